//! Ability definitions, per-unit ability systems and activation instances
//!
//! An activation is an explicit state machine driven by the orchestrator's
//! tick. Action points are only charged when an instance completes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::battle::pattern::{AbilityRangeData, PatternKind, RangeSpec};
use crate::battle::units::UnitStats;
use crate::core::types::UnitId;

/// Unit attribute an effect modifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Attribute {
    #[default]
    Health,
}

/// Which units on the impact tiles an effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EffectTargets {
    #[default]
    Enemies,
    Allies,
    All,
}

/// Random modifier applied to an attribute; negative values hurt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityEffect {
    pub attribute: Attribute,
    pub min: i32,
    pub max: i32,
    pub targets: EffectTargets,
}

impl AbilityEffect {
    pub fn damage(min: i32, max: i32) -> Self {
        Self {
            attribute: Attribute::Health,
            min: -max,
            max: -min,
            targets: EffectTargets::Enemies,
        }
    }

    pub fn heal(min: i32, max: i32) -> Self {
        Self {
            attribute: Attribute::Health,
            min,
            max,
            targets: EffectTargets::Allies,
        }
    }

    /// Roll the modifier within `min..=max`
    pub fn roll(&self, rng: &mut impl Rng) -> i32 {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum AbilityKind {
    /// Applies effects to units on the impact tiles
    #[default]
    Strike,
    /// Places a new unit on the target tile for the caster's team
    Summon { name: String, stats: UnitStats },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub name: String,
    /// Action points charged on completion
    pub cost: u32,
    /// Where the target may be chosen, relative to the caster
    pub range: AbilityRangeData,
    /// Tiles affected, relative to the target
    pub area_of_effect: AbilityRangeData,
    pub effects: Vec<AbilityEffect>,
    pub kind: AbilityKind,
    /// Ticks between activation and resolution
    pub duration_ticks: u32,
}

impl AbilityDef {
    /// Single-target attack in a star around the caster
    pub fn strike(name: impl Into<String>, reach: i32, min_damage: i32, max_damage: i32) -> Self {
        Self {
            name: name.into(),
            cost: 1,
            range: AbilityRangeData::new(PatternKind::Star, RangeSpec::new(1, reach)),
            area_of_effect: AbilityRangeData::new(PatternKind::None, RangeSpec::new(0, 0)),
            effects: vec![AbilityEffect::damage(min_damage, max_damage)],
            kind: AbilityKind::Strike,
            duration_ticks: 1,
        }
    }

    pub fn summon(name: impl Into<String>, reach: i32, unit_name: impl Into<String>, stats: UnitStats) -> Self {
        Self {
            name: name.into(),
            cost: 2,
            range: AbilityRangeData::new(PatternKind::Diamond, RangeSpec::new(1, reach)),
            area_of_effect: AbilityRangeData::new(PatternKind::None, RangeSpec::new(0, 0)),
            effects: Vec::new(),
            kind: AbilityKind::Summon {
                name: unit_name.into(),
                stats,
            },
            duration_ticks: 1,
        }
    }

    pub fn with_area(mut self, area_of_effect: AbilityRangeData) -> Self {
        self.area_of_effect = area_of_effect;
        self
    }

    pub fn with_range(mut self, range: AbilityRangeData) -> Self {
        self.range = range;
        self
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }
}

/// Abilities and the action point pool of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AbilitySystem {
    pub abilities: Vec<AbilityDef>,
    pub action_points: u32,
    pub max_action_points: u32,
}

impl AbilitySystem {
    pub fn new(max_action_points: u32, abilities: Vec<AbilityDef>) -> Self {
        Self {
            abilities,
            action_points: max_action_points,
            max_action_points,
        }
    }

    pub fn ability(&self, name: &str) -> Option<&AbilityDef> {
        self.abilities.iter().find(|ability| ability.name == name)
    }

    pub fn has_action_points(&self, amount: u32) -> bool {
        self.action_points >= amount
    }

    pub fn remove_action_points(&mut self, amount: u32) {
        self.action_points = self.action_points.saturating_sub(amount);
    }

    pub fn reset_action_points(&mut self) {
        self.action_points = self.max_action_points;
    }
}

/// Lifecycle of one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityPhase {
    Pending { ticks_remaining: u32 },
    Completed,
    Cancelled,
}

/// A committed activation waiting to resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityInstance {
    pub caster: UnitId,
    pub ability: AbilityDef,
    pub origin: GridIndex,
    pub target: GridIndex,
    /// Tiles the area of effect covers, computed at activation
    pub impact: Vec<GridIndex>,
    pub phase: AbilityPhase,
}

impl AbilityInstance {
    pub fn new(caster: UnitId, ability: AbilityDef, origin: GridIndex, target: GridIndex, impact: Vec<GridIndex>) -> Self {
        let ticks_remaining = ability.duration_ticks;
        Self {
            caster,
            ability,
            origin,
            target,
            impact,
            phase: AbilityPhase::Pending { ticks_remaining },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, AbilityPhase::Pending { .. })
    }

    /// Count down; returns true on the tick the instance completes
    pub fn tick(&mut self) -> bool {
        let AbilityPhase::Pending { ticks_remaining } = self.phase else {
            return false;
        };
        if ticks_remaining <= 1 {
            self.phase = AbilityPhase::Completed;
            true
        } else {
            self.phase = AbilityPhase::Pending {
                ticks_remaining: ticks_remaining - 1,
            };
            false
        }
    }

    /// Returns true if the instance was still pending
    pub fn cancel(&mut self) -> bool {
        if self.is_pending() {
            self.phase = AbilityPhase::Cancelled;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_damage_roll_is_negative_and_bounded() {
        let effect = AbilityEffect::damage(2, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let roll = effect.roll(&mut rng);
            assert!((-4..=-2).contains(&roll));
        }
    }

    #[test]
    fn test_fixed_roll() {
        let effect = AbilityEffect::heal(3, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(effect.roll(&mut rng), 3);
    }

    #[test]
    fn test_action_points() {
        let mut system = AbilitySystem::new(2, vec![AbilityDef::strike("Strike", 1, 1, 2)]);
        assert!(system.has_action_points(2));
        system.remove_action_points(1);
        assert!(!system.has_action_points(2));
        system.remove_action_points(5);
        assert_eq!(system.action_points, 0);
        system.reset_action_points();
        assert_eq!(system.action_points, 2);
        assert!(system.ability("Strike").is_some());
        assert!(system.ability("Fireball").is_none());
    }

    #[test]
    fn test_instance_completes_after_duration() {
        let mut ability = AbilityDef::strike("Strike", 1, 1, 1);
        ability.duration_ticks = 2;
        let mut instance = AbilityInstance::new(UnitId::new(), ability, GridIndex::ZERO, GridIndex::new(1, 0), vec![]);

        assert!(!instance.tick());
        assert!(instance.tick());
        assert_eq!(instance.phase, AbilityPhase::Completed);
        assert!(!instance.tick());
        assert!(!instance.cancel());
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let mut ability = AbilityDef::strike("Strike", 1, 1, 1);
        ability.duration_ticks = 0;
        let mut instance = AbilityInstance::new(UnitId::new(), ability, GridIndex::ZERO, GridIndex::new(1, 0), vec![]);
        assert!(instance.tick());
    }

    #[test]
    fn test_cancel_pending() {
        let ability = AbilityDef::strike("Strike", 1, 1, 1);
        let mut instance = AbilityInstance::new(UnitId::new(), ability, GridIndex::ZERO, GridIndex::new(1, 0), vec![]);
        assert!(instance.cancel());
        assert_eq!(instance.phase, AbilityPhase::Cancelled);
        assert!(!instance.tick());
    }
}
