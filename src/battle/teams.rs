//! Team membership for units in combat
//!
//! A unit belongs to at most one team. Changing team removes it from exactly
//! one set and inserts it into exactly one other.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};

use crate::core::types::{TeamId, UnitId};

#[derive(Debug, Clone, Default)]
pub struct Teams {
    members: BTreeMap<TeamId, AHashSet<UnitId>>,
    membership: AHashMap<UnitId, TeamId>,
}

impl Teams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team_of(&self, unit: UnitId) -> Option<TeamId> {
        self.membership.get(&unit).copied()
    }

    /// Move `unit` to `team` (or out of every team), returning its old team
    pub fn assign(&mut self, unit: UnitId, team: Option<TeamId>) -> Option<TeamId> {
        let previous = self.remove(unit);
        if let Some(team) = team {
            self.members.entry(team).or_default().insert(unit);
            self.membership.insert(unit, team);
        }
        previous
    }

    pub fn remove(&mut self, unit: UnitId) -> Option<TeamId> {
        let team = self.membership.remove(&unit)?;
        if let Some(set) = self.members.get_mut(&team) {
            set.remove(&unit);
            if set.is_empty() {
                self.members.remove(&team);
            }
        }
        Some(team)
    }

    pub fn members(&self, team: TeamId) -> impl Iterator<Item = UnitId> + '_ {
        self.members.get(&team).into_iter().flatten().copied()
    }

    pub fn member_count(&self, team: TeamId) -> usize {
        self.members.get(&team).map(|set| set.len()).unwrap_or(0)
    }

    /// Teams with at least one member, in ascending order
    pub fn active_teams(&self) -> Vec<TeamId> {
        self.members.keys().copied().collect()
    }

    pub fn non_empty_count(&self) -> usize {
        self.members.len()
    }

    /// Both units are on the same team
    pub fn are_allies(&self, a: UnitId, b: UnitId) -> bool {
        match (self.team_of(a), self.team_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Units on a different team than `unit` (all teamed units if it has none)
    pub fn enemies_of(&self, unit: UnitId) -> AHashSet<UnitId> {
        let own = self.team_of(unit);
        self.membership
            .iter()
            .filter(|(other, team)| **other != unit && Some(**team) != own)
            .map(|(other, _)| *other)
            .collect()
    }
}
