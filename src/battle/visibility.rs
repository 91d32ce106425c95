//! Line of sight between tiles
//!
//! The gate asks an [`OcclusionProvider`] for the first thing a ray hits.
//! Units standing on either end tile are ignored, any other unit denies
//! sight outright, and a ray stopped by level geometry is retried from four
//! points around the origin so shots past a corner are not denied.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::battle::grid_store::GridStore;
use crate::core::types::UnitId;

/// What a ray struck first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RayHit {
    Unit(UnitId),
    Geometry,
}

/// Collision world queried by the visibility gate
pub trait OcclusionProvider {
    /// First hit along `direction` within `max_distance`, skipping the
    /// colliders of `ignore` and anything the ray starts inside
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, ignore: &[UnitId]) -> Option<RayHit>;
}

/// Provider with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSky;

impl OcclusionProvider for OpenSky {
    fn raycast(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32, _ignore: &[UnitId]) -> Option<RayHit> {
        None
    }
}

// Retry order matters: the first clear ray wins.
const CORNER_OFFSETS: [(f32, f32); 4] = [(-1.0, 0.0), (0.0, 1.0), (1.0, 0.0), (0.0, -1.0)];

enum Verdict {
    Granted,
    Denied,
    Blocked,
}

fn classify(hit: Option<RayHit>) -> Verdict {
    match hit {
        None => Verdict::Granted,
        Some(RayHit::Unit(_)) => Verdict::Denied,
        Some(RayHit::Geometry) => Verdict::Blocked,
    }
}

/// Whether `target` can be seen from `origin` with eyes `height` above both tiles
///
/// `corner_offset` is the retry distance in tiles (0.5 puts the rays on tile edges).
pub fn has_line_of_sight(
    grid: &GridStore,
    occlusion: &dyn OcclusionProvider,
    origin: GridIndex,
    target: GridIndex,
    height: f32,
    corner_offset: f32,
) -> bool {
    let (Some(origin_tile), Some(target_tile)) = (grid.tile(origin), grid.tile(target)) else {
        return false;
    };

    let start = origin_tile.world_position + Vec3::Y * height;
    let end = target_tile.world_position + Vec3::Y * height;
    let direction = end - start;
    let distance = direction.length();
    if distance <= f32::EPSILON {
        return true;
    }

    let ignore: Vec<UnitId> = origin_tile.occupant.into_iter().chain(target_tile.occupant).collect();

    match classify(occlusion.raycast(start, direction, distance, &ignore)) {
        Verdict::Granted => return true,
        Verdict::Denied => return false,
        Verdict::Blocked => {}
    }

    let step = grid.layout().tile_size() * corner_offset;
    for (dx, dz) in CORNER_OFFSETS {
        let shifted = start + Vec3::new(dx * step, 0.0, dz * step);
        match classify(occlusion.raycast(shifted, direction, distance, &ignore)) {
            Verdict::Granted => return true,
            Verdict::Denied => return false,
            Verdict::Blocked => continue,
        }
    }

    false
}

/// Keep only the indexes visible from `origin`
pub fn filter_line_of_sight(
    grid: &GridStore,
    occlusion: &dyn OcclusionProvider,
    origin: GridIndex,
    indexes: Vec<GridIndex>,
    height: f32,
    corner_offset: f32,
) -> Vec<GridIndex> {
    indexes
        .into_iter()
        .filter(|index| has_line_of_sight(grid, occlusion, origin, *index, height, corner_offset))
        .collect()
}

/// Axis-aligned box in the occlusion world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occluder {
    pub min: Vec3,
    pub max: Vec3,
    /// Set when the box is a unit's collider
    pub unit: Option<UnitId>,
}

impl Occluder {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max, unit: None }
    }

    /// Distance along a normalised ray to the entry point, if the ray enters the box
    fn entry_distance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < 1e-8 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (self.min[axis] - o) / d;
            let t2 = (self.max[axis] - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        // A ray starting inside the box does not report it.
        if t_max < t_min || t_min < 0.0 || t_min > max_distance {
            return None;
        }
        Some(t_min)
    }
}

/// Minimal collision world made of boxes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AabbOccluders {
    pub boxes: Vec<Occluder>,
}

impl AabbOccluders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_box(&mut self, min: Vec3, max: Vec3) {
        self.boxes.push(Occluder::new(min, max));
    }

    /// Wall filling the footprint of a tile up to `height` above it
    pub fn add_tile_wall(&mut self, grid: &GridStore, index: GridIndex, height: f32) {
        if let Some(center) = grid.world_position_of(index) {
            let half = grid.layout().tile_size() * 0.5;
            self.add_box(
                center - Vec3::new(half, 0.0, half),
                center + Vec3::new(half, height, half),
            );
        }
    }

    /// Collider for a unit standing at `center`
    pub fn add_unit(&mut self, unit: UnitId, center: Vec3, half_width: f32, height: f32) {
        self.boxes.push(Occluder {
            min: center - Vec3::new(half_width, 0.0, half_width),
            max: center + Vec3::new(half_width, height, half_width),
            unit: Some(unit),
        });
    }

    /// Drop every unit collider and add one per occupied tile
    pub fn sync_units(&mut self, grid: &GridStore, half_width: f32, height: f32) {
        self.boxes.retain(|occluder| occluder.unit.is_none());
        for index in grid.indexes() {
            if let Some(tile) = grid.tile(index) {
                if let Some(unit) = tile.occupant {
                    self.add_unit(unit, tile.world_position, half_width, height);
                }
            }
        }
    }
}

impl OcclusionProvider for AabbOccluders {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, ignore: &[UnitId]) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        self.boxes
            .iter()
            .filter(|occluder| occluder.unit.map_or(true, |unit| !ignore.contains(&unit)))
            .filter_map(|occluder| {
                occluder
                    .entry_distance(origin, direction, max_distance)
                    .map(|t| (t, occluder))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, occluder)| match occluder.unit {
                Some(unit) => RayHit::Unit(unit),
                None => RayHit::Geometry,
            })
    }
}
