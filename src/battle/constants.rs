//! Combat constants - default unit values and collider sizes

// Unit defaults
pub const DEFAULT_MAX_HEALTH: i32 = 10;
pub const DEFAULT_MOVE_RANGE: f32 = 4.0;
pub const DEFAULT_ACTION_POINTS: u32 = 2;

// Occlusion colliders, in tile sizes
pub const UNIT_COLLIDER_HALF_WIDTH: f32 = 0.3;
pub const UNIT_COLLIDER_HEIGHT: f32 = 1.8;
