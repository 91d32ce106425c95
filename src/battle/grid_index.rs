//! Integer grid coordinates shared by every topology
//!
//! `x` runs along columns, `z` along rows. The meaning of a step depends on
//! the [`Topology`](crate::battle::topology::Topology) interpreting it.

use derive_more::{Add, Display, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};

/// Column/row coordinate of a tile
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    Neg,
    Mul,
)]
#[display(fmt = "({}, {})", x, z)]
pub struct GridIndex {
    pub x: i32,
    pub z: i32,
}

impl GridIndex {
    /// Sentinel for "not on the grid"
    pub const INVALID: GridIndex = GridIndex {
        x: i32::MIN,
        z: i32::MIN,
    };

    pub const ZERO: GridIndex = GridIndex { x: 0, z: 0 };

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    /// True on odd rows, including negative ones
    pub fn is_odd_row(&self) -> bool {
        self.z.rem_euclid(2) == 1
    }

    /// Triangle cells whose coordinate sum is even point up
    pub fn is_facing_up(&self) -> bool {
        (self.x + self.z).rem_euclid(2) == 0
    }

    /// Odd-r offset to axial (q, r)
    pub fn to_axial(&self) -> (i32, i32) {
        let q = self.x - (self.z - self.z.rem_euclid(2)) / 2;
        (q, self.z)
    }

    /// Axial (q, r) back to odd-r offset
    pub fn from_axial(q: i32, r: i32) -> Self {
        Self::new(q + (r - r.rem_euclid(2)) / 2, r)
    }
}

impl From<(i32, i32)> for GridIndex {
    fn from((x, z): (i32, i32)) -> Self {
        Self::new(x, z)
    }
}
