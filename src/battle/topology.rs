//! Tile adjacency for the three supported grid shapes
//!
//! Square grids use 8-way movement. Hex grids are pointy-top with odd rows
//! shifted right. Triangle cells alternate facing by coordinate parity.

use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;

/// Shape of the tiles making up a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Topology {
    #[default]
    Square,
    Hexagon,
    Triangle,
}

const SQUARE_NEIGHBORS: [GridIndex; 8] = [
    GridIndex::new(1, 0),
    GridIndex::new(-1, 0),
    GridIndex::new(0, 1),
    GridIndex::new(0, -1),
    GridIndex::new(1, 1),
    GridIndex::new(-1, -1),
    GridIndex::new(-1, 1),
    GridIndex::new(1, -1),
];

const HEX_NEIGHBORS_EVEN_ROW: [GridIndex; 6] = [
    GridIndex::new(1, 0),
    GridIndex::new(-1, 0),
    GridIndex::new(0, 1),
    GridIndex::new(-1, 1),
    GridIndex::new(0, -1),
    GridIndex::new(-1, -1),
];

const HEX_NEIGHBORS_ODD_ROW: [GridIndex; 6] = [
    GridIndex::new(1, 0),
    GridIndex::new(-1, 0),
    GridIndex::new(1, 1),
    GridIndex::new(0, 1),
    GridIndex::new(1, -1),
    GridIndex::new(0, -1),
];

// Edge neighbors first, then the vertex neighbors.
const TRIANGLE_NEIGHBORS_UP: [GridIndex; 6] = [
    GridIndex::new(1, 0),
    GridIndex::new(-1, 0),
    GridIndex::new(0, -1),
    GridIndex::new(2, 0),
    GridIndex::new(-2, 0),
    GridIndex::new(0, 1),
];

const TRIANGLE_NEIGHBORS_DOWN: [GridIndex; 6] = [
    GridIndex::new(1, 0),
    GridIndex::new(-1, 0),
    GridIndex::new(0, 1),
    GridIndex::new(2, 0),
    GridIndex::new(-2, 0),
    GridIndex::new(0, -1),
];

impl Topology {
    /// Relative offsets of every neighbor of `index`
    pub fn neighbor_offsets(&self, index: GridIndex) -> &'static [GridIndex] {
        match self {
            Topology::Square => &SQUARE_NEIGHBORS,
            Topology::Hexagon if index.is_odd_row() => &HEX_NEIGHBORS_ODD_ROW,
            Topology::Hexagon => &HEX_NEIGHBORS_EVEN_ROW,
            Topology::Triangle if index.is_facing_up() => &TRIANGLE_NEIGHBORS_UP,
            Topology::Triangle => &TRIANGLE_NEIGHBORS_DOWN,
        }
    }

    /// Absolute neighbor coordinates, whether or not they exist on a grid
    pub fn neighbors(&self, index: GridIndex) -> impl Iterator<Item = GridIndex> {
        self.neighbor_offsets(index)
            .iter()
            .map(move |offset| index + *offset)
    }

    /// Neighbor in a given table slot
    pub fn neighbor(&self, index: GridIndex, slot: usize) -> Option<GridIndex> {
        self.neighbor_offsets(index)
            .get(slot)
            .map(|offset| index + *offset)
    }

    /// Whether stepping from `from` to `to` crosses a square corner
    pub fn is_diagonal_step(&self, from: GridIndex, to: GridIndex) -> bool {
        matches!(self, Topology::Square) && from.x != to.x && from.z != to.z
    }

    /// Lower bound on the number of steps between two tiles
    ///
    /// Exact on open square and hex grids.
    pub fn step_distance(&self, a: GridIndex, b: GridIndex) -> u32 {
        match self {
            Topology::Square => {
                let dx = (a.x - b.x).unsigned_abs();
                let dz = (a.z - b.z).unsigned_abs();
                dx.max(dz)
            }
            Topology::Hexagon => hex_distance(a, b),
            Topology::Triangle => {
                // Every triangle step changes exactly one coordinate, x by at most 2.
                let dx = (a.x - b.x).unsigned_abs();
                let dz = (a.z - b.z).unsigned_abs();
                dz + dx.div_ceil(2)
            }
        }
    }
}

/// Cube distance between two odd-r offset coordinates
pub fn hex_distance(a: GridIndex, b: GridIndex) -> u32 {
    let (aq, ar) = a.to_axial();
    let (bq, br) = b.to_axial();
    let dq = aq - bq;
    let dr = ar - br;
    ((dq.abs() + dr.abs() + (dq + dr).abs()) / 2) as u32
}
