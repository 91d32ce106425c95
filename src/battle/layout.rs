//! Translation between grid coordinates and world space
//!
//! The core only reasons in world units when asking the occlusion provider
//! for rays; everything else stays on integer coordinates.

use std::fmt::Debug;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::battle::topology::Topology;

const SQRT_3: f32 = 1.732_050_8;

/// World placement of tiles, normally owned by the renderer
pub trait WorldLayout: Debug + Send + Sync {
    /// Centre of the tile's top surface at the given height
    fn world_position_of(&self, index: GridIndex, height: f32) -> Vec3;

    /// Tile whose footprint contains the position (height ignored)
    fn grid_index_of(&self, position: Vec3) -> GridIndex;

    /// Distance between neighboring tile centres along the x axis
    fn tile_size(&self) -> f32;
}

/// Built-in layout for all three topologies, centred on `origin`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileLayout {
    pub topology: Topology,
    pub tile_size: f32,
    pub origin: Vec3,
}

impl TileLayout {
    pub fn new(topology: Topology, tile_size: f32) -> Self {
        Self {
            topology,
            tile_size,
            origin: Vec3::ZERO,
        }
    }

    /// Distance between row centres along the z axis
    fn row_height(&self) -> f32 {
        match self.topology {
            Topology::Square => self.tile_size,
            Topology::Hexagon | Topology::Triangle => self.tile_size * SQRT_3 / 2.0,
        }
    }

    fn hex_index_of(&self, x: f32, z: f32) -> GridIndex {
        let r = z / self.row_height();
        let q = x / self.tile_size - r / 2.0;
        let (q, r) = cube_round(q, r);
        GridIndex::from_axial(q, r)
    }

    fn triangle_index_of(&self, x: f32, z: f32) -> GridIndex {
        let half_width = self.tile_size / 2.0;
        let row_height = self.row_height();
        let row = (z / row_height).round() as i32;
        // Vertical offset from the row centre, in [-0.5, 0.5] row heights
        let v = (z - row as f32 * row_height) / row_height;
        let nearest = (x / half_width).round() as i32;

        for column in [nearest, nearest - 1, nearest + 1] {
            let candidate = GridIndex::new(column, row);
            let u = (x - column as f32 * half_width).abs();
            // Up triangles are widest at the bottom of the row, down ones at the top.
            let reach = if candidate.is_facing_up() {
                half_width * (0.5 - v)
            } else {
                half_width * (0.5 + v)
            };
            if u <= reach + f32::EPSILON {
                return candidate;
            }
        }
        GridIndex::new(nearest, row)
    }
}

impl WorldLayout for TileLayout {
    fn world_position_of(&self, index: GridIndex, height: f32) -> Vec3 {
        let (x, z) = match self.topology {
            Topology::Square => (index.x as f32 * self.tile_size, index.z as f32 * self.tile_size),
            Topology::Hexagon => {
                let shift = if index.is_odd_row() { 0.5 } else { 0.0 };
                (
                    (index.x as f32 + shift) * self.tile_size,
                    index.z as f32 * self.row_height(),
                )
            }
            Topology::Triangle => (
                index.x as f32 * self.tile_size / 2.0,
                index.z as f32 * self.row_height(),
            ),
        };
        self.origin + Vec3::new(x, height, z)
    }

    fn grid_index_of(&self, position: Vec3) -> GridIndex {
        let local = position - self.origin;
        match self.topology {
            Topology::Square => GridIndex::new(
                (local.x / self.tile_size).round() as i32,
                (local.z / self.tile_size).round() as i32,
            ),
            Topology::Hexagon => self.hex_index_of(local.x, local.z),
            Topology::Triangle => self.triangle_index_of(local.x, local.z),
        }
    }

    fn tile_size(&self) -> f32 {
        self.tile_size
    }
}

/// Round fractional axial coordinates to the nearest hex
fn cube_round(q: f32, r: f32) -> (i32, i32) {
    let s = -q - r;
    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();

    let q_diff = (rq - q).abs();
    let r_diff = (rr - r).abs();
    let s_diff = (rs - s).abs();

    if q_diff > r_diff && q_diff > s_diff {
        rq = -rr - rs;
    } else if r_diff > s_diff {
        rr = -rq - rs;
    }

    (rq as i32, rr as i32)
}
