//! Tile-by-tile traversal of a committed path
//!
//! Occupancy jumps to the destination when a move is committed; this state
//! machine only tracks where the unit is visually along the way so the
//! orchestrator knows when it has arrived.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MovementState {
    #[default]
    Idle,
    Moving {
        /// Tile the unit is currently passing over
        at: GridIndex,
        /// Remaining tiles, destination last
        remaining: VecDeque<GridIndex>,
    },
}

/// Result of advancing along the path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementStep {
    /// Nothing to do
    Idle,
    /// Still travelling, currently over this tile
    Travelling(GridIndex),
    /// Reached the destination this step
    Arrived(GridIndex),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GridMovement {
    pub state: MovementState,
}

impl GridMovement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.state, MovementState::Moving { .. })
    }

    /// Start walking `path`; the first element is the starting tile
    pub fn begin(&mut self, path: &[GridIndex]) {
        match path.split_first() {
            Some((&at, rest)) if !rest.is_empty() => {
                self.state = MovementState::Moving {
                    at,
                    remaining: rest.iter().copied().collect(),
                };
            }
            _ => self.state = MovementState::Idle,
        }
    }

    /// Advance up to `steps` tiles
    pub fn advance(&mut self, steps: u32) -> MovementStep {
        let MovementState::Moving { at, remaining } = &mut self.state else {
            return MovementStep::Idle;
        };
        for _ in 0..steps {
            match remaining.pop_front() {
                Some(next) => *at = next,
                None => break,
            }
        }
        if remaining.is_empty() {
            let destination = *at;
            self.state = MovementState::Idle;
            MovementStep::Arrived(destination)
        } else {
            MovementStep::Travelling(*at)
        }
    }

    /// Jump straight to the end of the path
    pub fn finish(&mut self) -> Option<GridIndex> {
        let destination = match &self.state {
            MovementState::Moving { at, remaining } => remaining.back().copied().unwrap_or(*at),
            MovementState::Idle => return None,
        };
        self.state = MovementState::Idle;
        Some(destination)
    }

    /// Abandon the traversal without arriving
    pub fn stop(&mut self) {
        self.state = MovementState::Idle;
    }
}
