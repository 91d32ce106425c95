//! Tactical Grid - turn-based tactical combat engine

pub mod battle;
pub mod core;
