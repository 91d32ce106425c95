pub mod config;
pub mod error;
pub mod types;

pub use config::{CombatConfig, EngineConfig, GridConfig, VisibilityConfig};
pub use error::{Result, TacticsError};
pub use types::{SubscriptionId, TeamId, Tick, UnitId};
