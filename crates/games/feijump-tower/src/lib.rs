pub mod config;
pub mod controls;
pub mod error;
pub mod flow;
pub mod level_gen;
pub mod physics;
pub mod powerups;
pub mod progression;
pub mod session;

pub use config::{LevelConfig, LevelLayout, LevelTable, TowerConfig};
pub use error::{ConfigError, GameError};
pub use flow::{Flow, FlowEvent, Scene};
pub use level_gen::{GeneratedLevel, Platform, PlatformKind, generate_level};
pub use powerups::{PowerUpKind, PowerUpSystem};
pub use progression::{ProgressionState, ProgressionTracker};
pub use session::{GameSession, SessionEvent, SessionSetup, SessionState};
