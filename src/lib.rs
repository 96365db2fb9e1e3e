// Jenga - resumable WeiDU mod-build installer for Infinity Engine games
//
// This is the library crate containing the build engine, archive handling and
// data models. The binary crate (main.rs) provides the command line.

pub mod config;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use errors::JengaError;
pub use metrics::BuildMetrics;
pub use models::{BuildPlan, JengaConfig, ModStep, RunConfig};
pub use services::{BuildEngine, BuildOutcome};
pub use state::CheckpointStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
