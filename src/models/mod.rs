//! Data models for jenga.
//!
//! - [`JengaConfig`]: tool configuration (installer path, caches, game directories)
//! - [`BuildPlan`] / [`ModStep`] / [`Component`]: the ordered build loaded from a build file
//! - [`RunConfig`]: the settings of one build run, resolved from the build file and config
//! - [`CheckpointState`]: the persisted resume marker
//! - [`InstallableUnit`] / [`JengaHint`]: what an archive classifies to, and its cached form
//! - [`ModIndexEntry`]: one record of the offline mod index

pub mod build;
pub mod checkpoint;
pub mod config;
pub mod index;
pub mod unit;

pub use build::{BuildFileFormat, BuildPlan, BuildSettings, Component, ModStep, RunConfig, RunOverrides};
pub use checkpoint::CheckpointState;
pub use config::{GameDirKind, GameDirs, JengaConfig, canonical_game_key};
pub use index::ModIndexEntry;
pub use unit::{ArchiveShape, HINT_FILE_NAME, InstallableUnit, JengaHint};
