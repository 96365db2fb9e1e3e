// Checkpoint persistence
//
// A build run writes a fresh `jenga_state_<build>_<YYYYMMDD_HHMMSS>.json`
// into the game directory when it starts, and overwrites it after every
// terminal event. Resuming reads the most recent one.

use crate::errors::JengaError;
use crate::models::CheckpointState;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;

/// File name prefix shared by every checkpoint file.
pub const STATE_FILE_PREFIX: &str = "jenga_state_";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the checkpoint file for `build_name` created at `at`.
pub fn state_file_name(build_name: &str, at: DateTime<Local>) -> String {
    format!(
        "{}{}_{}.json",
        STATE_FILE_PREFIX,
        build_name,
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Writes the checkpoint of one build run.
///
/// The store owns a single file; every [`save`](Self::save) overwrites it.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    build_name: String,
    path: Utf8PathBuf,
}

impl CheckpointStore {
    /// A store with a fresh, timestamped file name in `game_dir`.
    pub fn create(game_dir: &Utf8Path, build_name: &str) -> Self {
        let path = game_dir.join(state_file_name(build_name, Local::now()));
        Self::at(path, build_name)
    }

    /// A store writing to an explicit path.
    pub fn at(path: Utf8PathBuf, build_name: &str) -> Self {
        Self {
            build_name: build_name.to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn build_name(&self) -> &str {
        &self.build_name
    }

    /// Record `last_mod_index` as the last step needing no further work.
    pub fn save(&self, last_mod_index: i64) -> Result<()> {
        let state = CheckpointState::new(&self.build_name, last_mod_index);
        let json =
            serde_json::to_string_pretty(&state).context("Failed to serialize checkpoint")?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)
            .with_context(|| format!("Failed to write checkpoint: {}", staging))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to move checkpoint into place: {}", self.path))?;
        tracing::debug!("Checkpoint {} saved at index {}", self.path, last_mod_index);
        Ok(())
    }

    /// Read a checkpoint file.
    pub fn read(path: &Utf8Path) -> Result<CheckpointState> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {}", path))?;
        let state: CheckpointState = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse checkpoint: {}", path))?;
        Ok(state)
    }

    /// The most recent checkpoint file of `build_name` in `game_dir`.
    ///
    /// Only names of the exact form `jenga_state_<build_name>_<timestamp>.json`
    /// count, so a build named `eet` never picks up `eet_end`'s files.
    pub fn find_latest(game_dir: &Utf8Path, build_name: &str) -> Result<Utf8PathBuf> {
        let prefix = format!("{}{}_", STATE_FILE_PREFIX, build_name);
        let mut candidates = Vec::new();
        for entry in game_dir
            .read_dir_utf8()
            .with_context(|| format!("Failed to list directory: {}", game_dir))?
        {
            let entry = entry.with_context(|| format!("Failed to read entry in {}", game_dir))?;
            let name = entry.file_name();
            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            if NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok() {
                candidates.push(name.to_string());
            }
        }
        candidates.sort();
        match candidates.pop() {
            Some(latest) => {
                let path = game_dir.join(latest);
                tracing::info!("Found latest checkpoint {}", path);
                Ok(path)
            }
            None => Err(JengaError::NoStateFileFound {
                build_name: build_name.to_string(),
                search_dir: game_dir.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn temp_utf8_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_state_file_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(state_file_name("eet", at), "jenga_state_eet_20240309_070501.json");
    }

    #[test]
    fn test_save_then_read_resumes_at_next_index() {
        let (_temp_dir, game) = temp_utf8_dir();
        let store = CheckpointStore::create(&game, "mybuild");
        store.save(4).unwrap();

        let state = CheckpointStore::read(store.path()).unwrap();
        assert_eq!(state, CheckpointState::new("mybuild", 4));
        assert_eq!(state.resume_index(), 5);
    }

    #[test]
    fn test_find_latest_picks_newest_of_this_build() {
        let (_temp_dir, game) = temp_utf8_dir();
        for name in [
            "jenga_state_eet_20240101_000000.json",
            "jenga_state_eet_20240301_120000.json",
            "jenga_state_eet_end_20250101_000000.json",
            "jenga_state_eet_notes.json",
        ] {
            fs::write(game.join(name), "{}").unwrap();
        }

        let latest = CheckpointStore::find_latest(&game, "eet").unwrap();
        assert_eq!(latest, game.join("jenga_state_eet_20240301_120000.json"));
    }

    #[test]
    fn test_find_latest_without_files() {
        let (_temp_dir, game) = temp_utf8_dir();
        let err = CheckpointStore::find_latest(&game, "eet").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JengaError>(),
            Some(JengaError::NoStateFileFound { .. })
        ));
    }
}
