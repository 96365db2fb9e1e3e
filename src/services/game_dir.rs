//! Resetting a game directory from a pristine copy.

use crate::errors::JengaError;
use crate::models::{GameDirKind, JengaConfig};
use crate::services::fsutil;
use crate::ui::{Decision, Gate, Prompter};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

/// Replace `target` with a copy of `source`.
///
/// The old tree is made writable and deleted first. Nothing is asked; see
/// [`overwrite_game_dir`] for the confirmed variant.
pub fn overwrite_dir_with(source: &Utf8Path, target: &Utf8Path) -> Result<()> {
    tracing::info!("Overwriting {} with {}", target, source);
    fsutil::replace_dir(source, target)?;
    tracing::info!("{} now mirrors {}", target, source);
    Ok(())
}

/// Overwrite the target directory of `game` with its clean (or EET) source.
///
/// Requires the user to type the overwrite confirmation phrase. Returns the
/// overwritten directory.
pub fn overwrite_game_dir(
    config: &JengaConfig,
    game: &str,
    source_kind: GameDirKind,
    prompter: &mut dyn Prompter,
) -> Result<Utf8PathBuf> {
    let target = config
        .game_dir(game, GameDirKind::Target)
        .ok_or_else(|| JengaError::config(format!("No target game directory configured for '{}'", game)))?
        .to_path_buf();
    let source = config.demand_game_dir(game, source_kind)?;

    let decision = prompter.ask(&Gate::OverwriteDirectory {
        target: &target,
        source,
    });
    if decision != Decision::Yes {
        return Err(JengaError::config(format!("Overwrite of {} was not confirmed", target)).into());
    }

    overwrite_dir_with(source, &target)?;
    Ok(target)
}
