//! Locating a mod's files and copying them into the game directory.
//!
//! Sources are tried in a fixed order: the mod index (when preferred), the
//! archive cache (when preferred and configured), then the extracted-mods
//! cache. The first source that yields both a mod folder and an
//! installer-definition file wins.

use crate::errors::JengaError;
use crate::models::{JengaConfig, JengaHint, ModStep, RunConfig};
use crate::services::aliases::AliasRegistry;
use crate::services::archive::Unpacker;
use crate::services::classifier::{self, ExtractionResult};
use crate::services::fsutil;
use crate::services::matching::{FuzzyLocator, SearchKind};
use crate::services::mod_index::ModIndex;
use crate::ui::{Decision, Gate, Prompter};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Where a resolved mod came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Index,
    Archive,
    ExtractedCache,
}

/// A mod copied into the game directory, ready to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMod {
    pub mod_dir: Utf8PathBuf,
    pub definition_file: Utf8PathBuf,
    pub source: ResolutionSource,
}

pub struct ModResolver<'a> {
    config: &'a JengaConfig,
    aliases: &'a AliasRegistry,
    index: &'a ModIndex,
    unpacker: &'a dyn Unpacker,
}

fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Find where `definition` lands once `source_dir` is copied to `target_dir`.
///
/// A definition file inside the mod folder moves with it. One sitting at the
/// root of the extracted-mods directory, beside the folder, is copied to the
/// root of the game directory instead.
fn place_definition(
    definition: &Utf8Path,
    source_dir: &Utf8Path,
    target_dir: &Utf8Path,
    extracted_root: &Utf8Path,
    game_dir: &Utf8Path,
) -> Result<Utf8PathBuf> {
    if let Ok(rel) = definition.strip_prefix(source_dir) {
        return Ok(target_dir.join(rel));
    }
    if definition.parent() == Some(extracted_root) {
        let dest = game_dir.join(file_name(definition));
        fsutil::replace_file(definition, &dest)?;
        tracing::info!("Copied installer definition to {}", dest);
        return Ok(dest);
    }
    Err(JengaError::IllformedExtractedModDir {
        path: source_dir.to_string(),
        reason: format!(
            "installer definition {} is neither inside the mod folder nor beside it",
            definition
        ),
    }
    .into())
}

impl<'a> ModResolver<'a> {
    pub fn new(
        config: &'a JengaConfig,
        aliases: &'a AliasRegistry,
        index: &'a ModIndex,
        unpacker: &'a dyn Unpacker,
    ) -> Self {
        Self {
            config,
            aliases,
            index,
            unpacker,
        }
    }

    fn locator(&self) -> FuzzyLocator<'a> {
        FuzzyLocator::new(self.aliases, self.config.fuzzy_match_threshold)
    }

    /// Resolve `step` and copy its files into the run's game directory.
    ///
    /// Fails with [`JengaError::ModNotFound`] when every source comes up empty.
    pub fn resolve(
        &self,
        step: &ModStep,
        run: &RunConfig,
        prompter: &mut dyn Prompter,
    ) -> Result<ResolvedMod> {
        let name = step.name();

        if run.prefer_index {
            if let Some(resolved) = self.from_index(name, &run.game_dir)? {
                return Ok(resolved);
            }
        }

        if run.prefer_archive_cache {
            match self.config.zipped_mod_cache_dir_path.as_deref() {
                Some(zipped_dir) => {
                    if let Some(resolved) =
                        self.from_archive(name, zipped_dir, &run.game_dir, prompter)?
                    {
                        return Ok(resolved);
                    }
                }
                None => tracing::warn!(
                    "prefer_zipped_mods is set but zipped_mod_cache_dir_path is not; \
                     using the extracted mods directory"
                ),
            }
        }

        self.from_extracted_cache(name, &run.game_dir)
    }

    fn from_index(&self, name: &str, game_dir: &Utf8Path) -> Result<Option<ResolvedMod>> {
        let Some(entry) = self.index.get(name, self.aliases) else {
            tracing::info!("'{}' is not in the mod index", name);
            return Ok(None);
        };
        tracing::info!("Found '{}' in the mod index at {}", name, entry.extracted_dpath);

        let source = &entry.extracted_dpath;
        let extracted_root = source
            .parent()
            .with_context(|| format!("Indexed mod folder {} has no parent", source))?;
        let target = game_dir.join(file_name(source));
        fsutil::replace_dir(source, &target)?;
        let definition_file =
            place_definition(&entry.tp2_fpath, source, &target, extracted_root, game_dir)?;

        Ok(Some(ResolvedMod {
            mod_dir: target,
            definition_file,
            source: ResolutionSource::Index,
        }))
    }

    fn from_archive(
        &self,
        name: &str,
        zipped_dir: &Utf8Path,
        game_dir: &Utf8Path,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<ResolvedMod>> {
        let extracted_dir = self.config.demand_extracted_mod_cache_dir()?;
        let locator = self.locator();

        let Some(archive) = locator.locate(zipped_dir, name, SearchKind::Archive)? else {
            tracing::warn!("No archive matching '{}' in {}", name, zipped_dir);
            return Ok(None);
        };
        let decision = prompter.ask(&Gate::ConfirmArchive {
            mod_name: name,
            archive: &archive,
        });
        if decision != Decision::Yes {
            tracing::warn!("Archive {} rejected for '{}'", archive, name);
            return Ok(None);
        }

        if let Some(existing) = locator.locate(extracted_dir, name, SearchKind::Directory)? {
            if prompter.ask(&Gate::DeleteExisting { path: &existing }) == Decision::Yes {
                fsutil::remove_path(&existing)?;
            }
        }

        let extraction = classifier::extract_archive(&archive, extracted_dir, Some(name), self.unpacker)?;
        self.copy_extraction(&extraction, extracted_dir, game_dir).map(Some)
    }

    fn copy_extraction(
        &self,
        extraction: &ExtractionResult,
        extracted_dir: &Utf8Path,
        game_dir: &Utf8Path,
    ) -> Result<ResolvedMod> {
        let unit = &extraction.unit;
        let source = &extraction.mod_folder;
        let target = game_dir.join(file_name(source));
        fsutil::replace_dir(source, &target)?;
        let definition_file = place_definition(
            &unit.primary_definition_file,
            source,
            &target,
            extracted_dir,
            game_dir,
        )?;

        for folder in &unit.secondary_folders {
            fsutil::replace_dir(folder, &game_dir.join(file_name(folder)))?;
        }
        for file in unit
            .secondary_definition_files
            .iter()
            .filter(|def| def.parent() == Some(extracted_dir))
            .chain(&unit.secondary_loose_files)
        {
            fsutil::replace_file(file, &game_dir.join(file_name(file)))?;
        }

        tracing::info!(
            "Copied {} ({}) into {}",
            extraction.archive_file_name,
            unit.shape,
            game_dir
        );
        Ok(ResolvedMod {
            mod_dir: target,
            definition_file,
            source: ResolutionSource::Archive,
        })
    }

    fn from_extracted_cache(&self, name: &str, game_dir: &Utf8Path) -> Result<ResolvedMod> {
        let extracted_dir = self.config.demand_extracted_mod_cache_dir()?;
        let locator = self.locator();

        let Some(source) = locator.locate(extracted_dir, name, SearchKind::Directory)? else {
            return Err(JengaError::ModNotFound(name.to_string()).into());
        };
        tracing::info!("Found '{}' in the extracted mods directory at {}", name, source);
        let target = game_dir.join(file_name(&source));
        fsutil::replace_dir(&source, &target)?;

        let hinted = JengaHint::read(&source)?
            .map(|hint| hint.main_tp2_fpath)
            .filter(|tp2| tp2.is_file())
            .and_then(|tp2| {
                place_definition(&tp2, &source, &target, extracted_dir, game_dir)
                    .inspect_err(|err| tracing::warn!("Ignoring hint of {}: {:#}", source, err))
                    .ok()
            });
        let definition_file = match hinted {
            Some(definition) => definition,
            None => locator
                .locate(&target, name, SearchKind::Definition)?
                .ok_or_else(|| JengaError::ModNotFound(name.to_string()))?,
        };

        Ok(ResolvedMod {
            mod_dir: target,
            definition_file,
            source: ResolutionSource::ExtractedCache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildSettings, ModStep, ModIndexEntry, RunOverrides};
    use crate::ui::{GateKind, ScriptedPrompter};
    use std::fs;
    use tempfile::TempDir;

    struct NoUnpack;

    impl Unpacker for NoUnpack {
        fn unpack(&self, archive: &Utf8Path, _dest: &Utf8Path) -> Result<()> {
            anyhow::bail!("unexpected unpack of {}", archive)
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        game: Utf8PathBuf,
        extracted: Utf8PathBuf,
        config: JengaConfig,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let game = root.join("game");
        let extracted = root.join("extracted");
        fs::create_dir_all(&game).unwrap();
        fs::create_dir_all(&extracted).unwrap();
        let config = JengaConfig {
            extracted_mod_cache_dir_path: Some(extracted.clone()),
            ..Default::default()
        };
        Fixture {
            _temp_dir: temp_dir,
            game,
            extracted,
            config,
        }
    }

    fn run_config(game: &Utf8Path, prefer_index: bool) -> RunConfig {
        let settings = BuildSettings {
            build_name: "b".to_string(),
            prefer_mod_index: prefer_index,
            ..Default::default()
        };
        let overrides = RunOverrides {
            game_dir: Some(game.to_path_buf()),
            ..Default::default()
        };
        RunConfig::resolve(&settings, &JengaConfig::default(), &overrides).unwrap()
    }

    fn write(path: Utf8PathBuf, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_place_definition_inside_and_beside() {
        let fx = fixture();
        let source = fx.extracted.join("baz");
        write(source.join("data.txt"), "");
        write(fx.extracted.join("setup-baz.tp2"), "BACKUP ~baz/backup~");

        let inside = place_definition(
            &source.join("setup-baz.tp2"),
            &source,
            &fx.game.join("baz"),
            &fx.extracted,
            &fx.game,
        )
        .unwrap();
        assert_eq!(inside, fx.game.join("baz/setup-baz.tp2"));

        let beside = place_definition(
            &fx.extracted.join("setup-baz.tp2"),
            &source,
            &fx.game.join("baz"),
            &fx.extracted,
            &fx.game,
        )
        .unwrap();
        assert_eq!(beside, fx.game.join("setup-baz.tp2"));
        assert!(beside.is_file());

        let err = place_definition(
            Utf8Path::new("/elsewhere/setup-baz.tp2"),
            &source,
            &fx.game.join("baz"),
            &fx.extracted,
            &fx.game,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JengaError>(),
            Some(JengaError::IllformedExtractedModDir { .. })
        ));
    }

    #[test]
    fn test_resolves_from_extracted_cache() {
        let fx = fixture();
        write(fx.extracted.join("lucy/setup-lucy.tp2"), "BACKUP ~lucy/backup~");
        write(fx.extracted.join("eet/eet.tp2"), "");

        let aliases = AliasRegistry::new();
        let index = ModIndex::new();
        let resolver = ModResolver::new(&fx.config, &aliases, &index, &NoUnpack);
        let step = ModStep::new("lucy", "1", 0, Vec::new()).unwrap();
        let mut prompter = ScriptedPrompter::default();

        let resolved = resolver
            .resolve(&step, &run_config(&fx.game, false), &mut prompter)
            .unwrap();
        assert_eq!(resolved.source, ResolutionSource::ExtractedCache);
        assert_eq!(resolved.mod_dir, fx.game.join("lucy"));
        assert_eq!(resolved.definition_file, fx.game.join("lucy/setup-lucy.tp2"));
        assert!(resolved.definition_file.is_file());
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_index_preferred_over_extracted_cache() {
        let fx = fixture();
        write(fx.extracted.join("item_rev/item_rev.tp2"), "");
        let mut index = ModIndex::new();
        index.insert(ModIndexEntry {
            name: "item_rev".to_string(),
            full_name: "Item Revisions".to_string(),
            version: "v4".to_string(),
            author: String::new(),
            description: String::new(),
            extracted_dpath: fx.extracted.join("item_rev"),
            tp2_fpath: fx.extracted.join("item_rev/item_rev.tp2"),
            aliases: Vec::new(),
            archive_fname: None,
            archive_inferred_version: None,
            download: None,
            label_type: None,
            mod_type: None,
            before: None,
            after: None,
        });

        let aliases = AliasRegistry::new();
        let resolver = ModResolver::new(&fx.config, &aliases, &index, &NoUnpack);
        let step = ModStep::new("ITEM_REV", "v4", 0, Vec::new()).unwrap();
        let resolved = resolver
            .resolve(&step, &run_config(&fx.game, true), &mut ScriptedPrompter::default())
            .unwrap();
        assert_eq!(resolved.source, ResolutionSource::Index);
        assert_eq!(resolved.definition_file, fx.game.join("item_rev/item_rev.tp2"));
    }

    #[test]
    fn test_unknown_mod_is_not_found() {
        let fx = fixture();
        let aliases = AliasRegistry::new();
        let index = ModIndex::new();
        let resolver = ModResolver::new(&fx.config, &aliases, &index, &NoUnpack);
        let step = ModStep::new("nothing_here", "", 0, Vec::new()).unwrap();

        let err = resolver
            .resolve(&step, &run_config(&fx.game, true), &mut ScriptedPrompter::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JengaError>(),
            Some(JengaError::ModNotFound(name)) if name == "nothing_here"
        ));
    }

    #[test]
    fn test_rejected_archive_falls_back_to_extracted_cache() {
        let mut fx = fixture();
        let zipped = fx.extracted.parent().unwrap().join("zipped");
        write(zipped.join("lucy-v2.zip"), "");
        write(fx.extracted.join("lucy/setup-lucy.tp2"), "");
        fx.config.zipped_mod_cache_dir_path = Some(zipped);

        let aliases = AliasRegistry::new();
        let index = ModIndex::new();
        let resolver = ModResolver::new(&fx.config, &aliases, &index, &NoUnpack);
        let step = ModStep::new("lucy", "2", 0, Vec::new()).unwrap();
        let mut run = run_config(&fx.game, false);
        run.prefer_archive_cache = true;
        let mut prompter = ScriptedPrompter::new([Decision::No]);

        let resolved = resolver.resolve(&step, &run, &mut prompter).unwrap();
        assert_eq!(resolved.source, ResolutionSource::ExtractedCache);
        assert_eq!(prompter.asked(), &[GateKind::ConfirmArchive]);
    }
}
