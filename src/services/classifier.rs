//! Archive classification and extraction into the extracted-mods cache.
//!
//! An unpacked mod archive is reduced to one of five [`ArchiveShape`]s by
//! looking at its top level:
//!
//! | subfolders | definition files at root | shape |
//! |---|---|---|
//! | 1, with a definition file inside | any | `SINGLE_FOLDER` |
//! | 1, without one | ≥ 1 | `FOLDER_PLUS_SIBLING_DEFINITION` |
//! | 0 | ≥ 1 | `FLAT_FILES` |
//! | > 1 | ≥ 1 | `MULTI_FOLDER_SHARED_SIBLING_DEFINITION` |
//! | > 1 | 0 | `MULTI_FOLDER_EACH_SELF_CONTAINED` |
//!
//! Container folders wrapping the real content are collapsed first.

use crate::errors::JengaError;
use crate::models::{ArchiveShape, InstallableUnit, JengaHint};
use crate::services::archive::{Unpacker, is_archive_name};
use crate::services::fsutil::{self, is_junk_name};
use crate::services::matching::{DEFINITION_EXT, find_best, is_definition_file};
use crate::services::naming::{
    NameMapper, archive_stem, name_mapper_for_archive, peel_affixes, version_from_archive_name,
};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use walkdir::WalkDir;

const LOOSE_FILE_EXT: &str = "command";

/// Top-level view of one directory, junk excluded, each list sorted.
#[derive(Debug, Default)]
struct Listing {
    dirs: Vec<Utf8PathBuf>,
    definitions: Vec<Utf8PathBuf>,
    files: Vec<Utf8PathBuf>,
}

impl Listing {
    fn read(dir: &Utf8Path) -> Result<Self> {
        let mut listing = Listing::default();
        for path in fsutil::sorted_entries(dir)? {
            let name = file_name(&path);
            if is_junk_name(name) {
                continue;
            }
            if path.is_dir() {
                listing.dirs.push(path);
            } else if is_definition_file(name) {
                listing.definitions.push(path);
            } else {
                listing.files.push(path);
            }
        }
        Ok(listing)
    }

    fn loose_files(&self) -> Vec<Utf8PathBuf> {
        self.files
            .iter()
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(LOOSE_FILE_EXT))
            })
            .cloned()
            .collect()
    }
}

fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Definition file stem with any `setup-` prefix removed, lower-cased.
fn definition_key(path: &Utf8Path) -> String {
    let stem = path.file_stem().unwrap_or_default().to_lowercase();
    stem.strip_prefix("setup-")
        .or_else(|| stem.strip_prefix("setup_"))
        .map(str::to_string)
        .unwrap_or(stem)
}

/// Whether `dir` only wraps the real content.
///
/// A folder without definition files is a wrapper. So is one whose
/// definition file names one of its own subfolders (`setup-foo.tp2` beside
/// `foo/`), the layout of older archives.
fn is_container(dir: &Utf8Path) -> Result<bool> {
    let listing = Listing::read(dir)?;
    if listing.definitions.is_empty() {
        return Ok(true);
    }
    let sub_names: Vec<String> = listing
        .dirs
        .iter()
        .map(|d| file_name(d).to_lowercase())
        .collect();
    Ok(listing
        .definitions
        .iter()
        .any(|def| sub_names.contains(&definition_key(def))))
}

/// Descend through folders that are the only entry of their parent.
fn collapse_root(root: &Utf8Path) -> Result<Utf8PathBuf> {
    let mut current = root.to_path_buf();
    loop {
        let listing = Listing::read(&current)?;
        if listing.dirs.len() != 1 || !listing.definitions.is_empty() || !listing.files.is_empty()
        {
            return Ok(current);
        }
        let only = &listing.dirs[0];
        if !is_container(only)? {
            return Ok(current);
        }
        tracing::debug!("Collapsing container folder {}", only);
        current = only.clone();
    }
}

/// The shortest definition-file stem anywhere under `root`.
fn infer_hint(root: &Utf8Path) -> Option<String> {
    let mut best: Option<String> = None;
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_definition_file(name) {
            continue;
        }
        let stem = &name[..name.len() - DEFINITION_EXT.len() - 1];
        if best.as_ref().is_none_or(|b| stem.len() < b.len()) {
            best = Some(stem.to_string());
        }
    }
    best
}

/// Split `defs` into the one best matching `hint` and the rest.
fn pick_definition(
    defs: &[Utf8PathBuf],
    hint: &str,
    archive_name: &str,
) -> Result<(Utf8PathBuf, Vec<Utf8PathBuf>)> {
    let keys: Vec<String> = defs.iter().map(|d| definition_key(d)).collect();
    let best = find_best(&hint.to_lowercase(), &keys)
        .ok_or_else(|| JengaError::malformed(archive_name, "no installer-definition files"))?;
    let mut rest = defs.to_vec();
    let primary = rest.remove(best.index);
    Ok((primary, rest))
}

/// Classify an unpacked tree, naming it after its root folder.
pub fn classify(root: &Utf8Path, hint: Option<&str>) -> Result<InstallableUnit> {
    classify_named(root, hint, file_name(root))
}

/// Classify an unpacked tree that came from the archive `archive_name`.
///
/// `hint` is the mod name to prefer when several definition files or
/// folders compete; when absent it is inferred from the shortest
/// definition-file name in the tree. Classification reads the tree only.
pub fn classify_named(
    root: &Utf8Path,
    hint: Option<&str>,
    archive_name: &str,
) -> Result<InstallableUnit> {
    let root = collapse_root(root)?;
    let listing = Listing::read(&root)?;

    let inferred = match hint {
        Some(h) => h.to_string(),
        None => infer_hint(&root).ok_or_else(|| {
            JengaError::malformed(archive_name, "no installer-definition files anywhere")
        })?,
    };
    let archive_folder = peel_affixes(archive_stem(archive_name));

    let unit = match listing.dirs.len() {
        0 => {
            if listing.definitions.is_empty() {
                return Err(JengaError::malformed(
                    archive_name,
                    "no folders and no installer-definition files",
                )
                .into());
            }
            let (primary, rest) = pick_definition(&listing.definitions, &inferred, archive_name)?;
            InstallableUnit {
                shape: ArchiveShape::FlatFiles,
                folder_name: archive_stem(archive_name).to_string(),
                mod_name: peel_affixes(hint.unwrap_or(&archive_folder)),
                primary_folder: None,
                primary_definition_file: primary,
                secondary_folders: Vec::new(),
                secondary_definition_files: rest,
                secondary_loose_files: Vec::new(),
                root: root.clone(),
            }
        }
        1 => {
            let folder = listing.dirs[0].clone();
            let inner = Listing::read(&folder)?;
            let folder_name = file_name(&folder).to_string();
            let mod_name = peel_affixes(hint.unwrap_or(&folder_name));
            if !inner.definitions.is_empty() {
                let (primary, rest) = pick_definition(&inner.definitions, &inferred, archive_name)?;
                if !listing.definitions.is_empty() {
                    tracing::debug!(
                        "Ignoring {} root-level definition file(s) beside {}",
                        listing.definitions.len(),
                        folder
                    );
                }
                InstallableUnit {
                    shape: ArchiveShape::SingleFolder,
                    folder_name,
                    mod_name,
                    primary_folder: Some(folder),
                    primary_definition_file: primary,
                    secondary_folders: Vec::new(),
                    secondary_definition_files: rest,
                    secondary_loose_files: Vec::new(),
                    root: root.clone(),
                }
            } else if !listing.definitions.is_empty() {
                let (primary, rest) = pick_definition(&listing.definitions, &inferred, archive_name)?;
                InstallableUnit {
                    shape: ArchiveShape::FolderPlusSiblingDefinition,
                    folder_name,
                    mod_name,
                    primary_folder: Some(folder),
                    primary_definition_file: primary,
                    secondary_folders: Vec::new(),
                    secondary_definition_files: rest,
                    secondary_loose_files: listing.loose_files(),
                    root: root.clone(),
                }
            } else {
                return Err(JengaError::malformed(
                    archive_name,
                    format!("folder '{}' has no installer-definition file", folder_name),
                )
                .into());
            }
        }
        _ if !listing.definitions.is_empty() => {
            let (primary, rest) = pick_definition(&listing.definitions, &inferred, archive_name)?;
            InstallableUnit {
                shape: ArchiveShape::MultiFolderSharedSiblingDefinition,
                folder_name: archive_folder.clone(),
                mod_name: peel_affixes(hint.unwrap_or(&archive_folder)),
                primary_folder: Some(root.clone()),
                primary_definition_file: primary,
                secondary_folders: Vec::new(),
                secondary_definition_files: rest,
                secondary_loose_files: Vec::new(),
                root: root.clone(),
            }
        }
        _ => {
            let mut qualifying = Vec::new();
            for dir in &listing.dirs {
                let inner = Listing::read(dir)?;
                if !inner.definitions.is_empty() {
                    qualifying.push((dir.clone(), inner.definitions));
                }
            }
            let names: Vec<String> = qualifying
                .iter()
                .map(|(dir, _)| file_name(dir).to_lowercase())
                .collect();
            let best = find_best(&inferred.to_lowercase(), &names).ok_or_else(|| {
                JengaError::malformed(archive_name, "no folder holds an installer-definition file")
            })?;

            let (folder, defs) = qualifying.remove(best.index);
            let (primary, _) = pick_definition(&defs, &inferred, archive_name)?;
            let mut secondary_folders = Vec::new();
            let mut secondary_definition_files = Vec::new();
            for (dir, defs) in qualifying {
                let own = file_name(&dir).to_lowercase();
                let (def, _) = pick_definition(&defs, &own, archive_name)?;
                secondary_folders.push(dir);
                secondary_definition_files.push(def);
            }
            let folder_name = file_name(&folder).to_string();
            InstallableUnit {
                shape: ArchiveShape::MultiFolderEachSelfContained,
                mod_name: peel_affixes(hint.unwrap_or(&folder_name)),
                folder_name,
                primary_folder: Some(folder),
                primary_definition_file: primary,
                secondary_folders,
                secondary_definition_files,
                secondary_loose_files: listing.loose_files(),
                root: root.clone(),
            }
        }
    };

    tracing::debug!(
        "Classified {} as {} (primary definition {})",
        archive_name,
        unit.shape,
        unit.primary_definition_file
    );
    Ok(unit)
}

/// Result of extracting one archive into the extracted-mods directory.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// The classified unit, with paths inside the extracted-mods directory.
    pub unit: InstallableUnit,
    /// Folder holding the hint file; the primary folder, or the folder a
    /// flat archive was copied to.
    pub mod_folder: Utf8PathBuf,
    pub mod_name: String,
    pub archive_file_name: String,
    pub aliases: Vec<String>,
    pub inferred_version: Option<String>,
    pub hint_file: Utf8PathBuf,
}

/// Copies a classified unit out of the scratch tree.
struct Placement<'a> {
    extracted_dir: &'a Utf8Path,
    mapper: Option<NameMapper>,
}

impl Placement<'_> {
    fn mapped_name(&self, name: &str) -> String {
        match &self.mapper {
            Some(mapper) => mapper.map_folder_name(name),
            None => name.to_string(),
        }
    }

    fn mapped_file_name(&self, name: &str) -> String {
        match &self.mapper {
            Some(mapper) => mapper.map_text(name),
            None => name.to_string(),
        }
    }

    fn copy_folder(&self, source: &Utf8Path, name: &str) -> Result<Utf8PathBuf> {
        let dest = self.extracted_dir.join(self.mapped_name(name));
        fsutil::replace_dir(source, &dest)?;
        Ok(dest)
    }

    fn copy_file_to_root(&self, source: &Utf8Path) -> Result<Utf8PathBuf> {
        let dest = self.extracted_dir.join(self.mapped_file_name(file_name(source)));
        fsutil::replace_file(source, &dest)?;
        Ok(dest)
    }

    /// Where a file under `from` ends up once `from` is copied to `to`.
    fn rebase(path: &Utf8Path, from: &Utf8Path, to: &Utf8Path) -> Utf8PathBuf {
        match path.strip_prefix(from) {
            Ok(rel) => to.join(rel),
            Err(_) => to.join(file_name(path)),
        }
    }
}

/// Unpack `archive`, classify it and copy its unit into `extracted_dir`.
///
/// Pre-existing folders and files of the same name are replaced. A
/// [`JengaHint`] is written into the resulting mod folder.
pub fn extract_archive(
    archive: &Utf8Path,
    extracted_dir: &Utf8Path,
    hint: Option<&str>,
    unpacker: &dyn Unpacker,
) -> Result<ExtractionResult> {
    let archive_file_name = file_name(archive).to_string();
    tracing::info!("Extracting {} into {}", archive_file_name, extracted_dir);

    let scratch = tempfile::TempDir::new().context("Failed to create scratch directory")?;
    let scratch_root = Utf8PathBuf::try_from(scratch.path().join("unpacked"))
        .context("Scratch directory path is not valid UTF-8")?;
    unpacker.unpack(archive, &scratch_root)?;

    let unit = classify_named(&scratch_root, hint, &archive_file_name)?;
    std::fs::create_dir_all(extracted_dir)
        .with_context(|| format!("Failed to create {}", extracted_dir))?;

    let placement = Placement {
        extracted_dir,
        mapper: name_mapper_for_archive(&archive_file_name),
    };

    let mut placed = unit.clone();
    let mod_folder = match unit.shape {
        ArchiveShape::SingleFolder | ArchiveShape::MultiFolderEachSelfContained => {
            let source = unit.primary_folder.as_deref().unwrap_or(&unit.root);
            let dest = placement.copy_folder(source, &unit.folder_name)?;
            placed.primary_definition_file =
                Placement::rebase(&unit.primary_definition_file, source, &dest);
            placed.primary_folder = Some(dest.clone());

            placed.secondary_folders.clear();
            placed.secondary_definition_files.clear();
            if unit.shape == ArchiveShape::SingleFolder {
                for def in &unit.secondary_definition_files {
                    placed
                        .secondary_definition_files
                        .push(Placement::rebase(def, source, &dest));
                }
            } else {
                for (folder, def) in unit
                    .secondary_folders
                    .iter()
                    .zip(&unit.secondary_definition_files)
                {
                    let copied = placement.copy_folder(folder, file_name(folder))?;
                    placed
                        .secondary_definition_files
                        .push(Placement::rebase(def, folder, &copied));
                    placed.secondary_folders.push(copied);
                }
            }
            dest
        }
        ArchiveShape::FolderPlusSiblingDefinition => {
            let source = unit.primary_folder.as_deref().unwrap_or(&unit.root);
            let dest = placement.copy_folder(source, &unit.folder_name)?;
            placed.primary_folder = Some(dest.clone());
            placed.primary_definition_file =
                placement.copy_file_to_root(&unit.primary_definition_file)?;
            placed.secondary_definition_files = unit
                .secondary_definition_files
                .iter()
                .map(|def| placement.copy_file_to_root(def))
                .collect::<Result<_>>()?;
            dest
        }
        ArchiveShape::FlatFiles | ArchiveShape::MultiFolderSharedSiblingDefinition => {
            let dest = placement.copy_folder(&unit.root, &unit.folder_name)?;
            placed.primary_definition_file =
                Placement::rebase(&unit.primary_definition_file, &unit.root, &dest);
            placed.secondary_definition_files = unit
                .secondary_definition_files
                .iter()
                .map(|def| Placement::rebase(def, &unit.root, &dest))
                .collect();
            if unit.shape == ArchiveShape::MultiFolderSharedSiblingDefinition {
                placed.primary_folder = Some(dest.clone());
            }
            dest
        }
    };
    placed.secondary_loose_files = unit
        .secondary_loose_files
        .iter()
        .map(|file| placement.copy_file_to_root(file))
        .collect::<Result<_>>()?;
    placed.root = extracted_dir.to_path_buf();
    placed.folder_name = file_name(&mod_folder).to_string();

    let aliases = derive_aliases(&unit, &scratch_root, &archive_file_name, placement.mapper);
    let mod_name = match placement.mapper {
        Some(mapper) => mapper.map_text(&unit.mod_name),
        None => unit.mod_name.clone(),
    };
    placed.mod_name = mod_name.clone();
    let inferred_version = version_from_archive_name(&archive_file_name);

    let hint_record = JengaHint {
        mod_name: mod_name.clone(),
        archive_fname: archive_file_name.clone(),
        extraction_type: unit.shape,
        main_tp2_fpath: placed.primary_definition_file.clone(),
        aliases: aliases.clone(),
        archive_inferred_version: inferred_version.clone(),
    };
    let hint_file = hint_record.write(&mod_folder)?;

    tracing::info!(
        "Extracted {} as {} into {}",
        archive_file_name,
        unit.shape,
        mod_folder
    );
    Ok(ExtractionResult {
        unit: placed,
        mod_folder,
        mod_name,
        archive_file_name,
        aliases,
        inferred_version,
        hint_file,
    })
}

fn derive_aliases(
    unit: &InstallableUnit,
    scratch_root: &Utf8Path,
    archive_name: &str,
    mapper: Option<NameMapper>,
) -> Vec<String> {
    let mut aliases: IndexSet<String> = IndexSet::new();
    aliases.insert(unit.mod_name.clone());
    aliases.insert(peel_affixes(file_name(&unit.primary_definition_file)));
    aliases.insert(peel_affixes(archive_name));
    if unit.root.as_path() != scratch_root {
        aliases.insert(peel_affixes(file_name(&unit.root)));
    }
    if let [single] = unit.secondary_loose_files.as_slice() {
        aliases.insert(peel_affixes(file_name(single)));
    }
    aliases
        .into_iter()
        .map(|alias| match mapper {
            Some(mapper) => mapper.map_text(&alias),
            None => alias,
        })
        .filter(|alias| !alias.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Outcome of extracting every archive of a directory.
#[derive(Debug, Default)]
pub struct BulkExtractionReport {
    pub extracted: Vec<ExtractionResult>,
    pub failed: Vec<(Utf8PathBuf, String)>,
}

/// Extract every archive in `zipped_dir` whose name contains `filter`.
///
/// A failing archive is logged and recorded; the rest are still extracted.
pub fn extract_all(
    zipped_dir: &Utf8Path,
    extracted_dir: &Utf8Path,
    filter: Option<&str>,
    unpacker: &dyn Unpacker,
) -> Result<BulkExtractionReport> {
    let filter = filter.map(str::to_lowercase);
    let archives: Vec<Utf8PathBuf> = fsutil::sorted_entries(zipped_dir)?
        .into_iter()
        .filter(|path| path.is_file() && is_archive_name(file_name(path)))
        .filter(|path| {
            filter
                .as_deref()
                .is_none_or(|f| file_name(path).to_lowercase().contains(f))
        })
        .collect();
    tracing::info!("Extracting {} archive(s) from {}", archives.len(), zipped_dir);

    let mut report = BulkExtractionReport::default();
    for archive in archives {
        match extract_archive(&archive, extracted_dir, None, unpacker) {
            Ok(result) => report.extracted.push(result),
            Err(err) => {
                match err.downcast_ref::<JengaError>() {
                    Some(JengaError::MalformedArchive { .. }) => {
                        tracing::warn!("Skipping malformed archive {}: {}", archive, err)
                    }
                    _ => tracing::error!("Failed to extract {}: {:#}", archive, err),
                }
                report.failed.push((archive, format!("{:#}", err)));
            }
        }
    }
    tracing::info!(
        "Bulk extraction done: {} extracted, {} failed",
        report.extracted.len(),
        report.failed.len()
    );
    Ok(report)
}
