//! The offline mod index: metadata for every folder of the extracted-mods cache.
//!
//! The index is rebuilt wholesale by [`ModIndex::populate`] and persisted as
//! JSON keyed by lower-cased canonical name. Populating also rebuilds the
//! alias registry from each mod's hint file and definition file name.

use crate::errors::JengaError;
use crate::models::{JengaHint, ModIndexEntry};
use crate::services::aliases::AliasRegistry;
use crate::services::fsutil;
use crate::services::matching::is_definition_file;
use crate::services::naming::name_mapper_for_archive;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use walkdir::WalkDir;

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^VERSION\s*~([a-zA-Z0-9._-]+)~").expect("version line regex is valid")
});

static AUTHOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^AUTHOR\s*~([a-zA-Z0-9._\-\s]+)~").expect("author line regex is valid")
});

/// Version and author declared by an installer-definition file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DefinitionMetadata {
    pub version: Option<String>,
    pub author: Option<String>,
}

pub fn read_definition_metadata(path: &Utf8Path) -> Result<DefinitionMetadata> {
    let text = fsutil::read_text(path)?;
    let mut metadata = DefinitionMetadata::default();
    for line in text.lines() {
        if let Some(caps) = VERSION_LINE.captures(line) {
            metadata.version = Some(caps[1].to_string());
        }
        if let Some(caps) = AUTHOR_LINE.captures(line) {
            metadata.author = Some(caps[1].trim().to_string());
        }
    }
    Ok(metadata)
}

/// Key/value pairs below the `[Metadata]` header of a mod `.ini` file.
///
/// Keys are lower-cased; values split on the first `=`.
pub fn read_ini_metadata(path: &Utf8Path) -> Result<IndexMap<String, String>> {
    let text = fsutil::read_text(path)?;
    let mut pairs = IndexMap::new();
    let mut in_metadata = false;
    for line in text.lines() {
        if in_metadata {
            if let Some((key, value)) = line.split_once('=') {
                pairs.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }
        if line.contains("[Metadata]") {
            in_metadata = true;
        }
    }
    Ok(pairs)
}

fn is_likely_mod_dir_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    !(lowered.starts_with("__")
        || lowered.starts_with('.')
        || lowered == "docs"
        || lowered.ends_with(".app"))
}

/// Shortest-named definition file anywhere under `dir`.
fn shortest_definition(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut best: Option<(usize, Utf8PathBuf)> = None;
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_definition_file(name) {
            continue;
        }
        let Ok(path) = Utf8PathBuf::try_from(entry.path().to_path_buf()) else {
            continue;
        };
        if best.as_ref().is_none_or(|(len, _)| name.len() < *len) {
            best = Some((name.len(), path));
        }
    }
    best.map(|(_, path)| path)
}

/// Build the index entry of one extracted mod folder.
///
/// The hint file, when present, supplies name, definition path and
/// provenance; otherwise the shortest-named definition file decides both.
pub fn entry_from_dir(dir: &Utf8Path) -> Result<ModIndexEntry> {
    let hint = JengaHint::read(dir)?;

    let (name, tp2_fpath) = match &hint {
        Some(hint) if hint.main_tp2_fpath.is_file() => {
            (hint.mod_name.clone(), hint.main_tp2_fpath.clone())
        }
        _ => {
            let tp2 = shortest_definition(dir).ok_or_else(|| JengaError::IllformedExtractedModDir {
                path: dir.to_string(),
                reason: "no installer-definition file found".to_string(),
            })?;
            let name = match &hint {
                Some(hint) => hint.mod_name.clone(),
                None => tp2.file_stem().unwrap_or_default().to_string(),
            };
            (name, tp2)
        }
    };

    let definition = read_definition_metadata(&tp2_fpath)?;

    let mut ini = IndexMap::new();
    for path in fsutil::sorted_entries(dir)? {
        if path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ini")) {
            ini.extend(read_ini_metadata(&path)?);
        }
    }

    let archive_inferred_version = hint.as_ref().and_then(|h| h.archive_inferred_version.clone());
    let version = definition
        .version
        .or_else(|| archive_inferred_version.clone())
        .unwrap_or_default();
    let author = ini
        .get("author")
        .cloned()
        .or(definition.author)
        .unwrap_or_default();

    Ok(ModIndexEntry {
        full_name: ini.get("name").cloned().unwrap_or_else(|| name.clone()),
        name,
        version,
        author,
        description: ini.get("description").cloned().unwrap_or_default(),
        extracted_dpath: dir.to_path_buf(),
        tp2_fpath,
        aliases: hint.as_ref().map(|h| h.aliases.clone()).unwrap_or_default(),
        archive_fname: hint.as_ref().map(|h| h.archive_fname.clone()),
        archive_inferred_version,
        download: ini.get("download").cloned(),
        label_type: ini.get("labeltype").cloned(),
        mod_type: ini.get("type").cloned(),
        before: ini.get("before").cloned(),
        after: ini.get("after").cloned(),
    })
}

/// Index of extracted mods keyed by lower-cased canonical name.
#[derive(Debug, Clone, Default)]
pub struct ModIndex {
    entries: IndexMap<String, ModIndexEntry>,
}

impl ModIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan `extracted_dir` from scratch.
    ///
    /// `aliases` is reset and refilled from the scanned mods. Folders that
    /// cannot be indexed are logged and skipped.
    pub fn populate(extracted_dir: &Utf8Path, aliases: &mut AliasRegistry) -> Result<Self> {
        tracing::info!("Populating mod index from {}", extracted_dir);
        aliases.reset();
        let mut index = Self::new();

        for dir in fsutil::sorted_entries(extracted_dir)? {
            let Some(dir_name) = dir.file_name() else {
                continue;
            };
            if !dir.is_dir() || !is_likely_mod_dir_name(dir_name) {
                continue;
            }
            let mut entry = match entry_from_dir(&dir) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Skipping {}: {:#}", dir, err);
                    continue;
                }
            };

            let mapper = entry.archive_fname.as_deref().and_then(name_mapper_for_archive);
            let fix = |alias: &str| match mapper {
                Some(mapper) => mapper.map_text(alias),
                None => alias.to_string(),
            };
            let mut names: Vec<String> = entry.aliases.iter().map(|a| fix(a)).collect();
            if !entry.full_name.is_empty() {
                names.push(fix(&entry.full_name));
            }
            if let Some(stem) = entry.tp2_fpath.file_stem() {
                names.push(fix(stem));
            }
            names.sort();
            names.dedup();
            for alias in &names {
                aliases.register(alias, &entry.name);
            }
            entry.aliases = names;

            tracing::debug!("Indexed {} from {}", entry.key(), dir);
            index.entries.insert(entry.key(), entry);
        }

        tracing::info!("Mod index populated with {} mods", index.len());
        Ok(index)
    }

    /// Load a persisted index. A missing file yields an empty index.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.is_file() {
            tracing::debug!("No mod index at {}", path);
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mod index: {}", path))?;
        let entries: IndexMap<String, ModIndexEntry> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse mod index: {}", path))?;
        tracing::info!("Loaded mod index with {} mods from {}", entries.len(), path);
        Ok(Self { entries })
    }

    /// Replace the persisted index at `path` with this one.
    pub fn persist(&self, path: &Utf8Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize mod index")?;
        fs::write(path, json).with_context(|| format!("Failed to write mod index: {}", path))?;
        tracing::info!("Mod index written to {}", path);
        Ok(())
    }

    /// Look up a mod by name, falling back to its canonical alias.
    pub fn get(&self, name: &str, aliases: &AliasRegistry) -> Option<&ModIndexEntry> {
        let key = name.trim().to_lowercase();
        if let Some(entry) = self.entries.get(&key) {
            return Some(entry);
        }
        let canonical = aliases.resolve(&key)?;
        let found = self.entries.get(&canonical.to_lowercase());
        if found.is_none() {
            tracing::debug!("Mod '{}' not found in the mod index", name);
        }
        found
    }

    pub fn insert(&mut self, entry: ModIndexEntry) {
        self.entries.insert(entry.key(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModIndexEntry> {
        self.entries.values()
    }
}
