//! Reading the game's `weidu.log`.
//!
//! WeiDU records one line per installed component:
//!
//! ```text
//! ~EET/EET.TP2~ #0 #0 // EET core (resource importation): V13.4
//! ```
//!
//! The records tell the engine what is already installed, and can be turned
//! back into a build file that reproduces the installation.

use crate::models::{BuildFileFormat, BuildPlan, BuildSettings, Component, ModStep};
use crate::services::aliases::AliasRegistry;
use crate::services::fsutil;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const WEIDU_LOG_FILE: &str = "weidu.log";

/// Version recorded for components whose log line carries none.
pub const UNVERSIONED: &str = "UNVERSIONED";

/// Tried first. The version is whatever follows the last `": "`, so a
/// versionless line whose description itself contains `": "` reads as
/// versioned; the log format offers nothing to tell the two apart.
static VERSIONED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^~(([^/~]+)/)?([^~]+)\.(?i:tp2)~ #(\d+) #(\d+) // (.+): (.+)$")
        .expect("versioned log line regex is valid")
});

static UNVERSIONED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^~(([^/~]+)/)?([^~]+)\.(?i:tp2)~ #(\d+) #(\d+) // (.+)$")
        .expect("log line regex is valid")
});

static DEFINITION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^~([^~]+)~").expect("definition path regex is valid"));

/// One mod as recorded in `weidu.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledMod {
    /// Lower-cased mod folder name, or definition stem for root-level mods.
    pub name: String,
    pub version: String,
    pub language_int: u32,
    /// Components in log order.
    pub components: Vec<Component>,
    /// Installed component numbers, sorted numerically.
    pub install_list: String,
    /// Definition file path relative to the game directory, as logged.
    pub tp2_rel_fpath: String,
}

/// Whether `step` is already installed exactly as planned.
///
/// Versions must match unless the log carries none; components are compared
/// as unordered sets of `(number, description)`.
pub fn installed_identically(step: &ModStep, installed: &InstalledMod) -> bool {
    let version_match = installed.version == UNVERSIONED || installed.version == step.version();
    let planned: HashSet<&Component> = step.components().iter().collect();
    let present: HashSet<&Component> = installed.components.iter().collect();
    tracing::debug!(
        "Comparing planned {} ({}) with installed ({}): version match {}, component match {}",
        step.name(),
        step.version(),
        installed.version,
        version_match,
        planned == present
    );
    version_match && planned == present
}

/// Installed mods keyed by lower-cased name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct InstalledMods {
    mods: IndexMap<String, InstalledMod>,
}

impl InstalledMods {
    pub fn parse(text: &str) -> Self {
        let mut mods: IndexMap<String, InstalledMod> = IndexMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let (caps, version) = match VERSIONED_LINE.captures(line) {
                Some(caps) => {
                    let version = caps[7].trim().to_string();
                    (caps, version)
                }
                None => match UNVERSIONED_LINE.captures(line) {
                    Some(caps) => (caps, UNVERSIONED.to_string()),
                    None => {
                        tracing::debug!("Skipping unrecognized weidu.log line: {}", line);
                        continue;
                    }
                },
            };

            let name = caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or(&caps[3])
                .to_lowercase();
            let language_int = caps[4].parse().unwrap_or(0);
            let component = Component::new(&caps[5], caps[6].trim());
            let tp2_rel_fpath = DEFINITION_PATH
                .captures(line)
                .map(|c| c[1].to_string())
                .unwrap_or_default();

            let record = mods.entry(name.clone()).or_insert_with(|| InstalledMod {
                name,
                version,
                language_int,
                components: Vec::new(),
                install_list: String::new(),
                tp2_rel_fpath,
            });
            if !record.components.iter().any(|c| c.number == component.number) {
                record.components.push(component);
            }
        }

        for record in mods.values_mut() {
            let mut numbers: Vec<&str> = record.components.iter().map(|c| c.number.as_str()).collect();
            numbers.sort_by_key(|n| n.parse::<u64>().unwrap_or(u64::MAX));
            record.install_list = numbers.join(" ");
        }
        Self { mods }
    }

    /// Read `weidu.log` of a game directory. No log means nothing installed.
    pub fn from_game_dir(game_dir: &Utf8Path) -> Result<Self> {
        let path = game_dir.join(WEIDU_LOG_FILE);
        if !path.is_file() {
            tracing::debug!("No {} in {}", WEIDU_LOG_FILE, game_dir);
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fsutil::read_text(path)?;
        let mods = Self::parse(&text);
        tracing::info!("Read {} installed mods from {}", mods.len(), path);
        Ok(mods)
    }

    /// Find a mod by name, then by canonical alias, then by any alias of it.
    pub fn find(&self, name: &str, aliases: &AliasRegistry) -> Option<&InstalledMod> {
        let key = name.trim().to_lowercase();
        if let Some(found) = self.mods.get(&key) {
            return Some(found);
        }
        let canonical = aliases.canonical_or_self(&key);
        if let Some(found) = self.mods.get(&canonical) {
            return Some(found);
        }
        aliases
            .aliases_of(&canonical)
            .into_iter()
            .find_map(|alias| self.mods.get(alias))
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstalledMod> {
        self.mods.values()
    }

    /// A build plan reinstalling these mods in log order.
    pub fn to_build_plan(&self) -> Result<BuildPlan> {
        let mods = self
            .iter()
            .map(|m| ModStep::new(&m.name, &m.version, m.language_int, m.components.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(BuildPlan {
            config: BuildSettings::default(),
            mods,
        })
    }
}

/// Convert a `weidu.log` into a build file.
///
/// The file is named `<YYYYMMDD_HHMMSS>_jenga_build_from_weidu_log.<ext>`
/// and written to `output_dir`, or beside the log when none is given.
pub fn convert_weidu_log(
    log_path: &Utf8Path,
    format: BuildFileFormat,
    output_dir: Option<&Utf8Path>,
) -> Result<Utf8PathBuf> {
    let installed = InstalledMods::load(log_path)?;
    let plan = installed
        .to_build_plan()
        .with_context(|| format!("Failed to convert {}", log_path))?;

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => log_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from(".")),
    };
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let out = dir.join(format!(
        "{}_jenga_build_from_weidu_log.{}",
        timestamp,
        format.extension()
    ));
    std::fs::write(&out, plan.to_text(format)?)
        .with_context(|| format!("Failed to write build file: {}", out))?;
    tracing::info!("Converted {} to {}", log_path, out);
    Ok(out)
}
