//! Name normalization for mod archives, folders and installer files.
//!
//! Mod authors decorate file names with versions, platform tags and
//! installer prefixes (`osx-EET-13.4.zip`, `setup-lucy.tp2`). Peeling those
//! affixes yields the bare mod name used for matching and aliasing.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const KNOWN_EXTENSIONS: &[&str] = &[
    ".zip", ".tar.gz", ".tgz", ".rar", ".7z", ".tp2", ".command", ".exe", ".ini",
];

const KNOWN_PREFIXES: &[&str] = &["mac-", "mac_", "macos-", "macos_", "osx-", "osx_", "setup-"];

const KNOWN_SUFFIXES: &[&str] = &["-mac", "_mac", "-macos", "_macos", "-osx", "_osx"];

const KNOWN_INFIXES: &[&str] = &[
    "mac",
    "osx",
    "mod",
    "modification",
    "eet",
    "weidu",
    "setup",
    "install",
    "bg1",
    "bg1ee",
    "bgiee",
    "bg2",
    "bgii",
    "bg2ee",
    "bgiiee",
    "bgee",
    "bgt",
    "tutu",
    "sod",
];

/// Archive-name fragment → folder renames applied to everything extracted from it.
const ARCHIVE_NAME_MAPPERS: &[(&str, &[(&str, &str)])] = &[
    ("sr_revised", &[("spell_rev", "sr_revised")]),
    ("ir_revised", &[("item_rev", "ir_revised")]),
];

static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-\s_]?[vV]?([0-9._-]+|master|main|alpha|beta|Beta|a|b|rc)+)$")
        .expect("version suffix regex is valid")
});

static INFIX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    KNOWN_INFIXES
        .iter()
        .map(|infix| {
            RegexBuilder::new(&format!(r"[-\s_]{}[-\s_.]", regex::escape(infix)))
                .case_insensitive(true)
                .build()
                .expect("infix regex is valid")
        })
        .collect()
});

/// Strip a trailing version marker (`-v4b10`, ` 13.4`, `_master`).
pub fn remove_version_suffix(name: &str) -> String {
    match version_suffix(name) {
        Some((start, _)) => name[..start].to_string(),
        None => name.to_string(),
    }
}

/// The trailing version marker of `name`, without leading separators.
pub fn version_of(name: &str) -> Option<String> {
    version_suffix(name).map(|(_, version)| version)
}

fn version_suffix(name: &str) -> Option<(usize, String)> {
    let lowered = name.to_ascii_lowercase();
    if lowered.ends_with("bg1") || lowered.ends_with("bg2") {
        return None;
    }
    let found = VERSION_SUFFIX.find(name)?;
    let matched = found.as_str().to_ascii_lowercase();
    // Bare "a", "b", "rc" runs are ordinary word endings, not versions.
    if matched.chars().all(|c| matches!(c, 'a' | 'b' | 'r' | 'c')) {
        return None;
    }
    let version = matched.trim_matches(['-', '_']).trim().to_string();
    Some((found.start(), version))
}

fn strip_known_extension(name: &str) -> Option<&str> {
    let lowered = name.to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| lowered.ends_with(*ext))
        .map(|ext| &name[..name.len() - ext.len()])
}

fn peel_once(name: &str) -> Option<String> {
    if let Some(stem) = strip_known_extension(name) {
        return Some(stem.to_string());
    }

    let lowered = name.to_ascii_lowercase();
    for marker in ["-for-", "_for_"] {
        if let Some(pos) = lowered.find(marker) {
            return Some(name[..pos].to_string());
        }
    }

    let unversioned = remove_version_suffix(name);
    if unversioned != name {
        return Some(unversioned);
    }

    if let Some(prefix) = KNOWN_PREFIXES.iter().find(|p| lowered.starts_with(*p)) {
        return Some(name[prefix.len()..].to_string());
    }
    if let Some(suffix) = KNOWN_SUFFIXES.iter().find(|s| lowered.ends_with(*s)) {
        return Some(name[..name.len() - suffix.len()].to_string());
    }

    for pattern in INFIX_PATTERNS.iter() {
        let replaced = pattern.replace_all(name, "");
        if replaced != name {
            return Some(replaced.into_owned());
        }
    }
    None
}

/// Repeatedly remove extensions, versions and platform affixes from a name.
///
/// A step that would leave nothing is not taken.
pub fn peel_affixes(name: &str) -> String {
    let mut current = name.trim().to_string();
    while let Some(next) = peel_once(&current) {
        let next = next.trim().to_string();
        if next.is_empty() || next == current {
            break;
        }
        current = next;
    }
    current
}

/// Version inferred from an archive file name, e.g. `13.4` for `EET-13.4.zip`.
pub fn version_from_archive_name(file_name: &str) -> Option<String> {
    let mut stem = file_name;
    while let Some(shorter) = strip_known_extension(stem) {
        stem = shorter;
    }
    version_of(stem).filter(|v| !v.is_empty())
}

/// Archive file name without its archive extension(s).
pub fn archive_stem(file_name: &str) -> &str {
    let mut stem = file_name;
    while let Some(shorter) = strip_known_extension(stem) {
        stem = shorter;
    }
    stem
}

/// Folder renames to apply for an archive, if its name hits a known collision.
pub fn name_mapper_for_archive(archive_name: &str) -> Option<NameMapper> {
    let lowered = archive_name.to_lowercase();
    ARCHIVE_NAME_MAPPERS
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|(_, pairs)| NameMapper { pairs })
}

/// Rewrites names sharing a pattern with a sibling mod family.
#[derive(Debug, Clone, Copy)]
pub struct NameMapper {
    pairs: &'static [(&'static str, &'static str)],
}

impl NameMapper {
    /// Rename a single folder name if it is exactly one of the mapped names.
    pub fn map_folder_name(&self, name: &str) -> String {
        self.pairs
            .iter()
            .find(|(from, _)| *from == name)
            .map(|(_, to)| to.to_string())
            .unwrap_or_else(|| name.to_string())
    }

    /// Replace every mapped fragment inside free text such as an alias.
    pub fn map_text(&self, text: &str) -> String {
        self.pairs
            .iter()
            .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
    }
}
