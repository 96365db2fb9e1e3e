use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// What the mod index knows about one extracted mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModIndexEntry {
    /// Canonical name; the index key is its lower-cased form.
    pub name: String,
    /// Display name from the mod's `.ini` metadata, else `name`.
    pub full_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub extracted_dpath: Utf8PathBuf,
    pub tp2_fpath: Utf8PathBuf,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub archive_fname: Option<String>,
    #[serde(default)]
    pub archive_inferred_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl ModIndexEntry {
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}
