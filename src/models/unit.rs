use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// File name of the hint record written into every extracted mod folder.
pub const HINT_FILE_NAME: &str = ".jenga_hint.json";

/// Structural shape of an unpacked mod archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveShape {
    /// One folder holding the installer-definition file(s).
    SingleFolder,
    /// Definition file(s) and data loose at the root.
    FlatFiles,
    /// One data folder with the definition file beside it.
    FolderPlusSiblingDefinition,
    /// Several folders, each with its own definition file.
    MultiFolderEachSelfContained,
    /// Several folders sharing root-level definition file(s).
    MultiFolderSharedSiblingDefinition,
}

impl std::fmt::Display for ArchiveShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArchiveShape::SingleFolder => "SINGLE_FOLDER",
            ArchiveShape::FlatFiles => "FLAT_FILES",
            ArchiveShape::FolderPlusSiblingDefinition => "FOLDER_PLUS_SIBLING_DEFINITION",
            ArchiveShape::MultiFolderEachSelfContained => "MULTI_FOLDER_EACH_SELF_CONTAINED",
            ArchiveShape::MultiFolderSharedSiblingDefinition => {
                "MULTI_FOLDER_SHARED_SIBLING_DEFINITION"
            }
        };
        f.write_str(name)
    }
}

/// What a classified archive installs.
///
/// Paths point into whatever tree was classified: the scratch directory
/// during classification, the extracted-mods directory after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallableUnit {
    pub shape: ArchiveShape,
    /// The classified root, after collapsing container folders.
    pub root: Utf8PathBuf,
    /// Name the primary unit is stored under in the extracted-mods directory.
    pub folder_name: String,
    /// The mod name used for matching (given or inferred).
    pub mod_name: String,
    /// Absent only for [`ArchiveShape::FlatFiles`].
    pub primary_folder: Option<Utf8PathBuf>,
    pub primary_definition_file: Utf8PathBuf,
    pub secondary_folders: Vec<Utf8PathBuf>,
    pub secondary_definition_files: Vec<Utf8PathBuf>,
    pub secondary_loose_files: Vec<Utf8PathBuf>,
}

impl InstallableUnit {
    /// Number of installable folders (primary plus secondaries).
    pub fn unit_count(&self) -> usize {
        1 + self.secondary_folders.len()
    }
}

/// Classification results cached inside an extracted mod folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JengaHint {
    pub mod_name: String,
    pub archive_fname: String,
    pub extraction_type: ArchiveShape,
    pub main_tp2_fpath: Utf8PathBuf,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub archive_inferred_version: Option<String>,
}

impl JengaHint {
    /// Read the hint of an extracted mod folder, if it has one.
    pub fn read(mod_dir: &Utf8Path) -> Result<Option<Self>> {
        let path = mod_dir.join(HINT_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read hint file: {}", path))?;
        let hint = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse hint file: {}", path))?;
        Ok(Some(hint))
    }

    pub fn write(&self, mod_dir: &Utf8Path) -> Result<Utf8PathBuf> {
        let path = mod_dir.join(HINT_FILE_NAME);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize hint")?;
        fs::write(&path, json).with_context(|| format!("Failed to write hint file: {}", path))?;
        tracing::debug!("Wrote hint file {}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shape_serializes_screaming_snake() {
        let json = serde_json::to_string(&ArchiveShape::FolderPlusSiblingDefinition).unwrap();
        assert_eq!(json, "\"FOLDER_PLUS_SIBLING_DEFINITION\"");
        assert_eq!(
            ArchiveShape::FolderPlusSiblingDefinition.to_string(),
            "FOLDER_PLUS_SIBLING_DEFINITION"
        );
    }

    #[test]
    fn test_hint_read_write() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        assert!(JengaHint::read(&dir).unwrap().is_none());

        let hint = JengaHint {
            mod_name: "lucy".to_string(),
            archive_fname: "lucy-v2.zip".to_string(),
            extraction_type: ArchiveShape::SingleFolder,
            main_tp2_fpath: dir.join("lucy/setup-lucy.tp2"),
            aliases: vec!["lucy".to_string()],
            archive_inferred_version: Some("2".to_string()),
        };
        hint.write(&dir).unwrap();
        assert_eq!(JengaHint::read(&dir).unwrap(), Some(hint));
    }
}
