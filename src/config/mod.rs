use crate::models::JengaConfig;
use crate::services::aliases::AliasRegistry;
use crate::services::mod_index::ModIndex;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use std::fs;

/// Environment variable prefix for configuration keys (`JENGA__WEIDU_EXEC_PATH`).
pub const ENV_PREFIX: &str = "JENGA";

/// Separator between the prefix and nested keys (`JENGA__GAMES__BGEE__TARGET`).
pub const ENV_SEPARATOR: &str = "__";

pub const CONFIG_FILE_NAME: &str = "cfg.yaml";
pub const MOD_INDEX_FILE_NAME: &str = "mod_index.json";
pub const ALIAS_REGISTRY_FILE_NAME: &str = "mod_alias_registry.json";

const APP_DIR_NAME: &str = "jenga";

/// Per-user configuration directory: `<config dir>/jenga`.
pub fn default_config_dir() -> Result<Utf8PathBuf> {
    let base = BaseDirs::new().context("Failed to resolve the home directory")?;
    let dir = base.config_dir().join(APP_DIR_NAME);
    Utf8PathBuf::try_from(dir).context("Configuration directory path is not valid UTF-8")
}

/// Per-user log directory: `<local data dir>/jenga/logs`.
pub fn default_log_dir() -> Result<Utf8PathBuf> {
    let base = BaseDirs::new().context("Failed to resolve the home directory")?;
    let dir = base.data_local_dir().join(APP_DIR_NAME).join("logs");
    Utf8PathBuf::try_from(dir).context("Log directory path is not valid UTF-8")
}

/// Owns the per-user configuration directory and everything stored in it.
///
/// Holds three files:
/// - `cfg.yaml`: tool configuration, layered under `JENGA__*` variables
/// - `mod_index.json`: the mod index cache
/// - `mod_alias_registry.json`: the persisted alias registry
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
    mod_index_path: Utf8PathBuf,
    alias_registry_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for `config_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            mod_index_path: config_dir.join(MOD_INDEX_FILE_NAME),
            alias_registry_path: config_dir.join(ALIAS_REGISTRY_FILE_NAME),
            config_dir,
        })
    }

    /// A ConfigManager for the per-user configuration directory.
    pub fn for_user() -> Result<Self> {
        Self::new(default_config_dir()?)
    }

    /// Load the tool configuration.
    ///
    /// Layers, lowest first: built-in defaults, `cfg.yaml` (optional), then
    /// `JENGA__*` environment variables.
    pub fn load_config(&self) -> Result<JengaConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults and environment",
                self.config_path
            );
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.config_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", self.config_path))?;

        let config: JengaConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration: {}", self.config_path))?;

        tracing::info!("Loaded configuration from {}", self.config_dir);
        Ok(config)
    }

    /// Write `config` to `cfg.yaml`.
    pub fn save_config(&self, config: &JengaConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// The built-in aliases merged with the persisted registry.
    pub fn load_aliases(&self) -> Result<AliasRegistry> {
        let mut aliases = AliasRegistry::with_builtin();
        aliases.load(&self.alias_registry_path)?;
        Ok(aliases)
    }

    pub fn load_mod_index(&self) -> Result<ModIndex> {
        ModIndex::load(&self.mod_index_path)
    }

    /// Persist the index and the aliases together; they are one logical store.
    pub fn save_mod_index(&self, index: &ModIndex, aliases: &AliasRegistry) -> Result<()> {
        index.persist(&self.mod_index_path)?;
        aliases.persist(&self.alias_registry_path)
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    pub fn mod_index_path(&self) -> &Utf8Path {
        &self.mod_index_path
    }

    pub fn alias_registry_path(&self) -> &Utf8Path {
        &self.alias_registry_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameDirs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(config_path.join("jenga")).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.config_dir().is_dir());
        assert_eq!(manager.config_path().file_name(), Some(CONFIG_FILE_NAME));
        assert_eq!(manager.mod_index_path().file_name(), Some(MOD_INDEX_FILE_NAME));
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = manager.load_config().unwrap();
        assert_eq!(config.default_lang, "en_us");
        assert_eq!(config.fuzzy_match_threshold, 30);
    }

    #[test]
    fn test_save_then_load_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = JengaConfig {
            weidu_exec_path: Some(Utf8PathBuf::from("/opt/weidu/weidu")),
            default_lang: "de_de".to_string(),
            fuzzy_match_threshold: 45,
            ..Default::default()
        };
        config.games.insert(
            "bgee".to_string(),
            GameDirs {
                target: Some(Utf8PathBuf::from("/games/bgee")),
                ..Default::default()
            },
        );
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.weidu_exec_path, config.weidu_exec_path);
        assert_eq!(loaded.default_lang, "de_de");
        assert_eq!(loaded.fuzzy_match_threshold, 45);
        assert_eq!(loaded.games.get("bgee"), config.games.get("bgee"));
    }

    #[test]
    fn test_aliases_start_with_builtin() {
        let (manager, _temp_dir) = create_test_config_manager();
        let aliases = manager.load_aliases().unwrap();
        assert_eq!(aliases.resolve("c#anotherfinehell"), Some("anotherfinehell"));
    }
}
