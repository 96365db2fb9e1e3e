use crate::errors::JengaError;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tool-wide configuration, layered from `cfg.yaml` and `JENGA__*` variables.
///
/// Constructed once at startup by [`ConfigManager`](crate::config::ConfigManager)
/// and passed by reference to every component that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JengaConfig {
    #[serde(default)]
    pub weidu_exec_path: Option<Utf8PathBuf>,

    #[serde(default)]
    pub zipped_mod_cache_dir_path: Option<Utf8PathBuf>,

    #[serde(default)]
    pub extracted_mod_cache_dir_path: Option<Utf8PathBuf>,

    #[serde(default = "default_lang")]
    pub default_lang: String,

    /// Minimum NameMatcher score (0-100) accepted by fuzzy file searches.
    #[serde(default = "default_fuzzy_match_threshold")]
    pub fuzzy_match_threshold: u8,

    /// Ask before applying each pre-install fix.
    #[serde(default)]
    pub confirm_pre_install_fixes: bool,

    /// Directories per canonical game key (`bgee`, `bgiiee`, `iwdee`, `iwd2ee`, `pstee`).
    #[serde(default)]
    pub games: IndexMap<String, GameDirs>,
}

/// The directories jenga knows about for one game.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameDirs {
    /// The game installation builds are installed into.
    #[serde(default)]
    pub target: Option<Utf8PathBuf>,

    /// A pristine copy of the game, used to reset `target`.
    #[serde(default)]
    pub clean_source: Option<Utf8PathBuf>,

    /// A copy of the game with EET already installed.
    #[serde(default)]
    pub eet_source: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameDirKind {
    Target,
    CleanSource,
    EetSource,
}

impl GameDirKind {
    pub fn key(self) -> &'static str {
        match self {
            GameDirKind::Target => "target",
            GameDirKind::CleanSource => "clean_source",
            GameDirKind::EetSource => "eet_source",
        }
    }
}

impl Default for JengaConfig {
    fn default() -> Self {
        Self {
            weidu_exec_path: None,
            zipped_mod_cache_dir_path: None,
            extracted_mod_cache_dir_path: None,
            default_lang: default_lang(),
            fuzzy_match_threshold: default_fuzzy_match_threshold(),
            confirm_pre_install_fixes: false,
            games: IndexMap::new(),
        }
    }
}

pub(crate) fn default_lang() -> String {
    "en_us".to_string()
}

pub(crate) fn default_fuzzy_match_threshold() -> u8 {
    30
}

const GAME_ALIASES: &[(&str, &str)] = &[
    ("bgee", "bgee"),
    ("bg:ee", "bgee"),
    ("baldur's gate", "bgee"),
    ("baldur's gate: enhanced edition", "bgee"),
    ("bgiiee", "bgiiee"),
    ("bgii:ee", "bgiiee"),
    ("bg2ee", "bgiiee"),
    ("bg2:ee", "bgiiee"),
    ("baldur's gate ii", "bgiiee"),
    ("baldur's gate ii: enhanced edition", "bgiiee"),
    ("baldur's gate 2", "bgiiee"),
    ("baldur's gate 2: enhanced edition", "bgiiee"),
    ("eet", "bgiiee"),
    ("iwdee", "iwdee"),
    ("iwd:ee", "iwdee"),
    ("icewind dale", "iwdee"),
    ("icewind dale: enhanced edition", "iwdee"),
    ("iwd2ee", "iwd2ee"),
    ("iwd2:ee", "iwd2ee"),
    ("icewind dale ii", "iwd2ee"),
    ("icewind dale 2", "iwd2ee"),
    ("icewind dale 2: enhanced edition", "iwd2ee"),
    ("pstee", "pstee"),
    ("pst:ee", "pstee"),
    ("planescape torment", "pstee"),
    ("planescape: torment: enhanced edition", "pstee"),
];

/// Map any known spelling of a game to its canonical config key.
pub fn canonical_game_key(game_alias: &str) -> Option<&'static str> {
    let needle = game_alias.trim().to_lowercase();
    GAME_ALIASES
        .iter()
        .find(|(alias, _)| *alias == needle)
        .map(|(_, key)| *key)
}

impl JengaConfig {
    /// Look up a configured directory for a game, by any alias of that game.
    pub fn game_dir(&self, game_alias: &str, kind: GameDirKind) -> Option<&Utf8Path> {
        let key = canonical_game_key(game_alias)?;
        let dirs = self.games.get(key)?;
        match kind {
            GameDirKind::Target => dirs.target.as_deref(),
            GameDirKind::CleanSource => dirs.clean_source.as_deref(),
            GameDirKind::EetSource => dirs.eet_source.as_deref(),
        }
    }

    /// Like [`game_dir`](Self::game_dir), but the directory must be set and exist.
    pub fn demand_game_dir(&self, game_alias: &str, kind: GameDirKind) -> Result<&Utf8Path> {
        let config_key = format!("games.{}.{}", game_alias, kind.key());
        demand_valid_dir(self.game_dir(game_alias, kind), &config_key)
    }

    /// All configured target game directories.
    pub fn target_game_dirs(&self) -> Vec<&Utf8Path> {
        self.games
            .values()
            .filter_map(|dirs| dirs.target.as_deref())
            .collect()
    }

    pub fn demand_weidu_exec_path(&self) -> Result<&Utf8Path> {
        let path = self
            .weidu_exec_path
            .as_deref()
            .ok_or_else(|| JengaError::config("weidu_exec_path is not set"))?;
        if !path.is_file() {
            return Err(JengaError::config(format!(
                "weidu_exec_path set to {}, which is not an existing file",
                path
            ))
            .into());
        }
        Ok(path)
    }

    pub fn demand_zipped_mod_cache_dir(&self) -> Result<&Utf8Path> {
        demand_valid_dir(
            self.zipped_mod_cache_dir_path.as_deref(),
            "zipped_mod_cache_dir_path",
        )
    }

    pub fn demand_extracted_mod_cache_dir(&self) -> Result<&Utf8Path> {
        demand_valid_dir(
            self.extracted_mod_cache_dir_path.as_deref(),
            "extracted_mod_cache_dir_path",
        )
    }
}

fn demand_valid_dir<'a>(dir: Option<&'a Utf8Path>, config_key: &str) -> Result<&'a Utf8Path> {
    let Some(dir) = dir else {
        return Err(JengaError::config(format!("{} is not set", config_key)).into());
    };
    if !dir.exists() {
        return Err(JengaError::config(format!(
            "{} set to {}, which does not exist",
            config_key, dir
        ))
        .into());
    }
    if !dir.is_dir() {
        return Err(JengaError::config(format!(
            "{} set to {}, which is a file instead of a directory",
            config_key, dir
        ))
        .into());
    }
    Ok(dir)
}
