use crate::errors::JengaError;
use crate::models::config::{GameDirKind, JengaConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;

/// One selectable component of a mod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub number: String,
    #[serde(default)]
    pub description: String,
}

impl Component {
    pub fn new(number: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            description: description.into(),
        }
    }
}

/// A single install step of a build plan.
///
/// `install_list` is never set directly; it is always the space-joined
/// component numbers, in component order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModStep {
    #[serde(rename = "mod")]
    name: String,

    #[serde(default)]
    version: String,

    #[serde(
        default,
        deserialize_with = "deserialize_language_int",
        serialize_with = "serialize_language_int"
    )]
    language_int: u32,

    #[serde(default)]
    install_list: String,

    #[serde(default)]
    components: Vec<Component>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    prompt_for_manual_install: bool,
}

impl ModStep {
    /// Create a step, rejecting duplicate component numbers.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        language_int: u32,
        components: Vec<Component>,
    ) -> Result<Self> {
        let mut step = Self {
            name: name.into(),
            version: version.into(),
            language_int,
            install_list: String::new(),
            components,
            prompt_for_manual_install: false,
        };
        step.normalize()?;
        Ok(step)
    }

    /// A step standing in for a mod the build has no data about.
    ///
    /// The user is asked to install it by hand when the engine reaches it.
    pub fn placeholder(name: impl Into<String>, numbers: &[String]) -> Result<Self> {
        let components = numbers
            .iter()
            .map(|number| Component::new(number.clone(), ""))
            .collect();
        let mut step = Self::new(name, "", 0, components)?;
        step.prompt_for_manual_install = true;
        Ok(step)
    }

    pub fn with_manual_install(mut self, manual: bool) -> Self {
        self.prompt_for_manual_install = manual;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased name used as the key for index, alias and fix lookups.
    pub fn canonical_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn language_int(&self) -> u32 {
        self.language_int
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn install_list(&self) -> &str {
        &self.install_list
    }

    pub fn is_manual_install(&self) -> bool {
        self.prompt_for_manual_install
    }

    /// Copy of this step restricted to the given components.
    pub fn with_components(&self, components: Vec<Component>) -> Result<Self> {
        let mut step = self.clone();
        step.components = components;
        step.install_list.clear();
        step.normalize()?;
        Ok(step)
    }

    /// Re-derive `install_list` and validate component numbers.
    ///
    /// Files that carry an install list but no component records get
    /// components synthesized from the list.
    fn normalize(&mut self) -> Result<()> {
        if self.components.is_empty() && !self.install_list.trim().is_empty() {
            self.components = self
                .install_list
                .split_whitespace()
                .map(|number| Component::new(number, ""))
                .collect();
        }

        let mut seen = IndexSet::new();
        for component in &self.components {
            if !seen.insert(component.number.as_str()) {
                return Err(JengaError::config(format!(
                    "Mod '{}' lists component #{} more than once",
                    self.name, component.number
                ))
                .into());
            }
        }

        let derived = self
            .components
            .iter()
            .map(|c| c.number.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if !self.install_list.is_empty() && self.install_list.trim() != derived {
            tracing::warn!(
                "Install list '{}' of mod '{}' disagrees with its components; using '{}'",
                self.install_list,
                self.name,
                derived
            );
        }
        self.install_list = derived;
        Ok(())
    }
}

fn deserialize_language_int<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(u32),
        Text(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Number(n) => Ok(n),
        Lenient::Text(s) if s.trim().is_empty() => Ok(0),
        Lenient::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn serialize_language_int<S>(value: &u32, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// The `config` section of a build file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    #[serde(default)]
    pub build_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    #[serde(default)]
    pub force_lang_in_weidu_conf: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_every_x_mods: Option<i64>,

    #[serde(default)]
    pub skip_installed_mods: bool,

    #[serde(default)]
    pub prefer_zipped_mods: bool,

    #[serde(default)]
    pub prefer_mod_index: bool,
}

/// An ordered build: run settings plus the mods to install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub config: BuildSettings,

    #[serde(default)]
    pub mods: Vec<ModStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildFileFormat {
    Json,
    Yaml,
}

impl BuildFileFormat {
    /// YAML for `.yaml`/`.yml` files, JSON otherwise.
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension().map(|e| e.to_ascii_lowercase()) {
            Some(ext) if ext == "yaml" || ext == "yml" => BuildFileFormat::Yaml,
            _ => BuildFileFormat::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            BuildFileFormat::Json => "json",
            BuildFileFormat::Yaml => "yaml",
        }
    }
}

impl BuildPlan {
    /// Load a JSON or YAML build file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build file: {}", path))?;
        let plan = Self::parse(&contents, BuildFileFormat::from_path(path))
            .with_context(|| format!("Failed to parse build file: {}", path))?;
        tracing::info!(
            "Loaded build '{}' with {} mods from {}",
            plan.config.build_name,
            plan.mods.len(),
            path
        );
        Ok(plan)
    }

    pub fn parse(contents: &str, format: BuildFileFormat) -> Result<Self> {
        let mut plan: BuildPlan = match format {
            BuildFileFormat::Json => serde_json::from_str(contents)?,
            BuildFileFormat::Yaml => serde_yaml_ng::from_str(contents)?,
        };
        for step in &mut plan.mods {
            step.normalize()?;
        }
        Ok(plan)
    }

    pub fn to_text(&self, format: BuildFileFormat) -> Result<String> {
        let text = match format {
            BuildFileFormat::Json => serde_json::to_string_pretty(self)?,
            BuildFileFormat::Yaml => serde_yaml_ng::to_string(self)?,
        };
        Ok(text)
    }

    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        let text = self.to_text(BuildFileFormat::from_path(path))?;
        fs::write(path, text).with_context(|| format!("Failed to write build file: {}", path))?;
        tracing::info!("Saved build file to {}", path);
        Ok(())
    }
}

/// Caller-supplied overrides applied on top of a build file's settings.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub game_dir: Option<Utf8PathBuf>,
    pub skip_installed_mods: bool,
}

/// Fully resolved settings for one build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub build_name: String,
    pub game: Option<String>,
    pub game_dir: Utf8PathBuf,
    /// Language directory code, e.g. `en_us`.
    pub lang: String,
    pub force_lang: bool,
    pub pause_interval: Option<usize>,
    pub skip_installed: bool,
    pub prefer_index: bool,
    pub prefer_archive_cache: bool,
}

impl RunConfig {
    pub fn resolve(
        settings: &BuildSettings,
        config: &JengaConfig,
        overrides: &RunOverrides,
    ) -> Result<Self> {
        let build_name = settings.build_name.trim();
        if build_name.is_empty() {
            return Err(JengaError::config("build_name must be specified in the build file").into());
        }
        if build_name.contains(['/', '\\']) || build_name == "." || build_name == ".." {
            return Err(JengaError::config(format!(
                "build_name '{}' cannot be used as a file name",
                build_name
            ))
            .into());
        }

        let game_dir = match (&overrides.game_dir, &settings.game) {
            (Some(dir), _) => dir.clone(),
            (None, Some(game)) => config
                .game_dir(game, GameDirKind::Target)
                .map(Utf8Path::to_path_buf)
                .ok_or_else(|| {
                    JengaError::config(format!("No target game directory configured for '{}'", game))
                })?,
            (None, None) => {
                return Err(JengaError::config(
                    "The build file names no game and no game directory was given",
                )
                .into());
            }
        };
        if !game_dir.is_dir() {
            return Err(JengaError::config(format!(
                "Game directory {} does not exist or is not a directory",
                game_dir
            ))
            .into());
        }

        let pause_interval = settings
            .pause_every_x_mods
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok());

        Ok(Self {
            build_name: build_name.to_string(),
            game: settings.game.clone(),
            game_dir,
            lang: settings
                .lang
                .clone()
                .filter(|lang| !lang.trim().is_empty())
                .unwrap_or_else(|| config.default_lang.clone()),
            force_lang: settings.force_lang_in_weidu_conf,
            pause_interval,
            skip_installed: settings.skip_installed_mods || overrides.skip_installed_mods,
            prefer_index: settings.prefer_mod_index,
            prefer_archive_cache: settings.prefer_zipped_mods,
        })
    }
}
