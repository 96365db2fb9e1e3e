use anyhow::{Context, Result};
use camino::Utf8Path;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fs;

/// Aliases every registry starts with, as `(canonical, aliases)`.
const BUILTIN_ALIASES: &[(&str, &[&str])] = &[
    ("eet", &["eet"]),
    ("leui-bg1ee", &["lefreuts-enhanced-ui-bg1ee-skin"]),
    ("anotherfinehell", &["c#anotherfinehell"]),
    ("lucy", &["lucy-the-wyvern"]),
    ("dc", &["dungeoncrawl"]),
    ("crucible", &["crucible"]),
    (
        "item_rev",
        &["itemrev", "item revisions", "item_revisions"],
    ),
    (
        "spell_rev",
        &["spellrev", "spell revisions", "spell_revisions"],
    ),
    ("eet_end", &["eetend"]),
];

/// Persisted form of the registry; the reverse view is rebuilt on load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AliasRecord {
    aliases: IndexMap<String, String>,
}

/// Many-to-one mapping from alternate mod names to canonical names.
///
/// Both directions are kept in lock-step. Registering an alias that
/// already points at another mod moves it (last write wins).
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    to_canonical: IndexMap<String, String>,
    by_canonical: IndexMap<String, IndexSet<String>>,
}

impl AliasRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in aliases.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (canonical, aliases) in BUILTIN_ALIASES {
            for alias in *aliases {
                registry.register(alias, canonical);
            }
        }
        registry
    }

    /// Canonical name for an alias (case-insensitive).
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.to_canonical
            .get(&alias.trim().to_lowercase())
            .map(String::as_str)
    }

    /// All aliases registered for a canonical name, in registration order.
    pub fn aliases_of(&self, canonical: &str) -> Vec<&str> {
        self.by_canonical
            .get(&canonical.to_lowercase())
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Canonical name for `name`, or `name` lower-cased when unregistered.
    pub fn canonical_or_self(&self, name: &str) -> String {
        self.resolve(name)
            .map(str::to_string)
            .unwrap_or_else(|| name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.to_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_canonical.is_empty()
    }

    /// Register `alias` and its derived spellings for `canonical`.
    pub fn register(&mut self, alias: &str, canonical: &str) {
        let canonical = canonical.trim().to_lowercase();
        if canonical.is_empty() {
            return;
        }
        for variant in alias_variants(alias) {
            self.insert(variant, canonical.clone());
        }
    }

    fn insert(&mut self, alias: String, canonical: String) {
        if let Some(previous) = self.to_canonical.insert(alias.clone(), canonical.clone()) {
            if previous != canonical {
                if let Some(set) = self.by_canonical.get_mut(&previous) {
                    set.shift_remove(&alias);
                    if set.is_empty() {
                        self.by_canonical.shift_remove(&previous);
                    }
                }
            }
        }
        self.by_canonical.entry(canonical).or_default().insert(alias);
    }

    /// Drop every in-memory mapping.
    pub fn reset(&mut self) {
        self.to_canonical.clear();
        self.by_canonical.clear();
    }

    /// Merge a persisted registry into this one. A missing file is not an error.
    pub fn load(&mut self, path: &Utf8Path) -> Result<()> {
        if !path.exists() {
            tracing::debug!("No alias registry at {}, nothing to load", path);
            return Ok(());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read alias registry: {}", path))?;
        let record: AliasRecord = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse alias registry: {}", path))?;
        for (alias, canonical) in record.aliases {
            self.insert(alias, canonical);
        }
        tracing::info!("Loaded {} aliases from {}", self.len(), path);
        Ok(())
    }

    pub fn persist(&self, path: &Utf8Path) -> Result<()> {
        let record = AliasRecord {
            aliases: self.to_canonical.clone(),
        };
        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialize alias registry")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write alias registry: {}", path))?;
        tracing::info!("Saved {} aliases to {}", self.len(), path);
        Ok(())
    }

    /// Erase the persisted registry.
    pub fn clear(path: &Utf8Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove alias registry: {}", path))?;
            tracing::info!("Removed alias registry {}", path);
        }
        Ok(())
    }
}

/// The lower-cased alias plus its separator and camel-case variants.
fn alias_variants(alias: &str) -> IndexSet<String> {
    let alias = alias.trim();
    let mut bases = vec![alias.to_lowercase()];
    if is_pure_camel_case(alias) {
        bases.push(split_camel_case(alias));
    }

    let mut variants = IndexSet::new();
    for base in bases {
        if base.is_empty() {
            continue;
        }
        variants.insert(base.clone());
        if base.contains(['-', '_', ' ']) {
            for separator in ["-", "_", " ", ""] {
                variants.insert(base.replace(['-', '_', ' '], separator));
            }
        }
    }
    variants
}

fn is_pure_camel_case(s: &str) -> bool {
    let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
    let inner_upper = s.chars().skip(1).any(|c| c.is_ascii_uppercase());
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()) && has_lower && inner_upper
}

fn split_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_lowercase());
    }
    out
}
