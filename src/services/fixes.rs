//! Per-mod corrective hooks applied around installer invocations.
//!
//! Some mods ship installer-definition files that fail on one platform or
//! another. A [`Fix`] either rewrites files of the mod before or after it is
//! installed ([`FileFix`]), or rewrites the installer argument list
//! ([`CommandFix`]). Fixes are registered per canonical mod name in a
//! [`FixRegistry`] and run in registration order.

use crate::errors::JengaError;
use crate::models::{JengaConfig, RunConfig};
use crate::services::aliases::AliasRegistry;
use crate::services::fsutil;
use anyhow::{Context, Result};
use camino::Utf8Path;
use indexmap::IndexMap;
use std::fmt;
use std::fs;

/// Read-only state handed to every hook.
#[derive(Debug, Clone, Copy)]
pub struct FixContext<'a> {
    pub mod_name: &'a str,
    pub config: &'a JengaConfig,
    pub run: &'a RunConfig,
}

/// A hook that mutates mod files in place.
pub trait FileFix: fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, mod_dir: &Utf8Path, definition_file: &Utf8Path, ctx: &FixContext<'_>)
    -> Result<()>;
}

/// A hook that rewrites the installer argument list.
pub trait CommandFix: fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, argv: Vec<String>, ctx: &FixContext<'_>) -> Result<Vec<String>>;
}

/// A registered hook, tagged by when it runs.
#[derive(Debug)]
pub enum Fix {
    Prefix(Box<dyn FileFix>),
    Postfix(Box<dyn FileFix>),
    Command(Box<dyn CommandFix>),
}

/// Wrap a hook error so the engine can report which fix failed.
pub fn hook_failed(fix: &str, mod_name: &str, err: anyhow::Error) -> anyhow::Error {
    JengaError::HookFailed {
        fix: fix.to_string(),
        mod_name: mod_name.to_string(),
        reason: format!("{:#}", err),
    }
    .into()
}

/// Rewrites backslash path separators in the definition file to forward slashes.
///
/// AnotherFineHell's definition file uses Windows separators, which makes
/// WeiDU fail to load `c#anotherfinehell/scripts/c#afhvis.baf` elsewhere.
#[derive(Debug, Default)]
pub struct MirrorBackslashes;

impl FileFix for MirrorBackslashes {
    fn name(&self) -> &str {
        "mirror-backslashes"
    }

    fn apply(&self, _mod_dir: &Utf8Path, definition_file: &Utf8Path, ctx: &FixContext<'_>) -> Result<()> {
        let text = fsutil::read_text(definition_file)?;
        if !text.contains('\\') {
            tracing::debug!("{} has no backslashes; nothing to fix", definition_file);
            return Ok(());
        }
        let fixed = text.replace('\\', "/");
        fs::write(definition_file, fixed)
            .with_context(|| format!("Failed to rewrite {}", definition_file))?;
        tracing::info!("Mirrored backslashes in {} for {}", definition_file, ctx.mod_name);
        Ok(())
    }
}

/// Drops a flag (and, if it takes one, its value) from the argument list.
#[derive(Debug, Clone)]
pub struct RemoveFlag {
    pub flag: String,
    pub takes_value: bool,
}

impl CommandFix for RemoveFlag {
    fn name(&self) -> &str {
        "remove-flag"
    }

    fn apply(&self, argv: Vec<String>, _ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(argv.len());
        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            if arg == self.flag {
                if self.takes_value {
                    args.next();
                }
                continue;
            }
            out.push(arg);
        }
        Ok(out)
    }
}

/// Canonical mod name → ordered hooks.
#[derive(Debug, Default)]
pub struct FixRegistry {
    fixes: IndexMap<String, Vec<Fix>>,
}

impl FixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of fixes jenga ships with.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("anotherfinehell", Fix::Prefix(Box::new(MirrorBackslashes)));
        registry
    }

    pub fn register(&mut self, canonical_name: &str, fix: Fix) {
        self.fixes
            .entry(canonical_name.trim().to_lowercase())
            .or_default()
            .push(fix);
    }

    fn hooks_for<'a>(&'a self, name: &str, aliases: &AliasRegistry) -> &'a [Fix] {
        let key = aliases.canonical_or_self(name);
        self.fixes.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    /// File hooks to run before installing `name`.
    pub fn prefix_hooks(&self, name: &str, aliases: &AliasRegistry) -> Vec<&dyn FileFix> {
        self.hooks_for(name, aliases)
            .iter()
            .filter_map(|fix| match fix {
                Fix::Prefix(hook) => Some(hook.as_ref()),
                _ => None,
            })
            .collect()
    }

    /// File hooks to run after installing `name`.
    pub fn postfix_hooks(&self, name: &str, aliases: &AliasRegistry) -> Vec<&dyn FileFix> {
        self.hooks_for(name, aliases)
            .iter()
            .filter_map(|fix| match fix {
                Fix::Postfix(hook) => Some(hook.as_ref()),
                _ => None,
            })
            .collect()
    }

    pub fn command_hooks(&self, name: &str, aliases: &AliasRegistry) -> Vec<&dyn CommandFix> {
        self.hooks_for(name, aliases)
            .iter()
            .filter_map(|fix| match fix {
                Fix::Command(hook) => Some(hook.as_ref()),
                _ => None,
            })
            .collect()
    }
}
