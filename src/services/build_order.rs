//! Build-order files: a plain-text view of a build used to reorder it.
//!
//! Each non-empty line names a mod, optionally followed by the component
//! numbers to install in that step:
//!
//! ```text
//! eet
//! lucy 0 2
//! item_rev
//! lucy 10
//! ```
//!
//! Lines starting with `#` are comments.

use crate::models::{BuildPlan, Component, ModStep};
use crate::services::fsutil;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

/// One line of a build-order file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub name: String,
    /// Component numbers; empty means every component of the mod.
    pub components: Vec<String>,
}

pub fn parse_build_order(text: &str) -> Vec<OrderLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?.to_string();
            Some(OrderLine {
                name,
                components: parts.map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Render a plan as build-order text, one step per line.
pub fn build_order_text(plan: &BuildPlan) -> String {
    let mut out = String::new();
    for step in &plan.mods {
        out.push_str(step.name());
        if !step.install_list().is_empty() {
            out.push(' ');
            out.push_str(step.install_list());
        }
        out.push('\n');
    }
    out
}

/// Every step of one mod in the source plan, merged.
struct SourceMod<'a> {
    template: &'a ModStep,
    components: Vec<&'a Component>,
}

/// Rearrange `plan` to follow `order`.
///
/// A mod listed on several lines becomes several steps, each with only the
/// components of its line. Names missing from `plan` become placeholder
/// steps flagged for manual installation. Mods of `plan` that `order` never
/// mentions are dropped with a warning.
pub fn reorder(plan: &BuildPlan, order: &[OrderLine]) -> Result<BuildPlan> {
    let mut sources: IndexMap<String, SourceMod<'_>> = IndexMap::new();
    for step in &plan.mods {
        let source = sources
            .entry(step.canonical_name())
            .or_insert_with(|| SourceMod {
                template: step,
                components: Vec::new(),
            });
        for component in step.components() {
            if !source.components.iter().any(|c| c.number == component.number) {
                source.components.push(component);
            }
        }
    }

    let mut mods = Vec::with_capacity(order.len());
    for line in order {
        let key = line.name.to_lowercase();
        let Some(source) = sources.get(&key) else {
            tracing::warn!(
                "'{}' is not in build '{}'; adding it for manual installation",
                line.name,
                plan.config.build_name
            );
            mods.push(ModStep::placeholder(&line.name, &line.components)?);
            continue;
        };

        let components = if line.components.is_empty() {
            source.components.iter().map(|c| (*c).clone()).collect()
        } else {
            line.components
                .iter()
                .map(|number| {
                    match source.components.iter().find(|c| &c.number == number) {
                        Some(component) => (*component).clone(),
                        None => {
                            tracing::warn!(
                                "Component #{} of '{}' is not in the build; keeping it without a description",
                                number,
                                line.name
                            );
                            Component::new(number.clone(), "")
                        }
                    }
                })
                .collect()
        };
        mods.push(source.template.with_components(components)?);
    }

    let listed: Vec<String> = order.iter().map(|line| line.name.to_lowercase()).collect();
    for (key, source) in &sources {
        if !listed.contains(key) {
            tracing::warn!(
                "'{}' is not listed in the build order and was dropped",
                source.template.name()
            );
        }
    }

    Ok(BuildPlan {
        config: plan.config.clone(),
        mods,
    })
}

fn sibling_path(file: &Utf8Path, name: String) -> Utf8PathBuf {
    match file.parent() {
        Some(dir) => dir.join(name),
        None => Utf8PathBuf::from(name),
    }
}

fn file_stem(path: &Utf8Path) -> &str {
    path.file_stem().unwrap_or("build")
}

/// Write the build-order view of a build file.
///
/// Defaults to `jenga_build_order_<stem>.txt` beside the build file.
pub fn build_file_to_build_order_file(
    build_file: &Utf8Path,
    output: Option<&Utf8Path>,
) -> Result<Utf8PathBuf> {
    let plan = BuildPlan::load(build_file)?;
    let out = match output {
        Some(path) => path.to_path_buf(),
        None => sibling_path(
            build_file,
            format!("jenga_build_order_{}.txt", file_stem(build_file)),
        ),
    };
    fs::write(&out, build_order_text(&plan))
        .with_context(|| format!("Failed to write build order file: {}", out))?;
    tracing::info!("Wrote build order of {} to {}", build_file, out);
    Ok(out)
}

/// Reorder a build file by a build-order file.
///
/// Defaults to `reordered_<stem>.json` beside the build file.
pub fn reorder_build_file(
    build_file: &Utf8Path,
    order_file: &Utf8Path,
    output: Option<&Utf8Path>,
) -> Result<Utf8PathBuf> {
    let plan = BuildPlan::load(build_file)?;
    let order = parse_build_order(&fsutil::read_text(order_file)?);
    tracing::info!("Reordering {} by {} ({} lines)", build_file, order_file, order.len());

    let reordered = reorder(&plan, &order)?;
    let out = match output {
        Some(path) => path.to_path_buf(),
        None => sibling_path(build_file, format!("reordered_{}.json", file_stem(build_file))),
    };
    reordered.save(&out)?;
    Ok(out)
}
