use crate::services::aliases::AliasRegistry;
use crate::services::archive::is_archive_name;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Extension of WeiDU installer-definition files.
pub const DEFINITION_EXT: &str = "tp2";

/// Best candidate found by [`find_best`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMatch {
    pub candidate: String,
    pub index: usize,
    pub score: u8,
}

/// Levenshtein ratio of two strings, scaled to 0-100.
///
/// Substitutions cost two edits, so the ratio equals
/// `(len_a + len_b - distance) / (len_a + len_b)`.
pub fn similarity_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    let distance = weighted_levenshtein(&a, &b);
    let ratio = (total - distance) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

fn weighted_levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, a_ch) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_ch) in b.iter().enumerate() {
            let cost = if a_ch == b_ch { 0 } else { 2 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b.len()]
}

/// Highest-scoring candidate for `query`, compared case-insensitively.
///
/// Ties keep the earliest candidate. No candidates, no match.
pub fn find_best<S: AsRef<str>>(query: &str, candidates: &[S]) -> Option<BestMatch> {
    let query = query.to_lowercase();
    let mut best: Option<BestMatch> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let candidate = candidate.as_ref();
        let score = similarity_ratio(&query, &candidate.to_lowercase());
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(BestMatch {
                candidate: candidate.to_string(),
                index,
                score,
            });
        }
    }
    best
}

pub fn is_definition_file(name: &str) -> bool {
    Utf8Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DEFINITION_EXT))
}

/// What a fuzzy search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Definition,
    Archive,
    Directory,
}

/// Locates mod artifacts on disk from human-entered mod names.
pub struct FuzzyLocator<'a> {
    aliases: &'a AliasRegistry,
    threshold: u8,
}

impl<'a> FuzzyLocator<'a> {
    pub fn new(aliases: &'a AliasRegistry, threshold: u8) -> Self {
        Self { aliases, threshold }
    }

    /// Find the entry of `dir` best matching `name`.
    ///
    /// Long names first try entries containing the name verbatim. Then every
    /// registered alias is tried, with `setup-` prefixes for definition files
    /// and `osx-`/`mac-` prefixes for archives and folders. Matches below the
    /// threshold are rejected, except that a definition search falls back to
    /// its best candidate with a warning.
    pub fn locate(&self, dir: &Utf8Path, name: &str, kind: SearchKind) -> Result<Option<Utf8PathBuf>> {
        let entries = list_entries(dir, kind)?;
        if entries.is_empty() {
            return Ok(None);
        }
        let lowered = name.trim().to_lowercase();

        if lowered.chars().count() > 5 {
            let containing: Vec<&String> = entries
                .iter()
                .filter(|entry| entry.to_lowercase().contains(&lowered))
                .collect();
            if containing.len() == 1 {
                return Ok(Some(dir.join(containing[0])));
            }
            if let Some(best) = find_best(&lowered, &containing) {
                if best.score >= self.threshold {
                    return Ok(Some(dir.join(&best.candidate)));
                }
            }
        }

        let mut best_overall: Option<BestMatch> = None;
        for variant in self.search_variants(&lowered, kind) {
            if let Some(found) = find_best(&variant, &entries) {
                tracing::debug!(
                    "Fuzzy search for '{}' in {}: '{}' scored {}",
                    variant,
                    dir,
                    found.candidate,
                    found.score
                );
                if best_overall.as_ref().is_none_or(|b| found.score > b.score) {
                    best_overall = Some(found);
                }
            }
        }

        match best_overall {
            Some(best) if best.score >= self.threshold => Ok(Some(dir.join(&best.candidate))),
            Some(best) if kind == SearchKind::Definition => {
                tracing::warn!(
                    "Best installer-definition match for '{}' in {} is '{}' with a low score of {}; using it anyway",
                    name,
                    dir,
                    best.candidate,
                    best.score
                );
                Ok(Some(dir.join(&best.candidate)))
            }
            _ => Ok(None),
        }
    }

    fn search_variants(&self, lowered: &str, kind: SearchKind) -> Vec<String> {
        let canonical = self.aliases.canonical_or_self(lowered);
        let mut names: Vec<String> = vec![lowered.to_string()];
        if canonical != lowered {
            names.push(canonical.clone());
        }
        names.extend(self.aliases.aliases_of(&canonical).into_iter().map(str::to_string));

        let prefixes: &[&str] = match kind {
            SearchKind::Definition => &["setup-"],
            SearchKind::Archive | SearchKind::Directory => &["osx-", "mac-"],
        };
        let mut variants = Vec::new();
        for name in names {
            for prefix in prefixes {
                variants.push(format!("{}{}", prefix, name));
            }
            variants.push(name);
        }

        match kind {
            SearchKind::Definition => variants.sort_by_key(|v| v.len()),
            SearchKind::Archive | SearchKind::Directory => {
                variants.sort_by_key(|v| std::cmp::Reverse(v.len()))
            }
        }
        let mut seen = std::collections::HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants
    }
}

/// Entry names of `dir` that are candidates for `kind`, sorted.
fn list_entries(dir: &Utf8Path, kind: SearchKind) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to list directory: {}", dir))?
    {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir))?;
        let path = entry.path();
        let name = entry.file_name();
        let keep = match kind {
            SearchKind::Definition => path.is_file() && is_definition_file(name),
            SearchKind::Archive => path.is_file() && is_archive_name(name),
            SearchKind::Directory => path.is_dir(),
        };
        if keep {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
