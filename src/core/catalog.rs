//! Static option catalog (fields vocabulary, course and career lists)
//! plus the ranking strategy that turns inferred fields into three options.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::profile::OptionKind;

/// Catalog shipped with the crate, used when no path is configured.
const BUILTIN_CATALOG: &str = include_str!("../../data/options_catalog.json");

/// Minimum list length needed to always suggest three distinct options.
pub const MIN_ENTRIES_PER_KIND: usize = 3;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// One course or career.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl CatalogEntry {
    /// Number of this entry's fields that appear in `fields`.
    pub fn overlap(&self, fields: &FxHashSet<&str>) -> usize {
        self.fields
            .iter()
            .filter(|f| fields.contains(f.as_str()))
            .count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub fields_vocab: Vec<String>,
    #[serde(default)]
    pub courses_poly: Vec<CatalogEntry>,
    #[serde(default)]
    pub uni_courses: Vec<CatalogEntry>,
    #[serde(default)]
    pub careers_poly_work: Vec<CatalogEntry>,
}

/// Findings of [`Catalog::lint`].
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_json(&contents)
    }

    /// Parse and structurally check a catalog document.
    pub fn parse_json(input: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(input)?;
        let report = catalog.lint();
        if let Some(first) = report.errors.into_iter().next() {
            return Err(CatalogError::Invalid(first));
        }
        Ok(catalog)
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse_json(BUILTIN_CATALOG)
    }

    pub fn entries(&self, kind: OptionKind) -> &[CatalogEntry] {
        match kind {
            OptionKind::Careers => &self.careers_poly_work,
            OptionKind::PolyCourses => &self.courses_poly,
            OptionKind::UniCourses => &self.uni_courses,
        }
    }

    pub fn option_names(&self, kind: OptionKind) -> Vec<&str> {
        self.entries(kind).iter().map(|e| e.name.as_str()).collect()
    }

    pub fn find(&self, kind: OptionKind, name: &str) -> Option<&CatalogEntry> {
        self.entries(kind).iter().find(|e| e.name == name)
    }

    /// Look an option up in every list. Gate content only knows the name.
    pub fn find_any(&self, name: &str) -> Option<&CatalogEntry> {
        [OptionKind::Careers, OptionKind::UniCourses, OptionKind::PolyCourses]
            .into_iter()
            .find_map(|kind| self.find(kind, name))
    }

    pub fn contains(&self, kind: OptionKind, name: &str) -> bool {
        self.find(kind, name).is_some()
    }

    /// Structural errors make the catalog unusable; warnings are quality
    /// issues such as fields outside the vocabulary.
    pub fn lint(&self) -> LintReport {
        let mut report = LintReport::default();

        // Fields are compared trimmed, the way inference reads them.
        let vocab: FxHashSet<&str> = self
            .fields_vocab
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if self.fields_vocab.iter().any(|f| f.trim().is_empty()) {
            report.errors.push("fields_vocab contains a blank entry".to_string());
        }
        if vocab.len() < MIN_ENTRIES_PER_KIND {
            report.errors.push(format!(
                "fields_vocab has {} distinct entries (minimum {})",
                vocab.len(),
                MIN_ENTRIES_PER_KIND
            ));
        }

        for kind in [OptionKind::PolyCourses, OptionKind::UniCourses, OptionKind::Careers] {
            let key = kind.catalog_key();
            let entries = self.entries(kind);
            let mut seen = FxHashSet::default();
            for entry in entries {
                if entry.name.trim().is_empty() {
                    report.errors.push(format!("{} contains an entry with a blank name", key));
                    continue;
                }
                if !seen.insert(entry.name.as_str()) {
                    report
                        .errors
                        .push(format!("{} lists '{}' more than once", key, entry.name));
                }
                if entry.fields.is_empty() {
                    report
                        .warnings
                        .push(format!("{} entry '{}' has no fields", key, entry.name));
                }
                for field in &entry.fields {
                    if !vocab.contains(field.trim()) {
                        report.warnings.push(format!(
                            "{} entry '{}' uses field '{}' which is not in fields_vocab",
                            key, entry.name, field
                        ));
                    }
                }
                if entry.resources.is_empty() {
                    report
                        .warnings
                        .push(format!("{} entry '{}' has no resources", key, entry.name));
                }
            }
            if seen.len() < MIN_ENTRIES_PER_KIND {
                report.errors.push(format!(
                    "{} has {} usable entries (minimum {})",
                    key,
                    seen.len(),
                    MIN_ENTRIES_PER_KIND
                ));
            }
        }

        report
    }
}

/// Picks the best-matching options for a set of inferred fields.
///
/// Implementations return up to `count` distinct names taken from
/// `entries`; callers fill any shortfall themselves.
pub trait RankingStrategy: Send + Sync {
    fn rank(&self, entries: &[CatalogEntry], inferred_fields: &[String], count: usize) -> Vec<String>;
}

/// Scores each entry by how many inferred fields it shares, ties broken
/// by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldOverlapRanking;

impl RankingStrategy for FieldOverlapRanking {
    fn rank(&self, entries: &[CatalogEntry], inferred_fields: &[String], count: usize) -> Vec<String> {
        let wanted: FxHashSet<&str> = inferred_fields.iter().map(|s| s.as_str()).collect();
        let mut scored: Vec<(usize, &str)> = entries
            .iter()
            .map(|e| (e.overlap(&wanted), e.name.as_str()))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let mut seen = FxHashSet::default();
        scored
            .into_iter()
            .filter(|(_, name)| seen.insert(*name))
            .take(count)
            .map(|(_, name)| name.to_string())
            .collect()
    }
}
