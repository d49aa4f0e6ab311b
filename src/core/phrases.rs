//! Weighted phrase templates: parsing, loading and rendering.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Phrase bank shipped with the crate.
const BUILTIN_PHRASES: &str = include_str!("../../data/phrases.ron");

/// Nested `{@rule}` expansion stops at this depth.
const MAX_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("template parse error: {0}")]
    TemplateParse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Caller-supplied value: `{name}`.
    Slot(String),
    /// Another phrase rule: `{@rule}`.
    RuleRef(String),
}

/// A parsed template, as a sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a template string into a sequence of segments.
    ///
    /// Syntax:
    /// - `{name}` → `Slot`
    /// - `{@rule}` → `RuleRef`
    /// - `{{` / `}}` → literal braces
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, PhraseError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    if !literal_buf.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                    }

                    let start = i + 1;
                    let mut end = start;
                    while end < len && chars[end] != '}' {
                        if chars[end] == '{' {
                            return Err(PhraseError::TemplateParse(
                                "nested braces are not allowed".to_string(),
                            ));
                        }
                        end += 1;
                    }
                    if end == len {
                        return Err(PhraseError::TemplateParse("unclosed brace".to_string()));
                    }

                    let content: String = chars[start..end].iter().collect();
                    segments.push(Self::parse_segment(content.trim())?);
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                '}' => {
                    return Err(PhraseError::TemplateParse(
                        "unmatched closing brace".to_string(),
                    ));
                }
                c => {
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    fn parse_segment(content: &str) -> Result<TemplateSegment, PhraseError> {
        if content.is_empty() {
            return Err(PhraseError::TemplateParse("empty braces".to_string()));
        }
        match content.strip_prefix('@') {
            Some("") => Err(PhraseError::TemplateParse("empty rule reference".to_string())),
            Some(rule) => Ok(TemplateSegment::RuleRef(rule.to_string())),
            None => Ok(TemplateSegment::Slot(content.to_string())),
        }
    }

    /// Slot names this template reads.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Slot(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A weighted text alternative within a phrase rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub weight: u32,
    pub template: Template,
}

/// A named rule with weighted alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseRule {
    pub name: String,
    pub alternatives: Vec<Alternative>,
}

/// Slot values for one render call.
pub type Slots<'a> = FxHashMap<&'a str, String>;

/// A set of named phrase rules.
#[derive(Debug, Clone, Default)]
pub struct PhraseBook {
    pub rules: FxHashMap<String, PhraseRule>,
}

#[derive(Debug, Deserialize)]
struct RonAlternative {
    weight: u32,
    text: String,
}

impl PhraseBook {
    pub fn load_from_ron(path: &Path) -> Result<PhraseBook, PhraseError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PhraseBook, PhraseError> {
        let raw: FxHashMap<String, Vec<RonAlternative>> = ron::from_str(input)?;
        let mut rules = FxHashMap::default();

        for (name, alts) in raw {
            let alternatives = alts
                .into_iter()
                .map(|alt| {
                    Ok(Alternative {
                        weight: alt.weight,
                        template: Template::parse(&alt.text)?,
                    })
                })
                .collect::<Result<Vec<_>, PhraseError>>()?;
            rules.insert(name.clone(), PhraseRule { name, alternatives });
        }

        Ok(PhraseBook { rules })
    }

    pub fn builtin() -> Result<PhraseBook, PhraseError> {
        Self::parse_ron(BUILTIN_PHRASES)
    }

    /// Merge another book into this one. Rules from `other` win.
    pub fn merge(&mut self, other: PhraseBook) {
        self.rules.extend(other.rules);
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.rules.contains_key(rule)
    }

    /// Render `rule`, picking alternatives by weight.
    ///
    /// Returns `None` when the rule is unknown, has no positive weight,
    /// reads a slot that was not supplied, or recurses too deeply.
    pub fn render(&self, rule: &str, slots: &Slots<'_>, rng: &mut StdRng) -> Option<String> {
        self.render_at(rule, slots, rng, 0)
    }

    fn render_at(
        &self,
        rule: &str,
        slots: &Slots<'_>,
        rng: &mut StdRng,
        depth: usize,
    ) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        let rule = self.rules.get(rule)?;
        let weights: Vec<u32> = rule.alternatives.iter().map(|a| a.weight).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        let template = &rule.alternatives[dist.sample(rng)].template;

        let mut out = String::new();
        for segment in &template.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Slot(name) => out.push_str(slots.get(name.as_str())?),
                TemplateSegment::RuleRef(name) => {
                    out.push_str(&self.render_at(name, slots, rng, depth + 1)?)
                }
            }
        }
        Some(out)
    }

    /// Problems that would make rendering fail: dangling rule references,
    /// rules without a positive weight, and blank alternatives.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut names: Vec<&String> = self.rules.keys().collect();
        names.sort();

        for name in names {
            let rule = &self.rules[name];
            if rule.alternatives.iter().all(|a| a.weight == 0) {
                problems.push(format!("rule '{}' has no alternative with positive weight", name));
            }
            for alt in &rule.alternatives {
                let blank = alt.template.segments.iter().all(|s| match s {
                    TemplateSegment::Literal(t) => t.trim().is_empty(),
                    _ => false,
                });
                if blank {
                    problems.push(format!("rule '{}' has a blank alternative", name));
                }
                for seg in &alt.template.segments {
                    if let TemplateSegment::RuleRef(target) = seg {
                        if !self.rules.contains_key(target) {
                            problems.push(format!(
                                "rule '{}' references unknown rule '{}'",
                                name, target
                            ));
                        }
                    }
                }
            }
        }
        problems
    }
}
