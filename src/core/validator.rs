//! Strict shape checks for the four stage payloads.
//!
//! Every document coming back from the generation service passes through
//! [`SchemaValidator::validate`] before anything is deserialized into the
//! typed payloads. Checks run in a fixed order (top-level object, required
//! keys, array arity, then nested shapes) and stop at the first violation.
//! Nothing is coerced: `5.0` is not an integer and `"3"` is not a number.

use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::core::catalog::Catalog;
use crate::schema::payload::{
    AnalysisPayload, GatePayload, Part1Payload, Part2Payload, FEEDBACK_LINES,
    INFERRED_FIELD_COUNT, PART1_QUESTION_COUNT, PART2_QUESTION_COUNT, STRENGTH_TAG_COUNT,
    SUGGESTED_OPTION_COUNT, WORK_STYLE_TAGS,
};
use crate::schema::profile::{BranchChoice, OptionKind};
use crate::schema::question::QuestionType;

/// Path reported for violations at the top level of a document.
pub const ROOT: &str = "<root>";

/// What went wrong at a location in the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaErrorKind {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    #[error("missing required key '{0}'")]
    MissingKey(String),
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected {expected} items, found {found}")]
    WrongArity { expected: String, found: usize },
    #[error("{0}")]
    InvalidValue(String),
    #[error("'{field}' is not allowed on a {question_type} question")]
    UnexpectedField {
        field: &'static str,
        question_type: QuestionType,
    },
    #[error("duplicate value '{0}'")]
    Duplicate(String),
    #[error("'{name}' is not one of the catalog {kind}")]
    NotInCatalog { name: String, kind: &'static str },
}

/// The first schema violation found in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct SchemaError {
    pub path: String,
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, kind: SchemaErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// The schema a document is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Part1,
    /// `vocational` decides whether the branch question must be present.
    Part2 { vocational: bool },
    /// `kind` is the catalog list suggested options must come from.
    Analysis { kind: OptionKind },
    /// `work_path` decides whether the salary and work-style lines must be present.
    Gate { work_path: bool },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Part1 => f.write_str("part1"),
            Self::Part2 { .. } => f.write_str("part2"),
            Self::Analysis { .. } => f.write_str("analysis"),
            Self::Gate { .. } => f.write_str("gate"),
        }
    }
}

type Check = Result<(), SchemaError>;

pub struct SchemaValidator<'a> {
    catalog: &'a Catalog,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Check `doc` against the schema for `stage`. Never mutates `doc`.
    pub fn validate(&self, stage: &Stage, doc: &Value) -> Check {
        match *stage {
            Stage::Part1 => validate_part1(doc),
            Stage::Part2 { vocational } => validate_part2(doc, vocational),
            Stage::Analysis { kind } => self.validate_analysis(doc, kind),
            Stage::Gate { work_path } => validate_gate(doc, work_path),
        }
    }

    pub fn parse_part1(&self, doc: &Value) -> Result<Part1Payload, SchemaError> {
        self.validate(&Stage::Part1, doc)?;
        decode(doc)
    }

    pub fn parse_part2(&self, doc: &Value, vocational: bool) -> Result<Part2Payload, SchemaError> {
        self.validate(&Stage::Part2 { vocational }, doc)?;
        decode(doc)
    }

    pub fn parse_analysis(
        &self,
        doc: &Value,
        kind: OptionKind,
    ) -> Result<AnalysisPayload, SchemaError> {
        self.validate(&Stage::Analysis { kind }, doc)?;
        decode(doc)
    }

    pub fn parse_gate(&self, doc: &Value, work_path: bool) -> Result<GatePayload, SchemaError> {
        self.validate(&Stage::Gate { work_path }, doc)?;
        decode(doc)
    }

    fn validate_analysis(&self, doc: &Value, kind: OptionKind) -> Check {
        let obj = object(doc, ROOT)?;
        require_keys(
            obj,
            ROOT,
            &["strength_tags", "work_style_tags", "feedback_lines", "suggested_options"],
        )?;

        let strengths = array(obj, "strength_tags")?;
        let styles = array(obj, "work_style_tags")?;
        let feedback = array(obj, "feedback_lines")?;
        let options = array(obj, "suggested_options")?;
        exact_arity(strengths, "strength_tags", STRENGTH_TAG_COUNT)?;
        ranged_arity(styles, "work_style_tags", WORK_STYLE_TAGS)?;
        ranged_arity(feedback, "feedback_lines", FEEDBACK_LINES)?;
        exact_arity(options, "suggested_options", SUGGESTED_OPTION_COUNT)?;

        strings(strengths, "strength_tags")?;
        strings(styles, "work_style_tags")?;
        strings(feedback, "feedback_lines")?;
        let names = strings(options, "suggested_options")?;
        distinct(&names, "suggested_options")?;
        for (i, name) in names.iter().enumerate() {
            if !self.catalog.contains(kind, name) {
                return Err(SchemaError::new(
                    format!("suggested_options[{}]", i),
                    SchemaErrorKind::NotInCatalog {
                        name: name.to_string(),
                        kind: kind.noun(),
                    },
                ));
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(doc: &Value) -> Result<T, SchemaError> {
    serde_json::from_value(doc.clone())
        .map_err(|e| SchemaError::new(ROOT, SchemaErrorKind::InvalidValue(e.to_string())))
}

fn validate_part1(doc: &Value) -> Check {
    let obj = object(doc, ROOT)?;
    require_keys(obj, ROOT, &["questions"])?;
    let questions = array(obj, "questions")?;
    exact_arity(questions, "questions", PART1_QUESTION_COUNT)?;

    let mut ids = FxHashSet::default();
    let mut types = FxHashSet::default();
    for (i, q) in questions.iter().enumerate() {
        let path = format!("questions[{}]", i);
        let (id, qtype) = question(q, &path)?;
        unique_id(&mut ids, id, &path)?;
        types.insert(qtype);
    }
    if types.len() < 2 {
        return Err(SchemaError::new(
            "questions",
            SchemaErrorKind::InvalidValue("questions must mix at least two question types".into()),
        ));
    }
    Ok(())
}

fn validate_part2(doc: &Value, vocational: bool) -> Check {
    let obj = object(doc, ROOT)?;
    require_keys(obj, ROOT, &["inferred_fields", "questions"])?;
    if vocational {
        require_keys(obj, ROOT, &["poly_extra_question"])?;
    }

    let fields = array(obj, "inferred_fields")?;
    let questions = array(obj, "questions")?;
    exact_arity(fields, "inferred_fields", INFERRED_FIELD_COUNT)?;
    exact_arity(questions, "questions", PART2_QUESTION_COUNT)?;

    let names = strings(fields, "inferred_fields")?;
    distinct(&names, "inferred_fields")?;

    let mut ids = FxHashSet::default();
    for (i, q) in questions.iter().enumerate() {
        let path = format!("questions[{}]", i);
        let (id, _) = question(q, &path)?;
        unique_id(&mut ids, id, &path)?;
    }

    let extra = obj.get("poly_extra_question").unwrap_or(&Value::Null);
    match (vocational, extra) {
        (true, Value::Null) => Err(SchemaError::new(
            "poly_extra_question",
            SchemaErrorKind::InvalidValue("required for vocational-track learners".into()),
        )),
        (true, q) => {
            let path = "poly_extra_question";
            let (id, qtype) = question(q, path)?;
            if qtype != QuestionType::Mcq {
                return Err(SchemaError::new(
                    path,
                    SchemaErrorKind::InvalidValue(format!(
                        "branch question must be mcq, found {}",
                        qtype
                    )),
                ));
            }
            let offers_work = q["options"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .any(|o| BranchChoice::from_answer(o) == Some(BranchChoice::Work));
            if !offers_work {
                return Err(SchemaError::new(
                    format!("{}.options", path),
                    SchemaErrorKind::InvalidValue("branch question must offer a work option".into()),
                ));
            }
            unique_id(&mut ids, id, path)
        }
        (false, Value::Null) => Ok(()),
        (false, _) => Err(SchemaError::new(
            "poly_extra_question",
            SchemaErrorKind::InvalidValue("must be null for non-vocational learners".into()),
        )),
    }
}

fn validate_gate(doc: &Value, work_path: bool) -> Check {
    let obj = object(doc, ROOT)?;
    require_keys(obj, ROOT, &["info_dialog_lines", "dragon"])?;
    if work_path {
        require_keys(obj, ROOT, &["salary_outlook_line", "work_style_line"])?;
    }

    let info = array(obj, "info_dialog_lines")?;
    if info.is_empty() {
        return Err(SchemaError::new(
            "info_dialog_lines",
            SchemaErrorKind::WrongArity {
                expected: "at least 1".into(),
                found: 0,
            },
        ));
    }
    strings(info, "info_dialog_lines")?;

    let dragon = object(&obj["dragon"], "dragon")?;
    require_keys(
        dragon,
        "dragon",
        &["micro_quest_1_week", "mini_project_1_month", "resources"],
    )?;
    let resources = array(dragon, "resources").map_err(|e| nest("dragon", e))?;
    if resources.is_empty() {
        return Err(SchemaError::new(
            "dragon.resources",
            SchemaErrorKind::WrongArity {
                expected: "at least 1".into(),
                found: 0,
            },
        ));
    }
    text(&dragon["micro_quest_1_week"], "dragon.micro_quest_1_week")?;
    text(&dragon["mini_project_1_month"], "dragon.mini_project_1_month")?;
    strings(resources, "dragon.resources")?;

    for key in ["salary_outlook_line", "work_style_line"] {
        let value = obj.get(key).unwrap_or(&Value::Null);
        if work_path {
            text(value, key)?;
        } else if !value.is_null() {
            return Err(SchemaError::new(
                key,
                SchemaErrorKind::InvalidValue("only allowed on the work path".into()),
            ));
        }
    }
    Ok(())
}

/// Check one QuestionSpec, returning its id and type.
fn question<'v>(value: &'v Value, path: &str) -> Result<(&'v str, QuestionType), SchemaError> {
    let obj = object(value, path)?;
    require_keys(obj, path, &["id", "type", "prompt"])?;

    let id = text(&obj["id"], &format!("{}.id", path))?;
    let type_path = format!("{}.type", path);
    let raw_type = string(&obj["type"], &type_path)?;
    let qtype = QuestionType::parse(raw_type).ok_or_else(|| {
        SchemaError::new(
            &type_path,
            SchemaErrorKind::InvalidValue(format!("unknown question type '{}'", raw_type)),
        )
    })?;
    match qtype {
        QuestionType::Mcq => require_keys(obj, path, &["options"])?,
        QuestionType::Slider => require_keys(obj, path, &["scale"])?,
        QuestionType::Rating | QuestionType::Text => {}
    }
    text(&obj["prompt"], &format!("{}.prompt", path))?;

    let present = |key: &str| obj.get(key).is_some_and(|v| !v.is_null());
    let forbid = |field: &'static str| -> Check {
        if present(field) {
            Err(SchemaError::new(
                format!("{}.{}", path, field),
                SchemaErrorKind::UnexpectedField {
                    field,
                    question_type: qtype,
                },
            ))
        } else {
            Ok(())
        }
    };

    match qtype {
        QuestionType::Mcq => {
            forbid("scale")?;
            forbid("placeholder")?;
            let options_path = format!("{}.options", path);
            let options = array_at(&obj["options"], &options_path)?;
            if options.len() < 2 {
                return Err(SchemaError::new(
                    &options_path,
                    SchemaErrorKind::WrongArity {
                        expected: "at least 2".into(),
                        found: options.len(),
                    },
                ));
            }
            strings(options, &options_path)?;
        }
        QuestionType::Slider => {
            forbid("options")?;
            forbid("placeholder")?;
            let scale_path = format!("{}.scale", path);
            let scale = object(&obj["scale"], &scale_path)?;
            require_keys(scale, &scale_path, &["min", "max", "min_label", "max_label"])?;
            let min = integer(&scale["min"], &format!("{}.min", scale_path))?;
            let max = integer(&scale["max"], &format!("{}.max", scale_path))?;
            string(&scale["min_label"], &format!("{}.min_label", scale_path))?;
            string(&scale["max_label"], &format!("{}.max_label", scale_path))?;
            if min >= max {
                return Err(SchemaError::new(
                    scale_path,
                    SchemaErrorKind::InvalidValue(format!(
                        "min ({}) must be below max ({})",
                        min, max
                    )),
                ));
            }
        }
        QuestionType::Rating => {
            forbid("options")?;
            forbid("placeholder")?;
            if present("scale") {
                let scale_path = format!("{}.scale", path);
                let scale = object(&obj["scale"], &scale_path)?;
                require_keys(scale, &scale_path, &["min", "max"])?;
                let min = integer(&scale["min"], &format!("{}.min", scale_path))?;
                let max = integer(&scale["max"], &format!("{}.max", scale_path))?;
                if (min, max) != (1, 5) {
                    return Err(SchemaError::new(
                        scale_path,
                        SchemaErrorKind::InvalidValue(format!(
                            "rating scale is fixed at 1..5, found {}..{}",
                            min, max
                        )),
                    ));
                }
            }
        }
        QuestionType::Text => {
            forbid("options")?;
            forbid("scale")?;
            if present("placeholder") {
                string(&obj["placeholder"], &format!("{}.placeholder", path))?;
            }
        }
    }

    Ok((id, qtype))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, SchemaError> {
    value
        .as_object()
        .ok_or_else(|| SchemaError::new(path, SchemaErrorKind::NotAnObject(type_name(value))))
}

fn require_keys(obj: &Map<String, Value>, path: &str, keys: &[&str]) -> Check {
    match keys.iter().find(|k| !obj.contains_key(**k)) {
        Some(missing) => Err(SchemaError::new(
            path,
            SchemaErrorKind::MissingKey(missing.to_string()),
        )),
        None => Ok(()),
    }
}

fn array<'v>(obj: &'v Map<String, Value>, key: &str) -> Result<&'v Vec<Value>, SchemaError> {
    array_at(&obj[key], key)
}

fn array_at<'v>(value: &'v Value, path: &str) -> Result<&'v Vec<Value>, SchemaError> {
    value.as_array().ok_or_else(|| {
        SchemaError::new(
            path,
            SchemaErrorKind::WrongType {
                expected: "array",
                found: type_name(value),
            },
        )
    })
}

fn exact_arity(items: &[Value], path: &str, expected: usize) -> Check {
    if items.len() != expected {
        return Err(SchemaError::new(
            path,
            SchemaErrorKind::WrongArity {
                expected: expected.to_string(),
                found: items.len(),
            },
        ));
    }
    Ok(())
}

fn ranged_arity(items: &[Value], path: &str, range: std::ops::RangeInclusive<usize>) -> Check {
    if !range.contains(&items.len()) {
        return Err(SchemaError::new(
            path,
            SchemaErrorKind::WrongArity {
                expected: format!("{} to {}", range.start(), range.end()),
                found: items.len(),
            },
        ));
    }
    Ok(())
}

fn string<'v>(value: &'v Value, path: &str) -> Result<&'v str, SchemaError> {
    value.as_str().ok_or_else(|| {
        SchemaError::new(
            path,
            SchemaErrorKind::WrongType {
                expected: "string",
                found: type_name(value),
            },
        )
    })
}

/// A string with visible content.
fn text<'v>(value: &'v Value, path: &str) -> Result<&'v str, SchemaError> {
    let s = string(value, path)?;
    if s.trim().is_empty() {
        return Err(SchemaError::new(
            path,
            SchemaErrorKind::InvalidValue("must not be blank".into()),
        ));
    }
    Ok(s)
}

fn strings<'v>(items: &'v [Value], path: &str) -> Result<Vec<&'v str>, SchemaError> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| text(v, &format!("{}[{}]", path, i)))
        .collect()
}

fn integer(value: &Value, path: &str) -> Result<i64, SchemaError> {
    value.as_i64().ok_or_else(|| {
        SchemaError::new(
            path,
            SchemaErrorKind::WrongType {
                expected: "integer",
                found: type_name(value),
            },
        )
    })
}

fn distinct(items: &[&str], path: &str) -> Check {
    let mut seen = FxHashSet::default();
    for item in items {
        if !seen.insert(*item) {
            return Err(SchemaError::new(
                path,
                SchemaErrorKind::Duplicate(item.to_string()),
            ));
        }
    }
    Ok(())
}

fn unique_id<'v>(ids: &mut FxHashSet<&'v str>, id: &'v str, path: &str) -> Check {
    if !ids.insert(id) {
        return Err(SchemaError::new(
            format!("{}.id", path),
            SchemaErrorKind::Duplicate(id.to_string()),
        ));
    }
    Ok(())
}

fn nest(parent: &str, err: SchemaError) -> SchemaError {
    SchemaError::new(format!("{}.{}", parent, err.path), err.kind)
}
