//! Question specs to UI-facing records and back.
//!
//! `to_renderable` is total: every `QuestionSpec` maps to exactly one
//! `UiQuestion` that keeps the id, type and prompt, so the answer a UI
//! collects can always be rebuilt with [`UiQuestion::to_answer`].

use serde::{Deserialize, Serialize};

use crate::schema::answer::{Answer, AnswerValue};
use crate::schema::question::{QuestionKind, QuestionSpec, QuestionType};

pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;
pub const RATING_DEFAULT: i64 = 3;

const RATING_MIN_LABEL: &str = "Low";
const RATING_MAX_LABEL: &str = "High";

/// Which numeric widget a range question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Slider,
    Rating,
}

/// A question ready for a presentation layer, with its current input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum UiQuestion {
    Choice {
        id: String,
        prompt: String,
        options: Vec<String>,
        selected: usize,
    },
    Range {
        id: String,
        prompt: String,
        kind: RangeKind,
        min: i64,
        max: i64,
        min_label: String,
        max_label: String,
        value: i64,
    },
    FreeText {
        id: String,
        prompt: String,
        placeholder: Option<String>,
        text: String,
    },
}

pub fn to_renderable(question: &QuestionSpec) -> UiQuestion {
    let id = question.id.clone();
    let prompt = question.prompt.clone();
    match &question.kind {
        QuestionKind::Mcq { options } => UiQuestion::Choice {
            id,
            prompt,
            options: options.clone(),
            selected: 0,
        },
        QuestionKind::Slider { scale } => UiQuestion::Range {
            id,
            prompt,
            kind: RangeKind::Slider,
            min: scale.min,
            max: scale.max,
            min_label: scale.min_label.clone(),
            max_label: scale.max_label.clone(),
            value: scale.min,
        },
        QuestionKind::Rating => UiQuestion::Range {
            id,
            prompt,
            kind: RangeKind::Rating,
            min: RATING_MIN,
            max: RATING_MAX,
            min_label: RATING_MIN_LABEL.to_string(),
            max_label: RATING_MAX_LABEL.to_string(),
            value: RATING_DEFAULT,
        },
        QuestionKind::Text { placeholder } => UiQuestion::FreeText {
            id,
            prompt,
            placeholder: placeholder.clone(),
            text: String::new(),
        },
    }
}

/// Renderable records for a whole question list, in order.
pub fn to_renderables<'a>(questions: impl IntoIterator<Item = &'a QuestionSpec>) -> Vec<UiQuestion> {
    questions.into_iter().map(to_renderable).collect()
}

impl UiQuestion {
    pub fn id(&self) -> &str {
        match self {
            Self::Choice { id, .. } | Self::Range { id, .. } | Self::FreeText { id, .. } => id,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Self::Choice { prompt, .. }
            | Self::Range { prompt, .. }
            | Self::FreeText { prompt, .. } => prompt,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Choice { .. } => QuestionType::Mcq,
            Self::Range {
                kind: RangeKind::Slider,
                ..
            } => QuestionType::Slider,
            Self::Range {
                kind: RangeKind::Rating,
                ..
            } => QuestionType::Rating,
            Self::FreeText { .. } => QuestionType::Text,
        }
    }

    /// Select an mcq option. Returns false for other types or an index
    /// out of range, leaving the selection unchanged.
    pub fn select(&mut self, index: usize) -> bool {
        match self {
            Self::Choice {
                options, selected, ..
            } if index < options.len() => {
                *selected = index;
                true
            }
            _ => false,
        }
    }

    /// Set a slider or rating value, clamped to its bounds.
    pub fn set_value(&mut self, v: i64) -> bool {
        match self {
            Self::Range {
                min, max, value, ..
            } => {
                *value = v.clamp(*min, *max);
                true
            }
            _ => false,
        }
    }

    pub fn set_text(&mut self, t: impl Into<String>) -> bool {
        match self {
            Self::FreeText { text, .. } => {
                *text = t.into();
                true
            }
            _ => false,
        }
    }

    /// The answer for the current input, with the original id, type and prompt.
    pub fn to_answer(&self) -> Answer {
        let value = match self {
            Self::Choice {
                options, selected, ..
            } => AnswerValue::Text(options.get(*selected).cloned().unwrap_or_default()),
            Self::Range { value, .. } => AnswerValue::Number(*value),
            Self::FreeText { text, .. } => AnswerValue::Text(text.clone()),
        };
        Answer {
            id: self.id().to_string(),
            question_type: self.question_type(),
            prompt: self.prompt().to_string(),
            answer: value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_types() -> Vec<QuestionSpec> {
        vec![
            QuestionSpec::mcq("m", "Pick", ["A", "B", "C"]),
            QuestionSpec::slider("s", "Slide", 2, 8, "lo", "hi"),
            QuestionSpec::rating("r", "Rate"),
            QuestionSpec::text("t", "Say", Some("e.g.".to_string())),
        ]
    }

    #[test]
    fn lossless_for_id_type_prompt() {
        for q in all_types() {
            let ui = to_renderable(&q);
            assert_eq!(ui.id(), q.id);
            assert_eq!(ui.prompt(), q.prompt);
            assert_eq!(ui.question_type(), q.question_type());
            assert!(ui.to_answer().answers(&q));
        }
    }

    #[test]
    fn defaults_per_type() {
        let uis = to_renderables(&all_types());
        assert!(matches!(uis[0], UiQuestion::Choice { selected: 0, .. }));
        assert!(matches!(uis[1], UiQuestion::Range { value: 2, min: 2, max: 8, .. }));
        assert!(matches!(
            uis[2],
            UiQuestion::Range { value: RATING_DEFAULT, min: 1, max: 5, kind: RangeKind::Rating, .. }
        ));
        assert!(matches!(&uis[3], UiQuestion::FreeText { text, placeholder: Some(_), .. } if text.is_empty()));
    }

    #[test]
    fn edits_flow_into_answers() {
        let mut uis = to_renderables(&all_types());
        assert!(uis[0].select(2));
        assert!(!uis[0].select(3));
        assert!(uis[1].set_value(100));
        assert!(uis[2].set_value(-4));
        assert!(uis[3].set_text("Robots"));
        assert!(!uis[3].set_value(1));

        let answers: Vec<Answer> = uis.iter().map(UiQuestion::to_answer).collect();
        assert_eq!(answers[0].answer, AnswerValue::Text("C".to_string()));
        assert_eq!(answers[1].answer, AnswerValue::Number(8));
        assert_eq!(answers[2].answer, AnswerValue::Number(1));
        assert_eq!(answers[3].answer, AnswerValue::Text("Robots".to_string()));
        assert_eq!(answers[3].id, "t");
    }
}
