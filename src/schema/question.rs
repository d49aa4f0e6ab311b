use serde::{Deserialize, Serialize};
use std::fmt;

/// The four question types on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Slider,
    Rating,
    Text,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [Self::Mcq, Self::Slider, Self::Rating, Self::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::Slider => "slider",
            Self::Rating => "rating",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Answers to mcq/text questions are strings, slider/rating are integers.
    pub fn expects_number(&self) -> bool {
        matches!(self, Self::Slider | Self::Rating)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds and end labels of a slider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderScale {
    pub min: i64,
    pub max: i64,
    pub min_label: String,
    pub max_label: String,
}

/// Type-specific part of a question. Only the fields relevant to the
/// type exist, so an mcq can never carry a scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq {
        options: Vec<String>,
    },
    Slider {
        scale: SliderScale,
    },
    /// Fixed 1–5 rating.
    Rating,
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
}

/// Canonical shape of one question, independent of rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub id: String,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionSpec {
    pub fn mcq<I, S>(id: impl Into<String>, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind: QuestionKind::Mcq {
                options: options.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn slider(
        id: impl Into<String>,
        prompt: impl Into<String>,
        min: i64,
        max: i64,
        min_label: impl Into<String>,
        max_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind: QuestionKind::Slider {
                scale: SliderScale {
                    min,
                    max,
                    min_label: min_label.into(),
                    max_label: max_label.into(),
                },
            },
        }
    }

    pub fn rating(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind: QuestionKind::Rating,
        }
    }

    pub fn text(
        id: impl Into<String>,
        prompt: impl Into<String>,
        placeholder: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind: QuestionKind::Text { placeholder },
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::Mcq { .. } => QuestionType::Mcq,
            QuestionKind::Slider { .. } => QuestionType::Slider,
            QuestionKind::Rating => QuestionType::Rating,
            QuestionKind::Text { .. } => QuestionType::Text,
        }
    }
}
