use serde::{Deserialize, Serialize};

use super::question::{QuestionSpec, QuestionType};

/// Answer value: a string for mcq/text, an integer for slider/rating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(i64),
    Text(String),
}

impl AnswerValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// True when the value's shape is the one `question_type` produces.
    pub fn fits(&self, question_type: QuestionType) -> bool {
        match self {
            Self::Number(_) => question_type.expects_number(),
            Self::Text(_) => !question_type.expects_number(),
        }
    }
}

/// One learner answer, carrying the question it answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    pub answer: AnswerValue,
}

impl Answer {
    pub fn new(question: &QuestionSpec, answer: AnswerValue) -> Self {
        Self {
            id: question.id.clone(),
            question_type: question.question_type(),
            prompt: question.prompt.clone(),
            answer,
        }
    }

    /// True when this answers `question`: same id, same type, and a value
    /// of the matching shape.
    pub fn answers(&self, question: &QuestionSpec) -> bool {
        self.id == question.id
            && self.question_type == question.question_type()
            && self.answer.fits(self.question_type)
    }
}
