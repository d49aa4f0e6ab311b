use serde::{Deserialize, Serialize};

use super::question::QuestionSpec;

pub const PART1_QUESTION_COUNT: usize = 5;
pub const PART2_QUESTION_COUNT: usize = 12;
pub const INFERRED_FIELD_COUNT: usize = 3;
pub const STRENGTH_TAG_COUNT: usize = 5;
pub const WORK_STYLE_TAGS: std::ops::RangeInclusive<usize> = 3..=6;
pub const FEEDBACK_LINES: std::ops::RangeInclusive<usize> = 2..=5;
pub const SUGGESTED_OPTION_COUNT: usize = 3;

/// Stage 1: five intake questions of mixed types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part1Payload {
    pub questions: Vec<QuestionSpec>,
}

/// Stage 2: three inferred fields, twelve follow-up questions, and the
/// branch question for vocational-track learners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part2Payload {
    pub inferred_fields: Vec<String>,
    pub questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub poly_extra_question: Option<QuestionSpec>,
}

impl Part2Payload {
    /// Questions in presentation order, branch question last.
    pub fn presented(&self) -> impl Iterator<Item = &QuestionSpec> {
        self.questions.iter().chain(self.poly_extra_question.iter())
    }
}

/// Strengths analysis and the three options that become gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub strength_tags: Vec<String>,
    pub work_style_tags: Vec<String>,
    pub feedback_lines: Vec<String>,
    pub suggested_options: Vec<String>,
}

/// The quest offered by the dragon warrior when a gate is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragonQuest {
    pub micro_quest_1_week: String,
    pub mini_project_1_month: String,
    pub resources: Vec<String>,
}

/// Content for one gate scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePayload {
    pub info_dialog_lines: Vec<String>,
    pub dragon: DragonQuest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_outlook_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_style_line: Option<String>,
}

impl GatePayload {
    /// Lines the wise man speaks before asking whether the learner is
    /// interested: an introduction, the info lines, then the work-style
    /// and salary lines when present.
    pub fn dialog_lines(&self, option_name: &str) -> Vec<String> {
        let mut lines = vec![format!("This gate is {}.", option_name)];
        lines.extend(
            self.info_dialog_lines
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        for extra in [&self.work_style_line, &self.salary_outlook_line] {
            if let Some(line) = extra.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                lines.push(line.to_string());
            }
        }
        lines
    }
}
