//! Prompt text sent to the generation service, one builder per stage.
//! Each user prompt carries the known inputs and a schema hint.

use crate::core::fallback::{BRANCH_OPTIONS, BRANCH_QUESTION_ID};
use crate::schema::answer::Answer;
use crate::schema::profile::{BranchChoice, EducationStatus, OptionKind};

pub const SYSTEM_RULES: &str = "You are the content engine for Career Quest Map. \
Return valid JSON only. No extra text. \
Keep strings short and safe for a small game UI. \
Do not invent precise statistics. Use safe ranges or qualitative wording.";

const QUESTION_SHAPES: &str = r#"    {"id":"...","type":"mcq","prompt":"...","options":["...","..."]},
    {"id":"...","type":"slider","prompt":"...","scale":{"min":0,"max":10,"min_label":"...","max_label":"..."}},
    {"id":"...","type":"rating","prompt":"..."},
    {"id":"...","type":"text","prompt":"...","placeholder":"..."}"#;

pub fn part1_schema_hint() -> String {
    format!(
        "Schema A JSON:\n{{\n  \"questions\": [\n{}\n  ]\n}}\n\
         Rules: Exactly 5 questions. Mix types. Ids must be unique.",
        QUESTION_SHAPES
    )
}

pub fn part2_schema_hint(vocational: bool) -> String {
    let extra = if vocational {
        format!(
            "\"poly_extra_question\": {{\"id\":\"{}\",\"type\":\"mcq\",\"prompt\":\"...\",\"options\":[\"{}\",\"{}\"]}}",
            BRANCH_QUESTION_ID, BRANCH_OPTIONS[0], BRANCH_OPTIONS[1]
        )
    } else {
        "\"poly_extra_question\": null".to_string()
    };
    format!(
        "Schema B JSON:\n{{\n  \"inferred_fields\": [\"field1\",\"field2\",\"field3\"],\n  \
         \"questions\": [ 12 items, same question shapes as Part 1 ],\n  {}\n}}\n\
         Rules: Exactly 3 distinct fields and 12 questions. Questions must relate to the 3 fields.",
        extra
    )
}

pub fn analysis_schema_hint(kind: OptionKind, allowed: &[&str]) -> String {
    format!(
        "Schema C JSON:\n{{\n  \"strength_tags\": [\"...\" x5],\n  \"work_style_tags\": [\"...\" x3..6],\n  \
         \"feedback_lines\": [\"...\" x2..5],\n  \"suggested_options\": [\"...\",\"...\",\"...\"]\n}}\n\
         Rules: suggested_options must be 3 distinct {} chosen from: {}.",
        kind.noun(),
        serde_json::to_string(allowed).unwrap_or_default()
    )
}

pub fn gate_schema_hint(work_path: bool) -> String {
    let extra = if work_path {
        ", \"salary_outlook_line\":\"...\", \"work_style_line\":\"...\""
    } else {
        ""
    };
    format!(
        "Schema D JSON:\n{{\n  \"info_dialog_lines\": [\"...\"],\n  \
         \"dragon\": {{\"micro_quest_1_week\":\"...\",\"mini_project_1_month\":\"...\",\"resources\":[\"...\"]}}{}\n}}\n\
         Rules: info_dialog_lines must mention subjects to study, outlook in safe wording, impact on people.",
        extra
    )
}

pub fn part1_prompt(education: EducationStatus, course: Option<&str>) -> String {
    format!(
        "Generate Part 1 questions.\neducation_status: {}\npoly_course_of_study: {}\n{}",
        education.label(),
        course.unwrap_or(""),
        part1_schema_hint()
    )
}

pub fn part2_prompt(education: EducationStatus, part1_answers: &[Answer]) -> String {
    format!(
        "Infer 3 fields from Part 1 answers and generate Part 2 questions.\n\
         education_status: {}\npart1_answers_json: {}\n{}",
        education.label(),
        answers_json(part1_answers),
        part2_schema_hint(education.is_vocational())
    )
}

pub fn analysis_prompt(
    education: EducationStatus,
    branch: Option<BranchChoice>,
    inferred_fields: &[String],
    part2_answers: &[Answer],
    allowed: &[&str],
) -> String {
    let kind = OptionKind::for_profile(education, branch);
    format!(
        "Produce analysis and 3 suggested options.\neducation_status: {}\npoly_path_choice: {}\n\
         inferred_fields: {}\npart2_answers_json: {}\n{}",
        education.label(),
        branch.map(|b| b.label()).unwrap_or(""),
        serde_json::to_string(inferred_fields).unwrap_or_default(),
        answers_json(part2_answers),
        analysis_schema_hint(kind, allowed)
    )
}

pub fn gate_prompt(option_name: &str, work_path: bool) -> String {
    format!(
        "Generate gate scene content.\noption_name: {}\nwork_path: {}\n{}",
        option_name,
        work_path,
        gate_schema_hint(work_path)
    )
}

fn answers_json(answers: &[Answer]) -> String {
    serde_json::to_string(answers).unwrap_or_else(|_| "[]".to_string())
}
