/// Pipeline integration tests: every stage, every learner track.

use async_trait::async_trait;
use career_quest::core::adapter::to_renderable;
use career_quest::core::client::{GenerationClient, GenerationError};
use career_quest::core::pipeline::ContentPipeline;
use career_quest::core::validator::{SchemaErrorKind, SchemaValidator, Stage};
use career_quest::schema::answer::{Answer, AnswerValue};
use career_quest::schema::profile::{is_work_path, BranchChoice, EducationStatus, OptionKind};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BRANCHES: [Option<BranchChoice>; 3] =
    [None, Some(BranchChoice::Work), Some(BranchChoice::FurtherStudy)];

fn offline() -> ContentPipeline {
    ContentPipeline::builder().build().unwrap()
}

fn sample_answers(questions: &[career_quest::schema::question::QuestionSpec]) -> Vec<Answer> {
    questions
        .iter()
        .map(|q| {
            let mut ui = to_renderable(q);
            ui.set_text("I like building robots and helping people");
            ui.to_answer()
        })
        .collect()
}

#[test]
fn fallback_content_is_valid_for_every_track() {
    let pipeline = offline();
    let synth = pipeline.fallback();
    let validator = SchemaValidator::new(pipeline.catalog());

    for education in EducationStatus::ALL {
        let course = education.is_vocational().then_some("Engineering");
        let part1 = synth.part1(education, course);
        validator
            .validate(&Stage::Part1, &serde_json::to_value(&part1).unwrap())
            .unwrap();

        let answers = sample_answers(&part1.questions);
        let part2 = synth.part2(education, &answers);
        let vocational = education.is_vocational();
        validator
            .validate(&Stage::Part2 { vocational }, &serde_json::to_value(&part2).unwrap())
            .unwrap();
        assert_eq!(part2.poly_extra_question.is_some(), vocational);

        let part2_answers = sample_answers(&part2.questions);
        for branch in BRANCHES {
            let kind = OptionKind::for_profile(education, branch);
            let analysis = synth.analysis(education, branch, &part2.inferred_fields, &part2_answers);
            validator
                .validate(&Stage::Analysis { kind }, &serde_json::to_value(&analysis).unwrap())
                .unwrap_or_else(|e| panic!("{} / {:?}: {}", education, branch, e));

            let work_path = is_work_path(education, branch);
            for option in &analysis.suggested_options {
                let gate = synth.gate(option, work_path);
                validator
                    .validate(&Stage::Gate { work_path }, &serde_json::to_value(&gate).unwrap())
                    .unwrap_or_else(|e| panic!("gate {}: {}", option, e));
                assert!(gate.dragon.resources.len() <= 5);
            }
        }
    }
}

#[test]
fn every_stage_rejects_wrong_arity() {
    let pipeline = offline();
    let synth = pipeline.fallback();
    let validator = SchemaValidator::new(pipeline.catalog());

    let mut part1 = serde_json::to_value(synth.part1(EducationStatus::Jc, None)).unwrap();
    part1["questions"].as_array_mut().unwrap().pop();
    let err = validator.validate(&Stage::Part1, &part1).unwrap_err();
    assert_eq!(err.path, "questions");
    assert!(matches!(err.kind, SchemaErrorKind::WrongArity { found: 4, .. }));

    let mut part2 = serde_json::to_value(synth.part2(EducationStatus::Jc, &[])).unwrap();
    part2["inferred_fields"].as_array_mut().unwrap().push(json!("Arts"));
    let err = validator
        .validate(&Stage::Part2 { vocational: false }, &part2)
        .unwrap_err();
    assert_eq!(err.path, "inferred_fields");
    assert!(matches!(err.kind, SchemaErrorKind::WrongArity { found: 4, .. }));

    let fields = vec!["Technology".to_string()];
    let mut analysis =
        serde_json::to_value(synth.analysis(EducationStatus::Jc, None, &fields, &[])).unwrap();
    analysis["suggested_options"].as_array_mut().unwrap().truncate(2);
    let err = validator
        .validate(&Stage::Analysis { kind: OptionKind::UniCourses }, &analysis)
        .unwrap_err();
    assert_eq!(err.path, "suggested_options");
    assert!(matches!(err.kind, SchemaErrorKind::WrongArity { found: 2, .. }));

    let mut gate = serde_json::to_value(synth.gate("Nursing", false)).unwrap();
    gate["info_dialog_lines"] = json!([]);
    let err = validator
        .validate(&Stage::Gate { work_path: false }, &gate)
        .unwrap_err();
    assert_eq!(err.path, "info_dialog_lines");
}

#[test]
fn work_path_predicate_agrees_everywhere() {
    let pipeline = offline();
    for education in EducationStatus::ALL {
        for branch in BRANCHES {
            let work_path = is_work_path(education, branch);
            assert_eq!(
                OptionKind::for_profile(education, branch).is_careers(),
                work_path,
                "{} / {:?}",
                education,
                branch
            );
            let gate = pipeline.fallback().gate("Software Developer", work_path);
            assert_eq!(gate.salary_outlook_line.is_some(), work_path);
            assert_eq!(gate.work_style_line.is_some(), work_path);
        }
    }
    assert!(is_work_path(EducationStatus::Poly, Some(BranchChoice::Work)));
    assert!(!is_work_path(EducationStatus::Jc, Some(BranchChoice::Work)));
}

#[tokio::test]
async fn disabled_pipeline_runs_every_stage() {
    let pipeline = offline();
    assert!(!pipeline.service_enabled());

    let part1 = pipeline.part1(EducationStatus::Poly, Some("IT")).await.unwrap();
    let answers = sample_answers(&part1.questions);
    let part2 = pipeline.part2(EducationStatus::Poly, &answers).await.unwrap();
    assert_eq!(part2.questions.len(), 12);
    assert_eq!(part2.presented().count(), 13);

    let analysis = pipeline
        .analysis(
            EducationStatus::Poly,
            Some(BranchChoice::Work),
            &part2.inferred_fields,
            &sample_answers(&part2.questions),
        )
        .await
        .unwrap();
    for name in &analysis.suggested_options {
        assert!(pipeline.catalog().contains(OptionKind::Careers, name), "{}", name);
    }

    let gate = pipeline.gate(&analysis.suggested_options[0], true).await.unwrap();
    assert!(gate.salary_outlook_line.is_some());
}

#[tokio::test]
async fn fallback_is_deterministic_for_equal_inputs() {
    let a = offline();
    let b = offline();
    let q = career_quest::schema::question::QuestionSpec::text("p1_subject", "Favourite?", None);
    let answers = vec![Answer::new(&q, AnswerValue::Text("biology".to_string()))];
    assert_eq!(
        a.part2(EducationStatus::Jc, &answers).await.unwrap(),
        b.part2(EducationStatus::Jc, &answers).await.unwrap()
    );
    assert_eq!(
        a.gate("Law", false).await.unwrap(),
        b.gate("Law", false).await.unwrap()
    );
}

/// Always answers with the same document and counts calls.
struct Fixed {
    reply: Value,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationClient for Fixed {
    fn enabled(&self) -> bool {
        true
    }

    async fn invoke(&self, _system: &str, _user: &str) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

#[tokio::test]
async fn malformed_service_output_never_reaches_caller() {
    let client = Arc::new(Fixed {
        reply: json!(["not", "an", "object"]),
        calls: AtomicUsize::new(0),
    });
    let pipeline = ContentPipeline::builder()
        .with_client(client.clone())
        .build()
        .unwrap();
    assert!(pipeline.service_enabled());

    let part1 = pipeline.part1(EducationStatus::Jc, None).await.unwrap();
    assert_eq!(part1, pipeline.fallback().part1(EducationStatus::Jc, None));

    let part2 = pipeline.part2(EducationStatus::Poly, &[]).await.unwrap();
    assert!(part2.poly_extra_question.is_some());

    let gate = pipeline.gate("Nursing", true).await.unwrap();
    assert!(gate.work_style_line.is_some());

    // one attempt per stage, no retries
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}
