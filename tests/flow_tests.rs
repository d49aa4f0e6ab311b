/// Flow integration tests: full play-throughs, abandonment and persistence.

use async_trait::async_trait;
use career_quest::core::adapter::{to_renderable, UiQuestion};
use career_quest::core::client::{GenerationClient, GenerationError};
use career_quest::core::flow::{FlowController, FlowError, FlowState, GateDecision, GateOutcome};
use career_quest::core::persistence::{JsonFileSink, SnapshotSink};
use career_quest::core::pipeline::ContentPipeline;
use career_quest::schema::profile::{BranchChoice, EducationStatus, OptionKind, Profile};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn offline_flow() -> FlowController {
    FlowController::new(ContentPipeline::builder().build().unwrap())
}

/// First mcq option, slider midpoint, rating 3, fixed text.
fn answer_stage(flow: &mut FlowController) {
    while let Some(q) = flow.pending_question().cloned() {
        let mut ui = to_renderable(&q);
        let midpoint = match &ui {
            UiQuestion::Range { min, max, .. } => Some(min + (max - min) / 2),
            _ => None,
        };
        if let Some(v) = midpoint {
            ui.set_value(v);
        }
        ui.set_text("I enjoy fixing computers and coding small games");
        flow.answer(ui.to_answer()).unwrap();
    }
}

#[tokio::test]
async fn poly_work_learner_completes_all_gates() {
    let mut flow = offline_flow();
    let profile = Profile::new("Ana", EducationStatus::Poly).with_course("IT");

    let part1 = flow.confirm_profile(profile).await.unwrap();
    assert_eq!(part1.questions.len(), 5);
    assert_eq!(flow.state(), &FlowState::Stage1);
    assert_eq!(flow.ui_questions().len(), 5);

    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    assert_eq!(flow.state(), &FlowState::Stage2);
    // twelve questions plus the branch question
    assert_eq!(flow.ui_questions().len(), 13);

    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    assert_eq!(flow.state(), &FlowState::Analysis);
    assert_eq!(
        flow.session().profile.as_ref().unwrap().branch,
        Some(BranchChoice::Work)
    );

    let options = flow.suggested_options().unwrap().to_vec();
    assert_eq!(options.len(), 3);
    let catalog = ContentPipeline::builder().build().unwrap();
    for name in &options {
        assert!(catalog.catalog().contains(OptionKind::Careers, name), "{}", name);
    }

    // gates may be visited in any order
    for (i, option) in options.iter().rev().enumerate() {
        let gate = flow.enter_gate(option).await.unwrap();
        assert!(gate.salary_outlook_line.is_some());
        assert!(gate.work_style_line.is_some());
        let decision = if i == 1 {
            GateDecision::Decline
        } else {
            GateDecision::Accept
        };
        let outcome = flow.resolve_gate(decision).unwrap().clone();
        match decision {
            GateDecision::Accept => assert!(matches!(
                outcome,
                GateOutcome::Accepted { ref resources, .. } if (1..=5).contains(&resources.len())
            )),
            GateDecision::Decline => assert_eq!(outcome, GateOutcome::Declined),
        }
    }

    assert!(flow.is_complete());
    assert_eq!(flow.session().gates.len(), 3);
    assert!(matches!(
        flow.enter_gate(&options[0]).await,
        Err(FlowError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn jc_learner_gets_uni_courses_without_branch_question() {
    let mut flow = offline_flow();
    flow.confirm_profile(Profile::new("Ben", EducationStatus::Jc))
        .await
        .unwrap();
    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    assert!(flow.session().part2.as_ref().unwrap().poly_extra_question.is_none());
    assert_eq!(flow.ui_questions().len(), 12);

    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    assert!(!flow.session().work_path());

    let option = flow.suggested_options().unwrap()[0].clone();
    let gate = flow.enter_gate(&option).await.unwrap();
    assert!(gate.salary_outlook_line.is_none());
}

#[tokio::test]
async fn stage2_not_reached_with_partial_answers() {
    let mut flow = offline_flow();
    flow.confirm_profile(Profile::new("Cai", EducationStatus::SecondarySchool))
        .await
        .unwrap();

    for _ in 0..4 {
        let q = flow.pending_question().cloned().unwrap();
        flow.answer(to_renderable(&q).to_answer()).unwrap();
    }
    let err = flow.advance().await.unwrap_err();
    assert!(matches!(err, FlowError::IncompleteAnswers { expected: 5, got: 4 }));
    assert_eq!(flow.state(), &FlowState::Stage1);
    assert!(flow.session().part2.is_none());
}

#[tokio::test]
async fn unknown_gate_option_is_rejected() {
    let mut flow = offline_flow();
    flow.confirm_profile(Profile::new("Dee", EducationStatus::Jc))
        .await
        .unwrap();
    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    answer_stage(&mut flow);
    flow.advance().await.unwrap();

    let err = flow.enter_gate("Dragon Tamer").await.unwrap_err();
    assert!(matches!(err, FlowError::UnknownOption(ref name) if name == "Dragon Tamer"));
    assert_eq!(flow.state(), &FlowState::Analysis);
}

/// A service that never answers in time.
struct Stalled;

#[async_trait]
impl GenerationClient for Stalled {
    fn enabled(&self) -> bool {
        true
    }

    async fn invoke(&self, _system: &str, _user: &str) -> Result<Value, GenerationError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(GenerationError::Timeout { timeout_ms: 60_000 })
    }
}

#[tokio::test]
async fn abandoning_discards_content_in_flight() {
    let pipeline = ContentPipeline::builder()
        .with_client(Arc::new(Stalled))
        .build()
        .unwrap();
    let mut flow = FlowController::new(pipeline);
    let handle = flow.abandon_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    });

    let err = flow
        .confirm_profile(Profile::new("Eve", EducationStatus::Jc))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Abandoned));
    assert_eq!(flow.state(), &FlowState::Abandoned);
    assert!(flow.session().part1.is_none());
    assert!(flow.session().profile.is_none());
}

#[tokio::test]
async fn snapshot_survives_a_round_trip_on_disk() {
    let mut flow = offline_flow();
    flow.confirm_profile(Profile::new("Fay", EducationStatus::Poly).with_course("Design"))
        .await
        .unwrap();
    answer_stage(&mut flow);
    flow.advance().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let sink = JsonFileSink::new(dir.path());
    let snapshot = flow.snapshot();
    let path = sink.write(&snapshot).unwrap();
    sink.save(&snapshot).unwrap();

    let loaded = JsonFileSink::load(&path).unwrap();
    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.state, FlowState::Stage2);
    assert_eq!(loaded.session.part1_answers.len(), 5);
    assert_eq!(
        loaded.session.profile.unwrap().vocational_course.as_deref(),
        Some("Design")
    );
}

/// Answers each stage prompt with a fixed, schema-valid document.
struct StageService {
    calls: AtomicUsize,
}

fn service_question(id: String, n: usize) -> Value {
    match n % 4 {
        0 => json!({"id": id, "type": "mcq", "prompt": "Pick one", "options": ["Build", "Fix"]}),
        1 => json!({"id": id, "type": "slider", "prompt": "How much?",
                    "scale": {"min": 1, "max": 9, "min_label": "Little", "max_label": "Lots"}}),
        2 => json!({"id": id, "type": "rating", "prompt": "Rate it"}),
        _ => json!({"id": id, "type": "text", "prompt": "Tell us more", "placeholder": "..."}),
    }
}

#[async_trait]
impl GenerationClient for StageService {
    fn enabled(&self) -> bool {
        true
    }

    async fn invoke(&self, _system: &str, user: &str) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if user.contains("Schema A") {
            let questions: Vec<Value> = (0..5).map(|n| service_question(format!("svc1_{}", n), n)).collect();
            Ok(json!({"questions": questions}))
        } else if user.contains("Schema B") {
            let questions: Vec<Value> = (0..12).map(|n| service_question(format!("svc2_{}", n), n)).collect();
            Ok(json!({
                "inferred_fields": ["Design", "Media", "Technology"],
                "questions": questions,
                "poly_extra_question": {"id": "svc_path", "type": "mcq", "prompt": "After poly?",
                                        "options": ["Work", "Go to uni"]}
            }))
        } else if user.contains("Schema C") {
            Ok(json!({
                "strength_tags": ["Creative", "Curious", "Patient", "Visual", "Organised"],
                "work_style_tags": ["Hands-on", "Independent", "Steady"],
                "feedback_lines": ["You like making things.", "You learn by doing."],
                "suggested_options": ["Graphic Designer", "Digital Marketing Executive", "Software Developer"]
            }))
        } else if user.contains("Schema D") {
            Ok(json!({
                "info_dialog_lines": ["Study design basics.", "Demand is steady.", "You help people see ideas."],
                "dragon": {"micro_quest_1_week": "Make one poster.",
                           "mini_project_1_month": "Build a small portfolio.",
                           "resources": ["Library", "Online course"]},
                "salary_outlook_line": "Pay grows with experience.",
                "work_style_line": "Mostly studio work."
            }))
        } else {
            Err(GenerationError::Transport("unexpected prompt".to_string()))
        }
    }
}

#[tokio::test]
async fn service_content_drives_every_stage() {
    let service = Arc::new(StageService {
        calls: AtomicUsize::new(0),
    });
    let pipeline = ContentPipeline::builder()
        .with_client(service.clone())
        .build()
        .unwrap();
    let mut flow = FlowController::new(pipeline);

    let part1 = flow
        .confirm_profile(Profile::new("Gus", EducationStatus::Poly).with_course("Media"))
        .await
        .unwrap();
    assert_eq!(part1.questions[0].id, "svc1_0");

    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    let part2 = flow.session().part2.clone().unwrap();
    assert_eq!(part2.inferred_fields, vec!["Design", "Media", "Technology"]);
    assert_eq!(part2.poly_extra_question.as_ref().unwrap().id, "svc_path");

    answer_stage(&mut flow);
    flow.advance().await.unwrap();
    assert!(flow.session().work_path());
    let options = flow.suggested_options().unwrap().to_vec();
    assert_eq!(
        options,
        vec!["Graphic Designer", "Digital Marketing Executive", "Software Developer"]
    );

    for option in &options {
        let gate = flow.enter_gate(option).await.unwrap();
        assert_eq!(gate.salary_outlook_line.as_deref(), Some("Pay grows with experience."));
        let outcome = flow.resolve_gate(GateDecision::Accept).unwrap().clone();
        assert!(matches!(
            outcome,
            GateOutcome::Accepted { ref micro_quest_1_week, .. } if micro_quest_1_week == "Make one poster."
        ));
    }

    assert!(flow.is_complete());
    assert_eq!(service.calls.load(Ordering::SeqCst), 6);
}
