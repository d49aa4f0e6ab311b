//! The four-stage flow as an explicit state machine.
//!
//! ```text
//! ProfileIntake → Stage1 → Stage2 → Analysis ⇄ Gate(option) → Complete
//!        └──────────────── any ────────────────→ Abandoned
//! ```
//!
//! One `FlowController` owns one `FlowSession`. Every pipeline call for a
//! transition is awaited before the transition completes, and races the
//! session's cancellation token: once the session is abandoned an
//! outstanding result is dropped and every later call fails with
//! [`FlowError::Abandoned`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::adapter::{to_renderables, UiQuestion};
use crate::core::pipeline::ContentPipeline;
use crate::core::validator::SchemaError;
use crate::schema::answer::Answer;
use crate::schema::payload::{AnalysisPayload, GatePayload, Part1Payload, Part2Payload};
use crate::schema::profile::{BranchChoice, Profile};
use crate::schema::question::{QuestionSpec, QuestionType};

/// Most resources carried into an accepted gate outcome.
pub const MAX_OUTCOME_RESOURCES: usize = 5;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("cannot {action} while in {from}")]
    InvalidTransition { from: String, action: &'static str },
    #[error("stage needs {expected} answers, has {got}")]
    IncompleteAnswers { expected: usize, got: usize },
    #[error("expected an answer to '{expected}', got '{got}'")]
    UnexpectedAnswer { expected: String, got: String },
    #[error("answer to '{id}' must be a {expected} answer")]
    AnswerTypeMismatch { id: String, expected: QuestionType },
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("'{0}' is not one of the suggested options")]
    UnknownOption(String),
    #[error("gate '{0}' has already been resolved")]
    GateAlreadyResolved(String),
    #[error("no gate is active")]
    NoActiveGate,
    #[error("gate '{0}' is still active")]
    GateActive(String),
    #[error("session was abandoned")]
    Abandoned,
    #[error("content error: {0}")]
    Content(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "option")]
pub enum FlowState {
    ProfileIntake,
    Stage1,
    Stage2,
    /// Gate hub: the three suggested options are reachable in any order.
    Analysis,
    /// One gate is active until the learner accepts or declines.
    Gate(String),
    Complete,
    Abandoned,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfileIntake => f.write_str("profile intake"),
            Self::Stage1 => f.write_str("stage 1"),
            Self::Stage2 => f.write_str("stage 2"),
            Self::Analysis => f.write_str("analysis"),
            Self::Gate(option) => write!(f, "gate '{}'", option),
            Self::Complete => f.write_str("complete"),
            Self::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// The learner's decision in a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accept,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateOutcome {
    Accepted {
        micro_quest_1_week: String,
        mini_project_1_month: String,
        resources: Vec<String>,
    },
    Declined,
}

/// One visited gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRecord {
    pub option: String,
    pub payload: GatePayload,
    pub outcome: Option<GateOutcome>,
}

/// Everything one play-through has produced so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSession {
    pub profile: Option<Profile>,
    pub part1: Option<Part1Payload>,
    pub part1_answers: Vec<Answer>,
    pub part2: Option<Part2Payload>,
    pub part2_answers: Vec<Answer>,
    pub analysis: Option<AnalysisPayload>,
    /// Gates in the order they were entered.
    pub gates: Vec<GateRecord>,
}

impl FlowSession {
    pub fn work_path(&self) -> bool {
        self.profile.as_ref().is_some_and(Profile::work_path)
    }

    fn gate(&self, option: &str) -> Option<&GateRecord> {
        self.gates.iter().find(|g| g.option == option)
    }
}

/// Serializable copy of a session, handed to a persistence sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// RFC 3339 local time the snapshot was taken.
    pub taken_at: String,
    pub state: FlowState,
    #[serde(flatten)]
    pub session: FlowSession,
}

pub struct FlowController {
    pipeline: ContentPipeline,
    state: FlowState,
    session: FlowSession,
    cancel: CancellationToken,
}

impl FlowController {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self {
            pipeline,
            state: FlowState::ProfileIntake,
            session: FlowSession::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn session(&self) -> &FlowSession {
        &self.session
    }

    pub fn is_complete(&self) -> bool {
        self.state == FlowState::Complete
    }

    /// ProfileIntake → Stage1. Generates the five intake questions.
    pub async fn confirm_profile(&mut self, profile: Profile) -> Result<&Part1Payload, FlowError> {
        self.expect_state(FlowState::ProfileIntake, "confirm a profile")?;
        let profile = checked_profile(profile)?;

        let pipeline = self.pipeline.clone();
        let course = profile.vocational_course.clone();
        let payload = self
            .guarded(pipeline.part1(profile.education, course.as_deref()))
            .await?;

        self.session.profile = Some(profile);
        self.transition(FlowState::Stage1);
        Ok(&*self.session.part1.insert(payload))
    }

    /// Next question the flow expects an answer to.
    pub fn pending_question(&self) -> Option<&QuestionSpec> {
        let (questions, answers) = self.stage_questions()?;
        questions.into_iter().nth(answers.len())
    }

    /// Render-ready records for the current stage, in presentation order.
    pub fn ui_questions(&self) -> Vec<UiQuestion> {
        self.stage_questions()
            .map(|(questions, _)| to_renderables(questions))
            .unwrap_or_default()
    }

    /// Record the answer to the pending question.
    pub fn answer(&mut self, answer: Answer) -> Result<(), FlowError> {
        self.check_live()?;
        if !matches!(self.state, FlowState::Stage1 | FlowState::Stage2) {
            return Err(self.invalid("answer a question"));
        }

        let expected = self.pending_question().ok_or_else(|| FlowError::UnexpectedAnswer {
            expected: "<none>".to_string(),
            got: answer.id.clone(),
        })?;
        if answer.id != expected.id {
            return Err(FlowError::UnexpectedAnswer {
                expected: expected.id.clone(),
                got: answer.id,
            });
        }
        let qtype = expected.question_type();
        if answer.question_type != qtype || !answer.answer.fits(qtype) {
            return Err(FlowError::AnswerTypeMismatch {
                id: answer.id,
                expected: qtype,
            });
        }

        debug!(id = %answer.id, "answer recorded");
        if self.state == FlowState::Stage1 {
            self.session.part1_answers.push(answer);
        } else {
            self.session.part2_answers.push(answer);
        }
        Ok(())
    }

    /// Stage1 → Stage2 or Stage2 → Analysis, once every question of the
    /// current stage has been answered.
    pub async fn advance(&mut self) -> Result<(), FlowError> {
        self.check_live()?;
        match self.state {
            FlowState::Stage1 => self.advance_to_stage2().await,
            FlowState::Stage2 => self.advance_to_analysis().await,
            _ => Err(self.invalid("advance")),
        }
    }

    async fn advance_to_stage2(&mut self) -> Result<(), FlowError> {
        self.require_all_answered()?;
        let profile = self.profile()?.clone();
        let answers = self.session.part1_answers.clone();

        let pipeline = self.pipeline.clone();
        let payload = self.guarded(pipeline.part2(profile.education, &answers)).await?;

        self.session.part2 = Some(payload);
        self.transition(FlowState::Stage2);
        Ok(())
    }

    async fn advance_to_analysis(&mut self) -> Result<(), FlowError> {
        self.require_all_answered()?;

        let branch = self.branch_answer();
        let mut profile = self.profile()?.clone();
        profile.branch = branch;
        let fields = self
            .session
            .part2
            .as_ref()
            .map(|p| p.inferred_fields.clone())
            .unwrap_or_default();
        let answers = self.session.part2_answers.clone();

        let pipeline = self.pipeline.clone();
        let payload = self
            .guarded(pipeline.analysis(profile.education, profile.branch, &fields, &answers))
            .await?;

        info!(
            work_path = profile.work_path(),
            options = ?payload.suggested_options,
            "analysis ready"
        );
        self.session.profile = Some(profile);
        self.session.analysis = Some(payload);
        self.transition(FlowState::Analysis);
        Ok(())
    }

    pub fn suggested_options(&self) -> Option<&[String]> {
        self.session
            .analysis
            .as_ref()
            .map(|a| a.suggested_options.as_slice())
    }

    /// Analysis → Gate(option).
    pub async fn enter_gate(&mut self, option: &str) -> Result<&GatePayload, FlowError> {
        self.check_live()?;
        match &self.state {
            FlowState::Analysis => {}
            FlowState::Gate(active) => return Err(FlowError::GateActive(active.clone())),
            _ => return Err(self.invalid("enter a gate")),
        }
        if !self
            .suggested_options()
            .is_some_and(|opts| opts.iter().any(|o| o == option))
        {
            return Err(FlowError::UnknownOption(option.to_string()));
        }
        if self.session.gate(option).is_some() {
            return Err(FlowError::GateAlreadyResolved(option.to_string()));
        }

        let work_path = self.session.work_path();
        let pipeline = self.pipeline.clone();
        let payload = self.guarded(pipeline.gate(option, work_path)).await?;

        self.session.gates.push(GateRecord {
            option: option.to_string(),
            payload,
            outcome: None,
        });
        self.transition(FlowState::Gate(option.to_string()));
        let record = self.session.gates.len() - 1;
        Ok(&self.session.gates[record].payload)
    }

    /// Gate(option) → Analysis, or → Complete once all three gates are resolved.
    pub fn resolve_gate(&mut self, decision: GateDecision) -> Result<&GateOutcome, FlowError> {
        self.check_live()?;
        let FlowState::Gate(option) = &self.state else {
            return Err(FlowError::NoActiveGate);
        };
        let option = option.clone();
        let index = self
            .session
            .gates
            .iter()
            .position(|g| g.option == option)
            .ok_or(FlowError::NoActiveGate)?;

        let outcome = match decision {
            GateDecision::Accept => {
                let dragon = &self.session.gates[index].payload.dragon;
                GateOutcome::Accepted {
                    micro_quest_1_week: dragon.micro_quest_1_week.clone(),
                    mini_project_1_month: dragon.mini_project_1_month.clone(),
                    resources: dragon
                        .resources
                        .iter()
                        .take(MAX_OUTCOME_RESOURCES)
                        .cloned()
                        .collect(),
                }
            }
            GateDecision::Decline => GateOutcome::Declined,
        };
        info!(%option, ?decision, "gate resolved");
        self.session.gates[index].outcome = Some(outcome);

        let all_resolved = self.suggested_options().is_some_and(|opts| {
            opts.iter()
                .all(|o| self.session.gate(o).is_some_and(|g| g.outcome.is_some()))
        });
        self.transition(if all_resolved {
            FlowState::Complete
        } else {
            FlowState::Analysis
        });

        self.session.gates[index]
            .outcome
            .as_ref()
            .ok_or(FlowError::NoActiveGate)
    }

    /// Abandon the session. Any pipeline call in flight is discarded.
    pub fn abandon(&mut self) {
        self.cancel.cancel();
        self.transition(FlowState::Abandoned);
    }

    /// Token that abandons this session when cancelled, usable from
    /// another task while a transition is awaiting content.
    pub fn abandon_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            taken_at: chrono::Local::now().to_rfc3339(),
            state: self.state.clone(),
            session: self.session.clone(),
        }
    }

    async fn guarded<T>(
        &mut self,
        content: impl Future<Output = Result<T, SchemaError>>,
    ) -> Result<T, FlowError> {
        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FlowError::Abandoned),
            result = content => result.map_err(FlowError::from),
        };
        if matches!(outcome, Err(FlowError::Abandoned)) {
            debug!("content discarded, session abandoned");
            self.transition(FlowState::Abandoned);
        }
        outcome
    }

    fn check_live(&mut self) -> Result<(), FlowError> {
        if self.cancel.is_cancelled() && self.state != FlowState::Abandoned {
            self.transition(FlowState::Abandoned);
        }
        if self.state == FlowState::Abandoned {
            return Err(FlowError::Abandoned);
        }
        Ok(())
    }

    fn expect_state(&mut self, expected: FlowState, action: &'static str) -> Result<(), FlowError> {
        self.check_live()?;
        if self.state != expected {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            from: self.state.to_string(),
            action,
        }
    }

    fn transition(&mut self, to: FlowState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "flow transition");
            self.state = to;
        }
    }

    fn profile(&self) -> Result<&Profile, FlowError> {
        self.session
            .profile
            .as_ref()
            .ok_or_else(|| self.invalid("continue without a profile"))
    }

    fn stage_questions(&self) -> Option<(Vec<&QuestionSpec>, &Vec<Answer>)> {
        match self.state {
            FlowState::Stage1 => {
                let p = self.session.part1.as_ref()?;
                Some((p.questions.iter().collect(), &self.session.part1_answers))
            }
            FlowState::Stage2 => {
                let p = self.session.part2.as_ref()?;
                Some((p.presented().collect(), &self.session.part2_answers))
            }
            _ => None,
        }
    }

    fn require_all_answered(&self) -> Result<(), FlowError> {
        let (questions, answers) = self
            .stage_questions()
            .ok_or_else(|| self.invalid("advance"))?;
        if answers.len() < questions.len() {
            return Err(FlowError::IncompleteAnswers {
                expected: questions.len(),
                got: answers.len(),
            });
        }
        Ok(())
    }

    /// Branch choice from the answer to the extra Stage 2 question, if asked.
    fn branch_answer(&self) -> Option<BranchChoice> {
        let extra = self.session.part2.as_ref()?.poly_extra_question.as_ref()?;
        self.session
            .part2_answers
            .iter()
            .find(|a| a.id == extra.id)
            .and_then(|a| a.answer.as_text())
            .and_then(BranchChoice::from_answer)
    }
}

/// Enforce intake rules: a visible name, and a course for the vocational track.
fn checked_profile(mut profile: Profile) -> Result<Profile, FlowError> {
    profile.name = profile.name.trim().to_string();
    if profile.name.is_empty() {
        return Err(FlowError::InvalidProfile("name must not be blank".to_string()));
    }
    let course = profile
        .vocational_course
        .take()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if profile.education.is_vocational() {
        match course {
            Some(c) => profile.vocational_course = Some(c),
            None => {
                return Err(FlowError::InvalidProfile(format!(
                    "{} learners must give their current course",
                    profile.education
                )))
            }
        }
    }
    profile.branch = None;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapter::to_renderable;
    use crate::schema::answer::AnswerValue;
    use crate::schema::profile::EducationStatus;

    fn offline() -> FlowController {
        FlowController::new(ContentPipeline::builder().build().unwrap())
    }

    fn default_answer(q: &QuestionSpec) -> Answer {
        to_renderable(q).to_answer()
    }

    fn answer_all(flow: &mut FlowController) {
        while let Some(q) = flow.pending_question().cloned() {
            flow.answer(default_answer(&q)).unwrap();
        }
    }

    #[test]
    fn profile_rules() {
        assert!(checked_profile(Profile::new("  ", EducationStatus::Jc)).is_err());
        assert!(checked_profile(Profile::new("Ana", EducationStatus::Poly)).is_err());
        assert!(checked_profile(Profile::new("Ana", EducationStatus::Poly).with_course(" ")).is_err());
        let p = checked_profile(Profile::new(" Ana ", EducationStatus::Jc).with_course("IT")).unwrap();
        assert_eq!(p.name, "Ana");
        assert_eq!(p.vocational_course, None);
    }

    #[tokio::test]
    async fn answers_must_follow_presentation_order() {
        let mut flow = offline();
        flow.confirm_profile(Profile::new("Ana", EducationStatus::Jc)).await.unwrap();
        let questions = flow.session().part1.clone().unwrap().questions;

        let err = flow.answer(default_answer(&questions[1])).unwrap_err();
        assert!(matches!(err, FlowError::UnexpectedAnswer { .. }));

        let mut wrong = default_answer(&questions[0]);
        wrong.answer = AnswerValue::Number(1);
        let err = flow.answer(wrong).unwrap_err();
        assert!(matches!(err, FlowError::AnswerTypeMismatch { .. }));

        flow.answer(default_answer(&questions[0])).unwrap();
        assert_eq!(flow.pending_question().unwrap().id, questions[1].id);
    }

    #[tokio::test]
    async fn advance_requires_every_answer() {
        let mut flow = offline();
        flow.confirm_profile(Profile::new("Ana", EducationStatus::Jc)).await.unwrap();
        let err = flow.advance().await.unwrap_err();
        assert!(matches!(err, FlowError::IncompleteAnswers { expected: 5, got: 0 }));
        assert_eq!(flow.state(), &FlowState::Stage1);
    }

    #[tokio::test]
    async fn out_of_order_calls_fail() {
        let mut flow = offline();
        assert!(matches!(flow.advance().await, Err(FlowError::InvalidTransition { .. })));
        assert!(matches!(flow.enter_gate("Law").await, Err(FlowError::InvalidTransition { .. })));
        assert!(matches!(flow.resolve_gate(GateDecision::Accept), Err(FlowError::NoActiveGate)));

        flow.confirm_profile(Profile::new("Ana", EducationStatus::Jc)).await.unwrap();
        let again = flow.confirm_profile(Profile::new("Ana", EducationStatus::Jc)).await;
        assert!(matches!(again, Err(FlowError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn branch_answer_sets_work_path() {
        let mut flow = offline();
        flow.confirm_profile(Profile::new("Ana", EducationStatus::Poly).with_course("IT"))
            .await
            .unwrap();
        answer_all(&mut flow);
        flow.advance().await.unwrap();
        // default mcq selection is the first option, "Work"
        answer_all(&mut flow);
        flow.advance().await.unwrap();
        assert!(flow.session().work_path());
        assert_eq!(
            flow.session().profile.as_ref().unwrap().branch,
            Some(BranchChoice::Work)
        );
    }

    #[tokio::test]
    async fn gate_hub_rules() {
        let mut flow = offline();
        flow.confirm_profile(Profile::new("Ana", EducationStatus::Jc)).await.unwrap();
        answer_all(&mut flow);
        flow.advance().await.unwrap();
        answer_all(&mut flow);
        flow.advance().await.unwrap();

        let options = flow.suggested_options().unwrap().to_vec();
        assert!(matches!(
            flow.enter_gate("Astronaut").await,
            Err(FlowError::UnknownOption(_))
        ));

        let gate = flow.enter_gate(&options[1]).await.unwrap();
        assert!(gate.salary_outlook_line.is_none());
        assert!(matches!(flow.enter_gate(&options[0]).await, Err(FlowError::GateActive(_))));

        flow.resolve_gate(GateDecision::Decline).unwrap();
        assert_eq!(flow.state(), &FlowState::Analysis);
        assert!(matches!(
            flow.enter_gate(&options[1]).await,
            Err(FlowError::GateAlreadyResolved(_))
        ));

        let outcome = {
            flow.enter_gate(&options[0]).await.unwrap();
            flow.resolve_gate(GateDecision::Accept).unwrap().clone()
        };
        assert!(matches!(outcome, GateOutcome::Accepted { ref resources, .. } if !resources.is_empty()));
        assert!(!flow.is_complete());

        flow.enter_gate(&options[2]).await.unwrap();
        flow.resolve_gate(GateDecision::Accept).unwrap();
        assert!(flow.is_complete());
    }

    #[tokio::test]
    async fn abandon_blocks_everything() {
        let mut flow = offline();
        flow.confirm_profile(Profile::new("Ana", EducationStatus::Jc)).await.unwrap();
        flow.abandon();
        assert_eq!(flow.state(), &FlowState::Abandoned);
        assert!(matches!(flow.advance().await, Err(FlowError::Abandoned)));
        let q = flow.session().part1.as_ref().unwrap().questions[0].clone();
        assert!(matches!(flow.answer(default_answer(&q)), Err(FlowError::Abandoned)));
    }

    #[tokio::test]
    async fn cancelled_handle_abandons() {
        let mut flow = offline();
        flow.abandon_handle().cancel();
        let err = flow
            .confirm_profile(Profile::new("Ana", EducationStatus::Jc))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Abandoned));
        assert_eq!(flow.state(), &FlowState::Abandoned);
    }

    #[test]
    fn snapshot_serializes_state() {
        let flow = offline();
        let json = serde_json::to_value(flow.snapshot()).unwrap();
        assert_eq!(json["state"]["state"], "ProfileIntake");
        assert!(json["gates"].as_array().unwrap().is_empty());
    }
}
