//! Career Quest: validated, fallback-backed content for a career-guidance game.
//!
//! Content for the four stages (intake questions, follow-up questions,
//! strengths analysis, career gates) comes from an external generation
//! service when one is configured. Every reply is checked against a strict
//! per-stage schema and replaced by deterministic local content when the
//! service is off, fails, or returns anything malformed. A flow controller
//! sequences the stages and collects the learner's answers.
//!
//! ```no_run
//! use career_quest::core::flow::FlowController;
//! use career_quest::core::pipeline::ContentPipeline;
//! use career_quest::schema::profile::{EducationStatus, Profile};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ContentPipeline::builder().build()?;
//! let mut flow = FlowController::new(pipeline);
//! let part1 = flow
//!     .confirm_profile(Profile::new("Ana", EducationStatus::Poly).with_course("IT"))
//!     .await?;
//! assert_eq!(part1.questions.len(), 5);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod schema;
