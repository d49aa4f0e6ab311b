//! Locally synthesized stage content.
//!
//! The synthesizer is the availability guarantee of the pipeline: every
//! payload it returns has the shape its stage requires, whatever the
//! inputs. Structure (counts, ids, which optional fields exist) is fixed
//! by the inputs alone. Wording is picked from the phrase book with an RNG
//! seeded from a hash of the inputs, so identical inputs produce identical
//! payloads.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::{FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::catalog::{Catalog, FieldOverlapRanking, RankingStrategy};
use crate::core::phrases::{PhraseBook, Slots};
use crate::schema::answer::Answer;
use crate::schema::payload::{
    AnalysisPayload, DragonQuest, GatePayload, Part1Payload, Part2Payload, INFERRED_FIELD_COUNT,
    STRENGTH_TAG_COUNT, SUGGESTED_OPTION_COUNT,
};
use crate::schema::profile::{BranchChoice, EducationStatus, OptionKind};
use crate::schema::question::{QuestionSpec, QuestionType};

/// Id of the branch question asked of vocational-track learners.
pub const BRANCH_QUESTION_ID: &str = "poly_path";
/// Options of the branch question, in presentation order.
pub const BRANCH_OPTIONS: [&str; 2] = ["Work", "Go to uni"];

const ACTIVITY_OPTIONS: [&str; 5] = [
    "Building or fixing things",
    "Helping people",
    "Creating art or media",
    "Working with numbers and data",
    "Organising and leading",
];

const ENVIRONMENT_OPTIONS: [&str; 5] = [
    "Office",
    "Outdoors",
    "Lab or workshop",
    "Studio",
    "Hospital or clinic",
];

const INTEREST_OPTIONS: [&str; 4] = ["Very interested", "Curious to try", "Not sure yet", "Not for me"];

/// Extra keywords per field, matched against answer words. The field name
/// itself always counts as a keyword.
const FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    ("Technology", &["it", "tech", "comput", "coding", "code", "program", "software", "app", "game", "digital", "robot", "data"]),
    ("Engineering", &["engineer", "build", "fixing", "fix", "machine", "mechanic", "electr", "workshop", "robot"]),
    ("Healthcare", &["health", "nurs", "medic", "doctor", "hospital", "clinic", "care", "helping", "patient"]),
    ("Business", &["business", "office", "organis", "organiz", "leading", "lead", "manag", "market", "sell"]),
    ("Design", &["design", "art", "draw", "creat", "studio", "fashion", "graphic"]),
    ("Media", &["media", "film", "video", "photo", "writ", "music", "social", "studio"]),
    ("Science", &["science", "lab", "chemistry", "physics", "biology", "experiment", "research", "math", "maths"]),
    ("Education", &["teach", "tutor", "children", "coach", "helping"]),
    ("Hospitality", &["hospitality", "food", "cook", "hotel", "travel", "tourism", "event", "service"]),
    ("Environment", &["environment", "outdoors", "nature", "plant", "animal", "climate", "green", "sustain"]),
    ("Finance", &["finance", "money", "numbers", "account", "bank", "invest", "econom"]),
    ("Law", &["law", "legal", "justice", "debate", "rights", "police"]),
];

const FIELD_STRENGTHS: &[(&str, &str)] = &[
    ("Technology", "Logical thinking"),
    ("Engineering", "Hands-on problem solving"),
    ("Healthcare", "Empathy"),
    ("Business", "Leadership"),
    ("Design", "Creativity"),
    ("Media", "Storytelling"),
    ("Science", "Curiosity"),
    ("Education", "Patience"),
    ("Hospitality", "Service mindset"),
    ("Environment", "Care for the planet"),
    ("Finance", "Attention to detail"),
    ("Law", "Clear reasoning"),
];

const GENERAL_STRENGTHS: [&str; 7] = [
    "Persistence",
    "Teamwork",
    "Communication",
    "Adaptability",
    "Self-motivation",
    "Organisation",
    "Reliability",
];

const WORK_STYLES: [&str; 7] = [
    "Hands-on",
    "Collaborative",
    "Independent",
    "Structured",
    "Flexible",
    "Detail-focused",
    "Big-picture",
];

const DEFAULT_RESOURCES: [&str; 3] = [
    "Your school or poly career guidance counsellor",
    "MySkillsFuture portal",
    "Free introductory courses on Coursera",
];

const MAX_GATE_RESOURCES: usize = 5;

/// Deterministic, offline content for every stage.
#[derive(Clone)]
pub struct FallbackSynthesizer {
    catalog: Arc<Catalog>,
    phrases: Arc<PhraseBook>,
    ranking: Arc<dyn RankingStrategy>,
}

impl FallbackSynthesizer {
    pub fn new(catalog: Arc<Catalog>, phrases: Arc<PhraseBook>) -> Self {
        Self {
            catalog,
            phrases,
            ranking: Arc::new(FieldOverlapRanking),
        }
    }

    pub fn with_ranking(mut self, ranking: Arc<dyn RankingStrategy>) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn part1(&self, education: EducationStatus, course: Option<&str>) -> Part1Payload {
        let course = course.map(str::trim).filter(|c| !c.is_empty());
        let mut rng = seeded("part1", &(education, course));

        let mut slots = Slots::default();
        slots.insert("education", education.label().to_string());
        let track = match course {
            Some(c) => {
                slots.insert("course", c.to_string());
                self.phrase("track_course", &slots, &mut rng, "in your course")
            }
            None => self.phrase("track_school", &slots, &mut rng, "at school"),
        };
        slots.insert("track", track);

        let questions = vec![
            QuestionSpec::mcq(
                "p1_activity",
                self.phrase("part1_activity", &slots, &mut rng, "Which of these sounds most like you?"),
                ACTIVITY_OPTIONS,
            ),
            QuestionSpec::slider(
                "p1_team",
                self.phrase("part1_team", &slots, &mut rng, "Do you prefer working alone or in a team?"),
                0,
                10,
                "Alone",
                "In a team",
            ),
            QuestionSpec::rating(
                "p1_confidence",
                self.phrase("part1_confidence", &slots, &mut rng, "How confident do you feel about your next step?"),
            ),
            QuestionSpec::text(
                "p1_subject",
                self.phrase("part1_subject", &slots, &mut rng, "Which subject do you enjoy most, and why?"),
                Some(self.phrase("part1_subject_hint", &slots, &mut rng, "e.g. Maths, Art, Biology")),
            ),
            QuestionSpec::mcq(
                "p1_environment",
                self.phrase("part1_environment", &slots, &mut rng, "Where would you most like to work?"),
                ENVIRONMENT_OPTIONS,
            ),
        ];

        Part1Payload { questions }
    }

    pub fn part2(&self, education: EducationStatus, part1_answers: &[Answer]) -> Part2Payload {
        let mut rng = seeded("part2", &(education, part1_answers));
        let inferred_fields = self.infer_fields(part1_answers);

        let mut questions = Vec::with_capacity(INFERRED_FIELD_COUNT * 4);
        for (i, field) in inferred_fields.iter().enumerate() {
            let n = i + 1;
            let mut slots = Slots::default();
            slots.insert("field", field.clone());
            questions.push(QuestionSpec::mcq(
                format!("f{}_interest", n),
                self.phrase("part2_interest", &slots, &mut rng, &format!("How interested are you in {}?", field)),
                INTEREST_OPTIONS,
            ));
            questions.push(QuestionSpec::slider(
                format!("f{}_practice", n),
                self.phrase("part2_practice", &slots, &mut rng, &format!("How much would you practise {}?", field)),
                0,
                10,
                "Not at all",
                "Every day",
            ));
            questions.push(QuestionSpec::rating(
                format!("f{}_fit", n),
                self.phrase("part2_rating", &slots, &mut rng, &format!("How good a fit is {} for you?", field)),
            ));
            questions.push(QuestionSpec::text(
                format!("f{}_story", n),
                self.phrase("part2_story", &slots, &mut rng, &format!("What would you try first in {}?", field)),
                Some(self.phrase("part2_story_hint", &slots, &mut rng, "A project, hobby, or class activity")),
            ));
        }

        let poly_extra_question = education.is_vocational().then(|| {
            QuestionSpec::mcq(
                BRANCH_QUESTION_ID,
                self.phrase(
                    "branch_prompt",
                    &Slots::default(),
                    &mut rng,
                    "After poly, do you want to work or go to university?",
                ),
                BRANCH_OPTIONS,
            )
        });

        Part2Payload {
            inferred_fields,
            questions,
            poly_extra_question,
        }
    }

    pub fn analysis(
        &self,
        education: EducationStatus,
        branch: Option<BranchChoice>,
        inferred_fields: &[String],
        part2_answers: &[Answer],
    ) -> AnalysisPayload {
        let kind = OptionKind::for_profile(education, branch);
        let mut rng = seeded("analysis", &(education, branch, inferred_fields, part2_answers));

        // strengths: one per inferred field, then general ones
        let mut general = GENERAL_STRENGTHS;
        general.shuffle(&mut rng);
        let field_strengths = inferred_fields.iter().filter_map(|f| {
            FIELD_STRENGTHS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(f))
                .map(|(_, s)| *s)
        });
        let strength_tags = distinct_take(field_strengths.chain(general), STRENGTH_TAG_COUNT);

        let confident = mean_rating(part2_answers).is_some_and(|m| m >= 4.0);
        let mut styles = WORK_STYLES;
        styles.shuffle(&mut rng);
        let lead = if confident { "Self-assured" } else { "Reflective" };
        let work_style_tags = distinct_take(std::iter::once(lead).chain(styles), 4);

        let mut slots = Slots::default();
        slots.insert("fields", join_natural(inferred_fields));
        slots.insert("noun", kind.noun().to_string());
        let mut feedback_lines = vec![self.phrase(
            "feedback_opening",
            &slots,
            &mut rng,
            "You showed real curiosity across your answers.",
        )];
        if !inferred_fields.is_empty() {
            feedback_lines.push(self.phrase(
                "feedback_fields",
                &slots,
                &mut rng,
                "Some clear areas stood out.",
            ));
        }
        feedback_lines.push(self.phrase(
            "feedback_closing",
            &slots,
            &mut rng,
            "The three options below are a good place to start.",
        ));

        AnalysisPayload {
            strength_tags,
            work_style_tags,
            feedback_lines,
            suggested_options: self.suggest(kind, inferred_fields),
        }
    }

    pub fn gate(&self, option_name: &str, work_path: bool) -> GatePayload {
        let mut rng = seeded("gate", &(option_name, work_path));
        let entry = self.catalog.find_any(option_name);

        let mut slots = Slots::default();
        slots.insert("option", option_name.to_string());

        let subjects: Vec<String> = entry
            .map(|e| e.subjects.iter().filter(|s| !s.trim().is_empty()).cloned().collect())
            .unwrap_or_default();
        let subject_line = if subjects.is_empty() {
            self.phrase("gate_subjects_generic", &slots, &mut rng, "Start with the basics and build up.")
        } else {
            slots.insert("subjects", join_natural(&subjects));
            self.phrase("gate_subjects", &slots, &mut rng, "Focus on the core subjects first.")
        };

        let info_dialog_lines = vec![
            subject_line,
            self.phrase("gate_outlook", &slots, &mut rng, "Demand for these skills is generally steady."),
            self.phrase("gate_impact", &slots, &mut rng, "This path lets you make a difference for others."),
        ];

        let mut resources: Vec<String> = entry
            .map(|e| {
                e.resources
                    .iter()
                    .filter(|r| !r.trim().is_empty())
                    .take(MAX_GATE_RESOURCES)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if resources.is_empty() {
            resources = DEFAULT_RESOURCES.iter().map(|s| s.to_string()).collect();
        }

        let dragon = DragonQuest {
            micro_quest_1_week: self.phrase("dragon_micro", &slots, &mut rng, "Spend one week trying a small task."),
            mini_project_1_month: self.phrase("dragon_mini", &slots, &mut rng, "Complete a small project within a month."),
            resources,
        };

        let (salary_outlook_line, work_style_line) = if work_path {
            (
                Some(self.phrase("gate_salary", &slots, &mut rng, "Pay usually improves as your skills grow.")),
                Some(self.phrase("gate_work_style", &slots, &mut rng, "Expect a mix of focused work and teamwork.")),
            )
        } else {
            (None, None)
        };

        GatePayload {
            info_dialog_lines,
            dragon,
            salary_outlook_line,
            work_style_line,
        }
    }

    /// Three distinct fields from the vocabulary, best keyword match first,
    /// padded in vocabulary order.
    pub fn infer_fields(&self, answers: &[Answer]) -> Vec<String> {
        let words: Vec<String> = answers
            .iter()
            .filter(|a| !a.question_type.expects_number())
            .filter_map(|a| a.answer.as_text())
            .flat_map(|t| {
                t.split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut vocab: Vec<&str> = Vec::new();
        for field in &self.catalog.fields_vocab {
            let field = field.trim();
            if !field.is_empty() && !vocab.contains(&field) {
                vocab.push(field);
            }
        }

        let mut scored: Vec<(usize, usize, &str)> = vocab
            .iter()
            .enumerate()
            .map(|(idx, field)| (keyword_hits(field, &words), idx, *field))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let matched = scored.iter().filter(|(hits, _, _)| *hits > 0).map(|(_, _, f)| *f);
        distinct_take(matched.chain(vocab.iter().copied()), INFERRED_FIELD_COUNT)
    }

    /// Ranked options of `kind`, filled from catalog order when the
    /// ranking comes up short.
    pub fn suggest(&self, kind: OptionKind, inferred_fields: &[String]) -> Vec<String> {
        let entries = self.catalog.entries(kind);
        let ranked = self
            .ranking
            .rank(entries, inferred_fields, SUGGESTED_OPTION_COUNT);
        let known: Vec<&str> = ranked
            .iter()
            .map(String::as_str)
            .filter(|n| self.catalog.contains(kind, n))
            .collect();
        let fill = self.catalog.option_names(kind);
        distinct_take(known.into_iter().chain(fill), SUGGESTED_OPTION_COUNT)
    }

    fn phrase(&self, rule: &str, slots: &Slots<'_>, rng: &mut StdRng, default: &str) -> String {
        self.phrases
            .render(rule, slots, rng)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

fn seeded<T: Hash + ?Sized>(stage: &str, inputs: &T) -> StdRng {
    let mut hasher = FxHasher::default();
    stage.hash(&mut hasher);
    inputs.hash(&mut hasher);
    StdRng::seed_from_u64(hasher.finish())
}

fn keyword_hits(field: &str, words: &[String]) -> usize {
    let own = field.to_lowercase();
    let extra = FIELD_KEYWORDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(field))
        .map(|(_, kws)| *kws)
        .unwrap_or(&[]);

    words
        .iter()
        .filter(|w| {
            **w == own
                || extra
                    .iter()
                    .any(|kw| w.as_str() == *kw || (kw.len() >= 4 && w.starts_with(kw)))
        })
        .count()
}

fn mean_rating(answers: &[Answer]) -> Option<f64> {
    let ratings: Vec<i64> = answers
        .iter()
        .filter(|a| a.question_type == QuestionType::Rating)
        .filter_map(|a| a.answer.as_number())
        .collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<i64>() as f64 / ratings.len() as f64)
}

fn distinct_take<'a>(items: impl IntoIterator<Item = &'a str>, count: usize) -> Vec<String> {
    let mut seen = FxHashSet::default();
    items
        .into_iter()
        .filter(|s| !s.trim().is_empty() && seen.insert(*s))
        .take(count)
        .map(str::to_string)
        .collect()
}

/// "A", "A and B", "A, B and C".
fn join_natural(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
