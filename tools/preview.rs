/// Preview: runs one simulated play-through and prints every stage.
///
/// Usage: preview [--education <status>] [--course <name>] [--study]
///                [--config <file.ron>] [--catalog <file.json>] [--save <dir>]
///
/// Answers are mocked: first mcq option, slider midpoint, rating 3 and
/// "Sample answer" for text. `--study` picks further study at the branch
/// question instead of work. Uses the generation service when credentials
/// are configured, synthesized content otherwise.

use career_quest::core::adapter::{to_renderable, RangeKind, UiQuestion, RATING_DEFAULT};
use career_quest::core::config::PipelineConfig;
use career_quest::core::flow::{FlowController, GateDecision};
use career_quest::core::persistence::JsonFileSink;
use career_quest::core::pipeline::ContentPipeline;
use career_quest::schema::answer::Answer;
use career_quest::schema::profile::{EducationStatus, Profile};
use career_quest::schema::question::QuestionSpec;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tracing_subscriber::EnvFilter;

const SAMPLE_TEXT: &str = "Sample answer";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("career_quest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut education = EducationStatus::Poly;
    let mut course: Option<String> = None;
    let mut study = false;
    let mut config_path = None;
    let mut catalog_path = None;
    let mut save_dir = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--education" if i + 1 < args.len() => {
                i += 1;
                education = match EducationStatus::parse(&args[i]) {
                    Some(e) => e,
                    None => {
                        eprintln!("Unknown education status: {}", args[i]);
                        std::process::exit(1);
                    }
                };
            }
            "--course" if i + 1 < args.len() => {
                i += 1;
                course = Some(args[i].clone());
            }
            "--study" => study = true,
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--catalog" if i + 1 < args.len() => {
                i += 1;
                catalog_path = Some(args[i].clone());
            }
            "--save" if i + 1 < args.len() => {
                i += 1;
                save_dir = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let opts = RunOptions {
        education,
        course,
        study,
        config_path,
        catalog_path,
        save_dir,
    };
    if let Err(e) = run(opts).await {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

struct RunOptions {
    education: EducationStatus,
    course: Option<String>,
    study: bool,
    config_path: Option<String>,
    catalog_path: Option<String>,
    save_dir: Option<String>,
}

async fn run(opts: RunOptions) -> Result<(), Box<dyn Error>> {
    let config = match opts.config_path {
        Some(ref path) => PipelineConfig::load_from_ron(Path::new(path))?,
        None => PipelineConfig::from_env()?,
    };
    let mut builder = ContentPipeline::builder().config(config);
    if let Some(ref path) = opts.catalog_path {
        builder = builder.catalog_path(path);
    }
    let pipeline = builder.build()?;
    println!(
        "Generation service: {}",
        if pipeline.service_enabled() { "enabled" } else { "disabled (synthesized content)" }
    );

    let mut profile = Profile::new("Preview", opts.education);
    if opts.education.is_vocational() {
        profile = profile.with_course(opts.course.as_deref().unwrap_or("IT"));
    }

    let mut flow = FlowController::new(pipeline);

    let part1 = flow.confirm_profile(profile).await?.clone();
    print_section("PART 1", &part1)?;
    answer_stage(&mut flow, opts.study)?;
    flow.advance().await?;

    if let Some(part2) = flow.session().part2.clone() {
        print_section("PART 2", &part2)?;
    }
    answer_stage(&mut flow, opts.study)?;
    flow.advance().await?;

    if let Some(analysis) = flow.session().analysis.clone() {
        print_section("ANALYSIS", &analysis)?;
    }

    let options = flow.suggested_options().map(<[String]>::to_vec).unwrap_or_default();
    for option in &options {
        let gate = flow.enter_gate(option).await?.clone();
        println!("\n=== GATE: {} ===", option);
        for line in gate.dialog_lines(option) {
            println!("  wise man: {}", line);
        }
        print_section(&format!("GATE PAYLOAD: {}", option), &gate)?;
        flow.resolve_gate(GateDecision::Accept)?;
    }

    println!("\nComplete: {}", flow.is_complete());

    if let Some(ref dir) = opts.save_dir {
        let path = JsonFileSink::new(dir).write(&flow.snapshot())?;
        println!("Saved run to {}", path.display());
    }
    Ok(())
}

/// Answer every pending question of the current stage with mock input.
fn answer_stage(flow: &mut FlowController, study: bool) -> Result<(), Box<dyn Error>> {
    while let Some(question) = flow.pending_question().cloned() {
        let answer = mock_answer(&question, study);
        println!("  {} [{}] {}", answer.id, answer.question_type, question.prompt);
        flow.answer(answer)?;
    }
    Ok(())
}

fn mock_answer(question: &QuestionSpec, study: bool) -> Answer {
    let mut ui = to_renderable(question);
    let choice = match &ui {
        UiQuestion::Choice { options, .. } if study => options
            .iter()
            .position(|o| o.to_lowercase().contains("uni")),
        _ => None,
    };
    let value = match &ui {
        UiQuestion::Range { kind: RangeKind::Rating, .. } => Some(RATING_DEFAULT),
        UiQuestion::Range { min, max, .. } => Some(min + (max - min) / 2),
        _ => None,
    };
    if let Some(idx) = choice {
        ui.select(idx);
    }
    if let Some(v) = value {
        ui.set_value(v);
    }
    ui.set_text(SAMPLE_TEXT);
    ui.to_answer()
}

fn print_section<T: Serialize>(title: &str, payload: &T) -> Result<(), Box<dyn Error>> {
    println!("\n=== {} ===", title);
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

fn print_usage() {
    println!("Usage: preview [--education <status>] [--course <name>] [--study]");
    println!("               [--config <file.ron>] [--catalog <file.json>] [--save <dir>]");
    println!();
    println!("  --education  Secondary School | JC | Poly (default Poly)");
    println!("  --course     current course for Poly learners (default IT)");
    println!("  --study      choose further study at the branch question");
}
