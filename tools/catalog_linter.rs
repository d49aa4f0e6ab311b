/// Catalog Linter: validates an option catalog and the content built from it.
///
/// Usage: catalog_linter <catalog.json> [--phrases <file.ron>]

use career_quest::core::catalog::Catalog;
use career_quest::core::fallback::FallbackSynthesizer;
use career_quest::core::phrases::PhraseBook;
use career_quest::core::validator::{SchemaValidator, Stage};
use career_quest::schema::profile::{is_work_path, BranchChoice, EducationStatus, OptionKind};
use serde::Serialize;
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: catalog_linter <catalog.json> [--phrases <file.ron>]");
        process::exit(0);
    }

    let catalog_path = Path::new(&args[1]);
    let mut phrases_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--phrases" && i + 1 < args.len() {
            i += 1;
            phrases_path = Some(args[i].clone());
        }
        i += 1;
    }

    // Parse without the structural gate so every problem gets reported.
    let catalog: Catalog = match std::fs::read_to_string(catalog_path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: Failed to load catalog '{}': {}", catalog_path.display(), e);
            process::exit(1);
        }
    };

    let mut phrases = match PhraseBook::builtin() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: Built-in phrases failed to parse: {}", e);
            process::exit(1);
        }
    };
    if let Some(ref path) = phrases_path {
        match PhraseBook::load_from_ron(Path::new(path)) {
            Ok(p) => phrases.merge(p),
            Err(e) => {
                eprintln!("ERROR: Failed to load phrases '{}': {}", path, e);
                process::exit(1);
            }
        }
    }

    println!(
        "Loaded catalog: {} fields, {} poly courses, {} uni courses, {} careers",
        catalog.fields_vocab.len(),
        catalog.courses_poly.len(),
        catalog.uni_courses.len(),
        catalog.careers_poly_work.len()
    );
    println!("Loaded {} phrase rules", phrases.rules.len());

    let report = catalog.lint();
    let mut errors = report.errors;
    let mut warnings = report.warnings;

    errors.extend(phrases.check());
    for (name, rule) in &phrases.rules {
        if rule.alternatives.len() < 2 {
            warnings.push(format!(
                "Phrase rule '{}' has only {} alternative (2 or more recommended)",
                name,
                rule.alternatives.len()
            ));
        }
    }

    // Only worth synthesizing once the catalog is structurally sound.
    if errors.is_empty() {
        errors.extend(check_fallback(catalog, phrases));
    }

    println!("\n=== Catalog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

/// Synthesize every stage for every track and validate the result.
fn check_fallback(catalog: Catalog, phrases: PhraseBook) -> Vec<String> {
    let catalog = Arc::new(catalog);
    let synth = FallbackSynthesizer::new(Arc::clone(&catalog), Arc::new(phrases));
    let validator = SchemaValidator::new(&catalog);
    let mut errors = Vec::new();

    let mut check = |label: String, stage: Stage, payload: &dyn ErasedPayload| {
        match payload.to_value() {
            Ok(doc) => {
                if let Err(e) = validator.validate(&stage, &doc) {
                    errors.push(format!("fallback {} is invalid: {}", label, e));
                }
            }
            Err(e) => errors.push(format!("fallback {} failed to serialize: {}", label, e)),
        }
    };

    for edu in EducationStatus::ALL {
        let course = edu.is_vocational().then_some("IT");
        check(format!("part1 ({})", edu), Stage::Part1, &synth.part1(edu, course));

        let part2 = synth.part2(edu, &[]);
        check(
            format!("part2 ({})", edu),
            Stage::Part2 { vocational: edu.is_vocational() },
            &part2,
        );

        for branch in [None, Some(BranchChoice::Work), Some(BranchChoice::FurtherStudy)] {
            let kind = OptionKind::for_profile(edu, branch);
            let analysis = synth.analysis(edu, branch, &part2.inferred_fields, &[]);
            check(
                format!("analysis ({}, {:?})", edu, branch),
                Stage::Analysis { kind },
                &analysis,
            );

            let work_path = is_work_path(edu, branch);
            for option in &analysis.suggested_options {
                check(
                    format!("gate '{}'", option),
                    Stage::Gate { work_path },
                    &synth.gate(option, work_path),
                );
            }
        }
    }

    errors
}

trait ErasedPayload {
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error>;
}

impl<T: Serialize> ErasedPayload for T {
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
