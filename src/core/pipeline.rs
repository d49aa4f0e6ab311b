//! The content pipeline: prompt → service → validation → fallback.
//!
//! Every stage runs the same algorithm. When the generation service is
//! enabled the stage prompt is sent once and the reply is validated; any
//! failure along the way is logged and replaced by synthesized content,
//! which is validated too. Callers only ever see a valid payload, or a
//! `SchemaError` if the synthesizer itself is broken.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::core::catalog::{Catalog, CatalogError, RankingStrategy};
use crate::core::client::{AzureChatClient, DisabledClient, GenerationClient, GenerationError};
use crate::core::config::{ConfigError, PipelineConfig};
use crate::core::fallback::FallbackSynthesizer;
use crate::core::phrases::{PhraseBook, PhraseError};
use crate::core::prompts;
use crate::core::validator::{SchemaError, SchemaErrorKind, SchemaValidator, Stage, ROOT};
use crate::schema::answer::Answer;
use crate::schema::payload::{AnalysisPayload, GatePayload, Part1Payload, Part2Payload};
use crate::schema::profile::{BranchChoice, EducationStatus, OptionKind};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("phrase error: {0}")]
    Phrases(#[from] PhraseError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("generation client error: {0}")]
    Client(#[from] GenerationError),
}

/// Produces validated content for each stage. Built via
/// `ContentPipeline::builder()`.
#[derive(Clone)]
pub struct ContentPipeline {
    client: Arc<dyn GenerationClient>,
    catalog: Arc<Catalog>,
    fallback: FallbackSynthesizer,
}

/// Builder for constructing a `ContentPipeline`.
#[derive(Default)]
pub struct ContentPipelineBuilder {
    config: Option<PipelineConfig>,
    catalog_path: Option<PathBuf>,
    phrases_path: Option<PathBuf>,
    /// Directly provided catalog (for testing without files).
    catalog: Option<Catalog>,
    /// Directly provided client (for tests and alternative services).
    client: Option<Arc<dyn GenerationClient>>,
    ranking: Option<Arc<dyn RankingStrategy>>,
}

impl ContentPipeline {
    pub fn builder() -> ContentPipelineBuilder {
        ContentPipelineBuilder::default()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn fallback(&self) -> &FallbackSynthesizer {
        &self.fallback
    }

    pub fn service_enabled(&self) -> bool {
        self.client.enabled()
    }

    pub async fn part1(
        &self,
        education: EducationStatus,
        course: Option<&str>,
    ) -> Result<Part1Payload, SchemaError> {
        self.generate(
            Stage::Part1,
            || prompts::part1_prompt(education, course),
            |v, doc| v.parse_part1(doc),
            || self.fallback.part1(education, course),
        )
        .await
    }

    pub async fn part2(
        &self,
        education: EducationStatus,
        part1_answers: &[Answer],
    ) -> Result<Part2Payload, SchemaError> {
        let vocational = education.is_vocational();
        self.generate(
            Stage::Part2 { vocational },
            || prompts::part2_prompt(education, part1_answers),
            |v, doc| v.parse_part2(doc, vocational),
            || self.fallback.part2(education, part1_answers),
        )
        .await
    }

    pub async fn analysis(
        &self,
        education: EducationStatus,
        branch: Option<BranchChoice>,
        inferred_fields: &[String],
        part2_answers: &[Answer],
    ) -> Result<AnalysisPayload, SchemaError> {
        let kind = OptionKind::for_profile(education, branch);
        self.generate(
            Stage::Analysis { kind },
            || {
                let allowed = self.catalog.option_names(kind);
                prompts::analysis_prompt(education, branch, inferred_fields, part2_answers, &allowed)
            },
            |v, doc| v.parse_analysis(doc, kind),
            || {
                self.fallback
                    .analysis(education, branch, inferred_fields, part2_answers)
            },
        )
        .await
    }

    pub async fn gate(&self, option_name: &str, work_path: bool) -> Result<GatePayload, SchemaError> {
        self.generate(
            Stage::Gate { work_path },
            || prompts::gate_prompt(option_name, work_path),
            |v, doc| v.parse_gate(doc, work_path),
            || self.fallback.gate(option_name, work_path),
        )
        .await
    }

    async fn generate<T, U, P, F>(
        &self,
        stage: Stage,
        user_prompt: U,
        parse: P,
        synthesize: F,
    ) -> Result<T, SchemaError>
    where
        T: Serialize,
        U: FnOnce() -> String,
        P: Fn(&SchemaValidator<'_>, &Value) -> Result<T, SchemaError>,
        F: FnOnce() -> T,
    {
        let validator = SchemaValidator::new(&self.catalog);

        if self.client.enabled() {
            debug!(%stage, "requesting content from generation service");
            match self.client.invoke(prompts::SYSTEM_RULES, &user_prompt()).await {
                Ok(doc) => match parse(&validator, &doc) {
                    Ok(payload) => {
                        debug!(%stage, "generated content accepted");
                        return Ok(payload);
                    }
                    Err(e) => warn!(%stage, error = %e, "generated content rejected, using fallback"),
                },
                Err(e) => warn!(%stage, error = %e, "generation failed, using fallback"),
            }
        } else {
            debug!(%stage, "generation service disabled, using fallback");
        }

        let doc = serde_json::to_value(synthesize())
            .map_err(|e| SchemaError::new(ROOT, SchemaErrorKind::InvalidValue(e.to_string())))?;
        parse(&validator, &doc).map_err(|e| {
            error!(%stage, error = %e, "fallback content failed validation");
            e
        })
    }
}

impl ContentPipelineBuilder {
    /// Credentials, timeout and default catalog location.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Catalog file to load. Unlike the configured default, this path must exist.
    pub fn catalog_path(mut self, path: impl AsRef<Path>) -> Self {
        self.catalog_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Phrase file merged over the built-in wording.
    pub fn phrases_path(mut self, path: impl AsRef<Path>) -> Self {
        self.phrases_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Provide the catalog directly (for testing without files).
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_client(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_ranking(mut self, ranking: Arc<dyn RankingStrategy>) -> Self {
        self.ranking = Some(ranking);
        self
    }

    pub fn build(self) -> Result<ContentPipeline, PipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        // Explicit catalog, then explicit path, then the configured path
        // if it exists, then the copy shipped with the crate.
        let catalog = match (self.catalog, &self.catalog_path) {
            (Some(catalog), _) => catalog,
            (None, Some(path)) => Catalog::load(path)?,
            (None, None) if config.catalog_path.exists() => Catalog::load(&config.catalog_path)?,
            (None, None) => Catalog::builtin()?,
        };

        let mut phrases = PhraseBook::builtin()?;
        if let Some(ref path) = self.phrases_path {
            phrases.merge(PhraseBook::load_from_ron(path)?);
        }

        let client: Arc<dyn GenerationClient> = match self.client {
            Some(client) => client,
            None if config.credentials_present() => Arc::new(AzureChatClient::new(&config)?),
            None => Arc::new(DisabledClient),
        };

        let catalog = Arc::new(catalog);
        let mut fallback = FallbackSynthesizer::new(Arc::clone(&catalog), Arc::new(phrases));
        if let Some(ranking) = self.ranking {
            fallback = fallback.with_ranking(ranking);
        }

        Ok(ContentPipeline {
            client,
            catalog,
            fallback,
        })
    }
}
