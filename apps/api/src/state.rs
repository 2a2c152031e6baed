use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::originality::judge::LlmJudge;
use crate::originality::materializer::GitCloner;
use crate::originality::pipeline::{OriginalityPipeline, PipelineLimits};
use crate::originality::search::GithubCodeSearch;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Used for resume evaluation; the judge holds its own clone.
    pub llm: LlmClient,
    pub pipeline: Arc<OriginalityPipeline>,
}

impl AppState {
    /// Wires the production collaborators from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let llm = LlmClient::new(&config).context("Failed to build LLM client")?;
        let search = GithubCodeSearch::new(&config).context("Failed to build code search client")?;

        let pipeline = OriginalityPipeline::new(
            Arc::new(GitCloner::new(config.clone_timeout)),
            Arc::new(search),
            Arc::new(LlmJudge::new(llm.clone())),
            PipelineLimits::from_config(&config),
        );

        Ok(Self {
            config,
            llm,
            pipeline: Arc::new(pipeline),
        })
    }
}
