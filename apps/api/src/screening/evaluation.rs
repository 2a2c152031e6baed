//! Resume-vs-job-description evaluation. The returned text is opaque to the
//! originality pipeline and is passed through to the caller as-is.

use tracing::warn;

use crate::llm_client::LlmClient;
use crate::screening::prompts::EVALUATION_PROMPT_TEMPLATE;

pub fn build_evaluation_prompt(job_description: &str, resume_text: &str) -> String {
    EVALUATION_PROMPT_TEMPLATE
        .replace("{resume}", resume_text)
        .replace("{job_description}", job_description)
}

/// Never fails: a model error becomes an explanatory text.
pub async fn evaluate_resume(llm: &LlmClient, job_description: &str, resume_text: &str) -> String {
    let prompt = build_evaluation_prompt(job_description, resume_text);
    match llm.call_text(&prompt, None).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Resume evaluation failed: {e}");
            format!("Resume evaluation unavailable: {e}")
        }
    }
}
