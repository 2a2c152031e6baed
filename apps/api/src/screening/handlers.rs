use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::originality::models::ResumeAnalysisResult;
use crate::screening::evaluation::evaluate_resume;
use crate::screening::extract::{extract_text, DocumentKind};
use crate::state::AppState;

const JOB_DESCRIPTION_FIELD: &str = "job_description";
const RESUMES_FIELD: &str = "resumes";

/// One entry of the `/analyze` response, in upload order.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResumeOutcome {
    Analyzed(ResumeAnalysisResult),
    Rejected { filename: String, error: String },
}

impl ResumeOutcome {
    fn rejected(filename: &str, error: impl Into<String>) -> Self {
        ResumeOutcome::Rejected {
            filename: filename.to_string(),
            error: error.into(),
        }
    }
}

struct Upload {
    filename: String,
    bytes: Bytes,
}

/// POST /analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Vec<ResumeOutcome>>, AppError> {
    let request_id = Uuid::new_v4();
    analyze(state, multipart)
        .instrument(info_span!("analyze", %request_id))
        .await
        .map(Json)
}

async fn analyze(
    state: AppState,
    mut multipart: Multipart,
) -> Result<Vec<ResumeOutcome>, AppError> {
    let mut job_description = String::new();
    let mut uploads: Vec<Upload> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(JOB_DESCRIPTION_FIELD) => job_description = field.text().await?,
            Some(RESUMES_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                uploads.push(Upload { filename, bytes });
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    if uploads.is_empty() {
        return Err(AppError::Validation(
            "At least one file must be uploaded in the 'resumes' field".to_string(),
        ));
    }
    info!("Screening {} resume(s)", uploads.len());

    let mut outcomes = Vec::with_capacity(uploads.len());
    for upload in uploads {
        outcomes.push(screen_upload(&state, &job_description, upload).await);
    }
    Ok(outcomes)
}

async fn screen_upload(state: &AppState, job_description: &str, upload: Upload) -> ResumeOutcome {
    let Upload { filename, bytes } = upload;

    let Some(kind) = DocumentKind::from_filename(&filename) else {
        warn!("{filename}: rejected, file type not allowed");
        return ResumeOutcome::rejected(&filename, "File type not allowed");
    };

    // pdf-extract is CPU bound and may panic on malformed input.
    let resume_text = match tokio::task::spawn_blocking(move || extract_text(&bytes, kind)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("{filename}: {e}");
            return ResumeOutcome::rejected(&filename, format!("Failed to extract text: {e}"));
        }
        Err(e) => {
            warn!("{filename}: extraction task failed: {e}");
            return ResumeOutcome::rejected(&filename, format!("Failed to extract text: {e}"));
        }
    };

    let resume_analysis = evaluate_resume(&state.llm, job_description, &resume_text).await;
    let result = state
        .pipeline
        .analyze_resume(&filename, &resume_text, resume_analysis)
        .await;
    ResumeOutcome::Analyzed(result)
}
