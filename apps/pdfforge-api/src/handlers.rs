//! HTTP handlers for the pdfforge API

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use pdfforge_core::{JobCommand, JobOutput};

use crate::error::ApiError;
use crate::state::AppState;
use crate::upload::UploadForm;

pub const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-job-id");

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Merge every uploaded `files` part, in order
pub async fn merge(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let command = JobCommand::Merge {
        files: form.take_files("files"),
    };
    run_job(state, command).await
}

/// Extract `start_page..=end_page` from the uploaded `file`
pub async fn split(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let command = JobCommand::Split {
        file: form.take_file("file"),
        start_page: form.page_bound("start_page"),
        end_page: form.page_bound("end_page"),
    };
    run_job(state, command).await
}

/// Package every uploaded `images` part as one page each
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let command = JobCommand::Convert {
        images: form.take_files("images"),
    };
    run_job(state, command).await
}

/// Fetch a retained artifact by job id
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .workspace
        .artifact_for(&id)
        .ok_or_else(|| ApiError::ArtifactNotFound(id.clone()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::ArtifactNotFound(id.clone()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf")
        .to_string();

    Ok(pdf_response(&id, &file_name, bytes))
}

/// Run a job on the blocking pool once a slot is free.
///
/// The permit moves into the blocking task, so a job whose client has gone
/// away still finishes and disposes its workspace before the slot is
/// released.
async fn run_job(state: Arc<AppState>, command: JobCommand) -> Result<Response, ApiError> {
    let permit = Arc::clone(&state.job_slots)
        .acquire_owned()
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let operation = command.operation();
    let retention = state.retention();
    let worker = Arc::clone(&state);

    let output: JobOutput = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        command.execute(&worker.workspace, retention)
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))??;

    tracing::info!(
        "{} job {} produced {} pages ({} bytes)",
        operation,
        output.job_id,
        output.metrics.page_count,
        output.metrics.output_size_bytes
    );

    Ok(pdf_response(&output.job_id, output.file_name, output.bytes))
}

fn pdf_response(job_id: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
            (JOB_ID_HEADER, job_id.to_string()),
        ],
        bytes,
    )
        .into_response()
}
