//! The four remote-pipe protocol endpoints.
//!
//! - POST /new — spawn the command, register the job, return its id
//! - POST /upload — buffer one chunk, forward it to the job's stdin
//! - GET /resume — report the durable byte offset for the job
//! - POST /done — close stdin, wait for the child, forget the job
//!
//! Response bodies are the plain-text wire contract; see `crate::error`
//! for the texts. Wrong methods get 405 from the router.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use rpipe_protocol as protocol;

use crate::error::{PipeError, PipeResult};
use crate::jobs::{DoneOutcome, JobEntry};
use crate::metrics;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(protocol::NEW_PATH, post(new_job))
        .route(protocol::UPLOAD_PATH, post(upload_chunk))
        .route(protocol::RESUME_PATH, get(resume_job))
        .route(protocol::DONE_PATH, post(finish_job))
}

/// Raw `Job` header value. Axum matches header names case-insensitively.
fn job_header(headers: &HeaderMap) -> &str {
    headers
        .get(protocol::JOB_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Look up a registered job by the raw header value. An unparseable id is
/// indistinguishable from an unknown one.
fn lookup(state: &AppState, raw_id: &str) -> Option<Arc<JobEntry>> {
    let id = Uuid::parse_str(raw_id).ok()?;
    state.registry.get(&id)
}

async fn new_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> PipeResult<String> {
    let command = headers
        .get(protocol::COMMAND_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if command.is_empty() {
        return Err(PipeError::NoCommand);
    }

    let entry = JobEntry::spawn(command).map_err(|e| PipeError::Process(e.to_string()))?;
    let id = entry.id();
    state.registry.insert(Arc::new(entry));
    metrics::record_job_created();
    tracing::info!(job_id = %id, command, "created new job");
    Ok(id.to_string())
}

async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match try_upload(&state, &headers, body).await {
        Ok(ok) => ok.into_response(),
        Err(err) => {
            metrics::record_upload_error();
            err.into_response()
        }
    }
}

async fn try_upload(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> PipeResult<&'static str> {
    let raw_size = headers
        .get(protocol::CHUNK_SIZE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let chunk_size = protocol::parse_byte_count(raw_size)
        .filter(|n| *n > 0)
        .ok_or_else(|| PipeError::BadChunkSize(raw_size.to_string()))?;

    let raw_id = job_header(headers);
    let entry =
        lookup(state, raw_id).ok_or_else(|| PipeError::UnknownJob(raw_id.to_string()))?;

    // The whole body is in memory before any byte reaches the program, so
    // a torn request cannot poison the subprocess stdin: either all
    // `Chunk-Size` bytes are forwarded or none are.
    if body.is_empty() {
        return Err(PipeError::EmptyBody);
    }
    if body.len() as u64 != chunk_size {
        return Err(PipeError::SizeMismatch {
            expected: chunk_size,
            received: body.len() as u64,
        });
    }

    let total = entry
        .write_chunk(&body)
        .await
        .map_err(PipeError::StdinWrite)?;
    metrics::record_chunk(chunk_size);
    tracing::info!(job_id = %entry.id(), size = chunk_size, total, "finished processing chunk");
    Ok(protocol::OK_BODY)
}

async fn resume_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> PipeResult<String> {
    let entry = lookup(&state, job_header(&headers)).ok_or(PipeError::ResumeUnknownJob)?;
    let bytes_processed = entry.bytes_processed().await;
    tracing::info!(job_id = %entry.id(), bytes_processed, "sent resume offset");
    Ok(bytes_processed.to_string())
}

async fn finish_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> PipeResult<&'static str> {
    let entry = lookup(&state, job_header(&headers)).ok_or(PipeError::DoneUnknownJob)?;
    match entry.finish().await {
        Ok(DoneOutcome::Completed(status)) => {
            state.registry.remove(&entry.id());
            metrics::record_job_completed();
            tracing::info!(job_id = %entry.id(), %status, "finished processing job");
            Ok(protocol::OK_BODY)
        }
        Ok(DoneOutcome::AlreadyDone) => {
            tracing::info!(job_id = %entry.id(), "job already finished");
            Ok(protocol::OK_BODY)
        }
        Err(err) => Err(PipeError::Process(err.to_string())),
    }
}
