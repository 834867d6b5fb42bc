//! Error types for the job API.
//!
//! Wire bodies are the plain-text strings clients match on, so the
//! `Display` impls below are part of the protocol. Handlers never panic on
//! expected errors; every variant maps to a status plus its text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors a protocol handler can return to the client.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("no command was specified")]
    NoCommand,

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("cannot call resume on job which doesn't exist")]
    ResumeUnknownJob,

    #[error("cannot call done on job which doesn't exist")]
    DoneUnknownJob,

    #[error("invalid chunk size: {0}")]
    BadChunkSize(String),

    #[error("no body found")]
    EmptyBody,

    #[error("unexpected number of bytes")]
    SizeMismatch { expected: u64, received: u64 },

    #[error("could not send all bytes from buffer to job stdin")]
    StdinWrite(#[source] std::io::Error),

    /// Subprocess failures: spawn/pipe errors at `/new`, wait errors and
    /// non-zero exits at `/done`. The body is the error text itself.
    #[error("{0}")]
    Process(String),
}

impl PipeError {
    fn status(&self) -> StatusCode {
        match self {
            PipeError::NoCommand => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PipeError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            PipeError::SizeMismatch { expected, received } => {
                tracing::warn!(expected, received, "{self}");
            }
            PipeError::StdinWrite(source) => {
                tracing::warn!(error = %source, "{self}");
            }
            _ => tracing::warn!("{self}"),
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias for protocol handlers.
pub type PipeResult<T> = Result<T, PipeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn extract(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_no_command_returns_400() {
        let (status, body) = extract(PipeError::NoCommand.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "no command was specified");
    }

    #[tokio::test]
    async fn test_unknown_job_returns_500_with_id() {
        let err = PipeError::UnknownJob("deadbeef".to_string());
        let (status, body) = extract(err.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "unknown job: deadbeef");
    }

    #[tokio::test]
    async fn test_size_mismatch_body_is_fixed_text() {
        let err = PipeError::SizeMismatch {
            expected: 1_048_576,
            received: 1024,
        };
        let (status, body) = extract(err.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "unexpected number of bytes");
    }

    #[tokio::test]
    async fn test_resume_and_done_unknown_job_texts() {
        let (_, body) = extract(PipeError::ResumeUnknownJob.into_response()).await;
        assert_eq!(body, "cannot call resume on job which doesn't exist");
        let (_, body) = extract(PipeError::DoneUnknownJob.into_response()).await;
        assert_eq!(body, "cannot call done on job which doesn't exist");
    }

    #[tokio::test]
    async fn test_process_error_passes_text_through() {
        let err = PipeError::Process("command exited with exit status: 2".into());
        let (status, body) = extract(err.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "command exited with exit status: 2");
    }
}
