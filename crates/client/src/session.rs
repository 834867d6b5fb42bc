//! HTTP session driver: one request per protocol operation.

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use thiserror::Error;
use uuid::Uuid;

use rpipe_protocol as protocol;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-200 status; the body carries its
    /// explanation. For uploads this means zero bytes of the chunk were
    /// consumed.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("unexpected {endpoint} response body: {body:?}")]
    UnexpectedBody {
        endpoint: &'static str,
        body: String,
    },
}

/// A connection to one rpiped server: base URL plus the extra headers
/// applied to every request.
pub struct Session {
    http: reqwest::Client,
    base: String,
}

impl Session {
    /// `extra_headers` become default headers on every request. No request
    /// timeout is set: chunks may legitimately take arbitrarily long.
    pub fn new(base_url: &str, extra_headers: HeaderMap) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .default_headers(extra_headers)
            .user_agent("rpipe")
            .build()?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// POST /new: start a job running `command`. The response body is the
    /// job id and must parse as a UUID.
    pub async fn new_job(&self, command: &str) -> Result<String, SessionError> {
        let response = self
            .http
            .post(self.endpoint(protocol::NEW_PATH))
            .header(protocol::COMMAND_HEADER, command)
            .send()
            .await
            .map_err(|source| SessionError::Transport {
                endpoint: protocol::NEW_PATH,
                source,
            })?;
        let body = read_body(protocol::NEW_PATH, response).await?;
        if Uuid::parse_str(&body).is_err() {
            return Err(SessionError::UnexpectedBody {
                endpoint: protocol::NEW_PATH,
                body,
            });
        }
        Ok(body)
    }

    /// GET /resume: the server's `bytes_processed` for the job, the safe
    /// offset to restart uploading from.
    pub async fn resume(&self, job_id: &str) -> Result<u64, SessionError> {
        let response = self
            .http
            .get(self.endpoint(protocol::RESUME_PATH))
            .header(protocol::JOB_HEADER, job_id)
            .send()
            .await
            .map_err(|source| SessionError::Transport {
                endpoint: protocol::RESUME_PATH,
                source,
            })?;
        let body = read_body(protocol::RESUME_PATH, response).await?;
        protocol::parse_byte_count(&body).ok_or(SessionError::UnexpectedBody {
            endpoint: protocol::RESUME_PATH,
            body,
        })
    }

    /// POST /upload: one chunk. `Chunk-Size` always reports the true byte
    /// count being sent.
    pub async fn upload(&self, job_id: &str, chunk: Vec<u8>) -> Result<(), SessionError> {
        let chunk_len = chunk.len();
        let response = self
            .http
            .post(self.endpoint(protocol::UPLOAD_PATH))
            .header(protocol::JOB_HEADER, job_id)
            .header(protocol::CHUNK_SIZE_HEADER, chunk_len)
            .header(CONTENT_TYPE, protocol::OCTET_STREAM)
            .body(chunk)
            .send()
            .await
            .map_err(|source| SessionError::Transport {
                endpoint: protocol::UPLOAD_PATH,
                source,
            })?;
        expect_ok(protocol::UPLOAD_PATH, response).await
    }

    /// POST /done: close the job's stdin and reap the command.
    pub async fn done(&self, job_id: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .post(self.endpoint(protocol::DONE_PATH))
            .header(protocol::JOB_HEADER, job_id)
            .send()
            .await
            .map_err(|source| SessionError::Transport {
                endpoint: protocol::DONE_PATH,
                source,
            })?;
        expect_ok(protocol::DONE_PATH, response).await
    }
}

async fn read_body(endpoint: &'static str, response: Response) -> Result<String, SessionError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| SessionError::Transport { endpoint, source })?;
    if !status.is_success() {
        return Err(SessionError::Status {
            endpoint,
            status,
            body,
        });
    }
    Ok(body)
}

async fn expect_ok(endpoint: &'static str, response: Response) -> Result<(), SessionError> {
    let body = read_body(endpoint, response).await?;
    if body != protocol::OK_BODY {
        return Err(SessionError::UnexpectedBody { endpoint, body });
    }
    Ok(())
}
