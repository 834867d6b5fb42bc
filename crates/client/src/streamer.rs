//! Drives a job through `create → upload* → done` with resumption.
//!
//! The committed cursor advances only when the server acknowledges a
//! chunk; everything else — transport failures, 500s, lost responses — is
//! reconciled against the server's `bytes_processed` counter before any
//! byte is re-sent.

use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::backoff::Backoff;
use crate::chunk::ChunkBuffer;
use crate::session::{Session, SessionError};

#[derive(Debug, Error)]
pub enum StreamError {
    /// The local input failed or ended early; the stream cannot be
    /// re-read, so this is not retryable.
    #[error("reading input: {0}")]
    Input(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server's counter went backwards relative to bytes it already
    /// acknowledged; resuming would corrupt the stream.
    #[error("server reports {server} bytes processed but {committed} were committed locally")]
    CursorMismatch { server: u64, committed: u64 },
}

#[derive(Debug)]
pub struct StreamSummary {
    pub job_id: String,
    pub bytes_committed: u64,
}

pub struct Streamer {
    session: Session,
    chunk_size: usize,
}

impl Streamer {
    pub fn new(session: Session, chunk_size: usize) -> Self {
        Self {
            session,
            chunk_size,
        }
    }

    /// Run the full lifecycle, reading the payload from `input`.
    ///
    /// With `resume_job_id` the server's counter decides how many leading
    /// bytes of `input` to discard; otherwise a fresh job is created.
    pub async fn run<R>(
        &self,
        input: R,
        command: &str,
        resume_job_id: Option<&str>,
    ) -> Result<StreamSummary, StreamError>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunks = ChunkBuffer::new(input, self.chunk_size);

        let (job_id, skip) = match resume_job_id {
            None => {
                let id = self.session.new_job(command).await?;
                info!(job_id = %id, command, "created job");
                (id, 0)
            }
            Some(id) => {
                let skip = self.session.resume(id).await?;
                info!(job_id = %id, skip, "resuming job");
                (id.to_string(), skip)
            }
        };

        if skip > 0 {
            chunks.discard(skip).await?;
        }
        let mut committed = skip;

        let mut backoff = Backoff::new();
        loop {
            match self.upload_pass(&job_id, &mut chunks, &mut committed).await {
                Ok(()) => break,
                Err(StreamError::Session(err)) => {
                    warn!(job_id, error = %err, "upload pass failed");
                    // Reconcile before re-sending anything: a write may
                    // have landed even though its response was lost.
                    loop {
                        tokio::time::sleep(backoff.next_delay()).await;
                        match self.resync(&job_id, &mut chunks, &mut committed).await {
                            Ok(()) => break,
                            Err(StreamError::Session(err)) => {
                                warn!(job_id, error = %err, "resume reconciliation failed");
                            }
                            Err(fatal) => return Err(fatal),
                        }
                    }
                    backoff.reset();
                }
                Err(fatal) => return Err(fatal),
            }
        }

        let mut backoff = Backoff::new();
        loop {
            match self.session.done(&job_id).await {
                Ok(()) => break,
                Err(err @ SessionError::Status { .. }) => {
                    // The server processed the request and refused it (the
                    // command exited non-zero, say); retrying cannot change
                    // the outcome.
                    return Err(StreamError::Session(err));
                }
                Err(err) => {
                    warn!(job_id, error = %err, "done not acknowledged");
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
        }

        info!(job_id, bytes = committed, "file transfer complete");
        Ok(StreamSummary {
            job_id,
            bytes_committed: committed,
        })
    }

    /// Upload until end-of-stream. Bytes are consumed from the framer only
    /// after the server's `ok`, so any failure leaves the in-flight chunk
    /// peekable for the next pass.
    async fn upload_pass<R>(
        &self,
        job_id: &str,
        chunks: &mut ChunkBuffer<R>,
        committed: &mut u64,
    ) -> Result<(), StreamError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let chunk = chunks.peek().await?;
            if chunk.is_empty() {
                return Ok(());
            }
            let chunk_len = chunk.len();
            self.session.upload(job_id, chunk.to_vec()).await?;
            chunks.consume(chunk_len);
            *committed += chunk_len as u64;
            info!(job_id, chunk_bytes = chunk_len, total = *committed, "uploaded chunk");
        }
    }

    /// Align the local cursor with the server's counter at the start of a
    /// retry pass. If the server is ahead, the last chunk landed but its
    /// response was lost: discard it locally instead of re-sending.
    async fn resync<R>(
        &self,
        job_id: &str,
        chunks: &mut ChunkBuffer<R>,
        committed: &mut u64,
    ) -> Result<(), StreamError>
    where
        R: AsyncRead + Unpin,
    {
        let server = self.session.resume(job_id).await?;
        if server < *committed {
            return Err(StreamError::CursorMismatch {
                server,
                committed: *committed,
            });
        }
        if server > *committed {
            info!(job_id, skip = server - *committed, "server is ahead, discarding acknowledged bytes");
            chunks.discard(server - *committed).await?;
            *committed = server;
        }
        Ok(())
    }
}
