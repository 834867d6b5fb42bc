//! rpipe client library.
//!
//! Streams a local byte source over HTTP into a shell command running on a
//! rpiped server: frame stdin into chunks, drive the job through
//! `create → upload* → done`, and resume across transport failures without
//! duplicating or losing bytes.

pub mod backoff;
pub mod chunk;
pub mod headers;
pub mod session;
pub mod streamer;

pub use backoff::Backoff;
pub use chunk::ChunkBuffer;
pub use headers::parse_extra_headers;
pub use session::{Session, SessionError};
pub use streamer::{StreamError, StreamSummary, Streamer};
