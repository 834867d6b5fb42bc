//! rpiped server library.
//!
//! Axum-based HTTP daemon implementing the remote-pipe job API: `/new`
//! spawns a shell command per job, `/upload` feeds chunks into its stdin,
//! `/resume` reports the durable byte offset, `/done` closes stdin and
//! reaps the subprocess. A second router serves metrics and debug
//! endpoints so long-running uploads cannot starve observability.

pub mod error;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::{PipeError, PipeResult};
pub use jobs::{DoneOutcome, JobEntry, JobRegistry, JobSnapshot, JobState};
pub use metrics::{init_metrics, render_metrics};
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the job API router served on `--bind`.
///
/// The body limit is disabled because chunk sizes are chosen by the client
/// and `Chunk-Size` is validated per request. `timeout`, when set, applies
/// uniformly to every request; `None` is the normal operating mode since
/// chunks may take arbitrarily long to upload.
pub fn job_api(state: Arc<AppState>, timeout: Option<Duration>) -> Router {
    let mut router = routes::pipe::router()
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http());
    if let Some(timeout) = timeout {
        router = router.layer(TimeoutLayer::new(timeout));
    }
    router.with_state(state)
}

/// Create the metrics/debug router served on `--metrics`.
pub fn observability_api(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::metrics::router())
        .merge(routes::health::router())
        .merge(routes::debug::router())
        .with_state(state)
}
