//! Registry introspection for the metrics listener.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::jobs::JobSnapshot;
use crate::state::AppState;

/// GET /debug/jobs - snapshot of every registered job.
///
/// Reads the lock-free progress mirrors, so a job mid-upload shows its
/// last acknowledged offset rather than blocking the listener.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSnapshot>> {
    Json(state.registry.snapshot())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/debug/jobs", get(list_jobs))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::state::AppState;

    #[tokio::test]
    async fn test_list_jobs_empty() {
        let app = crate::observability_api(AppState::new());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/debug/jobs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert!(json.is_empty());
    }

    #[tokio::test]
    async fn test_list_jobs_reports_registered_job() {
        let state = AppState::new();
        let entry = crate::jobs::JobEntry::spawn("cat > /dev/null").unwrap();
        let id = entry.id();
        let entry = std::sync::Arc::new(entry);
        state.registry.insert(entry.clone());

        let app = crate::observability_api(state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/debug/jobs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["id"], id.to_string());
        assert_eq!(json[0]["state"], "running");

        let _ = entry.finish().await;
        state.registry.remove(&id);
    }
}
