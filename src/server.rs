//! src/server.rs
//!
//! HTTP front for the sandbox.
//!
//! Every `/run` answer is `200 {"output": ...}`; failures are reported in-band.

use crate::sandbox::{ExecutionRequest, Sandbox};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sandbox: Arc<Sandbox>,
}

impl AppState {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/run", post(run_code))
        .route("/versions", get(versions))
        .with_state(state)
}

/// GET /
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /run
pub async fn run_code(
    State(state): State<AppState>,
    Json(request): Json<ExecutionRequest>,
) -> Json<RunResponse> {
    let result = state.sandbox.run(request).await;
    Json(RunResponse {
        output: result.render(),
    })
}

/// GET /versions
pub async fn versions(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.sandbox.versions().await)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::languages::{LanguageRegistry, LanguageSpec};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for `oneshot`

    fn app(dir: &std::path::Path) -> Router {
        let config = SandboxConfig {
            timeout_seconds: 2,
            max_concurrent: 2,
            work_dir: dir.to_path_buf(),
            ..SandboxConfig::default()
        };
        let registry = LanguageRegistry::new(vec![
            LanguageSpec::new("shell", "sh", "sh")
                .with_version_args(&["-c", "echo sh-test"])
                .with_fallback_version("POSIX sh"),
        ]);
        create_router(AppState::new(Sandbox::new(config, registry).unwrap()))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn run_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn run_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(run_request(serde_json::json!({
                "code": "printf hello",
                "language": "shell"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["output"], "hello");
    }

    #[tokio::test]
    async fn errors_are_reported_in_band() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(dir.path());

        let response = router
            .clone()
            .oneshot(run_request(serde_json::json!({
                "code": "print('x')",
                "language": "brainfuck"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["output"],
            "Error: Language 'brainfuck' is not supported."
        );

        let response = router
            .oneshot(run_request(serde_json::json!({
                "code": "echo nope >&2; exit 1",
                "language": "shell"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["output"], "Execution Error:\nnope");
    }

    #[tokio::test]
    async fn versions_lists_every_language() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::builder().uri("/versions").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"shell": "sh-test"}));
    }

    #[tokio::test]
    async fn root_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "exec-sandbox");
    }
}
