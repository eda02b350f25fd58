//! HTTP API server for ingesting videos and asking questions about them.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::{Result, TubesageError};
use crate::orchestrator::Orchestrator;
use crate::session::DEFAULT_SESSION_ID;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared state for the HTTP server.
pub struct AppState {
    orchestrator: Orchestrator,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let request_timeout = Duration::from_secs(orchestrator.settings().server.request_timeout_secs);
        Self {
            orchestrator,
            request_timeout,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubesage doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let idle_ttl = Duration::from_secs(settings.session.idle_ttl_secs);
    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState::new(orchestrator));

    spawn_session_sweeper(state.clone(), idle_ttl);

    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Tubesage API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    Output::info("Endpoints:");
    Output::kv("POST /transcribe", "Fetch captions and summarize a video");
    Output::kv("POST /query", "Ask a question about the current video");
    Output::kv("GET  /health", "Health check");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/transcribe", post(transcribe))
        .route("/query", post(query))
        .layer(cors)
        .with_state(state)
}

fn spawn_session_sweeper(state: Arc<AppState>, idle_ttl: Duration) {
    let period = idle_ttl.max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = state.orchestrator.sessions().evict_idle().await;
            if evicted > 0 {
                info!("Evicted {} idle session(s)", evicted);
            }
        }
    });
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    #[serde(rename = "videoURL")]
    pub video_url: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub summary: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub result: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

// Handlers

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn transcribe(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TranscribeRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_json(rejection),
    };

    let Some(url) = non_empty(req.video_url) else {
        return error_response(StatusCode::BAD_REQUEST, "No video URL provided");
    };
    let session_id = session_or_default(req.session_id);

    let ingest = state.orchestrator.ingest(&session_id, &url);
    match with_timeout(state.request_timeout, ingest).await {
        Ok(result) => (
            StatusCode::OK,
            Json(TranscribeResponse {
                summary: result.summary,
                session_id,
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}

async fn query(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_json(rejection),
    };

    let Some(question) = non_empty(req.query) else {
        return error_response(StatusCode::BAD_REQUEST, "No query provided");
    };
    let session_id = session_or_default(req.session_id);

    let ask = state.orchestrator.ask(&session_id, &question);
    match with_timeout(state.request_timeout, ask).await {
        Ok(result) => (StatusCode::OK, Json(QueryResponse { result })).into_response(),
        Err(response) => response,
    }
}

// Helpers

async fn with_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T>>,
) -> std::result::Result<T, Response> {
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            let status = status_for(&e);
            if status.is_server_error() {
                warn!("Request failed: {}", e);
            }
            Err(error_response(status, &e.to_string()))
        }
        Err(_) => {
            warn!("Request timed out after {:?}", limit);
            Err(error_response(
                StatusCode::GATEWAY_TIMEOUT,
                &format!("Request timed out after {} seconds", limit.as_secs()),
            ))
        }
    }
}

fn status_for(err: &TubesageError) -> StatusCode {
    match err {
        TubesageError::InvalidUrl(_) | TubesageError::InvalidIdLength(_) => StatusCode::BAD_REQUEST,
        TubesageError::NoTranscript => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn bad_json(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(StatusCode::BAD_REQUEST, "No JSON data provided")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn session_or_default(session_id: Option<String>) -> String {
    non_empty(session_id).unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::{CaptionSource, CaptionTrack};
    use crate::config::Prompts;
    use crate::testing::{FakeEmbedder, ScriptedModel, StaticCaptionSource};
    use crate::video_id::VideoReference;
    use async_trait::async_trait;
    use serde_json::Value;

    const URL: &str = "https://youtu.be/dQw4w9WgXcQ?t=5";

    fn app_state(source: Arc<dyn CaptionSource>) -> AppState {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            source,
            Arc::new(FakeEmbedder::new()),
            Arc::new(ScriptedModel::answering("A short summary.")),
        );
        AppState::new(orchestrator)
    }

    fn state(source: StaticCaptionSource) -> Arc<AppState> {
        Arc::new(app_state(Arc::new(source)))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn transcribe_req(url: Option<&str>, session: Option<&str>) -> Json<TranscribeRequest> {
        Json(TranscribeRequest {
            video_url: url.map(String::from),
            session_id: session.map(String::from),
        })
    }

    fn query_req(query: Option<&str>, session: Option<&str>) -> Json<QueryRequest> {
        Json(QueryRequest {
            query: query.map(String::from),
            session_id: session.map(String::from),
        })
    }

    #[tokio::test]
    async fn test_health() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_transcribe_then_query() {
        let state = state(StaticCaptionSource::text("Captions about Rust lifetimes."));

        let response = transcribe(State(state.clone()), Ok(transcribe_req(Some(URL), None))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["summary"], "A short summary.");
        assert_eq!(body["sessionId"], "default");

        let response = query(State(state), Ok(query_req(Some("lifetimes?"), None))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"], "A short summary.");
    }

    #[tokio::test]
    async fn test_transcribe_echoes_session_id() {
        let state = state(StaticCaptionSource::text("captions"));
        let response =
            transcribe(State(state), Ok(transcribe_req(Some(URL), Some("tab-42")))).await;
        assert_eq!(body_json(response).await["sessionId"], "tab-42");
    }

    #[tokio::test]
    async fn test_missing_fields_are_bad_requests() {
        let state = state(StaticCaptionSource::text("captions"));

        let response = transcribe(State(state.clone()), Ok(transcribe_req(None, None))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No video URL provided");

        let response = query(State(state), Ok(query_req(Some("   "), None))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No query provided");
    }

    #[tokio::test]
    async fn test_invalid_url_is_bad_request() {
        let state = state(StaticCaptionSource::text("captions"));
        let response =
            transcribe(State(state), Ok(transcribe_req(Some("https://example.com"), None))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_captions_disabled_message() {
        let state = state(StaticCaptionSource::failing(|| TubesageError::CaptionsDisabled));
        let response = transcribe(State(state), Ok(transcribe_req(Some(URL), None))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "error": "Transcripts are disabled for this video." })
        );
    }

    #[tokio::test]
    async fn test_query_without_transcript_is_conflict() {
        let state = state(StaticCaptionSource::text("captions"));
        let response = query(State(state), Ok(query_req(Some("anything?"), Some("fresh")))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "No transcript available");
    }

    struct SlowSource;

    #[async_trait]
    impl CaptionSource for SlowSource {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch_track(&self, _video: &VideoReference) -> Result<CaptionTrack> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CaptionTrack::Fragments(vec!["late".to_string()]))
        }
    }

    #[tokio::test]
    async fn test_slow_ingest_times_out() {
        let state = Arc::new(app_state(Arc::new(SlowSource)).with_timeout(Duration::from_millis(20)));
        let response = transcribe(State(state), Ok(transcribe_req(Some(URL), None))).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(status_for(&TubesageError::InvalidIdLength(3)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&TubesageError::NoTranscript), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&TubesageError::QueryFailed("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let value = with_timeout(Duration::from_secs(1), async { Ok::<_, TubesageError>(1) })
            .await
            .ok();
        assert_eq!(value, Some(1));
    }
}
