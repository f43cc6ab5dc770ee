//! REST API Server for the debt market dashboard
//!
//! Exposes the dashboard orchestrator, analyst chat and image studio via HTTP
//! endpoints for the frontend UI.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::ChatRegistry;
use crate::dashboard::Dashboard;
use crate::error::DashboardError;
use crate::image::DOWNLOAD_FILE_NAME;
use crate::models::ImageSize;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub chat_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub size: ImageSize,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, message: impl ToString) -> ApiResult {
    (status, Json(ApiResponse::error(message.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub dashboard: Arc<Dashboard>,
    pub chats: Arc<ChatRegistry>,
}

/// =============================
/// Helpers: Chat Ids
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Client ids that are not UUIDs map to a stable derived id; a missing id
/// starts a fresh session.
fn resolve_chat_id(value: Option<&str>) -> Uuid {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v)),
        _ => Uuid::new_v4(),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "chat_sessions": state.chats.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Dashboard Endpoints
/// =============================

async fn get_dashboard(State(state): State<ApiState>) -> ApiResult {
    ok(state.dashboard.snapshot().await)
}

async fn run_sync(State(state): State<ApiState>) -> ApiResult {
    info!("Received sync request");
    ok(state.dashboard.sync().await)
}

async fn weekly_report(State(state): State<ApiState>) -> ApiResult {
    info!("Received weekly report request");
    ok(state.dashboard.generate_weekly_report().await)
}

async fn analyze(State(state): State<ApiState>, Json(req): Json<AnalyzeRequest>) -> ApiResult {
    match state.dashboard.analyze(&req.query).await {
        Some(answer) => ok(serde_json::json!({ "answer": answer })),
        None => fail(StatusCode::BAD_REQUEST, "Query must not be empty"),
    }
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiResult {
    if req.message.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    let chat_id = resolve_chat_id(req.chat_id.as_deref());
    let handle = state.chats.get_or_create(chat_id).await;

    // One turn at a time per session
    let Ok(mut session) = Arc::clone(&handle.session).try_lock_owned() else {
        return fail(
            StatusCode::CONFLICT,
            DashboardError::ChatBusy(chat_id.to_string()),
        );
    };

    info!(%chat_id, "Chat turn received");

    // The turn runs detached so a dropped request cannot cut the reply short
    let message = req.message;
    let turn = tokio::spawn(async move { session.send(&message).await });

    match turn.await {
        Ok(messages) => ok(serde_json::json!({
            "chat_id": chat_id.to_string(),
            "messages": messages,
        })),
        Err(e) => {
            error!(%chat_id, "Chat turn aborted: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn get_chat(State(state): State<ApiState>, Path(chat_id): Path<String>) -> ApiResult {
    let chat_id = resolve_chat_id(Some(&chat_id));
    match state.chats.get(chat_id).await {
        Some(handle) => ok(serde_json::json!({
            "chat_id": chat_id.to_string(),
            "messages": handle.transcript(),
        })),
        None => fail(
            StatusCode::NOT_FOUND,
            DashboardError::ChatNotFound(chat_id.to_string()),
        ),
    }
}

/// =============================
/// Image Endpoints
/// =============================

async fn generate_image(State(state): State<ApiState>, Json(req): Json<ImageRequest>) -> ApiResult {
    if req.prompt.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Prompt must not be empty");
    }
    ok(state.dashboard.generate_image(&req.prompt, req.size).await)
}

async fn download_image(State(state): State<ApiState>) -> Response {
    let Some(image) = state.dashboard.image().await else {
        return fail(StatusCode::NOT_FOUND, DashboardError::NoImageGenerated).into_response();
    };

    match image.bytes() {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, image.mime_type.clone()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
                ),
            ],
            Body::from(bytes),
        )
            .into_response(),
        Err(e) => {
            error!("Image decode failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// =============================
/// Key Endpoints
/// =============================

async fn key_status(State(state): State<ApiState>) -> ApiResult {
    ok(serde_json::json!({ "has_key": state.dashboard.check_key().await }))
}

async fn select_key(State(state): State<ApiState>) -> ApiResult {
    ok(serde_json::json!({ "has_key": state.dashboard.select_key().await }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(dashboard: Arc<Dashboard>, chats: Arc<ChatRegistry>) -> Router {
    let state = ApiState { dashboard, chats };

    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/sync", post(run_sync))
        .route("/api/weekly-report", post(weekly_report))
        .route("/api/analyze", post(analyze))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/:chat_id", get(get_chat))
        .route("/api/image", post(generate_image))
        .route("/api/image/download", get(download_image))
        .route("/api/key", get(key_status).post(select_key))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    dashboard: Arc<Dashboard>,
    chats: Arc<ChatRegistry>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(dashboard, chats);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::chat::{DEFAULT_CHAT_IDLE_TTL, DEFAULT_MAX_CHAT_SESSIONS};
    use crate::gateway::{GenerateResponse, MockGateway};
    use crate::keys::{ApiKey, EnvKeySelector};
    use crate::reports::ReportService;
    use axum::http::Request;
    use futures::StreamExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router_with(gateway: MockGateway, max_sessions: usize) -> (Router, Arc<ChatRegistry>) {
        let gateway = Arc::new(gateway);
        let models = ModelConfig::default();
        let chats = Arc::new(
            ChatRegistry::new(gateway.clone(), models.reasoning.clone())
                .with_limits(max_sessions, DEFAULT_CHAT_IDLE_TTL),
        );
        let selector = Arc::new(EnvKeySelector::new(ApiKey::new("AIza-test")));
        let dashboard = Arc::new(Dashboard::new(ReportService::new(gateway, models), selector));
        (create_router(dashboard, chats.clone()), chats)
    }

    fn router() -> Router {
        router_with(MockGateway::offline(), DEFAULT_MAX_CHAT_SESSIONS).0
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_stable_chat_ids() {
        let id = Uuid::new_v4();
        assert_eq!(resolve_chat_id(Some(&id.to_string())), id);
        assert_eq!(resolve_chat_id(Some("desk-1")), resolve_chat_id(Some("desk-1")));
        assert_ne!(resolve_chat_id(Some("desk-1")), resolve_chat_id(Some("desk-2")));
        assert_eq!(resolve_chat_id(Some("desk-1")).get_version_num(), 4);
        assert_ne!(resolve_chat_id(None), resolve_chat_id(Some("  ")));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&router(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_sync_then_dashboard() {
        let router = router();
        let (status, body) = call(&router, "GET", "/api/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["economic"]["state"], "idle");

        let (status, body) = call(&router, "POST", "/api/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["news"]["state"], "ready");
        assert_eq!(body["data"]["cards"][0]["title"], "LKR/USD (Spot)");
        assert!(body["data"]["last_synced"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_query() {
        let router = router();
        let (status, body) =
            call(&router, "POST", "/api/analyze", Some(serde_json::json!({ "query": " " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = call(
            &router,
            "POST",
            "/api/analyze",
            Some(serde_json::json!({ "query": "Impact of USD rate on T-bond demand" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["answer"].is_string());
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let router = router();
        let (status, body) = call(
            &router,
            "POST",
            "/api/chat",
            Some(serde_json::json!({ "chat_id": "desk-1", "message": "SLFR today?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "model");

        let chat_id = body["data"]["chat_id"].as_str().unwrap().to_string();
        let (status, body) = call(&router, "GET", &format!("/api/chat/{}", chat_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 3);

        let (status, _) = call(&router, "GET", &format!("/api/chat/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_image_generate_and_download() {
        let router = router();
        let (status, _) = call(&router, "GET", "/api/image/download", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &router,
            "POST",
            "/api/image",
            Some(serde_json::json!({ "prompt": "yield curve", "size": "2K" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["phase"], "done");
        assert_eq!(body["data"]["size"], "2K");

        let request = Request::builder()
            .uri("/api/image/download")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"market-visual.png\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_key_status() {
        let router = router();
        let (status, body) = call(&router, "GET", "/api/key", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["has_key"], true);

        let (status, body) = call(&router, "POST", "/api/key", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["has_key"], true);
    }

    #[tokio::test]
    async fn test_chat_turn_survives_dropped_request() {
        let gateway = MockGateway::offline().with_live_stream(|_| {
            let chunks = async_stream::stream! {
                tokio::time::sleep(Duration::from_millis(100)).await;
                yield Ok::<_, DashboardError>(GenerateResponse::from_text("Part one. "));
                tokio::time::sleep(Duration::from_millis(100)).await;
                yield Ok(GenerateResponse::from_text("Part two."));
            };
            Ok(chunks.boxed())
        });
        let (router, _) = router_with(gateway, DEFAULT_MAX_CHAT_SESSIONS);
        let chat_id = Uuid::new_v4();

        let request = chat_request(serde_json::json!({
            "chat_id": chat_id.to_string(),
            "message": "outlook?",
        }));
        let dropped =
            tokio::time::timeout(Duration::from_millis(150), router.clone().oneshot(request)).await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let (status, body) = call(&router, "GET", &format!("/api/chat/{}", chat_id), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["text"], "outlook?");
        assert_eq!(messages[2]["text"], "Part one. Part two.");
    }

    #[tokio::test]
    async fn test_concurrent_send_to_same_chat_conflicts() {
        let (router, chats) = router_with(MockGateway::offline(), DEFAULT_MAX_CHAT_SESSIONS);
        let chat_id = Uuid::new_v4();
        let handle = chats.get_or_create(chat_id).await;
        let body = serde_json::json!({ "chat_id": chat_id.to_string(), "message": "SLFR?" });

        let turn = handle.session.lock().await;
        let (status, response) = call(&router, "POST", "/api/chat", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().starts_with("Chat session busy"));
        drop(turn);

        let (status, _) = call(&router, "POST", "/api/chat", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(handle.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_anonymous_chats_are_capped() {
        let (router, chats) = router_with(MockGateway::offline(), 4);
        for _ in 0..20 {
            let (status, _) =
                call(&router, "POST", "/api/chat", Some(serde_json::json!({ "message": "hi" }))).await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(chats.len().await, 4);
        let (_, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(body["chat_sessions"], 4);
    }
}
