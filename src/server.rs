//! Web UI and JSON API server.
//!
//! Serves the three pages rendered by [`render`](crate::render) plus a small
//! JSON mirror of the same operations. Navigation state travels with each
//! request (`?page=` on `GET /`, a hidden `page` field on form posts) and is
//! handed to the [`PageController`] explicitly.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/?page=chat\|history\|sample_data` | Render a page |
//! | `POST` | `/chat/ask` | Submit a question (form: `page`, `question`) |
//! | `POST` | `/history/feedback` | Set feedback (form: `page`, `id`, `value`) |
//! | `POST` | `/samples/create` | Add a sample (form: `page`, `question`, `answer`) |
//! | `POST` | `/samples/update` | Edit a sample (form: `page`, `id`, `question`, `answer`) |
//! | `POST` | `/samples/delete` | Delete a sample (form: `page`, `id`) |
//! | `POST` | `/api/chat` | JSON `{ "question" }` → `{ "turn" }` |
//! | `GET`  | `/api/turns` | All turns, newest first |
//! | `POST` | `/api/turns/{id}/feedback` | JSON `{ "value" }` |
//! | `GET`  | `/api/samples` | All sample records |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! HTML pages always answer `200` and report problems as inline banners.
//! JSON endpoints use:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "turn not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `generation_failed` (502), `internal` (500).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::controller::{NavigationState, PageController, UiEvent};
use crate::error::{ChatError, GenerationError, StoreError};
use crate::models::{ConversationTurn, Feedback, SampleRecord};
use crate::render::render_page;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    controller: Arc<PageController>,
}

/// Starts the web UI server.
///
/// Binds to `[server].bind` and runs until the process is terminated. Returns
/// an error if startup (store, generator) or binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let controller = PageController::from_config(config).await?;
    let app = build_router(Arc::new(controller));

    info!(bind = %config.server.bind, "web UI listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full route table. Exposed for in-process tests.
pub fn build_router(controller: Arc<PageController>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_page))
        .route("/chat/ask", post(handle_ask))
        .route("/history/feedback", post(handle_feedback))
        .route("/samples/create", post(handle_sample_create))
        .route("/samples/update", post(handle_sample_update))
        .route("/samples/delete", post(handle_sample_delete))
        .route("/api/chat", post(handle_api_chat))
        .route("/api/turns", get(handle_api_turns))
        .route("/api/turns/{id}/feedback", post(handle_api_feedback))
        .route("/api/samples", get(handle_api_samples))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { controller })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::Storage(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Store(e) => e.into(),
            ChatError::Generation(e @ GenerationError::InvalidRequest(_)) => {
                bad_request(e.to_string())
            }
            ChatError::Generation(e) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "generation_failed".to_string(),
                message: e.to_string(),
            },
        }
    }
}

/// Unknown page names fall back to the chat page, the session start state.
fn parse_nav(raw: Option<&str>) -> NavigationState {
    raw.and_then(|p| p.parse().ok()).unwrap_or_default()
}

async fn render(state: &AppState, nav: NavigationState, event: UiEvent) -> Html<String> {
    let page = state.controller.handle(nav, event).await;
    Html(render_page(&page))
}

// ============ HTML pages ============

#[derive(Deserialize)]
struct PageQuery {
    page: Option<String>,
}

/// Handler for `GET /`. A `page` parameter is a page-selection event.
async fn handle_page(State(state): State<AppState>, Query(q): Query<PageQuery>) -> Html<String> {
    let event = match q.page.as_deref() {
        Some(raw) => UiEvent::SelectPage(parse_nav(Some(raw))),
        None => UiEvent::Show,
    };
    render(&state, NavigationState::Chat, event).await
}

#[derive(Deserialize)]
struct AskForm {
    page: Option<String>,
    question: String,
}

async fn handle_ask(State(state): State<AppState>, Form(form): Form<AskForm>) -> Html<String> {
    let event = UiEvent::SubmitQuestion {
        question: form.question,
    };
    render(&state, parse_nav(form.page.as_deref()), event).await
}

#[derive(Deserialize)]
struct FeedbackForm {
    page: Option<String>,
    id: i64,
    value: Feedback,
}

async fn handle_feedback(
    State(state): State<AppState>,
    Form(form): Form<FeedbackForm>,
) -> Html<String> {
    let event = UiEvent::SetFeedback {
        id: form.id,
        value: form.value,
    };
    render(&state, parse_nav(form.page.as_deref()), event).await
}

#[derive(Deserialize)]
struct SampleForm {
    page: Option<String>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

async fn handle_sample_create(
    State(state): State<AppState>,
    Form(form): Form<SampleForm>,
) -> Html<String> {
    let event = UiEvent::CreateSample {
        question: form.question,
        answer: form.answer,
    };
    render(&state, parse_nav(form.page.as_deref()), event).await
}

async fn handle_sample_update(
    State(state): State<AppState>,
    Form(form): Form<SampleForm>,
) -> Result<Html<String>, AppError> {
    let id = form.id.ok_or_else(|| bad_request("id is required"))?;
    let event = UiEvent::UpdateSample {
        id,
        question: form.question,
        answer: form.answer,
    };
    Ok(render(&state, parse_nav(form.page.as_deref()), event).await)
}

async fn handle_sample_delete(
    State(state): State<AppState>,
    Form(form): Form<SampleForm>,
) -> Result<Html<String>, AppError> {
    let id = form.id.ok_or_else(|| bad_request("id is required"))?;
    Ok(render(&state, parse_nav(form.page.as_deref()), UiEvent::DeleteSample { id }).await)
}

// ============ JSON API ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    turn: ConversationTurn,
}

/// Handler for `POST /api/chat`.
async fn handle_api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let turn = state.controller.ask(&req.question).await?;
    Ok(Json(ChatResponse { turn }))
}

#[derive(Serialize)]
struct TurnsResponse {
    turns: Vec<ConversationTurn>,
}

async fn handle_api_turns(State(state): State<AppState>) -> Result<Json<TurnsResponse>, AppError> {
    let turns = state.controller.store().list_turns().await?;
    Ok(Json(TurnsResponse { turns }))
}

#[derive(Deserialize)]
struct FeedbackRequest {
    value: Feedback,
}

/// Handler for `POST /api/turns/{id}/feedback`. Returns the updated turn.
async fn handle_api_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<ConversationTurn>, AppError> {
    let store = state.controller.store();
    store.set_feedback(id, req.value).await?;
    Ok(Json(store.get_turn(id).await?))
}

#[derive(Serialize)]
struct SamplesResponse {
    samples: Vec<SampleRecord>,
}

async fn handle_api_samples(
    State(state): State<AppState>,
) -> Result<Json<SamplesResponse>, AppError> {
    let samples = state.controller.store().list_samples().await?;
    Ok(Json(SamplesResponse { samples }))
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    model: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.controller.generator().model_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationConfig, MetricsConfig};
    use crate::generation::tests::StubGenerator;
    use crate::generation::Generator;
    use crate::metrics::initialize_metrics;
    use crate::store::tests::test_store;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app(stub: StubGenerator) -> (TempDir, Arc<PageController>, Router) {
        let (tmp, store) = test_store().await;
        let controller = Arc::new(PageController::new(
            store,
            Generator::new(Box::new(stub)),
            initialize_metrics(&MetricsConfig::default()).ok(),
            &GenerationConfig::default(),
        ));
        let app = build_router(controller.clone());
        (tmp, controller, app)
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_defaults_to_chat() {
        let (_tmp, _controller, app) = test_app(StubGenerator::replying("x")).await;

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("value=\"chat\" checked"));
        assert!(html.contains("action=\"/chat/ask\""));
    }

    #[tokio::test]
    async fn test_page_selection() {
        let (_tmp, _controller, app) = test_app(StubGenerator::replying("x")).await;

        let req = Request::builder()
            .uri("/?page=history")
            .body(Body::empty())
            .unwrap();
        let html = body_text(app.oneshot(req).await.unwrap()).await;
        assert!(html.contains("value=\"history\" checked"));
        assert!(html.contains("No conversation history yet."));
    }

    #[tokio::test]
    async fn test_ask_form_persists_and_renders_answer() {
        let (_tmp, controller, app) = test_app(StubGenerator::replying("reply")).await;

        let response = app
            .oneshot(form_request("/chat/ask", "page=chat&question=hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("hello reply"));
        assert_eq!(controller.store().count_turns().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ask_form_generation_failure_is_inline() {
        let (_tmp, controller, app) = test_app(StubGenerator::failing("boom")).await;

        let response = app
            .oneshot(form_request("/chat/ask", "page=chat&question=hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("banner error"));
        assert!(html.contains("boom"));
        assert_eq!(controller.store().count_turns().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sample_create_form() {
        let (_tmp, controller, app) = test_app(StubGenerator::replying("x")).await;

        let response = app
            .oneshot(form_request(
                "/samples/create",
                "page=sample_data&question=q1&answer=a1",
            ))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Added sample"));
        assert_eq!(controller.store().count_samples().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_api_feedback_not_found() {
        let (_tmp, _controller, app) = test_app(StubGenerator::replying("x")).await;

        let response = app
            .oneshot(json_request(
                "/api/turns/999/feedback",
                serde_json::json!({ "value": "positive" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_api_chat_and_feedback() {
        let (_tmp, controller, app) = test_app(StubGenerator::replying("reply")).await;

        let response = app
            .clone()
            .oneshot(json_request("/api/chat", serde_json::json!({ "question": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let id = body["turn"]["id"].as_i64().unwrap();
        assert_eq!(body["turn"]["feedback"], "none");

        let response = app
            .oneshot(json_request(
                &format!("/api/turns/{}/feedback", id),
                serde_json::json!({ "value": "negative" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            controller.store().get_turn(id).await.unwrap().feedback,
            Feedback::Negative
        );
    }

    #[tokio::test]
    async fn test_api_chat_empty_question_is_bad_request() {
        let (_tmp, _controller, app) = test_app(StubGenerator::replying("reply")).await;

        let response = app
            .oneshot(json_request("/api/chat", serde_json::json!({ "question": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_chat_backend_failure_is_bad_gateway() {
        let (_tmp, controller, app) = test_app(StubGenerator::failing("down")).await;

        let response = app
            .oneshot(json_request("/api/chat", serde_json::json!({ "question": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(controller.store().count_turns().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let (_tmp, _controller, app) = test_app(StubGenerator::replying("x")).await;

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "stub");
    }
}
