use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::render::FontBook;
use crate::settings;

use super::compose::{ServerError, add_text_request, captions_request};
use super::models::{AddTextRequest, CaptionRequest, ComposeResponse, ErrorResponse};
use super::state::ServerState;

type HandlerResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub async fn run_server(
    settings: settings::Settings,
    fonts: Arc<FontBook>,
    addr: String,
) -> Result<()> {
    if fonts.is_empty() {
        warn!("font registry is empty; every render request will fail");
    }
    let state = Arc::new(ServerState { settings, fonts });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    let body_limit = state.settings.server_max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/api/meme/add-text", post(add_text))
        .route("/api/meme/captions", post(captions))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn add_text(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<AddTextRequest>, JsonRejection>,
) -> HandlerResult<ComposeResponse> {
    let Json(request) = payload.map_err(reject)?;
    add_text_request(state.as_ref(), request)
        .await
        .map(Json)
        .map_err(into_reply)
}

async fn captions(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<CaptionRequest>, JsonRejection>,
) -> HandlerResult<ComposeResponse> {
    let Json(request) = payload.map_err(reject)?;
    captions_request(state.as_ref(), request)
        .await
        .map(Json)
        .map_err(into_reply)
}

fn reject(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    let mut err = ServerError::bad_request(rejection.body_text());
    err.status = rejection.status();
    into_reply(err)
}

fn into_reply(err: ServerError) -> (StatusCode, Json<ErrorResponse>) {
    (err.status, Json(err.body()))
}
