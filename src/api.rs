use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;

use crate::pages::PageCache;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<PageCache>,
    /// Tag served at `/`.
    pub default_tag: Arc<str>,
}

impl AppState {
    pub fn new(cache: Arc<PageCache>, default_tag: impl Into<Arc<str>>) -> Self {
        Self {
            cache,
            default_tag: default_tag.into(),
        }
    }
}

/// `/health` (and `/metrics`, merged in by the binary) take precedence over
/// tag pages; `config::sources::RESERVED_TAGS` keeps sources from using them.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/", get(index))
        .route("/{tag}", get(tag_page))
        .fallback(|| async { not_found() })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Response {
    page(&state, &state.default_tag)
}

async fn tag_page(State(state): State<AppState>, Path(tag): Path<String>) -> Response {
    page(&state, &tag)
}

fn page(state: &AppState, tag: &str) -> Response {
    match state.cache.get(tag) {
        Some(body) => html(body),
        None => not_found(),
    }
}

fn html(body: Bytes) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "page not found").into_response()
}
