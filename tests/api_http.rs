// tests/api_http.rs
//
// HTTP-level tests for the page router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /          (default tag)
// - GET /{tag}
// - unknown tag, nested path -> 404
// - cache swap visible to the next request

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use tower::ServiceExt as _; // for `oneshot`

use feeder::{create_router, AppState, PageCache};

const BODY_LIMIT: usize = 1024 * 1024;

fn cache_with(pages: &[(&str, &str)]) -> Arc<PageCache> {
    let cache = Arc::new(PageCache::new());
    cache.replace(
        pages
            .iter()
            .map(|(tag, body)| (tag.to_string(), Bytes::from(body.to_string())))
            .collect::<HashMap<_, _>>(),
    );
    cache
}

fn test_router(cache: Arc<PageCache>) -> Router {
    create_router(AppState::new(cache, "rss"))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let ctype = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, ctype, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, _, body) = get(test_router(cache_with(&[])), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn root_serves_default_tag() {
    let app = test_router(cache_with(&[("rss", "<p>rss page</p>"), ("news", "<p>news</p>")]));
    let (status, ctype, body) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctype.as_deref(), Some("text/html; charset=utf-8"));
    assert_eq!(body, "<p>rss page</p>");
}

#[tokio::test]
async fn tag_path_serves_that_page() {
    let app = test_router(cache_with(&[("rss", "<p>rss page</p>"), ("news", "<p>news</p>")]));
    let (status, _, body) = get(app, "/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<p>news</p>");
}

#[tokio::test]
async fn unknown_or_nested_paths_are_404() {
    let cache = cache_with(&[("rss", "<p>rss page</p>")]);
    for uri in ["/missing", "/rss/extra", "/a/b/c"] {
        let (status, _, body) = get(test_router(cache.clone()), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, "page not found", "{uri}");
    }
}

#[tokio::test]
async fn missing_default_page_is_404() {
    let (status, _, _) = get(test_router(cache_with(&[("news", "x")])), "/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replaced_cache_is_served_next_request() {
    let cache = cache_with(&[("rss", "old")]);
    let app = test_router(cache.clone());

    let (_, _, body) = get(app.clone(), "/rss").await;
    assert_eq!(body, "old");

    cache.replace(HashMap::from([("rss".to_string(), Bytes::from_static(b"new"))]));
    let (_, _, body) = get(app, "/rss").await;
    assert_eq!(body, "new");
}
