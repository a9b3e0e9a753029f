//! HTTP middleware
//!
//! `cors` must be the outermost layer so that every response, including the
//! link-preview short-circuit, carries the CORS headers.

use crate::web::AppState;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Lowercase User-Agent marker of Discord's link-preview crawler
pub const CRAWLER_MARKER: &str = "discordbot";

/// Open Graph document served to the link-preview crawler
pub const PREVIEW_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta property="og:title" content="Blazium Engine">
    <meta property="og:description" content="Blazium Engine forked from Godot.">
    <meta property="og:image" content="https://blazium.app/static/assets/logo.png">
    <meta property="og:url" content="https://blazium.app">
    <meta property="og:type" content="website">
    <meta name="twitter:card" content="summary_large_image">
    <meta property="og:site_name" content="Blazium Engine">
    <title>Blazium Engine</title>
</head>
<body>
    <h1>Welcome to Blazium Engine</h1>
</body>
</html>
"#;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS, PUT, DELETE";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Permissive CORS headers on every response; `OPTIONS` is answered directly
pub async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

/// Serve the Open Graph document to the link-preview crawler, on any path
pub async fn embed_preview(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_crawler(&request) {
        return next.run(request).await;
    }

    state.metrics.record_link_preview();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "max-age=3600"),
        ],
        PREVIEW_HTML,
    )
        .into_response()
}

fn is_crawler(request: &Request) -> bool {
    request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|agent| agent.to_ascii_lowercase().contains(CRAWLER_MARKER))
}
