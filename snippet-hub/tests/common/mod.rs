#![allow(dead_code)]

use axum::{body::Body, http::Request, routing::get, Router};
use serde_json::{json, Value};
use snippet_hub::api::{self, AppState};
use tower::util::ServiceExt;

pub struct TestApp {
    pub app: Router,
    _dir: tempfile::TempDir,
}

pub fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::init(dir.path()).unwrap();
    let app = Router::new()
        .merge(api::router(state))
        .route("/health", get(|| async { "OK" }));
    TestApp { app, _dir: dir }
}

pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// Register a user and return their bearer token.
pub async fn register(app: &Router, username: &str, org: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@{org}.test"),
            "password": "correct-horse",
            "organization": org,
        })),
    )
    .await;
    assert_eq!(status, 200, "registration failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

/// Create a snippet and return the response body.
pub async fn create_snippet(app: &Router, token: &str, title: &str, visibility: &str) -> Value {
    let (status, body) = request(
        app,
        "POST",
        "/snippets",
        Some(token),
        Some(json!({
            "title": title,
            "content": format!("// {title}"),
            "language": "rust",
            "visibility": visibility,
        })),
    )
    .await;
    assert_eq!(status, 200, "snippet creation failed: {body}");
    body
}
