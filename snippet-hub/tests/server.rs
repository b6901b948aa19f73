mod common;

use common::{request, test_app};
use serde_json::json;
use std::future::IntoFuture;

#[tokio::test]
async fn health_endpoint_responds() {
    let harness = test_app();
    let (status, _) = request(&harness.app, "GET", "/health", None, None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn serves_over_a_real_listener() {
    let harness = test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(
        axum::serve(listener, harness.app.clone().into_make_service()).into_future(),
    );

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");

    server.abort();
}

#[tokio::test]
async fn register_login_me_flow() {
    let harness = test_app();
    let (status, body) = request(
        &harness.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "jdoe",
            "email": "JDoe@acme.test",
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(status, 200);
    // First user on a fresh instance becomes the administrator.
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["email"], "jdoe@acme.test");

    let (status, body) = request(
        &harness.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "jdoe", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, 200);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = request(&harness.app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["username"], "jdoe");
}

#[tokio::test]
async fn second_user_is_not_admin() {
    let harness = test_app();
    common::register(&harness.app, "first", "acme").await;
    let (status, body) = request(
        &harness.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "second",
            "email": "second@acme.test",
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["user"]["role"], "user");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let harness = test_app();
    common::register(&harness.app, "jdoe", "acme").await;
    let (status, body) = request(
        &harness.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "jdoe",
            "email": "other@acme.test",
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let harness = test_app();
    common::register(&harness.app, "jdoe", "acme").await;
    let (status, body) = request(
        &harness.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "jdoe", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let harness = test_app();
    let (status, _) = request(&harness.app, "GET", "/auth/me", None, None).await;
    assert_eq!(status, 401);
    let (status, _) = request(&harness.app, "GET", "/snippets", Some("garbage"), None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn admin_can_toggle_registration() {
    let harness = test_app();
    let admin = common::register(&harness.app, "admin", "acme").await;
    let user = common::register(&harness.app, "pleb", "acme").await;

    // Only administrators may touch the instance configuration.
    let (status, _) = request(&harness.app, "GET", "/admin/config", Some(&user), None).await;
    assert_eq!(status, 403);

    let (status, body) = request(
        &harness.app,
        "PUT",
        "/admin/config",
        Some(&admin),
        Some(json!({ "registration_enabled": false })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["registration_enabled"], false);

    let (status, body) = request(
        &harness.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "latecomer",
            "email": "late@acme.test",
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "forbidden");
}
