//! Session lifecycle through the HTTP surface
mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::test_app;
use pizza_service::observability::Counter;

#[tokio::test]
async fn test_login_then_logout_revokes_token() {
    let t = test_app("http://127.0.0.1:1").await;
    let (_, token) = t.register("pizza diner", "d@jwt.com", "diner").await;

    let (status, _) = t.send(Method::GET, "/api/order", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send(Method::DELETE, "/api/auth", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "logout successful" }));

    let (status, body) = t.send(Method::GET, "/api/order", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "unauthorized" }));

    let (status, _) = t.send(Method::DELETE, "/api/auth", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let t = test_app("http://127.0.0.1:1").await;
    t.register("pizza diner", "d@jwt.com", "diner").await;

    let (_, first) = t.login("d@jwt.com", "diner").await;
    let (_, second) = t.login("d@jwt.com", "diner").await;
    let first = first["token"].as_str().unwrap().to_string();
    let second = second["token"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    t.send(Method::DELETE, "/api/auth", Some(&first), None).await;

    let (status, _) = t.send(Method::GET, "/api/order", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.send(Method::GET, "/api/order", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_and_tampered_tokens() {
    let t = test_app("http://127.0.0.1:1").await;
    let (_, token) = t.register("pizza diner", "d@jwt.com", "diner").await;

    let (status, body) = t.send(Method::GET, "/api/order", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized");

    let mut chars: Vec<char> = token.chars().collect();
    let at = chars.len() - 5;
    chars[at] = if chars[at] == 'x' { 'y' } else { 'x' };
    let tampered: String = chars.into_iter().collect();
    let (status, _) = t.send(Method::GET, "/api/order", Some(&tampered), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.send(Method::GET, "/api/order", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_requires_every_field() {
    let t = test_app("http://127.0.0.1:1").await;

    let (status, body) = t
        .send(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({ "name": "pizza diner", "email": "d@jwt.com" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name, email, and password are required");
}

#[tokio::test]
async fn test_unreadable_auth_bodies_get_json_errors() {
    let t = test_app("http://127.0.0.1:1").await;
    let metrics = &t.state.metrics;

    let (status, body) = t
        .send_raw(Method::PUT, "/api/auth", Some("application/json"), "not json")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "unknown user" }));

    let (status, body) = t
        .send_raw(Method::PUT, "/api/auth", None, r#"{"email":"a@jwt.com","password":"admin"}"#)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "unknown user");
    assert_eq!(metrics.counter(Counter::AuthFailure), 2);

    let (status, body) = t.send_raw(Method::POST, "/api/auth", None, "name=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name, email, and password are required");
    assert_eq!(metrics.counter(Counter::AuthSuccess), 0);
}

#[tokio::test]
async fn test_auth_counters_and_active_users() {
    let t = test_app("http://127.0.0.1:1").await;
    let metrics = &t.state.metrics;

    let (_, token) = t.register("pizza diner", "d@jwt.com", "diner").await;
    assert_eq!(metrics.counter(Counter::AuthSuccess), 1);
    assert_eq!(metrics.active_users(), 1);

    let (status, body) = t.login("d@jwt.com", "wrong").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "unknown user");
    assert_eq!(metrics.counter(Counter::AuthFailure), 1);
    assert_eq!(metrics.active_users(), 1);

    t.send(Method::DELETE, "/api/auth", Some(&token), None).await;
    assert_eq!(metrics.active_users(), 0);

    assert_eq!(metrics.counter(Counter::PostRequests), 1);
    assert_eq!(metrics.counter(Counter::PutRequests), 1);
    assert_eq!(metrics.counter(Counter::DeleteRequests), 1);
}

#[tokio::test]
async fn test_update_user_self_or_admin() {
    let t = test_app("http://127.0.0.1:1").await;
    let (diner_id, diner) = t.register("pizza diner", "d@jwt.com", "diner").await;
    let (other_id, _) = t.register("other diner", "o@jwt.com", "other").await;

    let uri = format!("/api/auth/{}", other_id);
    let (status, body) = t
        .send(Method::PUT, &uri, Some(&diner), Some(json!({ "email": "x@jwt.com" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "unauthorized");

    let uri = format!("/api/auth/{}", diner_id);
    let (status, body) = t
        .send(Method::PUT, &uri, Some(&diner), Some(json!({ "password": "changed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "d@jwt.com");
    assert_eq!(t.login("d@jwt.com", "changed").await.0, StatusCode::OK);

    let admin = t.admin_token().await;
    let uri = format!("/api/auth/{}", other_id);
    let (status, body) = t
        .send(Method::PUT, &uri, Some(&admin), Some(json!({ "email": "new@jwt.com" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "new@jwt.com");
}
