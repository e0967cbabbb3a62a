//! E2E tests for the session endpoint and the `{userId}` accessor

mod common;

use common::{SESSION_COOKIE, TestServer, cookie_value, set_cookies};

async fn get_session(server: &TestServer, cookie: Option<&str>) -> reqwest::Response {
    let mut request = server.client.get(server.url("/api/auth/session"));
    if let Some(cookie) = cookie {
        request = request.header("Cookie", cookie);
    }
    request.send().await.expect("request succeeds")
}

#[tokio::test]
async fn test_signed_out_session_is_empty_object() {
    let server = TestServer::new().await;

    let response = get_session(&server, None).await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({}));
}

#[tokio::test]
async fn test_session_exposes_user_and_reissues_cookie() {
    let server = TestServer::new().await;
    let user = server
        .create_user("a@example.com", "A", Some("img.png"))
        .await;
    let cookie = server.cookie_header(&server.token_for(&user));

    let response = get_session(&server, Some(&cookie)).await;

    assert_eq!(response.status(), 200);
    let reissued = cookie_value(&response, SESSION_COOKIE).expect("cookie re-issued");
    assert_eq!(server.decode(&reissued).id.as_deref(), Some(user.id.as_str()));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "user": {
                "id": user.id,
                "name": "A",
                "email": "a@example.com",
                "image": "img.png"
            }
        })
    );
}

#[tokio::test]
async fn test_profile_changes_reach_existing_sessions() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));

    server.update_profile(&user.id, "Renamed", "new.png").await;

    let response = get_session(&server, Some(&cookie)).await;
    let reissued = cookie_value(&response, SESSION_COOKIE).expect("cookie re-issued");
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["user"]["name"], "Renamed");
    assert_eq!(body["user"]["image"], "new.png");
    assert_eq!(server.decode(&reissued).name.as_deref(), Some("Renamed"));
}

#[tokio::test]
async fn test_deleted_user_session_is_cleared() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));
    server.delete_user(&user.id).await;

    let response = get_session(&server, Some(&cookie)).await;

    assert_eq!(response.status(), 200);
    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|v| v.starts_with(&format!("{SESSION_COOKIE}=;")) && v.contains("Max-Age=0")),
        "expected cookie removal, got: {cookies:?}"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({}));
}

#[tokio::test]
async fn test_database_failure_keeps_session_cookie() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));
    server.break_user_table().await;

    let response = get_session(&server, Some(&cookie)).await;

    assert_eq!(response.status(), 500);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store"
    );
    assert!(
        set_cookies(&response).is_empty(),
        "session cookie must survive a database failure"
    );
}

#[tokio::test]
async fn test_garbage_cookie_is_signed_out() {
    let server = TestServer::new().await;

    let response = get_session(&server, Some(&format!("{SESSION_COOKIE}=garbage"))).await;

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({}));
}

#[tokio::test]
async fn test_legacy_user_accessor() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));

    let response = server
        .client
        .get(server.url("/api/user"))
        .header("Cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "userId": user.id }));
}

#[tokio::test]
async fn test_legacy_user_accessor_requires_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/api/user"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}
