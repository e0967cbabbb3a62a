//! E2E tests for route protection

mod common;

use common::{SESSION_COOKIE, TestServer, location};

#[tokio::test]
async fn test_protected_path_without_token_redirects_to_landing() {
    let server = TestServer::new().await;

    for path in ["/dashboard", "/dashboard/", "/dashboard/pantry/42"] {
        let response = server.client.get(server.url(path)).send().await.unwrap();

        assert_eq!(response.status(), 307, "{path}");
        assert_eq!(location(&response), "/", "{path}");
    }
}

#[tokio::test]
async fn test_protected_path_with_valid_token_passes_through() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));

    let response = server
        .client
        .get(server.url("/dashboard"))
        .header("Cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("Welcome, A"));
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));
    let bearer = cookie
        .strip_prefix(&format!("{SESSION_COOKIE}="))
        .unwrap()
        .to_string();

    let response = server
        .client
        .get(server.url("/dashboard/items"))
        .bearer_auth(bearer)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_tampered_token_is_treated_as_missing() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let mut cookie = server.cookie_header(&server.token_for(&user));
    cookie.push('x');

    let response = server
        .client
        .get(server.url("/dashboard"))
        .header("Cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 307);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_unprotected_paths_pass_regardless_of_token() {
    let server = TestServer::new().await;

    for cookie in [None, Some(format!("{SESSION_COOKIE}=garbage"))] {
        for path in ["/", "/health", "/dashboards"] {
            let mut request = server.client.get(server.url(path));
            if let Some(cookie) = &cookie {
                request = request.header("Cookie", cookie);
            }
            let response = request.send().await.unwrap();

            assert_ne!(response.status(), 307, "{path} with {cookie:?}");
        }
    }
}

#[tokio::test]
async fn test_guard_does_not_consult_database() {
    let server = TestServer::new().await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));
    server.delete_user(&user.id).await;

    // The guard lets the signed token through; the handler's refresh then
    // finds no user and sends the visitor back to the landing page.
    let response = server
        .client
        .get(server.url("/dashboard"))
        .header("Cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_custom_protected_paths() {
    let server = TestServer::with_protected_paths(vec![
        "/dashboard/:path*".to_string(),
        "/api/user".to_string(),
    ])
    .await;

    let response = server
        .client
        .get(server.url("/api/user"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 307);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_protected_prefix_without_handler_still_redirects() {
    let server = TestServer::with_protected_paths(vec![
        "/dashboard/:path*".to_string(),
        "/settings/:path*".to_string(),
    ])
    .await;

    for path in ["/settings", "/settings/x", "/dashboard/"] {
        let response = server.client.get(server.url(path)).send().await.unwrap();

        assert_eq!(response.status(), 307, "{path}");
        assert_eq!(location(&response), "/", "{path}");
    }
}

#[tokio::test]
async fn test_signed_in_request_to_unknown_protected_path_is_404() {
    let server = TestServer::with_protected_paths(vec!["/settings/:path*".to_string()]).await;
    let user = server.create_user("a@example.com", "A", None).await;
    let cookie = server.cookie_header(&server.token_for(&user));

    let response = server
        .client
        .get(server.url("/settings/x"))
        .header("Cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}
