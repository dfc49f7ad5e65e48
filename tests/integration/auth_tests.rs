//! Authentication integration tests.
//!
//! Tests verify:
//! - The API key gate on file routes
//! - Tokens only work for the client they were minted for
//! - Tokens only work for the path they were minted for
//! - Expired, tampered and malformed tokens are rejected
//! - Alternative identity sources

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::http::header::HeaderName;
use tower::ServiceExt;

use fileserv::{ClientCertFingerprint, PreSharedKeyFingerprint};

use super::test_utils::{
    body_json, client_get, request_uri, token_of, TestServer, TestServerBuilder, TTL_SECS,
};

const API_KEY: &str = "test-api-key";

async fn assert_invalid_token(response: axum::http::Response<Body>) {
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_token");
    assert_eq!(json["message"], "Invalid or expired token");
}

// =============================================================================
// API Key Gate
// =============================================================================

#[tokio::test]
async fn test_missing_api_key_rejected() {
    let server = TestServerBuilder::new().api_key(API_KEY).build();
    let response = server
        .send(client_get("/hello.txt").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["error"], "missing_api_key");
    assert_eq!(json["message"], "Forbidden: Missing API key");
}

#[tokio::test]
async fn test_wrong_api_key_rejected() {
    let server = TestServerBuilder::new().api_key(API_KEY).build();
    let request = client_get("/hello.txt")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();

    let response = server.send(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "invalid_api_key");
}

#[tokio::test]
async fn test_api_key_checked_before_file_lookup() {
    let server = TestServerBuilder::new().api_key(API_KEY).build();
    let response = server
        .send(client_get("/missing.txt").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_correct_api_key_mints_and_downloads() {
    let server = TestServerBuilder::new().api_key(API_KEY).build();
    let request = client_get("/hello.txt")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = server.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = body_json(response).await.as_str().unwrap().to_string();

    let without_key = server
        .send(client_get(&request_uri(&url)).body(Body::empty()).unwrap())
        .await;
    assert_eq!(without_key.status(), StatusCode::FORBIDDEN);

    let with_key = server
        .send(
            client_get(&request_uri(&url))
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(with_key.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_not_gated() {
    let server = TestServerBuilder::new().api_key(API_KEY).build();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = server.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Client Binding
// =============================================================================

#[tokio::test]
async fn test_token_rejected_for_other_user_agent() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;

    let request = Request::builder()
        .uri(request_uri(&url))
        .header("user-agent", "OtherAgent")
        .header("accept-language", "en-US")
        .header("host", "localhost")
        .body(Body::empty())
        .unwrap();
    assert_invalid_token(server.send(request).await).await;
}

#[tokio::test]
async fn test_token_rejected_for_other_address() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;

    let other: SocketAddr = "10.0.0.2:52000".parse().unwrap();
    let response = server
        .router_from(other)
        .oneshot(client_get(&request_uri(&url)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_invalid_token(response).await;
}

#[tokio::test]
async fn test_source_port_does_not_matter() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;

    let same_host: SocketAddr = "10.0.0.1:61000".parse().unwrap();
    let response = server
        .router_from(same_host)
        .oneshot(client_get(&request_uri(&url)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unrelated_headers_do_not_matter() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;

    let request = client_get(&request_uri(&url))
        .header("cookie", "session=abc")
        .body(Body::empty())
        .unwrap();
    assert_eq!(server.send(request).await.status(), StatusCode::OK);
}

// =============================================================================
// Path Binding
// =============================================================================

#[tokio::test]
async fn test_token_rejected_for_other_path() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;
    let token = token_of(&url);

    let uri = format!("/testfile.txt?token={}", urlencoding::encode(&token));
    let response = server
        .send(client_get(&uri).body(Body::empty()).unwrap())
        .await;
    assert_invalid_token(response).await;
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_token_valid_through_expiry_second() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;

    server.clock.advance(TTL_SECS);
    let response = server
        .send(client_get(&request_uri(&url)).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_rejected_after_expiry() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;

    server.clock.advance(TTL_SECS + 1);
    let response = server
        .send(client_get(&request_uri(&url)).body(Body::empty()).unwrap())
        .await;
    assert_invalid_token(response).await;
}

#[tokio::test]
async fn test_fresh_token_after_expiry() {
    let server = TestServer::new();
    let old = server.mint_url("/hello.txt").await;

    server.clock.advance(TTL_SECS + 1);
    let new = server.mint_url("/hello.txt").await;
    assert_ne!(token_of(&old), token_of(&new));

    let response = server
        .send(client_get(&request_uri(&new)).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Malformed Tokens
// =============================================================================

#[tokio::test]
async fn test_malformed_tokens_rejected() {
    let server = TestServer::new();
    for token in ["", "not-base64!", "bm9jb2xvbnM%3D", "YWJjOmRlZjpnaGk%3D"] {
        let uri = format!("/hello.txt?token={}", token);
        let response = server
            .send(client_get(&uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{token}");
    }
}

#[tokio::test]
async fn test_repeated_token_parameter_rejected() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;
    let token = urlencoding::encode(&token_of(&url)).into_owned();

    for uri in [
        "/hello.txt?token=a&token=b".to_string(),
        format!("/hello.txt?token={token}&token={token}"),
    ] {
        let response = server
            .send(client_get(&uri).body(Body::empty()).unwrap())
            .await;
        assert_invalid_token(response).await;
    }
}

#[tokio::test]
async fn test_tampered_token_rejected() {
    let server = TestServer::new();
    let url = server.mint_url("/hello.txt").await;
    let mut token = token_of(&url).into_bytes();
    token[2] = if token[2] == b'A' { b'B' } else { b'A' };
    let token = String::from_utf8(token).unwrap();

    let uri = format!("/hello.txt?token={}", urlencoding::encode(&token));
    let response = server
        .send(client_get(&uri).body(Body::empty()).unwrap())
        .await;
    assert_invalid_token(response).await;
}

// =============================================================================
// Identity Sources
// =============================================================================

#[tokio::test]
async fn test_psk_tokens_not_valid_on_header_server() {
    let psk = TestServerBuilder::new()
        .identity(Arc::new(PreSharedKeyFingerprint::new("server-key")))
        .build();
    let plain = TestServer::new();

    let url = psk.mint_url("/hello.txt").await;
    let request = || client_get(&request_uri(&url)).body(Body::empty()).unwrap();

    assert_eq!(psk.send(request()).await.status(), StatusCode::OK);
    assert_invalid_token(plain.send(request()).await).await;
}

#[tokio::test]
async fn test_client_cert_identity_requires_header() {
    let server = TestServerBuilder::new()
        .identity(Arc::new(ClientCertFingerprint::default()))
        .build();

    let response = server
        .send(client_get("/hello.txt").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "identity_required");
}

#[tokio::test]
async fn test_client_cert_identity_follows_certificate() {
    let header = HeaderName::from_static("x-client-cert-fingerprint");
    let cert_a = "11".repeat(32);
    let cert_b = "22".repeat(32);
    let server = TestServerBuilder::new()
        .identity(Arc::new(ClientCertFingerprint::new(header.clone())))
        .build();

    let response = server
        .send(
            client_get("/hello.txt")
                .header(&header, &cert_a)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = body_json(response).await.as_str().unwrap().to_string();

    // Another address and user agent, same certificate.
    let roaming: SocketAddr = "192.0.2.7:40000".parse().unwrap();
    let request = Request::builder()
        .uri(request_uri(&url))
        .header("user-agent", "Elsewhere/2.0")
        .header(&header, &cert_a)
        .body(Body::empty())
        .unwrap();
    let response = server.router_from(roaming).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = client_get(&request_uri(&url))
        .header(&header, &cert_b)
        .body(Body::empty())
        .unwrap();
    assert_invalid_token(server.send(request).await).await;
}
