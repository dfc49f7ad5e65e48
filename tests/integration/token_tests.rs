//! Token format integration tests.
//!
//! Pins the tokens the server hands out to known values, so that links
//! minted by one deployment keep working on another.

use axum::body::Body;
use axum::http::StatusCode;

use fileserv::{derive_secret, Clock, ManualClock, SignatureScheme, TokenCodec, ValidityPeriod};

use super::test_utils::{client_get, request_uri, token_of, TestServerBuilder};

const LEGACY_TOKEN: &str =
    "MTAwNTp0ZXN0ZmlsZS50eHQ6NHh1alV5SmFoTm5QZVZ6OVBja1RSNHJXeV8xY1p6dEhyZnZSWF9BOG40OD0=";
const HMAC_TOKEN: &str =
    "MTAwNTp0ZXN0ZmlsZS50eHQ6cWU0Vy1CVGMzRlRvQkNSMVVLRTZTVTZnbEtNb2xYUDNFSF9TLWNLSkg5ST0=";

#[tokio::test]
async fn test_server_mints_known_hmac_token() {
    let server = TestServerBuilder::new().ttl(5).build();
    let url = server.mint_url("/testfile.txt").await;
    assert_eq!(token_of(&url), HMAC_TOKEN);
}

#[tokio::test]
async fn test_server_mints_known_legacy_token() {
    let server = TestServerBuilder::new()
        .scheme(SignatureScheme::PrefixSha256)
        .ttl(5)
        .build();
    let url = server.mint_url("/testfile.txt").await;
    assert_eq!(token_of(&url), LEGACY_TOKEN);
}

#[tokio::test]
async fn test_legacy_server_accepts_previously_issued_token() {
    let server = TestServerBuilder::new()
        .scheme(SignatureScheme::PrefixSha256)
        .build();
    let uri = format!(
        "/testfile.txt?token={}",
        urlencoding::encode(LEGACY_TOKEN)
    );

    let response = server
        .send(client_get(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_hmac_server_rejects_legacy_token() {
    let server = TestServerBuilder::new().build();
    let uri = format!(
        "/testfile.txt?token={}",
        urlencoding::encode(LEGACY_TOKEN)
    );

    let response = server
        .send(client_get(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_offline_minted_token_accepted_by_server() {
    let server = TestServerBuilder::new().build();
    let secret = derive_secret("10.0.0.1;TestAgent;en-US;localhost");
    let codec = TokenCodec::with_clock(ManualClock::new(server.clock.unix_now()));
    let token = codec.mint(ValidityPeriod::from_secs(60).unwrap(), &secret, "docs/report.pdf");

    let uri = format!(
        "/docs/report.pdf?token={}",
        urlencoding::encode(token.as_str())
    );
    let response = server
        .send(client_get(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_minted_url_token_matches_query_encoding() {
    let server = TestServerBuilder::new().ttl(5).build();
    let url = server.mint_url("/testfile.txt").await;

    assert!(request_uri(&url).ends_with(&HMAC_TOKEN.replace('=', "%3D")));
}
