//! HTTP identity client tests against a mock identity service

use std::time::Duration;

use rvoip_dialplan_core::identity::HttpIdentityClient;
use rvoip_dialplan_core::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpIdentityClient {
    HttpIdentityClient::new(server.uri(), Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn test_found_user_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/by-contact"))
        .and(query_param("contact_type", "phone"))
        .and(query_param("contact_value", "905551234567"))
        .and(header("x-trace-id", "call-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "id": "user-42",
                "display_name": "Ayse Yilmaz",
                "tenant_id": "acme",
                "user_type": "customer",
                "contacts": [
                    { "contact_type": "phone", "contact_value": "905551234567" }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile = client(&server)
        .find_by_phone("905551234567", "call-1")
        .await
        .unwrap()
        .expect("profile");
    assert_eq!(profile.id, "user-42");
    assert_eq!(profile.display_name.as_deref(), Some("Ayse Yilmaz"));
    assert_eq!(profile.contacts.len(), 1);
}

#[tokio::test]
async fn test_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/by-contact"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client(&server).find_by_phone("905559999999", "unknown").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_server_error_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).find_by_phone("905551234567", "unknown").await.unwrap_err();
    assert!(matches!(err, DialplanError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn test_malformed_body_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).find_by_phone("905551234567", "unknown").await.unwrap_err();
    assert!(matches!(err, DialplanError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn test_resolver_absorbs_slow_identity_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let lookup = std::sync::Arc::new(HttpIdentityClient::new(server.uri(), Duration::from_secs(10)).unwrap());
    let cache = std::sync::Arc::new(MokaIdentityCache::new(Duration::from_secs(60), 100));
    let resolver = IdentityResolver::new(lookup, cache, Duration::from_millis(100));

    let started = std::time::Instant::now();
    assert!(resolver.resolve("905551234567", "unknown").await.is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
}
