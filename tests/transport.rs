//! Transport behaviour against a real HTTP server.

use std::time::Duration;

use hemmer_provider_rest::{
    CancellationToken, EndpointConfig, FilePart, HttpMethod, MultipartBody, RestError, Transport,
};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Tag {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    color: Option<String>,
}

fn transport(server: &MockServer) -> Transport {
    let config = EndpointConfig::new(server.uri(), "test-token").unwrap();
    Transport::new(config).unwrap()
}

fn content_type(request: &Request) -> String {
    request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_json_exchange_sends_auth_and_json_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tags/"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "urgent"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 5, "name": "urgent"})))
        .expect(1)
        .mount(&server)
        .await;

    let tag: Option<Tag> = transport(&server)
        .exchange_json(HttpMethod::Post, "/api/v1/tags/", Some(&json!({"name": "urgent"})))
        .await
        .unwrap();

    assert_eq!(
        tag,
        Some(Tag {
            id: 5,
            name: "urgent".to_string(),
            color: None
        })
    );
}

#[tokio::test]
async fn test_user_agent_identifies_the_crate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;

    transport(&server)
        .exchange_json::<(), Tag>(HttpMethod::Get, "/tags/1/", None)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(agent.starts_with("hemmer-provider-rest/"));
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags/"))
        .and(query_param("color", "red"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = EndpointConfig::new(format!("{}/api/", server.uri()), "test-token").unwrap();
    let transport = Transport::new(config).unwrap();
    let request = hemmer_provider_rest::RequestEnvelope::new(HttpMethod::Get, "tags/")
        .with_query(vec![("color".to_string(), "red".to_string())]);
    let raw = transport.send(request).await.unwrap();
    assert_eq!(raw.status, 200);
}

#[tokio::test]
async fn test_remote_error_preserves_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"name": ["This field is required."]}"#))
        .mount(&server)
        .await;

    let err = transport(&server)
        .exchange_json::<_, Tag>(HttpMethod::Post, "/tags/", Some(&json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.body(), Some(r#"{"name": ["This field is required."]}"#));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .exchange_json_unit(HttpMethod::Get, "/tags/", None::<&()>)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("upstream unavailable"));
}

#[tokio::test]
async fn test_no_content_with_target_skips_decoding() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result: Option<Tag> = transport(&server)
        .exchange_json(HttpMethod::Delete, "/tags/1/", None::<&()>)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .exchange_json::<(), Tag>(HttpMethod::Get, "/tags/1/", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::Decode { .. }));
    assert_eq!(err.body(), Some("<html>oops</html>"));
}

#[tokio::test]
async fn test_multipart_without_file_sends_fields_only() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/documents/1/"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "x"})))
        .expect(1)
        .mount(&server)
        .await;

    let body = MultipartBody::new().with_field("name", "x");
    let tag: Option<Tag> = transport(&server)
        .exchange_multipart(HttpMethod::Patch, "/documents/1/", body)
        .await
        .unwrap();
    assert_eq!(tag.unwrap().name, "x");

    let requests = server.received_requests().await.unwrap();
    assert!(content_type(&requests[0]).starts_with("multipart/form-data; boundary="));
    let sent = String::from_utf8_lossy(&requests[0].body);
    assert!(sent.contains("name=\"name\"\r\n\r\nx\r\n"));
    assert!(!sent.contains("filename="));
}

#[tokio::test]
async fn test_multipart_with_file_part() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2})))
        .mount(&server)
        .await;

    let body = MultipartBody::new()
        .with_field("title", "Q3 report")
        .with_file("document", FilePart::new("q3.pdf", b"%PDF-1.7".to_vec()));
    transport(&server)
        .exchange_multipart_unit(HttpMethod::Post, "/documents/", body)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent = String::from_utf8_lossy(&requests[0].body);
    assert!(sent.contains("name=\"document\"; filename=\"q3.pdf\""));
    assert!(sent.contains("%PDF-1.7"));
    assert!(sent.contains("Q3 report"));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = EndpointConfig::new(server.uri(), "test-token")
        .unwrap()
        .with_timeout(Duration::from_millis(200))
        .unwrap();
    let err = Transport::new(config)
        .unwrap()
        .exchange_json_unit(HttpMethod::Get, "/tags/", None::<&()>)
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::Timeout(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let transport = transport(&server).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let started = std::time::Instant::now();
    let err = transport
        .exchange_json_unit(HttpMethod::Get, "/tags/", None::<&()>)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, RestError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_connection_failure_is_a_transport_error() {
    let config = EndpointConfig::new("http://127.0.0.1:9", "test-token").unwrap();
    let err = Transport::new(config)
        .unwrap()
        .exchange_json_unit(HttpMethod::Get, "/tags/", None::<&()>)
        .await;
    tokio_test::assert_err!(&err);
    assert!(matches!(
        err.unwrap_err(),
        RestError::Transport(_) | RestError::Timeout(_)
    ));
}
