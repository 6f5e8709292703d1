//! Integration tests using wiremock to simulate HTTP servers.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracewire::{
    deserialize, Client, ClientConfiguration, DeserializationError, Error, ErrorChain,
    ErrorStrategy, Multipart, Part, ReqwestTransport, TransportErrorKind, UNAUTHORIZED_CODES,
};
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn configuration_for(server: &MockServer) -> ClientConfiguration {
    let address = server.address();
    ClientConfiguration::builder()
        .scheme("http")
        .host(address.ip().to_string())
        .port(address.port())
        .default_header("User-Agent", "test-agent")
        .unwrap()
        .build()
        .unwrap()
}

fn client_for(server: &MockServer) -> Client {
    Client::with_reqwest(configuration_for(server)).unwrap()
}

fn test_data() -> TestData {
    TestData {
        id: 1,
        name: "Test".to_string(),
    }
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data())
                .insert_header("x-custom-header", "custom-value"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client.get("fetch test", "/test").build();

    let traced = client
        .call::<TestData>(&request, &[200], &ErrorChain::new())
        .await;
    let response = traced.result.unwrap();

    assert_eq!(response.data, test_data());
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-custom-header"), Some("custom-value"));

    let log = traced.log;
    assert_eq!(log.connection_name.as_deref(), Some("fetch test"));
    assert_eq!(log.server_response.unwrap().status, StatusCode::OK);
    assert_eq!(
        log.original_request.unwrap().url.as_str(),
        format!("{}/test", mock_server.uri())
    );
    assert!(log.connection_error.is_none());
}

#[tokio::test]
async fn test_query_parameters_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "1"))
        .and(query_param("q", "rust lang"))
        .and(header("user-agent", "test-agent"))
        .and(header("x-call", "search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client
        .get("search", "/search")
        .query_param("page", 1)
        .query_param("q", "rust lang")
        .header("X-Call", "search")
        .unwrap()
        .build();

    let traced = client.execute(&request).await;
    assert_eq!(traced.result.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_call_headers_override_defaults() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("user-agent", "override-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client
        .get("override", "/test")
        .header("User-Agent", "override-agent")
        .unwrap()
        .build();

    assert!(client.execute(&request).await.result.is_ok());
}

#[tokio::test]
async fn test_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/test"))
        .and(body_json(test_data()))
        .respond_with(ResponseTemplate::new(201).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client
        .post("create", "/test")
        .json_body(&test_data())
        .unwrap()
        .build();

    let traced = client
        .call::<TestData>(&request, &[200, 201], &ErrorChain::new())
        .await;

    assert_eq!(traced.result.unwrap().status, StatusCode::CREATED);
    assert_eq!(traced.log.body_string_representation, None);
    assert_eq!(
        traced.log.to_json()[9]["Request Body String Representation"],
        serde_json::json!({ "id": 1, "name": "Test" })
    );
}

#[tokio::test]
async fn test_form_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/form"))
        .and(body_string("a=1&b=x+y"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client
        .put("form", "/form")
        .form_body(&serde_json::json!({ "a": 1, "b": "x y" }))
        .unwrap()
        .build();

    assert!(client.execute(&request).await.result.is_ok());
}

#[tokio::test]
async fn test_multipart_body() {
    let mock_server = MockServer::start().await;

    let multipart = Multipart::new("BOUNDARY")
        .adding(Part::text("title", "hello"))
        .adding(Part::file("upload", "text/plain", &b"file contents"[..]));

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("content-type", "multipart/form-data; boundary=BOUNDARY"))
        .and(body_string(
            "BOUNDARY\nContent-Disposition: form-data; name=\"title\"\n\nhello\nBOUNDARY\n\
             Content-Disposition: form-data; name=\"upload\"; filename=\"\"\nContent-Type: text/plain\n\n\
             file contents\nBOUNDARY",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client
        .post("upload", "/upload")
        .multipart(&multipart)
        .unwrap()
        .build();

    let traced = client.execute(&request).await;
    assert!(traced.result.is_ok());
    assert!(traced
        .log
        .body_string_representation
        .unwrap()
        .contains("Data with byte count: 13"));
}

#[tokio::test]
async fn test_http_error_keeps_status_and_extracted_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "error": "bad" })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client.get("missing", "/test").build();
    let errors = ErrorChain::new().then(ErrorStrategy::message_for_key("error"));

    let traced = client.call::<TestData>(&request, &[200, 201], &errors).await;

    let error = traced.result.unwrap_err();
    assert!(matches!(error, Error::InvalidHttpCode { .. }));
    assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(error.to_string(), "invalid HTTP code: 404");
    assert_eq!(error.messages(), vec!["bad"]);
    assert_eq!(
        traced.log.server_output.as_deref(),
        Some(&br#"{"error":"bad"}"#[..])
    );
}

#[tokio::test]
async fn test_error_shape_in_successful_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "errors": ["x", "y"] })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client.get("soft failure", "/test").build();
    let errors = ErrorChain::new()
        .then(ErrorStrategy::exact_message("error", "nope"))
        .then(ErrorStrategy::array_for_key("errors"));

    let traced = client.call::<TestData>(&request, &[200], &errors).await;

    match traced.result {
        Err(Error::ErrorMessages(messages)) => assert_eq!(messages, vec!["x", "y"]),
        other => panic!("Expected ErrorMessages, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client.delete("remove", "/test").build();

    let traced = client
        .execute(&request)
        .await
        .and_then(|response| response.check_unauthorized(UNAUTHORIZED_CODES));

    assert!(matches!(traced.result, Err(Error::Unauthorized)));
    assert_eq!(traced.log.server_response.unwrap().status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_body_is_still_a_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client.patch("touch", "/test").build();

    let traced = client
        .execute(&request)
        .await
        .and_then(|response| response.accept_only(&[204], &ErrorChain::new()))
        .and_then(|response| deserialize::ignored(&response.body));

    assert!(traced.result.is_ok());
}

#[tokio::test]
async fn test_deserialization_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client.get("garbled", "/test").build();

    let traced = client
        .call::<TestData>(&request, &[200], &ErrorChain::new())
        .await;

    assert!(matches!(
        traced.result,
        Err(Error::Deserialization(DeserializationError::ToType { .. }))
    ));
    assert_eq!(
        traced.log.server_output.as_deref(),
        Some(&b"invalid json"[..])
    );
}

#[tokio::test]
async fn test_connection_failure() {
    let configuration = ClientConfiguration::builder()
        .scheme("http")
        .host("127.0.0.1")
        .port(1)
        .build()
        .unwrap();
    let client = Client::with_reqwest(configuration).unwrap();
    let request = client.get("refused", "/test").build();

    let traced = client.execute(&request).await;

    assert!(matches!(traced.result, Err(Error::Connection(_))));
    assert!(traced.log.connection_error.is_some());
    assert!(traced.log.server_response.is_none());
    assert!(traced.log.original_request.is_some());
}

#[tokio::test]
async fn test_transport_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let client = Client::new(configuration_for(&mock_server), transport);
    let request = client.get("slow", "/slow").build();

    let traced = client.execute(&request).await;

    match traced.result {
        Err(Error::Connection(error)) => assert_eq!(error.kind, TransportErrorKind::Timeout),
        other => panic!("Expected Connection timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_diagnostic_export() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(test_data())
                .insert_header("x-request-id", "abc"),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = client
        .post("export", "/test")
        .query_param("dry_run", true)
        .json_body(&test_data())
        .unwrap()
        .build();

    let exported = client.execute(&request).await.log.to_json();
    let field = |index: usize, name: &str| exported[index][name].clone();

    assert_eq!(field(0, "Connection Name"), "export");
    assert_eq!(field(1, "Request URL Scheme"), "http");
    assert_eq!(field(3, "Request URL Port"), mock_server.address().port());
    assert_eq!(field(4, "Request URL Path"), "/test");
    assert_eq!(field(5, "Request URL Query String"), "dry_run=true");
    assert_eq!(field(7, "Request HTTP Method"), "POST");
    assert_eq!(field(8, "Request HTTP Headers")["user-agent"], "test-agent");
    assert_eq!(field(9, "Request Body String Representation")["name"], "Test");
    assert_eq!(field(10, "Request Body Byte Length"), 22);
    assert!(field(11, "Connection Error").is_null());
    assert_eq!(field(12, "Response Status Code"), 201);
    assert_eq!(field(13, "Response HTTP Headers")["x-request-id"], "abc");
    assert_eq!(field(14, "Response Body")["name"], "Test");
}
