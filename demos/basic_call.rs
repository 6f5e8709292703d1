//! Basic example demonstrating a call pipeline and its diagnostic log.
//!
//! The transport here is a stub that answers every request locally, so the
//! example runs without network access. Swap in `Client::with_reqwest` to talk
//! to a real server.
//!
//! Run with: `cargo run --example basic_call`

use http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tracewire::{
    Client, ClientConfiguration, Error, ErrorChain, ErrorStrategy, FnTransport, HttpMethod,
    HttpRequest, RawOutcome, ResponseHead,
};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
}

async fn stub_server(request: HttpRequest) -> RawOutcome {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));

    match (request.method, request.url.path()) {
        (HttpMethod::Get, "/v1/posts/1") => RawOutcome::response(
            ResponseHead::new(StatusCode::OK, headers),
            r#"{"id":1,"title":"Hello"}"#,
        ),
        (HttpMethod::Post, "/v1/posts") => RawOutcome::response(
            ResponseHead::new(StatusCode::UNPROCESSABLE_ENTITY, headers),
            r#"{"errors":[{"message":"title is too short"}]}"#,
        ),
        _ => RawOutcome::response(ResponseHead::new(StatusCode::NOT_FOUND, headers), "{}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("tracewire=debug,basic_call=info")
        .init();

    let configuration = ClientConfiguration::builder()
        .host("api.example.com")
        .root_path("/v1")
        .default_header("Accept", "application/json")?
        .build()?;
    let client = Client::new(configuration, FnTransport::new(stub_server));
    let errors = ErrorChain::new().then(ErrorStrategy::messages_in_array("errors", "message"));

    println!("=== GET Request Example ===");
    let request = client.get("fetch post", "/posts/1").build();
    let traced = client.call::<Post>(&request, &[200], &errors).await;
    println!("Post: {:?}", traced.result?.data);
    println!();

    println!("=== Failed POST Request Example ===");
    let request = client
        .post("create post", "/posts")
        .json_body(&NewPost {
            title: "Hi".to_string(),
        })?
        .build();
    let traced = client.call::<Post>(&request, &[200, 201], &errors).await;

    if let Err(error) = &traced.result {
        println!("Error: {}", error);
        println!("Status: {:?}", error.status());
        println!("Messages: {:?}", error.messages());
    }
    println!();

    println!("=== Diagnostic Log ===");
    match serde_json::to_string_pretty(&traced.log.to_json()) {
        Ok(exported) => println!("{}", exported),
        Err(e) => println!("Could not render log: {}", e),
    }

    Ok(())
}
