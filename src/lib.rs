//! # Tracewire - an HTTP client pipeline that keeps its receipts
//!
//! Tracewire builds requests from a shared configuration, hands them to an
//! injectable transport, and classifies what comes back into a typed result. Every
//! call also yields a [`DiagnosticLog`] describing the request and response,
//! whether the call succeeded or not.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tracewire::{Client, ClientConfiguration, ErrorChain, ErrorStrategy};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tracewire::Error> {
//!     let configuration = ClientConfiguration::builder()
//!         .host("api.example.com")
//!         .root_path("/v1")
//!         .default_header("Accept", "application/json")?
//!         .build()?;
//!     let client = Client::with_reqwest(configuration)?;
//!
//!     let request = client
//!         .post("create user", "/users")
//!         .json_body(&CreateUser { name: "Alice".to_string() })?
//!         .build();
//!
//!     // Servers that report failures as {"errors": [{"message": ...}]}
//!     let errors = ErrorChain::new().then(ErrorStrategy::messages_in_array("errors", "message"));
//!
//!     let traced = client.call::<User>(&request, &[200, 201], &errors).await;
//!     if traced.result.is_err() {
//!         eprintln!("{:#}", traced.log.to_json());
//!     }
//!     let user = traced.result?;
//!     println!("Created user {} with ID {}", user.name, user.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Failures are values of [`Error`]. A status outside the accepted set is always
//! [`Error::InvalidHttpCode`]; a message extracted from the body by an
//! [`ErrorChain`] rides along as its `detail`:
//!
//! ```
//! use tracewire::{Error, ErrorChain, ErrorStrategy, HttpResponse};
//! use http::{HeaderMap, StatusCode};
//!
//! let response = HttpResponse::new(StatusCode::CONFLICT, HeaderMap::new(), r#"{"error":"taken"}"#);
//! let errors = ErrorChain::new().then(ErrorStrategy::message_for_key("error"));
//!
//! let error = response.accept_only(&[200], &errors).unwrap_err();
//! assert_eq!(error.status(), Some(StatusCode::CONFLICT));
//! assert_eq!(error.messages(), vec!["taken"]);
//! ```
//!
//! ## Transports
//!
//! Anything implementing [`Transport`] can carry requests. [`ReqwestTransport`]
//! covers real networking; [`FnTransport`] wraps an async function, which is the
//! simplest way to stub the network in tests.

mod client;
pub mod deserialize;
mod diagnostics;
mod error;
mod extraction;
pub mod multipart;
pub mod parse;
mod request;
mod response;
pub mod serialize;
mod transport;

pub use client::Client;
pub use diagnostics::{DiagnosticLog, Traced};
pub use error::{DeserializationError, Error, Result, SerializationError};
pub use extraction::{ErrorChain, ErrorStrategy};
pub use multipart::{Multipart, Part};
pub use request::{
    ClientConfiguration, ClientConfigurationBuilder, HttpMethod, HttpRequest, Request,
    RequestBuilder, UrlComponents,
};
pub use response::{classify, HttpResponse, Response, ResponseHead, UNAUTHORIZED_CODES};
pub use transport::{
    FnTransport, RawOutcome, ReqwestTransport, ReqwestTransportBuilder, Transport,
    TransportError, TransportErrorKind, DEFAULT_TIMEOUT,
};
