//! The transport seam.
//!
//! A [`Transport`] performs the network I/O for one resolved [`HttpRequest`] and
//! reports whatever it got back as a [`RawOutcome`]: optional body bytes, an
//! optional response head and an optional transport error. Any combination is
//! possible; classifying it is the pipeline's job, not the transport's.
//!
//! Pooling, retries, TLS and timeouts all belong here, never in the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::request::HttpRequest;
use crate::response::ResponseHead;
use crate::{Error, Result};

/// A failure reported by the transport itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&reqwest::Error> for TransportError {
    fn from(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error.to_string())
    }
}

/// Coarse category of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The transport gave up waiting.
    Timeout,
    /// The response body could not be read.
    Body,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Other => "other",
        }
    }

    /// Numeric code within the `Connection` error domain.
    pub fn code(&self) -> i64 {
        match self {
            TransportErrorKind::Other => 0,
            TransportErrorKind::Connect => 1,
            TransportErrorKind::Timeout => 2,
            TransportErrorKind::Body => 3,
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transport reported for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutcome {
    /// Body bytes, if any arrived.
    pub body: Option<Bytes>,
    /// Status line and headers, if a response arrived.
    pub response: Option<ResponseHead>,
    /// The transport's own failure, if any.
    pub error: Option<TransportError>,
}

impl RawOutcome {
    /// A complete response with its body.
    pub fn response(head: ResponseHead, body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            response: Some(head),
            error: None,
        }
    }

    /// A transport failure with nothing else.
    pub fn failed(error: TransportError) -> Self {
        Self {
            body: None,
            response: None,
            error: Some(error),
        }
    }
}

/// Executes resolved requests.
///
/// Implementations are called exactly once per call and must resolve to a single
/// outcome. The pipeline adds no timeout of its own.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and reports what came back.
    async fn execute(&self, request: HttpRequest) -> RawOutcome;
}

/// Adapts an async function into a [`Transport`].
///
/// # Examples
///
/// ```
/// use tracewire::{FnTransport, HttpRequest, RawOutcome, ResponseHead};
/// use http::{HeaderMap, StatusCode};
///
/// let transport = FnTransport::new(|_request: HttpRequest| async {
///     RawOutcome::response(ResponseHead::new(StatusCode::OK, HeaderMap::new()), "{}")
/// });
/// # let _ = transport;
/// ```
pub struct FnTransport<F> {
    function: F,
}

impl<F> FnTransport<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = RawOutcome> + Send + 'static,
{
    async fn execute(&self, request: HttpRequest) -> RawOutcome {
        (self.function)(request).await
    }
}

/// Request timeout of a [`ReqwestTransport`] unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A [`Transport`] backed by `reqwest`.
///
/// # Examples
///
/// ```no_run
/// use tracewire::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), tracewire::Error> {
/// let transport = ReqwestTransport::builder()
///     .timeout(Duration::from_secs(20))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Starts a builder with [`DEFAULT_TIMEOUT`].
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// The timeout applied to each request, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> RawOutcome {
        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return RawOutcome::failed(TransportError::from(&e)),
        };

        let head = ResponseHead::new(response.status(), response.headers().clone());
        match response.bytes().await {
            Ok(body) => RawOutcome::response(head, body),
            Err(e) => RawOutcome {
                body: None,
                response: Some(head),
                error: Some(TransportError::from(&e)),
            },
        }
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: None,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Sets the timeout applied to each request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the request timeout; the request then waits as long as the
    /// server does.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets the timeout for establishing connections.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Undefined`] if the underlying client cannot be created.
    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build().map_err(|e| Error::Undefined(Box::new(e)))?;

        Ok(ReqwestTransport {
            client,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpMethod;
    use http::{HeaderMap, StatusCode};

    fn request() -> HttpRequest {
        HttpRequest {
            url: "https://api.example.com/ping".parse().unwrap(),
            method: HttpMethod::Get,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn fn_transport_forwards_the_request() {
        let transport = FnTransport::new(|request: HttpRequest| async move {
            RawOutcome::response(
                ResponseHead::new(StatusCode::OK, HeaderMap::new()),
                request.url.path().to_string(),
            )
        });

        let outcome = transport.execute(request()).await;
        assert_eq!(outcome.body.as_deref(), Some(&b"/ping"[..]));
        assert_eq!(outcome.error, None);
    }

    #[test]
    fn builder_applies_default_timeout() {
        let transport = ReqwestTransport::builder().build().unwrap();
        assert_eq!(transport.timeout(), Some(Duration::from_secs(20)));

        let transport = ReqwestTransport::builder()
            .timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(transport.timeout(), Some(Duration::from_millis(250)));

        let transport = ReqwestTransport::builder().no_timeout().build().unwrap();
        assert_eq!(transport.timeout(), None);
    }

    #[test]
    fn error_kind_is_rendered_in_display() {
        let error = TransportError::new(TransportErrorKind::Connect, "refused");
        assert_eq!(error.to_string(), "connect: refused");
        assert_eq!(error.kind.code(), 1);
    }
}
