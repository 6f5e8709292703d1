//! Response classification and validation.
//!
//! [`classify`] turns a transport's [`RawOutcome`] into an [`HttpResponse`] or a
//! typed failure, recording whatever arrived in the diagnostic log. The
//! combinators on [`HttpResponse`] are independent checks that callers chain in
//! the order they need.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::diagnostics::{DiagnosticLog, Traced};
use crate::extraction::ErrorChain;
use crate::transport::RawOutcome;
use crate::{deserialize, Error, Result};

/// Status codes [`HttpResponse::check_unauthorized`] rejects by default.
pub const UNAUTHORIZED_CODES: &[u16] = &[401];

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHead {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Creates a response head.
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }
}

/// A response that arrived complete, with its raw body.
///
/// # Examples
///
/// ```
/// use tracewire::{Error, ErrorChain, ErrorStrategy, HttpResponse};
/// use http::{HeaderMap, StatusCode};
///
/// let response = HttpResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), r#"{"error":"bad"}"#);
/// let errors = ErrorChain::new().then(ErrorStrategy::message_for_key("error"));
///
/// match response.accept_only(&[200, 201], &errors) {
///     Err(Error::InvalidHttpCode { status, detail }) => {
///         assert_eq!(status, StatusCode::NOT_FOUND);
///         assert!(matches!(detail.as_deref(), Some(Error::ErrorMessage(m)) if m == "bad"));
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The body bytes, possibly empty.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Passes the response through iff its status is in `codes`.
    ///
    /// Otherwise the body is parsed as a JSON object and run through `errors`;
    /// an extracted error is attached as the failure's `detail`, but the failure
    /// is always [`Error::InvalidHttpCode`]. A body that does not parse is
    /// ignored.
    pub fn accept_only(self, codes: &[u16], errors: &ErrorChain) -> Result<Self> {
        if codes.contains(&self.status.as_u16()) {
            return Ok(self);
        }

        let detail = deserialize::to_dict_json(&self.body)
            .ok()
            .and_then(|object| errors.check(&object).err())
            .map(Box::new);

        if self.status.is_client_error() {
            tracing::error!(
                status = self.status.as_u16(),
                detail = ?detail,
                "Client error (4xx)"
            );
        } else if self.status.is_server_error() {
            tracing::warn!(
                status = self.status.as_u16(),
                detail = ?detail,
                "Server error (5xx)"
            );
        }

        Err(Error::InvalidHttpCode {
            status: self.status,
            detail,
        })
    }

    /// Fails with [`Error::Unauthorized`] iff the status is in `codes`.
    ///
    /// See [`UNAUTHORIZED_CODES`] for the usual set.
    pub fn check_unauthorized(self, codes: &[u16]) -> Result<Self> {
        if codes.contains(&self.status.as_u16()) {
            Err(Error::Unauthorized)
        } else {
            Ok(self)
        }
    }

    /// Returns a header value, or [`Error::InvalidHeader`] naming `key` if it is
    /// missing or not visible ASCII.
    pub fn header(&self, key: &str) -> Result<&str> {
        self.headers
            .get(key)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::InvalidHeader(key.to_string()))
    }

    /// Parses the body as a JSON object and runs `errors` over it.
    pub fn json_object(&self, errors: &ErrorChain) -> Result<Map<String, Value>> {
        errors.apply(deserialize::to_dict_json(&self.body)?)
    }

    /// Runs `errors` over the body when it is a JSON object; any other body
    /// passes through.
    pub fn check_body(self, errors: &ErrorChain) -> Result<Self> {
        if let Ok(object) = deserialize::to_dict_json(&self.body) {
            errors.check(&object)?;
        }
        Ok(self)
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        deserialize::to_string(&self.body)
    }

    /// Decodes the body into `T`, keeping the response details.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let data = deserialize::to_typed(&self.body)?;
        Ok(Response {
            data,
            raw_body: self.body,
            status: self.status,
            headers: self.headers,
        })
    }
}

/// Classifies a transport outcome.
///
/// Precedence: a transport error wins over everything, then a missing response,
/// then a missing body. The log records whichever of error, response head and
/// body were present, regardless of the classification.
///
/// # Examples
///
/// ```
/// use tracewire::{classify, Error, RawOutcome, ResponseHead, TransportError, TransportErrorKind};
/// use http::{HeaderMap, StatusCode};
///
/// let mut outcome = RawOutcome::response(ResponseHead::new(StatusCode::OK, HeaderMap::new()), "{}");
/// outcome.error = Some(TransportError::new(TransportErrorKind::Other, "reset"));
///
/// let classified = classify(outcome);
/// assert!(matches!(classified.result, Err(Error::Connection(_))));
/// assert_eq!(classified.log.server_response.unwrap().status, StatusCode::OK);
/// ```
pub fn classify(outcome: RawOutcome) -> Traced<HttpResponse> {
    let log = DiagnosticLog {
        connection_error: outcome.error.clone(),
        server_response: outcome.response.clone(),
        server_output: outcome.body.clone(),
        ..DiagnosticLog::empty()
    };

    let result = match outcome {
        RawOutcome {
            error: Some(error), ..
        } => Err(Error::Connection(error)),
        RawOutcome { response: None, .. } => Err(Error::NoResponse),
        RawOutcome { body: None, .. } => Err(Error::NoData),
        RawOutcome {
            response: Some(head),
            body: Some(body),
            ..
        } => Ok(HttpResponse {
            status: head.status,
            headers: head.headers,
            body,
        }),
    };

    Traced::new(result, log)
}

/// A decoded response body together with the response details.
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body.
    pub raw_body: Bytes,

    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,
}

impl<T> Response<T> {
    /// Maps the response data to a different type, keeping the details.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
        }
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ErrorStrategy;
    use crate::transport::{TransportError, TransportErrorKind};
    use http::HeaderValue;

    fn head(status: u16) -> ResponseHead {
        ResponseHead::new(StatusCode::from_u16(status).unwrap(), HeaderMap::new())
    }

    fn timeout() -> TransportError {
        TransportError::new(TransportErrorKind::Timeout, "deadline exceeded")
    }

    #[test]
    fn transport_error_wins_over_response() {
        let outcome = RawOutcome {
            body: Some(Bytes::from_static(b"{}")),
            response: Some(head(200)),
            error: Some(timeout()),
        };

        let classified = classify(outcome);
        assert!(matches!(classified.result, Err(Error::Connection(e)) if e == timeout()));
        assert_eq!(classified.log.connection_error, Some(timeout()));
        assert_eq!(classified.log.server_response, Some(head(200)));
        assert_eq!(classified.log.server_output.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn missing_response_beats_missing_body() {
        let classified = classify(RawOutcome {
            body: Some(Bytes::from_static(b"orphan")),
            ..RawOutcome::default()
        });
        assert!(matches!(classified.result, Err(Error::NoResponse)));
        assert_eq!(classified.log.server_output.as_deref(), Some(&b"orphan"[..]));

        let classified = classify(RawOutcome::default());
        assert!(matches!(classified.result, Err(Error::NoResponse)));
        assert!(classified.log.is_empty());
    }

    #[test]
    fn response_without_body_is_no_data() {
        let classified = classify(RawOutcome {
            response: Some(head(204)),
            ..RawOutcome::default()
        });
        assert!(matches!(classified.result, Err(Error::NoData)));
        assert_eq!(classified.log.server_response, Some(head(204)));
    }

    #[test]
    fn complete_outcome_succeeds() {
        let classified = classify(RawOutcome::response(head(201), "created"));
        let response = classified.result.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.text().unwrap(), "created");
    }

    #[test]
    fn accepted_status_passes_through() {
        let response = HttpResponse::new(StatusCode::CREATED, HeaderMap::new(), "{}");
        assert!(response.accept_only(&[200, 201], &ErrorChain::new()).is_ok());
    }

    #[test]
    fn status_check_wins_over_message_extraction() {
        let response =
            HttpResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), r#"{"error":"bad"}"#);
        let errors = ErrorChain::new().then(ErrorStrategy::message_for_key("error"));

        let error = response.accept_only(&[200, 201], &errors).unwrap_err();
        assert_eq!(error.to_string(), "invalid HTTP code: 404");
        assert_eq!(error.messages(), vec!["bad"]);
    }

    #[test]
    fn unparseable_error_body_keeps_status_failure() {
        let response = HttpResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), "<html>");
        let errors = ErrorChain::new().then(ErrorStrategy::message_for_key("error"));

        match response.accept_only(&[200], &errors) {
            Err(Error::InvalidHttpCode { status, detail }) => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert!(detail.is_none());
            }
            other => panic!("Expected InvalidHttpCode, got {:?}", other),
        }
    }

    #[test]
    fn unauthorized_ignores_body() {
        let response =
            HttpResponse::new(StatusCode::UNAUTHORIZED, HeaderMap::new(), r#"{"error":"x"}"#);
        assert!(matches!(
            response.check_unauthorized(UNAUTHORIZED_CODES),
            Err(Error::Unauthorized)
        ));

        let response = HttpResponse::new(StatusCode::FORBIDDEN, HeaderMap::new(), "");
        assert!(response.check_unauthorized(UNAUTHORIZED_CODES).is_ok());
    }

    #[test]
    fn header_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        headers.insert("x-binary", HeaderValue::from_bytes(&[0xfa]).unwrap());
        let response = HttpResponse::new(StatusCode::OK, headers, "");

        assert_eq!(response.header("X-Request-Id").unwrap(), "abc");
        assert!(matches!(response.header("x-missing"), Err(Error::InvalidHeader(k)) if k == "x-missing"));
        assert!(matches!(response.header("x-binary"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn body_check_reclassifies_successful_status() {
        let errors = ErrorChain::new().then(ErrorStrategy::array_for_key("errors"));

        let response = HttpResponse::new(StatusCode::OK, HeaderMap::new(), r#"{"errors":["x"]}"#);
        assert!(matches!(response.check_body(&errors), Err(Error::ErrorMessages(_))));

        let response = HttpResponse::new(StatusCode::OK, HeaderMap::new(), "[1,2]");
        assert!(response.check_body(&errors).is_ok());
    }

    #[test]
    fn typed_decoding_keeps_details() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let response = HttpResponse::new(StatusCode::OK, headers, "[1,2,3]");

        let typed = response.into_typed::<Vec<u8>>().unwrap();
        assert_eq!(typed.data, vec![1, 2, 3]);
        assert_eq!(typed.len(), 3);
        assert_eq!(typed.header("content-type"), Some("application/json"));

        let mapped = typed.map(|items| items.len());
        assert_eq!(mapped.data, 3);
    }
}
