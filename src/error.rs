//! Error taxonomy for the request/response pipeline.
//!
//! Every stage of a call reports failure as a value of [`Error`]. Each kind carries
//! the context needed to render it (status code, header key, path, extracted
//! messages) without going back to the diagnostic trail, and no kind is ever
//! retried by this crate.

use http::StatusCode;
use serde_json::{Map, Value};

use crate::parse::JsonPath;
use crate::request::UrlComponents;
use crate::transport::TransportError;

/// The main error type for a call.
///
/// # Examples
///
/// ```
/// use tracewire::Error;
/// use http::StatusCode;
///
/// let err = Error::InvalidHttpCode {
///     status: StatusCode::NOT_FOUND,
///     detail: Some(Box::new(Error::ErrorMessage("missing user".to_string()))),
/// };
///
/// assert_eq!(err.to_string(), "invalid HTTP code: 404");
/// assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
/// assert_eq!(err.messages(), vec!["missing user"]);
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport reported a connection-level failure.
    ///
    /// This takes precedence over anything else the transport returned, even a
    /// complete response.
    #[error("connection failed: {0}")]
    Connection(TransportError),

    /// The URL components could not be assembled into a valid URL.
    ///
    /// No network call was attempted.
    #[error("invalid URL components: {0}")]
    Request(UrlComponents),

    /// A response arrived without any body bytes.
    #[error("received empty data")]
    NoData,

    /// The transport produced neither a response nor an error.
    #[error("no response")]
    NoResponse,

    /// The response status was not among the accepted codes.
    ///
    /// # Fields
    ///
    /// * `status` - The status code that was received
    /// * `detail` - An error extracted from the response body, if the body matched
    ///   one of the strategies supplied to the status check. It enriches the status
    ///   failure and never replaces it.
    #[error("invalid HTTP code: {}", .status.as_u16())]
    InvalidHttpCode {
        /// The HTTP status code
        status: StatusCode,
        /// The error extracted from the body, if any
        #[source]
        detail: Option<Box<Error>>,
    },

    /// A header was missing or was not a valid string.
    #[error("invalid header at key: {0}")]
    InvalidHeader(String),

    /// Nothing was found at a structured path inside a JSON object.
    #[error("no value found at path: {0}")]
    NoValueAtPath(JsonPath),

    /// An array did not contain the requested index.
    #[error("no value found at index: {index}")]
    NoValueInArray {
        /// The index that was requested
        index: usize,
    },

    /// A result set was empty.
    #[error("no results")]
    NoResults,

    /// The body carried a single error message.
    #[error("{0}")]
    ErrorMessage(String),

    /// The body carried several error messages.
    #[error("{}", .0.join("\n"))]
    ErrorMessages(Vec<String>),

    /// The body carried a structured error object.
    #[error("generic error")]
    ErrorObject(Map<String, Value>),

    /// The response status marked the call as unauthorized.
    #[error("authorization denied")]
    Unauthorized,

    /// A value could not be serialized into a request body.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Response bytes could not be deserialized into the expected shape.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// Any error that does not fit another kind.
    #[error("undefined error: {0}")]
    Undefined(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failures while encoding a request body.
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    /// JSON encoding failed.
    #[error("serialization error: JSON ({0})")]
    ToJson(#[source] serde_json::Error),

    /// The value was not a string-keyed mapping.
    #[error("serialization error: form-url-encoded")]
    ToFormUrlEncoded,
}

/// Failures while decoding response bytes.
///
/// Shape variants hold the parser error when parsing itself failed, and `None`
/// when parsing succeeded but produced a value of the wrong shape.
#[derive(thiserror::Error, Debug)]
pub enum DeserializationError {
    /// The bytes were not JSON.
    #[error("deserialization error: toAny ({0})")]
    ToAny(#[source] serde_json::Error),

    /// The bytes were not a JSON object.
    #[error("deserialization error: toAnyDict")]
    ToDict(#[source] Option<serde_json::Error>),

    /// The bytes were not a JSON array (of the expected element shape).
    #[error("deserialization error: toArray")]
    ToArray(#[source] Option<serde_json::Error>),

    /// The bytes were not valid UTF-8.
    #[error("deserialization error: toString")]
    ToString(#[source] std::str::Utf8Error),

    /// The bytes could not be decoded into a concrete type.
    #[error("deserialization error: {type_name} ({source})")]
    ToType {
        /// Name of the target type
        type_name: &'static str,
        /// The parser error
        source: serde_json::Error,
    },
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::InvalidHttpCode { status, .. } => Some(*status),
            Error::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Returns every error message carried by this error, including one extracted
    /// from the body of an invalid-status response.
    pub fn messages(&self) -> Vec<&str> {
        match self {
            Error::ErrorMessage(message) => vec![message.as_str()],
            Error::ErrorMessages(messages) => messages.iter().map(String::as_str).collect(),
            Error::InvalidHttpCode {
                detail: Some(detail),
                ..
            } => detail.messages(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if this error was produced by inspecting a response body.
    pub fn is_extracted(&self) -> bool {
        matches!(
            self,
            Error::ErrorMessage(_) | Error::ErrorMessages(_) | Error::ErrorObject(_)
        )
    }

    /// The error domain, for callers that key errors by domain and code.
    pub fn domain(&self) -> &'static str {
        match self {
            Error::Connection(_) => "Connection",
            Error::Serialization(_) => "Serialization",
            Error::Deserialization(_) => "Deserialization",
            Error::Undefined(_) => "Undefined",
            _ => "Client",
        }
    }

    /// A stable numeric code, unique within [`Error::domain`].
    pub fn code(&self) -> i64 {
        match self {
            Error::Request(_) => 0,
            Error::NoData => 1,
            Error::NoResponse => 2,
            Error::InvalidHttpCode { .. } => 3,
            Error::InvalidHeader(_) => 4,
            Error::NoValueAtPath(_) => 5,
            Error::NoValueInArray { .. } => 8,
            Error::NoResults => 9,
            Error::ErrorMessage(_) => 11,
            Error::ErrorMessages(_) => 12,
            Error::ErrorObject(_) => 13,
            Error::Unauthorized => 14,
            Error::Connection(error) => error.kind.code(),
            Error::Serialization(SerializationError::ToFormUrlEncoded) => 0,
            Error::Serialization(SerializationError::ToJson(_)) => 1,
            Error::Deserialization(error) => match error {
                DeserializationError::ToAny(_) => 0,
                DeserializationError::ToDict(_) => 1,
                DeserializationError::ToArray(_) => 2,
                DeserializationError::ToString(_) => 3,
                DeserializationError::ToType { .. } => 4,
            },
            Error::Undefined(_) => 0,
        }
    }
}

/// A specialized `Result` type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
