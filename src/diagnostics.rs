//! Diagnostic trail of a call.
//!
//! Every pipeline stage produces a partial [`DiagnosticLog`]. Logs compose with a
//! right-biased merge: for each field, the later log's value wins when present.
//! Composition is associative with [`DiagnosticLog::empty`] as identity, so stages
//! can be merged in any grouping as long as their temporal order is kept.
//!
//! [`Traced`] pairs a stage's result with the log it produced. The log never
//! lives inside the result; it is available whether the call failed or not.

use bytes::Bytes;
use http::HeaderMap;
use serde_json::{json, Map, Value};

use crate::request::{HttpRequest, UrlComponents};
use crate::response::ResponseHead;
use crate::transport::TransportError;
use crate::{Error, Result};

/// Request and response metadata accumulated over one call.
///
/// # Examples
///
/// ```
/// use tracewire::DiagnosticLog;
///
/// let early = DiagnosticLog::empty().with_connection_name("first");
/// let late = DiagnosticLog::empty().with_connection_name("second");
///
/// assert_eq!(early.clone().compose(late).connection_name.as_deref(), Some("second"));
/// assert_eq!(early.clone().compose(DiagnosticLog::empty()), early);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticLog {
    /// The label the caller gave the call.
    pub connection_name: Option<String>,

    /// The components the request URL was assembled from.
    pub url_components: Option<UrlComponents>,

    /// The request as handed to the transport.
    pub original_request: Option<HttpRequest>,

    /// Readable form of a body that is not worth exporting byte for byte,
    /// such as a multipart upload.
    pub body_string_representation: Option<String>,

    /// The failure the transport reported, if any.
    pub connection_error: Option<TransportError>,

    /// Status line and headers of the response.
    pub server_response: Option<ResponseHead>,

    /// The raw response body.
    pub server_output: Option<Bytes>,
}

impl DiagnosticLog {
    /// The identity log, with every field absent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merges `later` over `self`, field by field. Present values in `later` win.
    pub fn compose(self, later: DiagnosticLog) -> DiagnosticLog {
        DiagnosticLog {
            connection_name: later.connection_name.or(self.connection_name),
            url_components: later.url_components.or(self.url_components),
            original_request: later.original_request.or(self.original_request),
            body_string_representation: later
                .body_string_representation
                .or(self.body_string_representation),
            connection_error: later.connection_error.or(self.connection_error),
            server_response: later.server_response.or(self.server_response),
            server_output: later.server_output.or(self.server_output),
        }
    }

    /// Returns `true` if no field is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Sets the connection name.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    /// Sets the URL components.
    pub fn with_url_components(mut self, components: UrlComponents) -> Self {
        self.url_components = Some(components);
        self
    }

    /// Sets the request snapshot.
    pub fn with_original_request(mut self, request: HttpRequest) -> Self {
        self.original_request = Some(request);
        self
    }

    /// Sets the readable body form.
    pub fn with_body_string_representation(mut self, body: impl Into<String>) -> Self {
        self.body_string_representation = Some(body.into());
        self
    }

    /// Sets the transport failure.
    pub fn with_connection_error(mut self, error: TransportError) -> Self {
        self.connection_error = Some(error);
        self
    }

    /// Sets the response status line and headers.
    pub fn with_server_response(mut self, response: ResponseHead) -> Self {
        self.server_response = Some(response);
        self
    }

    /// Sets the raw response body.
    pub fn with_server_output(mut self, output: impl Into<Bytes>) -> Self {
        self.server_output = Some(output.into());
        self
    }

    /// Exports the log as a JSON array of single-key objects in a fixed order.
    ///
    /// Every field name is always present; absent values are `null`. Bodies are
    /// rendered as JSON when they parse as JSON and as text otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use tracewire::DiagnosticLog;
    ///
    /// let exported = DiagnosticLog::empty().with_connection_name("ping").to_json();
    /// let fields = exported.as_array().unwrap();
    ///
    /// assert_eq!(fields.len(), 15);
    /// assert_eq!(fields[0]["Connection Name"], "ping");
    /// assert!(fields[12]["Response Status Code"].is_null());
    /// ```
    pub fn to_json(&self) -> Value {
        let components = self.url_components.as_ref();
        let request = self.original_request.as_ref();
        let request_body = request.and_then(|r| r.body.as_ref());

        let fields: [(&str, Option<Value>); 15] = [
            ("Connection Name", self.connection_name.clone().map(Value::String)),
            ("Request URL Scheme", components.map(|c| json!(c.scheme))),
            ("Request URL Host", components.map(|c| json!(c.host))),
            ("Request URL Port", components.and_then(|c| c.port).map(|p| json!(p))),
            ("Request URL Path", components.map(|c| json!(c.path))),
            ("Request URL Query String", components.and_then(|c| c.query()).map(Value::String)),
            ("Request URL Full String", request.map(|r| json!(r.url.as_str()))),
            ("Request HTTP Method", request.map(|r| json!(r.method.as_str()))),
            ("Request HTTP Headers", request.map(|r| headers_to_json(&r.headers))),
            (
                "Request Body String Representation",
                self.body_string_representation
                    .clone()
                    .map(Value::String)
                    .or_else(|| request_body.and_then(|body| body_to_json(body))),
            ),
            ("Request Body Byte Length", request_body.map(|body| json!(body.len()))),
            (
                "Connection Error",
                self.connection_error.as_ref().map(|error| {
                    json!({
                        "Kind": error.kind.as_str(),
                        "Code": error.kind.code(),
                        "Message": error.message,
                    })
                }),
            ),
            (
                "Response Status Code",
                self.server_response.as_ref().map(|r| json!(r.status.as_u16())),
            ),
            (
                "Response HTTP Headers",
                self.server_response.as_ref().map(|r| headers_to_json(&r.headers)),
            ),
            ("Response Body", self.server_output.as_ref().and_then(|b| body_to_json(b))),
        ];

        Value::Array(
            fields
                .into_iter()
                .map(|(name, value)| {
                    let mut entry = Map::new();
                    entry.insert(name.to_string(), value.unwrap_or(Value::Null));
                    Value::Object(entry)
                })
                .collect(),
        )
    }
}

impl FromIterator<DiagnosticLog> for DiagnosticLog {
    /// Composes logs in iteration order.
    fn from_iter<I: IntoIterator<Item = DiagnosticLog>>(iter: I) -> Self {
        iter.into_iter().fold(DiagnosticLog::empty(), DiagnosticLog::compose)
    }
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut object = Map::new();
    for (name, value) in headers {
        object.insert(
            name.as_str().to_string(),
            Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        );
    }
    Value::Object(object)
}

fn body_to_json(body: &[u8]) -> Option<Value> {
    serde_json::from_slice(body).ok().or_else(|| {
        std::str::from_utf8(body)
            .ok()
            .map(|text| Value::String(text.to_string()))
    })
}

/// A stage result paired with the diagnostics produced while computing it.
///
/// # Examples
///
/// ```
/// use tracewire::{DiagnosticLog, Error, Traced};
///
/// let parsed = Traced::success("42", DiagnosticLog::empty().with_connection_name("answer"))
///     .and_then(|text| text.parse::<u32>().map_err(|e| Error::Undefined(Box::new(e))));
///
/// assert_eq!(parsed.result.unwrap(), 42);
/// assert_eq!(parsed.log.connection_name.as_deref(), Some("answer"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct Traced<T> {
    /// What the stage produced.
    pub result: Result<T>,
    /// What the stage recorded, whatever the result.
    pub log: DiagnosticLog,
}

impl<T> Traced<T> {
    /// Pairs a result with its log.
    pub fn new(result: Result<T>, log: DiagnosticLog) -> Self {
        Self { result, log }
    }

    /// A successful stage.
    pub fn success(value: T, log: DiagnosticLog) -> Self {
        Self::new(Ok(value), log)
    }

    /// A failed stage.
    pub fn failure(error: Error, log: DiagnosticLog) -> Self {
        Self::new(Err(error), log)
    }

    /// Merges a log produced after this one.
    pub fn tell(self, later: DiagnosticLog) -> Self {
        Self {
            result: self.result,
            log: self.log.compose(later),
        }
    }

    /// Transforms the success value, keeping the log.
    pub fn map<U, F>(self, f: F) -> Traced<U>
    where
        F: FnOnce(T) -> U,
    {
        Traced {
            result: self.result.map(f),
            log: self.log,
        }
    }

    /// Chains a fallible step that produces no diagnostics of its own.
    pub fn and_then<U, F>(self, f: F) -> Traced<U>
    where
        F: FnOnce(T) -> Result<U>,
    {
        Traced {
            result: self.result.and_then(f),
            log: self.log,
        }
    }

    /// Chains a step that produces its own diagnostics.
    ///
    /// The step only runs on success; its log is merged after this one.
    pub fn and_then_traced<U, F>(self, f: F) -> Traced<U>
    where
        F: FnOnce(T) -> Traced<U>,
    {
        match self.result {
            Ok(value) => {
                let next = f(value);
                Traced {
                    result: next.result,
                    log: self.log.compose(next.log),
                }
            }
            Err(error) => Traced::failure(error, self.log),
        }
    }

    /// Returns `true` if the stage succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Splits into the result and the log.
    pub fn into_parts(self) -> (Result<T>, DiagnosticLog) {
        (self.result, self.log)
    }
}
