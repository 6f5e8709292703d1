//! Client configuration and request resolution.
//!
//! A [`ClientConfiguration`] is shared read-only by every call. Each call builds a
//! [`Request`] through a [`RequestBuilder`], then resolves it into the concrete
//! [`HttpRequest`] handed to the transport. Resolution always produces a
//! [`DiagnosticLog`], whether or not the URL turned out to be valid.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use url::{Host, Url};

use crate::diagnostics::{DiagnosticLog, Traced};
use crate::multipart::Multipart;
use crate::{serialize, Error, Result};

/// The HTTP methods a request can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// The method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Base settings shared by every request of a client.
///
/// Immutable once built. Use [`ClientConfiguration::builder`] for validated
/// construction.
///
/// # Examples
///
/// ```
/// use tracewire::ClientConfiguration;
///
/// # fn example() -> Result<(), tracewire::Error> {
/// let configuration = ClientConfiguration::builder()
///     .host("api.example.com")
///     .root_path("/v1")
///     .default_header("Accept", "application/json")?
///     .build()?;
///
/// assert_eq!(configuration.scheme(), "https");
/// assert_eq!(configuration.root_path(), Some("/v1"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfiguration {
    scheme: String,
    host: String,
    port: Option<u16>,
    root_path: Option<String>,
    default_headers: HeaderMap,
}

impl ClientConfiguration {
    /// Creates a configuration without validating it.
    ///
    /// An invalid combination surfaces later as [`Error::Request`] when a request
    /// is resolved.
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        root_path: Option<String>,
        default_headers: HeaderMap,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            root_path,
            default_headers,
        }
    }

    /// Creates a new `ClientConfigurationBuilder`.
    pub fn builder() -> ClientConfigurationBuilder {
        ClientConfigurationBuilder::new()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn root_path(&self) -> Option<&str> {
        self.root_path.as_deref()
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// The URL components every request of this configuration starts from.
    pub fn base_components(&self) -> UrlComponents {
        UrlComponents {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            path: self.root_path.clone().unwrap_or_default(),
            query_items: None,
        }
    }
}

/// Builder for a validated [`ClientConfiguration`].
#[derive(Debug)]
pub struct ClientConfigurationBuilder {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    root_path: Option<String>,
    default_headers: HeaderMap,
}

impl ClientConfigurationBuilder {
    /// Creates a builder using the `https` scheme.
    pub fn new() -> Self {
        Self {
            scheme: "https".to_string(),
            host: None,
            port: None,
            root_path: None,
            default_headers: HeaderMap::new(),
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the path prefix of every request. It must start with `/`.
    pub fn root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    /// Adds a header sent with every request unless the request overrides it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] if the scheme, host, port and root path do not
    /// form a valid URL.
    pub fn build(self) -> Result<ClientConfiguration> {
        let configuration = ClientConfiguration {
            scheme: self.scheme,
            host: self.host.unwrap_or_default(),
            port: self.port,
            root_path: self.root_path,
            default_headers: self.default_headers,
        };

        let components = configuration.base_components();
        match components.to_url() {
            Some(_) => Ok(configuration),
            None => Err(Error::Request(components)),
        }
    }
}

impl Default for ClientConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The pieces a request URL is assembled from.
///
/// The path is kept exactly as composed: the root path followed by the call's
/// path, with no slash normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlComponents {
    /// URL scheme, such as `https`.
    pub scheme: String,
    /// Host name or IP address.
    pub host: String,
    /// Explicit port; `None` uses the scheme's default.
    pub port: Option<u16>,
    /// Root path followed by the call's path.
    pub path: String,
    /// `None` when the request has no query component at all.
    pub query_items: Option<Vec<(String, String)>>,
}

impl UrlComponents {
    /// Appends a path segment verbatim.
    pub fn append_path(mut self, path: &str) -> Self {
        self.path.push_str(path);
        self
    }

    /// Replaces the query items. An empty mapping removes the query component.
    pub fn with_query(mut self, parameters: &BTreeMap<String, String>) -> Self {
        self.query_items = if parameters.is_empty() {
            None
        } else {
            Some(
                parameters
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )
        };
        self
    }

    /// The encoded query string, without the leading `?`.
    pub fn query(&self) -> Option<String> {
        self.query_items.as_ref().map(|items| {
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(items)
                .finish()
        })
    }

    /// Assembles the components into a URL.
    ///
    /// Returns `None` when the scheme or host is unusable, or when the path
    /// cannot be sent as written: a non-empty path must start with `/` and may
    /// not contain `.` or `..` segments, which URL parsing would collapse.
    pub fn to_url(&self) -> Option<Url> {
        if !(self.path.is_empty() || self.path.starts_with('/')) || has_dot_segment(&self.path) {
            return None;
        }
        Host::parse(&self.host).ok()?;

        let mut url = Url::parse(&format!("{}://{}", self.scheme, self.host)).ok()?;
        if url.host().is_none() || url.path().len() > 1 || url.query().is_some() {
            return None;
        }

        url.set_port(self.port).ok()?;
        url.set_path(&self.path);
        if let Some(items) = &self.query_items {
            url.query_pairs_mut().clear().extend_pairs(items);
        }
        Some(url)
    }
}

impl fmt::Display for UrlComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = self.query() {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// A fully resolved request descriptor.
///
/// Built once per call by [`RequestBuilder::build`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Free-form label that names the call in diagnostics.
    pub identifier: String,
    /// Where the request goes.
    pub url_components: UrlComponents,
    pub method: HttpMethod,
    /// Default headers merged with the call's own.
    pub headers: HeaderMap,
    /// Encoded body bytes.
    pub body: Option<Bytes>,
    /// Readable form of the body for diagnostics, set for multipart bodies.
    pub body_description: Option<String>,
}

impl Request {
    /// Starts building a request from a configuration.
    pub fn builder(
        identifier: impl Into<String>,
        configuration: &ClientConfiguration,
        method: HttpMethod,
    ) -> RequestBuilder {
        RequestBuilder::new(identifier, configuration, method)
    }

    /// Resolves the descriptor into the request handed to the transport.
    ///
    /// The returned log holds, in order: the connection name, the URL components
    /// and, when the URL is valid, the request snapshot and body description.
    ///
    /// # Examples
    ///
    /// ```
    /// use tracewire::{ClientConfiguration, HttpMethod, Request};
    ///
    /// # fn example() -> Result<(), tracewire::Error> {
    /// let configuration = ClientConfiguration::builder().host("api.example.com").build()?;
    /// let request = Request::builder("list users", &configuration, HttpMethod::Get)
    ///     .path("/users")
    ///     .query_param("page", 2)
    ///     .build();
    ///
    /// let resolved = request.resolve();
    /// let http_request = resolved.result?;
    /// assert_eq!(http_request.url.as_str(), "https://api.example.com/users?page=2");
    /// assert_eq!(resolved.log.connection_name.as_deref(), Some("list users"));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn resolve(&self) -> Traced<HttpRequest> {
        let log = DiagnosticLog::empty()
            .with_connection_name(self.identifier.clone())
            .compose(DiagnosticLog::empty().with_url_components(self.url_components.clone()));

        let Some(url) = self.url_components.to_url() else {
            tracing::warn!(
                connection = %self.identifier,
                components = %self.url_components,
                "Cannot assemble request URL"
            );
            return Traced::failure(Error::Request(self.url_components.clone()), log);
        };

        let request = HttpRequest {
            url,
            method: self.method,
            headers: self.headers.clone(),
            body: self.body.clone(),
        };

        let mut snapshot = DiagnosticLog::empty().with_original_request(request.clone());
        snapshot.body_string_representation = self.body_description.clone();

        Traced::success(request, log.compose(snapshot))
    }
}

/// Builder that merges per-call settings over a [`ClientConfiguration`].
///
/// # Examples
///
/// ```
/// use tracewire::{ClientConfiguration, HttpMethod, RequestBuilder};
///
/// # fn example() -> Result<(), tracewire::Error> {
/// let configuration = ClientConfiguration::builder()
///     .host("api.example.com")
///     .default_header("X-Client", "default")?
///     .build()?;
///
/// let request = RequestBuilder::new("create user", &configuration, HttpMethod::Post)
///     .path("/users")
///     .header("X-Client", "override")?
///     .json_body(&serde_json::json!({ "name": "Alice" }))?
///     .build();
///
/// assert_eq!(request.headers["x-client"], "override");
/// assert_eq!(request.body.as_deref(), Some(&br#"{"name":"Alice"}"#[..]));
/// assert_eq!(request.body_description, None);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    identifier: String,
    method: HttpMethod,
    components: UrlComponents,
    path: String,
    query_params: BTreeMap<String, String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    body_description: Option<String>,
}

impl RequestBuilder {
    /// Creates a builder seeded with the configuration's URL and default headers.
    pub fn new(
        identifier: impl Into<String>,
        configuration: &ClientConfiguration,
        method: HttpMethod,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            method,
            components: configuration.base_components(),
            path: String::new(),
            query_params: BTreeMap::new(),
            headers: configuration.default_headers.clone(),
            body: None,
            body_description: None,
        }
    }

    /// Sets the path appended to the root path. Supply the leading `/`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a query parameter, rendered with its `Display` form.
    pub fn query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query_params.insert(key.into(), value.to_string());
        self
    }

    /// Adds multiple query parameters.
    pub fn query_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Sets a header, replacing any default with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Merges a header map, replacing defaults that share a name.
    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for name in headers.keys() {
            self.headers.remove(name);
        }
        for (name, value) in headers {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Sets raw body bytes.
    ///
    /// Diagnostics export these bytes as JSON when they parse, and as text
    /// otherwise.
    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self.body_description = None;
        self
    }

    /// Serializes `body` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `body` cannot be encoded.
    pub fn json_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        Ok(self.raw_body(serialize::to_json(body)?))
    }

    /// Serializes `body` as `application/x-www-form-urlencoded`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `body` is not a string-keyed mapping.
    pub fn form_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        Ok(self.raw_body(serialize::to_form_urlencoded(body)?))
    }

    /// Attaches a multipart body together with its `Content-Type` header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the boundary is not a valid header value.
    pub fn multipart(mut self, multipart: &Multipart) -> Result<Self> {
        let headers = multipart.headers()?;
        self = self.headers(&headers);
        self.body = Some(multipart.encode());
        self.body_description = Some(multipart.string_representation());
        Ok(self)
    }

    /// Resolves the final descriptor.
    pub fn build(self) -> Request {
        Request {
            identifier: self.identifier,
            url_components: self
                .components
                .append_path(&self.path)
                .with_query(&self.query_params),
            method: self.method,
            headers: self.headers,
            body: self.body,
            body_description: self.body_description,
        }
    }
}

/// The concrete request handed to a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// The assembled URL, query included.
    pub url: Url,
    pub method: HttpMethod,
    pub headers: HeaderMap,
    /// Body bytes, sent as is.
    pub body: Option<Bytes>,
}

fn has_dot_segment(path: &str) -> bool {
    path.contains('\\')
        || path.split('/').any(|segment| {
            matches!(
                segment.to_ascii_lowercase().as_str(),
                "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
            )
        })
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name =
        HeaderName::try_from(name).map_err(|_| Error::InvalidHeader(name.to_string()))?;
    let header_value =
        HeaderValue::try_from(value).map_err(|_| Error::InvalidHeader(name.to_string()))?;
    Ok((header_name, header_value))
}
