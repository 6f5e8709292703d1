//! Client tying a configuration and a transport to the call pipeline.
//!
//! A call runs: request resolution, one transport execution, classification,
//! then whatever checks the caller asks for. Diagnostics from every stage are
//! merged in that order into the log returned next to the result.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

use crate::diagnostics::Traced;
use crate::extraction::ErrorChain;
use crate::request::{ClientConfiguration, HttpMethod, Request, RequestBuilder};
use crate::response::{classify, HttpResponse, Response};
use crate::transport::{ReqwestTransport, Transport};
use crate::Result;

/// An HTTP client whose network I/O is delegated to a [`Transport`].
///
/// Cheap to clone; clones share the configuration and transport.
///
/// # Examples
///
/// ```no_run
/// use tracewire::{Client, ClientConfiguration, ErrorChain, ErrorStrategy};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// # async fn example() -> Result<(), tracewire::Error> {
/// let configuration = ClientConfiguration::builder().host("api.example.com").build()?;
/// let client = Client::with_reqwest(configuration)?;
///
/// let request = client.get("fetch user", "/users/42").build();
/// let errors = ErrorChain::new().then(ErrorStrategy::message_for_key("error"));
///
/// let traced = client.call::<User>(&request, &[200], &errors).await;
/// println!("{}", traced.log.to_json());
/// println!("User: {}", traced.result?.data.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    configuration: ClientConfiguration,
    transport: Box<dyn Transport>,
}

impl Client {
    /// Creates a client that executes requests through `transport`.
    pub fn new(configuration: ClientConfiguration, transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                configuration,
                transport: Box::new(transport),
            }),
        }
    }

    /// Creates a client backed by a default [`ReqwestTransport`], which times
    /// out requests after [`DEFAULT_TIMEOUT`](crate::DEFAULT_TIMEOUT).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_reqwest(configuration: ClientConfiguration) -> Result<Self> {
        Ok(Self::new(configuration, ReqwestTransport::builder().build()?))
    }

    pub fn configuration(&self) -> &ClientConfiguration {
        &self.inner.configuration
    }

    /// Starts a request against this client's configuration.
    pub fn request(&self, identifier: impl Into<String>, method: HttpMethod) -> RequestBuilder {
        RequestBuilder::new(identifier, &self.inner.configuration, method)
    }

    pub fn get(&self, identifier: impl Into<String>, path: impl Into<String>) -> RequestBuilder {
        self.request(identifier, HttpMethod::Get).path(path)
    }

    pub fn post(&self, identifier: impl Into<String>, path: impl Into<String>) -> RequestBuilder {
        self.request(identifier, HttpMethod::Post).path(path)
    }

    pub fn put(&self, identifier: impl Into<String>, path: impl Into<String>) -> RequestBuilder {
        self.request(identifier, HttpMethod::Put).path(path)
    }

    pub fn patch(&self, identifier: impl Into<String>, path: impl Into<String>) -> RequestBuilder {
        self.request(identifier, HttpMethod::Patch).path(path)
    }

    pub fn delete(&self, identifier: impl Into<String>, path: impl Into<String>) -> RequestBuilder {
        self.request(identifier, HttpMethod::Delete).path(path)
    }

    /// Resolves `request`, executes it once and classifies the outcome.
    ///
    /// The transport is not called when the request cannot be resolved.
    pub async fn execute(&self, request: &Request) -> Traced<HttpResponse> {
        let resolved = request.resolve();
        let http_request = match resolved.result {
            Ok(http_request) => http_request,
            Err(e) => return Traced::failure(e, resolved.log),
        };

        tracing::debug!(
            connection = %request.identifier,
            method = %http_request.method,
            url = %http_request.url,
            "Executing HTTP request"
        );

        let start_time = Instant::now();
        let outcome = self.inner.transport.execute(http_request).await;
        let latency = start_time.elapsed();

        let classified = classify(outcome);
        match &classified.result {
            Ok(response) => tracing::info!(
                connection = %request.identifier,
                status = response.status.as_u16(),
                latency_ms = latency.as_millis(),
                "Received HTTP response"
            ),
            Err(e) => tracing::warn!(
                connection = %request.identifier,
                error = %e,
                latency_ms = latency.as_millis(),
                "Request failed"
            ),
        }

        Traced::new(classified.result, resolved.log.compose(classified.log))
    }

    /// Executes `request` and decodes a JSON body into `Res`.
    ///
    /// The status must be one of `accepted`; otherwise the call fails with
    /// [`Error::InvalidHttpCode`](crate::Error::InvalidHttpCode), enriched by
    /// `errors`. An accepted body that is a JSON object is also run through
    /// `errors` before decoding, so an error shape in a successful response still
    /// fails the call.
    pub async fn call<Res>(
        &self,
        request: &Request,
        accepted: &[u16],
        errors: &ErrorChain,
    ) -> Traced<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute(request)
            .await
            .and_then(|response| response.accept_only(accepted, errors))
            .and_then(|response| response.check_body(errors))
            .and_then(HttpResponse::into_typed::<Res>)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("configuration", &self.inner.configuration)
            .finish_non_exhaustive()
    }
}
