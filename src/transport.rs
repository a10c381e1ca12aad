//! Authenticated JSON and multipart exchanges against one remote API.
//!
//! A [`Transport`] owns an immutable [`EndpointConfig`] and a [`Dispatch`]
//! implementation. Each exchange:
//!
//! 1. builds a [`RequestEnvelope`],
//! 2. dispatches it under the configured timeout and the transport's
//!    cancellation token,
//! 3. classifies the status (`>= 400` becomes [`RestError::RemoteApi`] with the
//!    raw body),
//! 4. decodes the body into the caller's target type unless the response is
//!    `204` or empty.
//!
//! Nothing is retried and nothing is cached. The transport holds no mutable
//! state, so clones share the underlying connection pool and may be used
//! concurrently.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::RestError;
use crate::http::{HttpMethod, MultipartBody, RawResponse, RequestBody, RequestEnvelope};

/// `User-Agent` sent by [`HttpDispatcher`].
pub const USER_AGENT: &str = concat!("hemmer-provider-rest/", env!("CARGO_PKG_VERSION"));

const JSON: &str = "application/json";

/// Moves one [`RequestEnvelope`] over the wire and returns the raw response.
///
/// Implementations must not interpret the status code; classification happens
/// in [`Transport`]. Connection-level failures are reported as
/// [`RestError::Transport`] or [`RestError::Timeout`].
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Execute a single request.
    async fn dispatch(
        &self,
        config: &EndpointConfig,
        request: RequestEnvelope,
    ) -> Result<RawResponse, RestError>;
}

/// [`Dispatch`] implementation backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Build a dispatcher whose client enforces the configured timeout.
    pub fn new(config: &EndpointConfig) -> Result<Self, RestError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| RestError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Dispatch for HttpDispatcher {
    async fn dispatch(
        &self,
        config: &EndpointConfig,
        request: RequestEnvelope,
    ) -> Result<RawResponse, RestError> {
        let mut url = config.resolve(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }

        let builder = self
            .client
            .request(request.method.into(), url)
            .bearer_auth(config.token())
            .header(ACCEPT, JSON);

        let builder = match request.body {
            RequestBody::Empty => builder.header(CONTENT_TYPE, JSON),
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(&value).map_err(RestError::Marshal)?;
                builder.header(CONTENT_TYPE, JSON).body(bytes)
            },
            // reqwest sets the multipart content type with its boundary.
            RequestBody::Multipart(body) => builder.multipart(into_form(body)),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest(e, config))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest(e, config))?;

        Ok(RawResponse { status, body })
    }
}

fn into_form(body: MultipartBody) -> Form {
    let mut form = Form::new();
    for (name, value) in body.fields {
        form = form.text(name, value);
    }
    if let Some((part_name, file)) = body.file {
        form = form.part(part_name, Part::bytes(file.content).file_name(file.file_name));
    }
    form
}

fn classify_reqwest(err: reqwest::Error, config: &EndpointConfig) -> RestError {
    if err.is_timeout() {
        RestError::Timeout(config.timeout())
    } else {
        RestError::Transport(err.to_string())
    }
}

/// Typed client for one remote API.
pub struct Transport<D = HttpDispatcher> {
    config: Arc<EndpointConfig>,
    dispatcher: Arc<D>,
    cancel: CancellationToken,
}

impl Transport<HttpDispatcher> {
    /// Create a transport that talks HTTP through `reqwest`.
    pub fn new(config: EndpointConfig) -> Result<Self, RestError> {
        let dispatcher = HttpDispatcher::new(&config)?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }
}

impl<D: Dispatch> Transport<D> {
    /// Create a transport over an arbitrary dispatcher.
    pub fn with_dispatcher(config: EndpointConfig, dispatcher: D) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            cancel: CancellationToken::new(),
        }
    }

    /// A handle sharing this transport's configuration and connection pool
    /// whose exchanges abort as soon as `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            config: Arc::clone(&self.config),
            dispatcher: Arc::clone(&self.dispatcher),
            cancel: token,
        }
    }

    /// The endpoint configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Send a JSON exchange and decode the response into `T`.
    ///
    /// `body` is serialized to JSON when present. Returns `Ok(None)` when the
    /// remote answers `204` or with an empty body.
    pub async fn exchange_json<B, T>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, RestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = json_request(method, path, body)?;
        let raw = self.send(request).await?;
        decode(raw)
    }

    /// Send a JSON exchange whose response body is not needed.
    pub async fn exchange_json_unit<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), RestError>
    where
        B: Serialize + ?Sized,
    {
        let request = json_request(method, path, body)?;
        self.send(request).await.map(|_| ())
    }

    /// Send a multipart exchange and decode the response into `T`.
    ///
    /// A body without a file part is still sent; it patches metadata without
    /// replacing the stored file.
    pub async fn exchange_multipart<T>(
        &self,
        method: HttpMethod,
        path: &str,
        body: MultipartBody,
    ) -> Result<Option<T>, RestError>
    where
        T: DeserializeOwned,
    {
        let request = RequestEnvelope::new(method, path).with_body(RequestBody::Multipart(body));
        let raw = self.send(request).await?;
        decode(raw)
    }

    /// Send a multipart exchange whose response body is not needed.
    pub async fn exchange_multipart_unit(
        &self,
        method: HttpMethod,
        path: &str,
        body: MultipartBody,
    ) -> Result<(), RestError> {
        let request = RequestEnvelope::new(method, path).with_body(RequestBody::Multipart(body));
        self.send(request).await.map(|_| ())
    }

    /// Dispatch a prepared request and classify its status.
    ///
    /// Statuses `>= 400` are returned as [`RestError::RemoteApi`] with the body
    /// untouched; anything below is handed back for decoding.
    pub async fn send(&self, request: RequestEnvelope) -> Result<RawResponse, RestError> {
        let method = request.method;
        let path = request.path.clone();
        let timeout = self.config.timeout();

        let exchange = tokio::time::timeout(
            timeout,
            self.dispatcher.dispatch(&self.config, request),
        );

        let raw = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(%method, %path, "Exchange cancelled");
                return Err(RestError::Cancelled);
            }
            result = exchange => match result {
                Ok(outcome) => outcome?,
                Err(_) => {
                    debug!(%method, %path, ?timeout, "Exchange timed out");
                    return Err(RestError::Timeout(timeout));
                }
            },
        };

        debug!(%method, %path, status = raw.status, "Exchange completed");

        if raw.status >= 400 {
            return Err(RestError::RemoteApi {
                status: raw.status,
                body: raw.body,
            });
        }
        Ok(raw)
    }
}

impl<D> Clone for Transport<D> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            dispatcher: Arc::clone(&self.dispatcher),
            cancel: self.cancel.clone(),
        }
    }
}

impl<D> fmt::Debug for Transport<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn json_request<B>(method: HttpMethod, path: &str, body: Option<&B>) -> Result<RequestEnvelope, RestError>
where
    B: Serialize + ?Sized,
{
    let body = match body {
        Some(body) => RequestBody::Json(serde_json::to_value(body).map_err(RestError::Marshal)?),
        None => RequestBody::Empty,
    };
    Ok(RequestEnvelope::new(method, path).with_body(body))
}

/// Decode a successful response, skipping `204` and empty bodies.
pub fn decode<T: DeserializeOwned>(raw: RawResponse) -> Result<Option<T>, RestError> {
    if raw.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(&raw.body) {
        Ok(value) => Ok(Some(value)),
        Err(source) => Err(RestError::Decode {
            source,
            body: raw.body,
        }),
    }
}
