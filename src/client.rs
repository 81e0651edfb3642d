//! HTTP client for the Coveo REST API.
//!
//! Every request is scoped to one organization, authenticated with the
//! configured API key, and carries a JSON content type. Callers get the raw
//! response bytes back and decode them into the shape they expect with
//! [`decode`].

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::{ClientConfig, ClientOptions, RetryPolicy};
use crate::error::{ProviderError, Result};

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Coveo API client shared by every resource adapter.
#[derive(Debug)]
pub struct CoveoClient {
    http: Client,
    config: ClientConfig,
    base_url: String,
    retry: RetryPolicy,
}

/// A failed attempt, with the delay the server asked us to wait (if any).
struct Failure {
    error: ProviderError,
    retry_after: Option<Duration>,
}

impl From<ProviderError> for Failure {
    fn from(error: ProviderError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl CoveoClient {
    /// Create a client against the default endpoint.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_options(config, ClientOptions::default())
    }

    /// Create a client with explicit transport settings.
    pub fn with_options(config: ClientConfig, options: ClientOptions) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("coveo-provider/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ProviderError::Transport)?;

        let base_url = format!(
            "{}/organizations/{}",
            options.endpoint.trim_end_matches('/'),
            urlencoding::encode(config.organization_id())
        );

        Ok(Self {
            http,
            config,
            base_url,
            retry: options.retry,
        })
    }

    /// Organization-scoped base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path relative to the organization.
    pub fn url(&self, endpoint_path: &str) -> String {
        format!("{}/{}", self.base_url, endpoint_path.trim_start_matches('/'))
    }

    /// Send a request and return the raw response body.
    ///
    /// The body, if any, is serialized before anything goes on the wire.
    /// A 429 is retried for every method. Server errors, timeouts and
    /// connection failures are retried only for idempotent methods, so a
    /// `POST` is never re-sent after the server may have acted on it. Retries
    /// follow the client's [`RetryPolicy`]; any other failure is returned at once.
    #[instrument(skip(self, method, body), fields(method = %method))]
    pub async fn request<B>(
        &self,
        method: Method,
        endpoint_path: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ProviderError::Encoding)?;
        let url = self.url(endpoint_path);

        let mut attempt = 0;
        loop {
            match self.send_once(&method, &url, payload.as_deref()).await {
                Ok(bytes) => return Ok(bytes),
                Err(failure)
                    if attempt < self.retry.max_retries && should_retry(&method, &failure.error) =>
                {
                    let delay = failure
                        .retry_after
                        .unwrap_or_else(|| self.retry.backoff(attempt))
                        .min(self.retry.max_backoff);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.error,
                        "Retrying Coveo API request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&[u8]>,
    ) -> std::result::Result<Vec<u8>, Failure> {
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(self.config.api_key())
            .header(CONTENT_TYPE, "application/json");
        if let Some(payload) = payload {
            request = request.body(payload.to_vec());
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();

        if status.as_u16() >= 400 {
            let retry_after = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %sanitize_for_log(&body), "Coveo API error");
            return Err(Failure {
                error: ProviderError::Api {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                },
                retry_after,
            });
        }

        let bytes = response.bytes().await.map_err(classify_transport)?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "Coveo API response");
        Ok(bytes.to_vec())
    }
}

/// Decode a response body into `T`, reporting a [`ProviderError::Decode`] on mismatch.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(ProviderError::Decode)
}

fn should_retry(method: &Method, error: &ProviderError) -> bool {
    match error {
        ProviderError::Api { status: 429, .. } => true,
        _ => method.is_idempotent() && error.is_retryable(),
    }
}

fn classify_transport(err: reqwest::Error) -> Failure {
    if err.is_timeout() {
        ProviderError::DeadlineExceeded(err.to_string()).into()
    } else {
        ProviderError::Transport(err).into()
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Truncate a response body and strip control characters before logging it.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}
