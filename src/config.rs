//! Provider and client configuration.
//!
//! Credentials come from the provider configuration block and fall back to the
//! `COVEO_API_KEY` / `COVEO_ORGANIZATION_ID` environment variables.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::schema::Diagnostic;

/// Default API endpoint. The organization segment is appended per client.
pub const DEFAULT_ENDPOINT: &str = "https://api.cloud.coveo.com/push/v1";

/// Environment variable consulted when `api_key` is not configured.
pub const API_KEY_ENV: &str = "COVEO_API_KEY";

/// Environment variable consulted when `organization_id` is not configured.
pub const ORGANIZATION_ID_ENV: &str = "COVEO_ORGANIZATION_ID";

const MISSING_CREDENTIALS_DETAIL: &str =
    "Both the API key and organization ID are required to authenticate with the Coveo API.";

/// Credentials used by the API client. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_key: String,
    organization_id: String,
}

impl ClientConfig {
    /// Build a configuration, rejecting empty values.
    pub fn new(api_key: impl Into<String>, organization_id: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let organization_id = organization_id.into();

        if api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "api_key must not be empty".to_string(),
            ));
        }
        if organization_id.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "organization_id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            organization_id,
        })
    }

    /// The API key sent as bearer token.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The organization every request is scoped to.
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

/// Bounded exponential backoff for rate-limited and server-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial and maximum backoff.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before retry number `attempt` (zero based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Transport settings for the API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Base endpoint, without the organization segment.
    pub endpoint: String,
    /// Per-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
    /// Retry behavior for transient failures.
    pub retry: RetryPolicy,
}

impl ClientOptions {
    /// Override the endpoint (e.g. a regional host or a mock server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Fully resolved provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Credentials.
    pub client: ClientConfig,
    /// Transport settings.
    pub options: ClientOptions,
}

impl ProviderConfig {
    /// Resolve configuration from the provider block, falling back to the process environment.
    pub fn from_value(config: &Value) -> std::result::Result<Self, Vec<Diagnostic>> {
        Self::from_value_with_env(config, |name| std::env::var(name).ok())
    }

    /// Resolve configuration using `env` to look up fallback variables.
    pub fn from_value_with_env<F>(config: &Value, env: F) -> std::result::Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut diagnostics = Vec::new();

        let mut credential = |name: &str, env_name: &str| match string_attr(config, name) {
            Ok(Some(value)) => Some(value),
            Ok(None) => env(env_name),
            Err(diag) => {
                diagnostics.push(diag);
                None
            },
        };
        let api_key = credential("api_key", API_KEY_ENV);
        let organization_id = credential("organization_id", ORGANIZATION_ID_ENV);

        for (name, value) in [("api_key", &api_key), ("organization_id", &organization_id)] {
            let mistyped = diagnostics
                .iter()
                .any(|d| d.attribute.as_deref() == Some(name));
            if !mistyped && value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                diagnostics.push(
                    Diagnostic::error("Missing Configuration")
                        .with_detail(MISSING_CREDENTIALS_DETAIL)
                        .with_attribute(name),
                );
            }
        }

        let mut options = ClientOptions::default();
        match string_attr(config, "endpoint") {
            Ok(Some(endpoint)) if !endpoint.is_empty() => options.endpoint = endpoint,
            Ok(_) => {},
            Err(diag) => diagnostics.push(diag),
        }
        match non_negative_attr(config, "timeout_seconds") {
            Ok(Some(0)) => diagnostics.push(
                Diagnostic::error("Invalid value for 'timeout_seconds'")
                    .with_detail("Expected a positive number of seconds")
                    .with_attribute("timeout_seconds"),
            ),
            Ok(Some(secs)) => options.timeout = Some(Duration::from_secs(secs)),
            Ok(None) => {},
            Err(diag) => diagnostics.push(diag),
        }
        match non_negative_attr(config, "max_retries") {
            Ok(Some(retries)) => {
                options.retry.max_retries = u32::try_from(retries).unwrap_or(u32::MAX)
            },
            Ok(None) => {},
            Err(diag) => diagnostics.push(diag),
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let client = ClientConfig::new(api_key.unwrap_or_default(), organization_id.unwrap_or_default())
            .map_err(|e| vec![e.to_diagnostic()])?;

        Ok(Self { client, options })
    }
}

fn string_attr(config: &Value, name: &str) -> std::result::Result<Option<String>, Diagnostic> {
    match config.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Diagnostic::error(format!("Invalid type for '{}'", name))
            .with_detail("Expected a string")
            .with_attribute(name)),
    }
}

fn non_negative_attr(config: &Value, name: &str) -> std::result::Result<Option<u64>, Diagnostic> {
    match config.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            Diagnostic::error(format!("Invalid value for '{}'", name))
                .with_detail("Expected a non-negative integer")
                .with_attribute(name)
        }),
    }
}
