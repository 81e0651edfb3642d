//! The Coveo provider root.
//!
//! [`CoveoProvider`] resolves the provider configuration, builds a single
//! [`CoveoClient`] and hands it to every resource adapter. Lifecycle calls are
//! routed to the adapter registered for the requested resource type.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::CoveoClient;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::plan::plan_resource;
use crate::resources::{
    DocumentResource, IndexResource, Resource, DOCUMENT_RESOURCE_TYPE, INDEX_RESOURCE_TYPE,
};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Provider type name.
pub const PROVIDER_TYPE_NAME: &str = "coveo";

const NOT_CONFIGURED: &str = "The Coveo client was not properly initialized.";

/// State built by a successful `configure`.
struct Configured {
    client: Arc<CoveoClient>,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
}

impl Configured {
    fn new(client: Arc<CoveoClient>) -> Self {
        let adapters: [Arc<dyn Resource>; 2] = [
            Arc::new(IndexResource::new(Arc::clone(&client))),
            Arc::new(DocumentResource::new(Arc::clone(&client))),
        ];
        let resources = adapters
            .into_iter()
            .map(|resource| (resource.type_name(), resource))
            .collect();

        Self { client, resources }
    }
}

/// Provider managing Coveo indexes and documents.
pub struct CoveoProvider {
    version: String,
    state: RwLock<Option<Arc<Configured>>>,
}

impl Default for CoveoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CoveoProvider {
    /// Create an unconfigured provider reporting the crate version.
    pub fn new() -> Self {
        Self::with_version(env!("CARGO_PKG_VERSION"))
    }

    /// Create an unconfigured provider reporting `version`.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: RwLock::new(None),
        }
    }

    /// Provider configuration schema.
    pub fn provider_config_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "api_key",
                Attribute::required_string()
                    .sensitive()
                    .with_description("The API key for authenticating with the Coveo API."),
            )
            .with_attribute(
                "organization_id",
                Attribute::required_string().with_description("The Coveo organization ID."),
            )
            .with_attribute(
                "endpoint",
                Attribute::optional_string()
                    .with_description("Base URL of the Coveo push API."),
            )
            .with_attribute(
                "timeout_seconds",
                Attribute::optional_int64().with_description("Per-request timeout in seconds."),
            )
            .with_attribute(
                "max_retries",
                Attribute::optional_int64()
                    .with_description("Retries for rate-limited or failed (5xx) requests."),
            )
    }

    /// Whether `configure` has succeeded.
    pub fn is_configured(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The shared API client.
    pub fn client(&self) -> Result<Arc<CoveoClient>> {
        Ok(Arc::clone(&self.configured()?.client))
    }

    /// All configured resource adapters.
    pub fn resources(&self) -> Result<Vec<Arc<dyn Resource>>> {
        Ok(self.configured()?.resources.values().cloned().collect())
    }

    fn configured(&self) -> Result<Arc<Configured>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderError::Configuration(NOT_CONFIGURED.to_string()))
    }

    fn set_state(&self, state: Option<Arc<Configured>>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema> {
        self.schema()
            .resources
            .remove(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn resource(&self, resource_type: &str) -> Result<Arc<dyn Resource>> {
        self.resource_schema(resource_type)?;
        self.configured()?
            .resources
            .get(resource_type)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for CoveoProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(Self::provider_config_schema())
            .with_resource(INDEX_RESOURCE_TYPE, IndexResource::resource_schema())
            .with_resource(
                DOCUMENT_RESOURCE_TYPE,
                DocumentResource::resource_schema(),
            )
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            version: self.version.clone(),
            resources: self.schema().resources.keys().cloned().collect(),
        }
    }

    /// Credentials may come from the environment, so required attributes are
    /// checked after the fallback is applied.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>> {
        Ok(ProviderConfig::from_value(&config).err().unwrap_or_default())
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>> {
        let resolved = match ProviderConfig::from_value(&config) {
            Ok(resolved) => resolved,
            Err(diagnostics) => {
                warn!(
                    diagnostics = diagnostics.len(),
                    "Provider configuration rejected"
                );
                self.set_state(None);
                return Ok(diagnostics);
            },
        };

        let mut diagnostics = Vec::new();
        if resolved.options.endpoint.starts_with("http://") {
            diagnostics.push(
                Diagnostic::warning("Insecure Endpoint")
                    .with_detail("The API key will be sent over plain HTTP.")
                    .with_attribute("endpoint"),
            );
        }

        let client = match CoveoClient::with_options(resolved.client, resolved.options) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                warn!(error = %err, "Could not build Coveo client");
                self.set_state(None);
                diagnostics.push(err.to_diagnostic());
                return Ok(diagnostics);
            },
        };

        info!(base_url = %client.base_url(), "Configured Coveo provider");
        self.set_state(Some(Arc::new(Configured::new(client))));
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult> {
        let schema = self.resource_schema(resource_type)?;
        let plan = plan_resource(&schema, prior_state.as_ref(), &proposed_state);
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Planned resource"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value> {
        self.resource(resource_type)?.create(planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value> {
        self.resource(resource_type)?.read(current_state).await
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        self.resource(resource_type)?
            .update(prior_state, planned_state)
            .await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()> {
        self.resource(resource_type)?.delete(current_state).await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>> {
        let state = self.resource(resource_type)?.import(id).await?;
        info!("Imported resource");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}
