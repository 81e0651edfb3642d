//! The `ProviderService` trait driven by the host.
//!
//! The host calls these methods in lifecycle order: `schema`, then
//! `validate_provider_config` and `configure`, then per resource
//! `validate_resource_config`, `plan`, and one of the CRUD calls.
//!
//! # Example
//!
//! ```ignore
//! use coveo_provider::{CoveoProvider, ProviderService};
//! use serde_json::json;
//!
//! let provider = CoveoProvider::new();
//! provider
//!     .configure(json!({"api_key": "xx", "organization_id": "myorg"}))
//!     .await?;
//!
//! let state = provider
//!     .create("coveo_index", json!({"name": "products"}))
//!     .await?;
//! ```

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

/// Operations a provider exposes to its host.
///
/// States are attribute bags (`serde_json::Value` objects) shaped by the
/// resource schemas returned from [`ProviderService::schema`].
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider configuration schema and every resource schema.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default the resource list is taken from the schema.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.schema().resources.keys().cloned().collect(),
            ..Default::default()
        }
    }

    /// Validate the provider configuration without side effects.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&self.schema().provider, &config))
    }

    /// Configure the provider. Error diagnostics mean the provider stays unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Validate a resource configuration against its schema.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let resource = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validation::validate(resource, &config))
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource from its planned state.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Refresh a resource from the remote API.
    async fn read(&self, resource_type: &str, current_state: Value)
        -> Result<Value, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import an existing remote object into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::InvalidRequest(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}
