//! Test harness for `ProviderService` implementations.
//!
//! [`ProviderTester`] drives a provider the way a host would, with helpers
//! that chain plan and apply calls into whole lifecycles.
//!
//! ```ignore
//! use coveo_provider::testing::ProviderTester;
//! use coveo_provider::CoveoProvider;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(CoveoProvider::new());
//! tester
//!     .configure(json!({"api_key": "k", "organization_id": "o", "endpoint": server.uri()}))
//!     .await?;
//! let state = tester
//!     .lifecycle_create("coveo_index", json!({"name": "products"}))
//!     .await?;
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through host calls.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Provider schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Names of the managed resource types.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate provider configuration, failing on error diagnostics.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.configure(config).await?)
    }

    /// Validate a resource configuration, failing on error diagnostics.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Plan a create.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan an update of `prior_state`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan the deletion of `prior_state`.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// plan → create → read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// plan → update → read. Returns the state after read.
    ///
    /// A plan without changes skips the update and returns the prior state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        if !plan.has_changes() {
            return Ok(prior_state);
        }
        if plan.requires_replace {
            return Err(ProviderError::InvalidRequest(format!(
                "{} change requires replacement",
                resource_type
            )));
        }

        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// create → update → delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a tester call that can report diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    /// The call returned error diagnostics.
    #[error("{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call returned a provider error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl TestError {
    /// Error diagnostics, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diagnostics) => diagnostics,
            TestError::Provider(_) => &[],
        }
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for diag in diagnostics {
        out.push_str(&format!("\n  {}", diag.summary));
        if let Some(detail) = &diag.detail {
            out.push_str(&format!(": {}", detail));
        }
        if let Some(attr) = &diag.attribute {
            out.push_str(&format!(" (at {})", attr));
        }
    }
    out
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    if !has_errors(&diagnostics) {
        return Ok(());
    }
    Err(TestError::Diagnostics(
        diagnostics.into_iter().filter(Diagnostic::is_error).collect(),
    ))
}

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        plan.has_changes(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan changes nothing.
///
/// # Panics
///
/// Panics if the plan has changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "Expected no changes, but got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan replaces the resource.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if `path` is not among the plan's changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that no diagnostic is an error.
///
/// # Panics
///
/// Panics if any diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "Expected no errors, but got {:?}", errors);
}

/// Assert that some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoveoProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> Value {
        json!({
            "api_key": "test-key",
            "organization_id": "test-org",
            "endpoint": endpoint,
            "max_retries": 0,
        })
    }

    #[tokio::test]
    async fn test_configure_reports_missing_credentials() {
        let tester = ProviderTester::new(CoveoProvider::new());

        let err = tester
            .configure(json!({"api_key": "", "organization_id": ""}))
            .await
            .unwrap_err();

        assert_eq!(err.diagnostics().len(), 2);
        assert_error_contains(err.diagnostics(), "Missing Configuration");
        assert!(err.to_string().contains("(at api_key)"));
    }

    #[tokio::test]
    async fn test_lifecycle_create_reads_back() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/organizations/test-org/indexes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "ix-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/organizations/test-org/indexes/ix-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "products"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tester = ProviderTester::new(CoveoProvider::new());
        tester.configure(config(&mock_server.uri())).await.unwrap();

        let state = tester
            .lifecycle_create("coveo_index", json!({"name": "products"}))
            .await
            .unwrap();
        assert_eq!(state, json!({"id": "ix-1", "name": "products"}));
    }

    #[tokio::test]
    async fn test_lifecycle_update_without_changes_skips_api() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let tester = ProviderTester::new(CoveoProvider::new());
        tester.configure(config(&mock_server.uri())).await.unwrap();

        let prior = json!({"id": "ix-1", "name": "products"});
        let state = tester
            .lifecycle_update("coveo_index", prior.clone(), json!({"name": "products"}))
            .await
            .unwrap();
        assert_eq!(state, prior);
    }

    #[tokio::test]
    async fn test_lifecycle_update_refuses_replacement() {
        let tester = ProviderTester::new(CoveoProvider::new());
        tester
            .configure(config("http://127.0.0.1:1"))
            .await
            .unwrap();

        let err = tester
            .lifecycle_update(
                "coveo_document",
                json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"}),
                json!({"title": "T", "content": "C", "source_id": "src2"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_plan_helpers() {
        let tester = ProviderTester::new(CoveoProvider::new());
        let prior = json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"});

        let plan = tester
            .plan_create(
                "coveo_document",
                json!({"title": "T", "content": "C", "source_id": "src1"}),
            )
            .await
            .unwrap();
        assert_plan_creates(&plan);

        let plan = tester
            .plan_update(
                "coveo_document",
                prior.clone(),
                json!({"title": "T", "content": "C", "source_id": "src1"}),
            )
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let plan = tester
            .plan_update(
                "coveo_document",
                prior,
                json!({"title": "T", "content": "C", "source_id": "src2"}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "source_id");
    }

    #[test]
    fn test_assert_no_errors_allows_warnings() {
        assert_no_errors(&[Diagnostic::warning("Insecure Endpoint")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("Missing Configuration")]);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing Configuration").with_attribute("api_key"),
            Diagnostic::error("Invalid value for 'max_retries'").with_detail("Expected a non-negative integer"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("2 error diagnostic(s):"));
        assert!(display.contains("(at api_key)"));
        assert!(display.contains("Expected a non-negative integer"));
    }
}
