//! Coveo Provider
//!
//! An infrastructure provider that manages Coveo search indexes and the
//! documents pushed into Coveo sources. A host (an infrastructure-as-code
//! engine) drives it through the [`ProviderService`] trait: it configures the
//! provider with credentials, then plans and applies create, read, update and
//! delete calls against two resource types.
//!
//! | Resource         | Attributes                                   |
//! |------------------|----------------------------------------------|
//! | `coveo_index`    | `id` (computed), `name`                      |
//! | `coveo_document` | `id` (computed), `title`, `content`, `source_id` (forces replacement) |
//!
//! # Quick Start
//!
//! ```ignore
//! use coveo_provider::{init_logging, CoveoProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = CoveoProvider::new();
//!     let diagnostics = provider
//!         .configure(json!({"api_key": "xx", "organization_id": "myorg"}))
//!         .await?;
//!     assert!(diagnostics.iter().all(|d| !d.is_error()));
//!
//!     let plan = provider
//!         .plan("coveo_index", None, json!({"name": "products"}))
//!         .await?;
//!     let state = provider.create("coveo_index", plan.planned_state).await?;
//!     println!("created index {}", state["id"]);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! | Attribute         | Fallback                | Notes                         |
//! |-------------------|-------------------------|-------------------------------|
//! | `api_key`         | `COVEO_API_KEY`         | required, sensitive           |
//! | `organization_id` | `COVEO_ORGANIZATION_ID` | required                      |
//! | `endpoint`        |                         | defaults to the push API      |
//! | `timeout_seconds` |                         | per request, positive         |
//! | `max_retries`     |                         | default 2, see [`CoveoClient`] |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

pub use client::CoveoClient;
pub use config::{ClientConfig, ClientOptions, ProviderConfig, RetryPolicy};
pub use error::{ProviderError, Result};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::CoveoProvider;
pub use resources::{
    DocumentRecord, DocumentResource, IndexRecord, IndexResource, Resource,
    DOCUMENT_RESOURCE_TYPE, INDEX_RESOURCE_TYPE,
};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for implementors of `ProviderService`
pub use async_trait::async_trait;

pub use serde_json;
pub use tracing;
