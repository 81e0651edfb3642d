//! `coveo_index` resource.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{created_id, from_state, null_as_empty, require_id, to_state, Resource};
use crate::client::{decode, CoveoClient};
use crate::error::{ProviderError, Result};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const INDEX_RESOURCE_TYPE: &str = "coveo_index";

/// State of a managed index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Server-assigned id, empty until created.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    /// User-supplied index name.
    pub name: String,
}

#[derive(Debug, Serialize)]
struct IndexRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    name: Option<String>,
}

/// Adapter managing Coveo indexes.
pub struct IndexResource {
    client: Arc<CoveoClient>,
}

impl IndexResource {
    /// Create the adapter around a shared client.
    pub fn new(client: Arc<CoveoClient>) -> Self {
        Self { client }
    }

    /// Attribute schema of `coveo_index`.
    pub fn resource_schema() -> Schema {
        Schema::v0()
            .with_description("A Coveo search index.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("The ID of the Coveo index."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the Coveo index."),
            )
    }

    fn path(id: &str) -> String {
        format!("indexes/{}", urlencoding::encode(id))
    }

    /// Create an index named `name`.
    #[instrument(skip(self))]
    pub async fn create_index(&self, name: &str) -> Result<IndexRecord> {
        let body = self
            .client
            .request(Method::POST, "indexes", Some(&IndexRequest { name }))
            .await?;
        let id = created_id("index", &body)?;

        info!(id = %id, "Created Coveo index");
        Ok(IndexRecord {
            id,
            name: name.to_string(),
        })
    }

    /// Refresh an index. A response without `name` keeps the current name.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn read_index(&self, record: &IndexRecord) -> Result<IndexRecord> {
        require_id(INDEX_RESOURCE_TYPE, "read", &record.id)?;

        let body = self
            .client
            .request::<()>(Method::GET, &Self::path(&record.id), None)
            .await?;
        let response: IndexResponse = decode(&body)?;

        let mut refreshed = record.clone();
        match response.name {
            Some(name) => refreshed.name = name,
            None => debug!("Index response has no name, keeping current value"),
        }
        Ok(refreshed)
    }

    /// Rename an index.
    #[instrument(skip(self))]
    pub async fn update_index(&self, id: &str, name: &str) -> Result<IndexRecord> {
        require_id(INDEX_RESOURCE_TYPE, "update", id)?;

        self.client
            .request(Method::PUT, &Self::path(id), Some(&IndexRequest { name }))
            .await?;

        info!("Updated Coveo index");
        Ok(IndexRecord {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    /// Delete an index.
    #[instrument(skip(self))]
    pub async fn delete_index(&self, id: &str) -> Result<()> {
        require_id(INDEX_RESOURCE_TYPE, "delete", id)?;

        self.client
            .request::<()>(Method::DELETE, &Self::path(id), None)
            .await?;

        info!("Deleted Coveo index");
        Ok(())
    }

    fn decode_state(&self, state: Value) -> Result<IndexRecord> {
        from_state(INDEX_RESOURCE_TYPE, &Self::resource_schema(), state)
    }
}

#[async_trait]
impl Resource for IndexResource {
    fn type_name(&self) -> &'static str {
        INDEX_RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Self::resource_schema()
    }

    async fn create(&self, planned_state: Value) -> Result<Value> {
        let plan = self.decode_state(planned_state)?;
        to_state(&self.create_index(&plan.name).await?)
    }

    async fn read(&self, current_state: Value) -> Result<Value> {
        let state = self.decode_state(current_state)?;
        to_state(&self.read_index(&state).await?)
    }

    async fn update(&self, prior_state: Value, planned_state: Value) -> Result<Value> {
        let prior = self.decode_state(prior_state)?;
        let plan = self.decode_state(planned_state)?;
        to_state(&self.update_index(&prior.id, &plan.name).await?)
    }

    async fn delete(&self, current_state: Value) -> Result<()> {
        let state = self.decode_state(current_state)?;
        self.delete_index(&state.id).await
    }

    async fn import(&self, id: &str) -> Result<Value> {
        let stub = IndexRecord {
            id: id.to_string(),
            name: String::new(),
        };
        let record = self.read_index(&stub).await?;
        if record.name.is_empty() {
            return Err(ProviderError::InvalidResponse {
                message: format!("Coveo API response did not include a name for index '{}'.", id),
                remote_id: None,
            });
        }
        to_state(&record)
    }
}
