//! Resource adapters.
//!
//! Each adapter owns a shared [`CoveoClient`](crate::client::CoveoClient) and
//! translates host lifecycle calls for one resource type into API calls. The
//! [`Resource`] trait is the attribute-bag view of an adapter; the adapters
//! also expose typed methods over their records.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::client::decode;
use crate::error::{ProviderError, Result};
use crate::schema::Schema;
use crate::validation::ensure_valid;

pub mod document;
pub mod index;

pub use document::{DocumentRecord, DocumentResource, DOCUMENT_RESOURCE_TYPE};
pub use index::{IndexRecord, IndexResource, INDEX_RESOURCE_TYPE};

/// Lifecycle operations for one resource type, over attribute bags.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `coveo_index`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema of this resource type.
    fn schema(&self) -> Schema;

    /// Create the remote object and return the new state.
    async fn create(&self, planned_state: Value) -> Result<Value>;

    /// Refresh state from the remote object.
    async fn read(&self, current_state: Value) -> Result<Value>;

    /// Apply planned changes and return the new state.
    async fn update(&self, prior_state: Value, planned_state: Value) -> Result<Value>;

    /// Delete the remote object. On success the caller drops the state.
    async fn delete(&self, current_state: Value) -> Result<()>;

    /// Build state for an existing remote object identified by `id`.
    async fn import(&self, id: &str) -> Result<Value>;
}

/// Body returned by create endpoints.
#[derive(Debug, Deserialize)]
struct CreatedResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Validate an attribute bag and decode it into a typed record.
pub(crate) fn from_state<T: DeserializeOwned>(
    resource_type: &str,
    schema: &Schema,
    state: Value,
) -> Result<T> {
    ensure_valid(resource_type, schema, &state)?;
    serde_json::from_value(state)
        .map_err(|e| ProviderError::Validation(format!("{}: {}", resource_type, e)))
}

/// Encode a typed record back into an attribute bag.
pub(crate) fn to_state<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(ProviderError::Encoding)
}

/// Reject lifecycle calls that need an identity but have none.
pub(crate) fn require_id(resource_type: &str, operation: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ProviderError::InvalidRequest(format!(
            "{} {} requires an id",
            operation, resource_type
        )));
    }
    Ok(())
}

/// Extract the id assigned by a create call.
///
/// When the body cannot be decoded but still names an id, that id is kept on
/// the error: the object exists remotely and is no longer tracked.
pub(crate) fn created_id(kind: &str, bytes: &[u8]) -> Result<String> {
    let response: CreatedResponse = decode(bytes).map_err(|err| match recover_id(bytes) {
        Some(id) => ProviderError::InvalidResponse {
            message: format!("Could not parse {} creation response: {}", kind, err.message()),
            remote_id: Some(id),
        },
        None => err,
    })?;

    match response.id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ProviderError::InvalidResponse {
            message: format!("Coveo API response did not include a valid {} ID.", kind),
            remote_id: None,
        }),
    }
}

fn recover_id(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    match value.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserialize a string attribute, reading `null` (unknown) as empty.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
