//! `coveo_document` resource.
//!
//! Documents live inside a source, so every endpoint is scoped by the
//! document's `source_id`. Moving a document to another source is a
//! replacement, never an in-place update.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{created_id, from_state, null_as_empty, require_id, to_state, Resource};
use crate::client::{decode, CoveoClient};
use crate::error::{ProviderError, Result};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const DOCUMENT_RESOURCE_TYPE: &str = "coveo_document";

/// State of a managed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Server-assigned id, empty until created.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    /// Source the document belongs to. Fixed at creation.
    pub source_id: String,
    /// Document title.
    pub title: String,
    /// Document body.
    pub content: String,
}

#[derive(Debug, Serialize)]
struct DocumentRequest<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Adapter managing documents within Coveo sources.
pub struct DocumentResource {
    client: Arc<CoveoClient>,
}

impl DocumentResource {
    /// Create the adapter around a shared client.
    pub fn new(client: Arc<CoveoClient>) -> Self {
        Self { client }
    }

    /// Attribute schema of `coveo_document`.
    pub fn resource_schema() -> Schema {
        Schema::v0()
            .with_description("A document pushed to a Coveo source.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("The ID of the Coveo document."),
            )
            .with_attribute(
                "title",
                Attribute::required_string().with_description("The title of the document."),
            )
            .with_attribute(
                "content",
                Attribute::required_string().with_description("The main content of the document."),
            )
            .with_attribute(
                "source_id",
                Attribute::required_string()
                    .with_description("The source ID where the document will be stored.")
                    .with_force_new(),
            )
    }

    fn collection_path(source_id: &str) -> String {
        format!("sources/{}/documents", urlencoding::encode(source_id))
    }

    fn path(source_id: &str, id: &str) -> String {
        format!(
            "{}/{}",
            Self::collection_path(source_id),
            urlencoding::encode(id)
        )
    }

    /// Create a document in `plan.source_id`.
    ///
    /// Content is kept from the plan; the API is trusted to have stored it.
    #[instrument(skip(self, plan), fields(source_id = %plan.source_id))]
    pub async fn create_document(&self, plan: &DocumentRecord) -> Result<DocumentRecord> {
        let request = DocumentRequest {
            title: &plan.title,
            content: &plan.content,
        };
        let body = self
            .client
            .request(
                Method::POST,
                &Self::collection_path(&plan.source_id),
                Some(&request),
            )
            .await?;
        let id = created_id("document", &body)?;

        info!(id = %id, "Created Coveo document");
        Ok(DocumentRecord {
            id,
            ..plan.clone()
        })
    }

    /// Refresh title and content. Fields missing from the response keep their current value.
    #[instrument(skip(self, record), fields(id = %record.id, source_id = %record.source_id))]
    pub async fn read_document(&self, record: &DocumentRecord) -> Result<DocumentRecord> {
        require_id(DOCUMENT_RESOURCE_TYPE, "read", &record.id)?;

        let body = self
            .client
            .request::<()>(Method::GET, &Self::path(&record.source_id, &record.id), None)
            .await?;
        let response: DocumentResponse = decode(&body)?;

        let mut refreshed = record.clone();
        match response.title {
            Some(title) => refreshed.title = title,
            None => warn!("Document response has no title, keeping current value"),
        }
        match response.content {
            Some(content) => refreshed.content = content,
            None => warn!("Document response has no content, keeping current value"),
        }
        Ok(refreshed)
    }

    /// Replace title and content. The planned record is returned as-is.
    #[instrument(skip(self, plan), fields(id = %plan.id, source_id = %plan.source_id))]
    pub async fn update_document(&self, plan: &DocumentRecord) -> Result<DocumentRecord> {
        require_id(DOCUMENT_RESOURCE_TYPE, "update", &plan.id)?;

        let request = DocumentRequest {
            title: &plan.title,
            content: &plan.content,
        };
        self.client
            .request(
                Method::PUT,
                &Self::path(&plan.source_id, &plan.id),
                Some(&request),
            )
            .await?;

        info!("Updated Coveo document");
        Ok(plan.clone())
    }

    /// Delete a document.
    #[instrument(skip(self))]
    pub async fn delete_document(&self, source_id: &str, id: &str) -> Result<()> {
        require_id(DOCUMENT_RESOURCE_TYPE, "delete", id)?;

        self.client
            .request::<()>(Method::DELETE, &Self::path(source_id, id), None)
            .await?;

        info!("Deleted Coveo document");
        Ok(())
    }

    fn decode_state(&self, state: Value) -> Result<DocumentRecord> {
        from_state(DOCUMENT_RESOURCE_TYPE, &Self::resource_schema(), state)
    }
}

#[async_trait]
impl Resource for DocumentResource {
    fn type_name(&self) -> &'static str {
        DOCUMENT_RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Self::resource_schema()
    }

    async fn create(&self, planned_state: Value) -> Result<Value> {
        let plan = self.decode_state(planned_state)?;
        to_state(&self.create_document(&plan).await?)
    }

    async fn read(&self, current_state: Value) -> Result<Value> {
        let state = self.decode_state(current_state)?;
        to_state(&self.read_document(&state).await?)
    }

    async fn update(&self, prior_state: Value, planned_state: Value) -> Result<Value> {
        let prior = self.decode_state(prior_state)?;
        let plan = self.decode_state(planned_state)?;
        if plan.source_id != prior.source_id {
            return Err(ProviderError::InvalidRequest(format!(
                "source_id of document '{}' cannot change in place",
                prior.id
            )));
        }
        let plan = DocumentRecord {
            id: prior.id,
            ..plan
        };
        to_state(&self.update_document(&plan).await?)
    }

    async fn delete(&self, current_state: Value) -> Result<()> {
        let state = self.decode_state(current_state)?;
        self.delete_document(&state.source_id, &state.id).await
    }

    /// Import ids have the form `<source_id>/<document_id>`.
    async fn import(&self, id: &str) -> Result<Value> {
        let (source_id, document_id) = id
            .split_once('/')
            .filter(|(s, d)| !s.is_empty() && !d.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "document import id '{}' must have the form <source_id>/<document_id>",
                    id
                ))
            })?;

        let stub = DocumentRecord {
            id: document_id.to_string(),
            source_id: source_id.to_string(),
            title: String::new(),
            content: String::new(),
        };
        let record = self.read_document(&stub).await?;
        if record.title.is_empty() {
            return Err(ProviderError::InvalidResponse {
                message: format!(
                    "Coveo API response did not include a title for document '{}'.",
                    id
                ),
                remote_id: None,
            });
        }
        to_state(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::test_client;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            source_id: "src1".to_string(),
            title: "T".to_string(),
            content: "C".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_document() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("POST"))
            .and(path("/organizations/test-org/sources/src1/documents"))
            .and(bearer_token("test-key"))
            .and(body_json(json!({"title": "T", "content": "C"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "doc-9"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let state = resource
            .create(json!({"title": "T", "content": "C", "source_id": "src1"}))
            .await
            .unwrap();

        assert_eq!(state["id"], "doc-9");
        assert_eq!(state["title"], "T");
        assert_eq!(state["source_id"], "src1");
        assert_eq!(state["content"], "C");
    }

    #[tokio::test]
    async fn test_create_document_orphan_is_reported() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1234})))
            .mount(&mock_server)
            .await;

        let err = resource
            .create_document(&record(""))
            .await
            .unwrap_err();
        assert_eq!(err.orphaned_id(), Some("1234"));
        assert!(err.to_diagnostic().detail.unwrap().contains("manual cleanup"));
    }

    #[tokio::test]
    async fn test_read_document_refreshes_fields() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("GET"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"title": "Remote T", "content": "Remote C"})),
            )
            .mount(&mock_server)
            .await;

        let refreshed = resource.read_document(&record("doc-9")).await.unwrap();
        assert_eq!(refreshed.title, "Remote T");
        assert_eq!(refreshed.content, "Remote C");
        assert_eq!(refreshed.source_id, "src1");
    }

    #[tokio::test]
    async fn test_read_document_missing_fields_keep_state() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("GET"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "New"})))
            .mount(&mock_server)
            .await;

        let refreshed = resource.read_document(&record("doc-9")).await.unwrap();
        assert_eq!(refreshed.title, "New");
        assert_eq!(refreshed.content, "C");
    }

    #[tokio::test]
    async fn test_read_document_not_found() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("GET"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let tracked = record("doc-9");
        let err = resource.read_document(&tracked).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("404"));
        assert_eq!(tracked, record("doc-9"));
    }

    #[tokio::test]
    async fn test_read_document_wrong_types_is_decode_error() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": 5})))
            .mount(&mock_server)
            .await;

        let err = resource.read_document(&record("doc-9")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_update_document() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("PUT"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .and(body_json(json!({"title": "T2", "content": "C2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "ignored"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let state = resource
            .update(
                json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"}),
                json!({"id": null, "title": "T2", "content": "C2", "source_id": "src1"}),
            )
            .await
            .unwrap();

        assert_eq!(
            state,
            json!({"id": "doc-9", "title": "T2", "content": "C2", "source_id": "src1"})
        );
    }

    #[tokio::test]
    async fn test_update_document_rejects_source_change() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = resource
            .update(
                json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"}),
                json!({"title": "T", "content": "C", "source_id": "src2"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("DELETE"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        tokio_test::assert_ok!(
            resource
                .delete(json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"}))
                .await
        );
    }

    #[tokio::test]
    async fn test_path_segments_are_encoded() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("DELETE"))
            .and(path("/organizations/test-org/sources/my%20source/documents/a%2Fb"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        tokio_test::assert_ok!(resource.delete_document("my source", "a/b").await);
    }

    #[tokio::test]
    async fn test_import_document() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("GET"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"title": "T", "content": "C"})),
            )
            .mount(&mock_server)
            .await;

        let state = resource.import("src1/doc-9").await.unwrap();
        assert_eq!(
            state,
            json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"})
        );
    }

    #[tokio::test]
    async fn test_import_document_without_title_fails() {
        let mock_server = MockServer::start().await;
        let resource = DocumentResource::new(test_client(&mock_server.uri()));

        Mock::given(method("GET"))
            .and(path("/organizations/test-org/sources/src1/documents/doc-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "C"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = resource.import("src1/doc-9").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_import_document_rejects_malformed_id() {
        let resource = DocumentResource::new(test_client("http://127.0.0.1:1"));

        for id in ["doc-9", "/doc-9", "src1/"] {
            let err = resource.import(id).await.unwrap_err();
            assert!(matches!(err, ProviderError::InvalidRequest(_)));
        }
    }

    #[test]
    fn test_source_id_forces_replacement() {
        let schema = DocumentResource::resource_schema();
        assert!(schema.attribute("source_id").unwrap().force_new);
        assert!(!schema.attribute("title").unwrap().force_new);
    }
}
