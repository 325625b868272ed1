//! Contract of the remote catalog service.
//!
//! The reconciler only talks to the service through [`CatalogClient`]. The
//! HTTP implementation lives in `catsync-client`; [`crate::memory::MemoryCatalog`]
//! is an in-process implementation used for tests and dry runs.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::models::ResourceKey;

/// A JSON object as exchanged with the remote service.
pub type Document = Map<String, Value>;

/// Read, create and replace endpoints for collections and items.
///
/// | operation            | endpoint                                     |
/// |----------------------|----------------------------------------------|
/// | `get_collection`     | `GET /collections/{id}`                      |
/// | `create_collection`  | `POST /collections`                          |
/// | `replace_collection` | `PUT /collections/{id}`                      |
/// | `get_item`           | `GET /collections/{id}/items/{item_id}`      |
/// | `create_item`        | `POST /collections/{id}/items`               |
/// | `replace_item`       | `PUT /collections/{id}/items/{item_id}`      |
/// | `list_collection_ids`| `GET /collections`                           |
/// | `list_item_ids`      | `GET /collections/{id}/items`                |
///
/// `get_*` return `Ok(None)` for a not-found answer. Every other non-2xx
/// answer is a [`SyncError::RemoteRejected`].
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get_collection(&self, id: &str) -> Result<Option<Document>, SyncError>;

    async fn create_collection(&self, doc: &Document) -> Result<(), SyncError>;

    async fn replace_collection(&self, id: &str, doc: &Document) -> Result<(), SyncError>;

    async fn get_item(&self, collection: &str, id: &str) -> Result<Option<Document>, SyncError>;

    async fn create_item(&self, collection: &str, doc: &Document) -> Result<(), SyncError>;

    async fn replace_item(&self, collection: &str, id: &str, doc: &Document)
        -> Result<(), SyncError>;

    async fn list_collection_ids(&self) -> Result<Vec<String>, SyncError>;

    async fn list_item_ids(&self, collection: &str) -> Result<Vec<String>, SyncError>;

    /// Fetches the document addressed by `key`.
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<Document>, SyncError> {
        match key {
            ResourceKey::Collection(id) => self.get_collection(id).await,
            ResourceKey::Item { collection, id } => self.get_item(collection, id).await,
        }
    }

    /// Creates the document addressed by `key`.
    async fn create(&self, key: &ResourceKey, doc: &Document) -> Result<(), SyncError> {
        match key {
            ResourceKey::Collection(_) => self.create_collection(doc).await,
            ResourceKey::Item { collection, .. } => self.create_item(collection, doc).await,
        }
    }

    /// Replaces the document addressed by `key` with `doc`.
    async fn replace(&self, key: &ResourceKey, doc: &Document) -> Result<(), SyncError> {
        match key {
            ResourceKey::Collection(id) => self.replace_collection(id, doc).await,
            ResourceKey::Item { collection, id } => self.replace_item(collection, id, doc).await,
        }
    }
}
