//! In-memory catalog service.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::SyncError;
use crate::remote::{CatalogClient, Document};

/// HTTP verb of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// A call received by [`MemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub path: String,
}

impl Call {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, Document>,
    items: BTreeMap<String, BTreeMap<String, Document>>,
    calls: Vec<Call>,
    failures: HashMap<(Method, String), u16>,
}

/// A [`CatalogClient`] backed by in-process maps.
///
/// Every call is recorded, and individual endpoints can be told to answer
/// with an error status, which makes it suitable for asserting exactly
/// which requests a sync issues.
///
/// # Examples
///
/// ```
/// use catsync_core::memory::{MemoryCatalog, Method};
/// use catsync_core::remote::CatalogClient;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let catalog = MemoryCatalog::new();
/// assert!(catalog.get_collection("missing").await.unwrap().is_none());
/// assert_eq!(catalog.count(Method::Get), 1);
/// # }
/// ```
#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seeds a collection without recording a call.
    pub fn insert_collection(&self, doc: Document) {
        let id = doc_id(&doc);
        let mut state = self.state();
        state.items.entry(id.clone()).or_default();
        state.collections.insert(id, doc);
    }

    /// Seeds an item without recording a call.
    pub fn insert_item(&self, collection: &str, doc: Document) {
        let id = doc_id(&doc);
        self.state()
            .items
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc);
    }

    /// Makes `method path` answer with `status` from now on.
    pub fn fail_on(&self, method: Method, path: &str, status: u16) {
        self.state()
            .failures
            .insert((method, path.to_string()), status);
    }

    pub fn collection(&self, id: &str) -> Option<Document> {
        self.state().collections.get(id).cloned()
    }

    pub fn item(&self, collection: &str, id: &str) -> Option<Document> {
        self.state()
            .items
            .get(collection)
            .and_then(|items| items.get(id))
            .cloned()
    }

    pub fn collection_count(&self) -> usize {
        self.state().collections.len()
    }

    pub fn item_count(&self, collection: &str) -> usize {
        self.state().items.get(collection).map_or(0, BTreeMap::len)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Records the call and returns the injected failure for it, if any.
    fn record(&self, method: Method, path: String) -> Result<(), SyncError> {
        let mut state = self.state();
        let failure = state.failures.get(&(method, path.clone())).copied();
        state.calls.push(Call {
            method,
            path: path.clone(),
        });
        match failure {
            Some(status) => Err(rejected(method, &path, status, "injected failure")),
            None => Ok(()),
        }
    }
}

fn doc_id(doc: &Document) -> String {
    doc.get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn rejected(method: Method, path: &str, status: u16, body: &str) -> SyncError {
    SyncError::RemoteRejected {
        method: method.as_str().to_string(),
        url: path.to_string(),
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    async fn get_collection(&self, id: &str) -> Result<Option<Document>, SyncError> {
        let path = format!("/collections/{}", id);
        match self.record(Method::Get, path) {
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
            Ok(()) => Ok(self.collection(id)),
        }
    }

    async fn create_collection(&self, doc: &Document) -> Result<(), SyncError> {
        let path = "/collections".to_string();
        self.record(Method::Post, path.clone())?;
        let id = doc_id(doc);
        let mut state = self.state();
        if state.collections.contains_key(&id) {
            return Err(rejected(Method::Post, &path, 409, "collection already exists"));
        }
        state.items.entry(id.clone()).or_default();
        state.collections.insert(id, doc.clone());
        Ok(())
    }

    async fn replace_collection(&self, id: &str, doc: &Document) -> Result<(), SyncError> {
        let path = format!("/collections/{}", id);
        self.record(Method::Put, path.clone())?;
        let mut state = self.state();
        match state.collections.get_mut(id) {
            Some(existing) => {
                *existing = doc.clone();
                Ok(())
            }
            None => Err(rejected(Method::Put, &path, 404, "collection not found")),
        }
    }

    async fn get_item(&self, collection: &str, id: &str) -> Result<Option<Document>, SyncError> {
        let path = format!("/collections/{}/items/{}", collection, id);
        match self.record(Method::Get, path) {
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
            Ok(()) => Ok(self.item(collection, id)),
        }
    }

    async fn create_item(&self, collection: &str, doc: &Document) -> Result<(), SyncError> {
        let path = format!("/collections/{}/items", collection);
        self.record(Method::Post, path.clone())?;
        let id = doc_id(doc);
        let mut state = self.state();
        if !state.collections.contains_key(collection) {
            return Err(rejected(Method::Post, &path, 404, "collection not found"));
        }
        let items = state.items.entry(collection.to_string()).or_default();
        if items.contains_key(&id) {
            return Err(rejected(Method::Post, &path, 409, "item already exists"));
        }
        items.insert(id, doc.clone());
        Ok(())
    }

    async fn replace_item(
        &self,
        collection: &str,
        id: &str,
        doc: &Document,
    ) -> Result<(), SyncError> {
        let path = format!("/collections/{}/items/{}", collection, id);
        self.record(Method::Put, path.clone())?;
        let mut state = self.state();
        match state.items.get_mut(collection).and_then(|items| items.get_mut(id)) {
            Some(existing) => {
                *existing = doc.clone();
                Ok(())
            }
            None => Err(rejected(Method::Put, &path, 404, "item not found")),
        }
    }

    async fn list_collection_ids(&self) -> Result<Vec<String>, SyncError> {
        self.record(Method::Get, "/collections".to_string())?;
        Ok(self.state().collections.keys().cloned().collect())
    }

    async fn list_item_ids(&self, collection: &str) -> Result<Vec<String>, SyncError> {
        let path = format!("/collections/{}/items", collection);
        self.record(Method::Get, path.clone())?;
        let state = self.state();
        if !state.collections.contains_key(collection) {
            return Err(rejected(Method::Get, &path, 404, "collection not found"));
        }
        Ok(state
            .items
            .get(collection)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let catalog = MemoryCatalog::new();
        catalog.create_collection(&doc(json!({"id": "a"}))).await.unwrap();

        let fetched = catalog.get_collection("a").await.unwrap();
        assert_eq!(fetched, Some(doc(json!({"id": "a"}))));
        assert_eq!(
            catalog.calls(),
            vec![
                Call::new(Method::Post, "/collections"),
                Call::new(Method::Get, "/collections/a"),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let catalog = MemoryCatalog::new();
        catalog.create_collection(&doc(json!({"id": "a"}))).await.unwrap();
        let err = catalog.create_collection(&doc(json!({"id": "a"}))).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteRejected { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_item_requires_existing_collection() {
        let catalog = MemoryCatalog::new();
        let err = catalog
            .create_item("missing", &doc(json!({"id": "x", "collection": "missing"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteRejected { status: 404, .. }));
        assert_eq!(catalog.collection_count(), 0);
    }

    #[tokio::test]
    async fn test_replace_missing_is_rejected() {
        let catalog = MemoryCatalog::new();
        let err = catalog
            .replace_collection("a", &doc(json!({"id": "a"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let catalog = MemoryCatalog::new();
        catalog.fail_on(Method::Post, "/collections", 500);
        let err = catalog.create_collection(&doc(json!({"id": "a"}))).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteRejected { status: 500, .. }));
        assert_eq!(catalog.collection_count(), 0);
        assert_eq!(catalog.count(Method::Post), 1);
    }

    #[tokio::test]
    async fn test_list_ids() {
        let catalog = MemoryCatalog::new();
        catalog.insert_collection(doc(json!({"id": "b"})));
        catalog.insert_collection(doc(json!({"id": "a"})));
        catalog.insert_item("a", doc(json!({"id": "x", "collection": "a"})));

        assert_eq!(catalog.list_collection_ids().await.unwrap(), vec!["a", "b"]);
        assert_eq!(catalog.list_item_ids("a").await.unwrap(), vec!["x"]);
        assert!(catalog.list_item_ids("b").await.unwrap().is_empty());
    }
}
