//! Filesystem layout:
//!
//! ```text
//! <root>/collections/<collection_id>.json
//! <root>/collections/<collection_id>/items/<item_id>.json
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use catsync_core::error::SyncError;
use catsync_core::models::{CollectionDoc, ItemDoc, Loaded, ResourceKind, Stored};
use catsync_core::source::{check_collection, check_item, ResourceSource};
use catsync_core::tree::CatalogTree;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

const COLLECTIONS_DIR: &str = "collections";
const ITEMS_DIR: &str = "items";

/// A directory tree of collection and item documents.
///
/// Reads enforce the identity invariants: a document whose `id` differs
/// from its file stem, or an item whose `collection` differs from its
/// folder, comes back as a [`SyncError::Consistency`] entry.
///
/// # Examples
///
/// ```no_run
/// use catsync_core::source::ResourceSource;
/// use catsync_store::LocalStore;
///
/// let store = LocalStore::new("./catalog");
/// for entry in store.list_collections()? {
///     match entry {
///         Ok(stored) => println!("{}", stored.doc.id),
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// # Ok::<(), catsync_core::SyncError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.root.join(COLLECTIONS_DIR)
    }

    pub fn collection_path(&self, collection_id: &str) -> PathBuf {
        self.collections_dir().join(format!("{}.json", collection_id))
    }

    pub fn items_dir(&self, collection_id: &str) -> PathBuf {
        self.collections_dir().join(collection_id).join(ITEMS_DIR)
    }

    pub fn item_path(&self, collection_id: &str, item_id: &str) -> PathBuf {
        self.items_dir(collection_id).join(format!("{}.json", item_id))
    }

    /// Writes `doc` to its canonical path and returns that path.
    pub fn write_collection(&self, doc: &CollectionDoc) -> Result<PathBuf, SyncError> {
        let path = self.collection_path(&doc.id);
        write_json(&path, doc)?;
        debug!(id = %doc.id, path = %path.display(), "Wrote collection");
        Ok(path)
    }

    /// Writes `doc` below the collection named by its `collection` field.
    pub fn write_item(&self, doc: &ItemDoc) -> Result<PathBuf, SyncError> {
        let path = self.item_path(&doc.collection, &doc.id);
        write_json(&path, doc)?;
        debug!(id = %doc.id, collection = %doc.collection, "Wrote item");
        Ok(path)
    }

    /// Writes every catalog of `tree` as a collection document.
    pub fn write_tree(&self, tree: &CatalogTree) -> Result<Vec<PathBuf>, SyncError> {
        let paths = tree
            .documents()
            .iter()
            .map(|doc| self.write_collection(doc))
            .collect::<Result<Vec<_>, _>>()?;
        info!(root = tree.root_id(), catalogs = paths.len(), "Wrote catalog tree");
        Ok(paths)
    }
}

impl ResourceSource for LocalStore {
    fn list_collections(&self) -> Result<Vec<Loaded<CollectionDoc>>, SyncError> {
        let dir = self.collections_dir();
        let files = json_files(&dir).map_err(|e| SyncError::StoreUnreadable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        Ok(files
            .into_iter()
            .map(|path| {
                let stored = load(ResourceKind::Collection, path)?;
                check_collection(&stored)?;
                Ok(stored)
            })
            .collect())
    }

    fn list_items(&self, collection_id: &str) -> Result<Vec<Loaded<ItemDoc>>, SyncError> {
        let dir = self.items_dir(collection_id);
        if !dir.is_dir() {
            info!(collection = collection_id, path = %dir.display(), "No items directory");
            return Ok(Vec::new());
        }
        let files = json_files(&dir).map_err(|e| SyncError::StoreUnreadable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        Ok(files
            .into_iter()
            .map(|path| {
                let stored = load(ResourceKind::Item, path)?;
                check_item(&stored, collection_id)?;
                Ok(stored)
            })
            .collect())
    }
}

/// `*.json` files directly inside `dir`, sorted by name.
fn json_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads the JSON object at `path`, keeping it as read next to its typed view.
fn load<T: DeserializeOwned>(kind: ResourceKind, path: PathBuf) -> Loaded<T> {
    let invalid = |path: &Path, reason: String| SyncError::InvalidDocument {
        kind,
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(&path).map_err(|e| invalid(&path, e.to_string()))?;
    let raw = match serde_json::from_slice(&bytes) {
        Ok(Value::Object(raw)) => raw,
        Ok(_) => return Err(invalid(&path, "not a JSON object".to_string())),
        Err(e) => return Err(invalid(&path, e.to_string())),
    };
    Stored::parse(path.clone(), raw).map_err(|e| invalid(&path, e.to_string()))
}

fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<(), SyncError> {
    let io_error = |e: io::Error| SyncError::Generic(format!("{}: {}", path.display(), e));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut bytes = serde_json::to_vec_pretty(doc)?;
    bytes.push(b'\n');
    fs::write(path, bytes).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStore) {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        fs::create_dir_all(store.collections_dir()).unwrap();
        (tmp, store)
    }

    fn write_raw(path: &Path, value: serde_json::Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("nope"));
        let err = store.list_collections().unwrap_err();
        assert!(matches!(err, SyncError::StoreUnreadable { .. }));
        assert!(!err.is_document_scoped());
    }

    #[test]
    fn test_lists_collections_sorted() {
        let (_tmp, store) = setup();
        write_raw(&store.collection_path("b"), json!({"id": "b"}));
        write_raw(&store.collection_path("a"), json!({"id": "a", "title": "A"}));
        fs::write(store.collections_dir().join("README.md"), "ignored").unwrap();

        let ids: Vec<String> = store
            .list_collections()
            .unwrap()
            .into_iter()
            .map(|entry| entry.unwrap().doc.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_collection_id_must_match_file_name() {
        let (_tmp, store) = setup();
        write_raw(&store.collection_path("X"), json!({"id": "Y"}));
        write_raw(&store.collection_path("ok"), json!({"id": "ok"}));

        let entries = store.list_collections().unwrap();
        assert_eq!(entries.len(), 2);
        match &entries[0] {
            Err(SyncError::Consistency { kind, path, expected, actual }) => {
                assert_eq!(*kind, ResourceKind::Collection);
                assert!(path.ends_with("collections/X.json"));
                assert_eq!(expected, "X");
                assert_eq!(actual, "Y");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(entries[1].is_ok());
    }

    #[test]
    fn test_unparseable_document_is_isolated() {
        let (_tmp, store) = setup();
        fs::write(store.collection_path("broken"), "{ not json").unwrap();
        write_raw(&store.collection_path("fine"), json!({"id": "fine"}));

        let entries = store.list_collections().unwrap();
        assert!(matches!(entries[0], Err(SyncError::InvalidDocument { .. })));
        assert!(entries[1].is_ok());
    }

    #[test]
    fn test_listing_keeps_document_as_read() {
        let (_tmp, store) = setup();
        let raw = json!({"id": "x", "collection": "a", "geometry": null, "bbox": [0, 0, 1, 1]});
        write_raw(&store.item_path("a", "x"), raw.clone());
        fs::write(store.item_path("a", "list"), "[1, 2]").unwrap();

        let entries = store.list_items("a").unwrap();
        assert!(matches!(entries[0], Err(SyncError::InvalidDocument { .. })));
        let stored = entries[1].as_ref().unwrap();
        assert_eq!(serde_json::Value::Object(stored.raw.clone()), raw);
        assert!(stored.doc.geometry.is_none());
    }

    #[test]
    fn test_missing_items_directory_is_empty() {
        let (_tmp, store) = setup();
        write_raw(&store.collection_path("a"), json!({"id": "a"}));
        assert!(store.list_items("a").unwrap().is_empty());
    }

    #[test]
    fn test_item_collection_must_match_folder() {
        let (_tmp, store) = setup();
        write_raw(&store.item_path("a", "x"), json!({"id": "x", "collection": "a"}));
        write_raw(&store.item_path("a", "y"), json!({"id": "y", "collection": "b"}));
        write_raw(&store.item_path("a", "z"), json!({"id": "w", "collection": "a"}));

        let entries = store.list_items("a").unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_ok());
        assert!(matches!(
            &entries[1],
            Err(SyncError::Consistency { expected, actual, .. }) if expected == "a" && actual == "b"
        ));
        assert!(matches!(
            &entries[2],
            Err(SyncError::Consistency { expected, actual, .. }) if expected == "z" && actual == "w"
        ));
    }

    #[test]
    fn test_write_then_read() {
        let (_tmp, store) = setup();
        let mut collection = CollectionDoc::new("obs");
        collection.title = Some("Observations".to_string());
        let mut item = ItemDoc::new("ABO", "obs");
        item.geometry = Some(json!({"type": "Point", "coordinates": [7.56, 46.49]}));

        store.write_collection(&collection).unwrap();
        let path = store.write_item(&item).unwrap();
        assert_eq!(path, store.item_path("obs", "ABO"));

        let collections = store.list_collections().unwrap();
        assert_eq!(collections[0].as_ref().unwrap().doc, collection);
        let items = store.list_items("obs").unwrap();
        assert_eq!(items[0].as_ref().unwrap().doc, item);
    }

    #[test]
    fn test_write_tree() {
        let (_tmp, store) = setup();
        let mut tree = CatalogTree::new(CollectionDoc::new("root"));
        tree.add_child("root", "child", "Child").unwrap();

        let paths = store.write_tree(&tree).unwrap();
        assert_eq!(paths.len(), 2);

        let child: serde_json::Value =
            serde_json::from_slice(&fs::read(store.collection_path("child")).unwrap()).unwrap();
        assert_eq!(child["type"], "Catalog");
        assert_eq!(child["links"][0]["rel"], "parent");
        assert_eq!(child["links"][0]["href"], "root");
    }

    #[tokio::test]
    async fn test_reconcile_store_against_memory_catalog() {
        use catsync_core::memory::{MemoryCatalog, Method};
        use catsync_core::resolver::ProbeResolver;
        use catsync_core::sync::Reconciler;

        let (_tmp, store) = setup();
        write_raw(
            &store.collection_path("obs"),
            json!({"id": "obs", "title": "Observations", "links": []}),
        );
        write_raw(&store.item_path("obs", "ABO"), json!({"id": "ABO", "collection": "obs"}));
        write_raw(&store.collection_path("X"), json!({"id": "Y"}));

        let catalog = MemoryCatalog::new();
        let remote = json!({
            "id": "obs",
            "title": "Old",
            "keywords": ["kept"],
            "links": [{"rel": "self", "href": "x"}]
        });
        catalog.insert_collection(remote.as_object().cloned().unwrap());

        let mut reconciler = Reconciler::new(&catalog, Box::new(ProbeResolver));
        let report = reconciler.run(&store).await.unwrap();

        assert_eq!(report.collections.updated, 1);
        assert_eq!(report.collections.failed, 1);
        assert_eq!(report.items.created, 1);
        assert_eq!(report.completed_upserts(), 2);
        assert_eq!(catalog.count(Method::Put), 1);
        assert_eq!(catalog.count(Method::Post), 1);

        let remote = catalog.collection("obs").unwrap();
        assert_eq!(remote["title"], "Observations");
        assert_eq!(remote["keywords"], json!(["kept"]));
        assert_eq!(remote["links"], json!([]));
        assert!(catalog.collection("X").is_none());
        assert!(catalog.collection("Y").is_none());
        assert!(catalog.item("obs", "ABO").is_some());
    }
}
