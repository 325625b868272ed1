//! Local document sources and their identity checks.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SyncError;
use crate::models::{CollectionDoc, ItemDoc, Loaded, ResourceKind, Stored};

/// Enumerates the local documents to reconcile.
///
/// The outer `Result` fails only when the source itself cannot be read. A
/// document that fails to parse or breaks an identity invariant shows up as
/// an `Err` entry so the rest of the listing stays usable.
pub trait ResourceSource {
    fn list_collections(&self) -> Result<Vec<Loaded<CollectionDoc>>, SyncError>;

    /// Items stored under `collection_id`. A collection without an items
    /// directory has no items.
    fn list_items(&self, collection_id: &str) -> Result<Vec<Loaded<ItemDoc>>, SyncError>;
}

/// Returns the file stem of `path`, which is the identifier a document stored
/// there must carry.
pub fn storage_id(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

/// Checks that a collection's `id` matches the file it was stored in.
pub fn check_collection(stored: &Stored<CollectionDoc>) -> Result<(), SyncError> {
    check_stem(ResourceKind::Collection, &stored.path, &stored.doc.id)
}

/// Checks that an item's `id` matches its file and its `collection` matches
/// the collection folder it sits in.
pub fn check_item(stored: &Stored<ItemDoc>, collection_id: &str) -> Result<(), SyncError> {
    check_stem(ResourceKind::Item, &stored.path, &stored.doc.id)?;
    if stored.doc.collection != collection_id {
        return Err(SyncError::Consistency {
            kind: ResourceKind::Item,
            path: stored.path.clone(),
            expected: collection_id.to_string(),
            actual: stored.doc.collection.clone(),
        });
    }
    Ok(())
}

fn check_stem(kind: ResourceKind, path: &Path, id: &str) -> Result<(), SyncError> {
    match storage_id(path) {
        Some(stem) if stem == id => Ok(()),
        stem => Err(SyncError::Consistency {
            kind,
            path: path.to_path_buf(),
            expected: stem.unwrap_or_default().to_string(),
            actual: id.to_string(),
        }),
    }
}

/// A rejected local document.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub path: Option<PathBuf>,
    pub error: String,
}

/// Result of checking a whole source without contacting the remote service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Audit {
    pub collections: usize,
    pub items: usize,
    pub rejected: Vec<Rejection>,
}

impl Audit {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

fn rejection(error: &SyncError) -> Rejection {
    let path = match error {
        SyncError::Consistency { path, .. } | SyncError::InvalidDocument { path, .. } => {
            Some(path.clone())
        }
        _ => None,
    };
    Rejection {
        path,
        error: error.to_string(),
    }
}

/// Loads every document of `source` and collects the ones that fail.
pub fn audit(source: &dyn ResourceSource) -> Result<Audit, SyncError> {
    let mut audit = Audit::default();
    for entry in source.list_collections()? {
        let stored = match entry.and_then(|s| check_collection(&s).map(|_| s)) {
            Ok(stored) => stored,
            Err(e) => {
                audit.rejected.push(rejection(&e));
                continue;
            }
        };
        audit.collections += 1;

        let items = match source.list_items(&stored.doc.id) {
            Ok(items) => items,
            Err(e) => {
                audit.rejected.push(rejection(&e));
                continue;
            }
        };
        for item in items {
            match item.and_then(|s| check_item(&s, &stored.doc.id).map(|_| s)) {
                Ok(_) => audit.items += 1,
                Err(e) => audit.rejected.push(rejection(&e)),
            }
        }
    }
    Ok(audit)
}
