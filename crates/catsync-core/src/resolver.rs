//! Remote existence checks.
//!
//! Two strategies answer the same question with different round-trip counts:
//!
//! - [`ProbeResolver`] issues one `GET` per document.
//! - [`IndexResolver`] lists the identifiers of a whole scope once and answers
//!   from memory. Scopes are rebuilt independently, so the item index of one
//!   collection never leaks into the next.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{ResolverStrategy, SyncConfig};
use crate::error::SyncError;
use crate::models::ResourceKey;
use crate::remote::{CatalogClient, Document};

/// A set of sibling documents sharing one listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Collections,
    Items(String),
}

impl Scope {
    fn of(key: &ResourceKey) -> Scope {
        match key {
            ResourceKey::Collection(_) => Scope::Collections,
            ResourceKey::Item { collection, .. } => Scope::Items(collection.clone()),
        }
    }
}

/// Answer of an existence check.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Absent,
    /// The document exists. A probe already holds its current body; an index
    /// lookup does not, and the caller fetches it.
    Exists(Option<Document>),
}

impl Resolution {
    pub fn exists(&self) -> bool {
        matches!(self, Resolution::Exists(_))
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Called before the documents of `scope` are resolved. `expected` is the
    /// number of local documents about to be checked.
    async fn enter_scope(&mut self, client: &dyn CatalogClient, scope: &Scope, expected: usize);

    async fn resolve(
        &self,
        client: &dyn CatalogClient,
        key: &ResourceKey,
    ) -> Result<Resolution, SyncError>;

    fn name(&self) -> &'static str;
}

/// One point lookup per document.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeResolver;

async fn probe(client: &dyn CatalogClient, key: &ResourceKey) -> Result<Resolution, SyncError> {
    Ok(match client.fetch(key).await? {
        Some(doc) => Resolution::Exists(Some(doc)),
        None => Resolution::Absent,
    })
}

#[async_trait]
impl IdentityResolver for ProbeResolver {
    async fn enter_scope(
        &mut self,
        _client: &dyn CatalogClient,
        _scope: &Scope,
        _expected: usize,
    ) {
    }

    async fn resolve(
        &self,
        client: &dyn CatalogClient,
        key: &ResourceKey,
    ) -> Result<Resolution, SyncError> {
        probe(client, key).await
    }

    fn name(&self) -> &'static str {
        "probe"
    }
}

/// Lists each scope once, then answers from the in-memory set.
///
/// The collection index and the item index of the collection being processed
/// are held side by side; entering a new item scope drops the previous one.
/// Scopes with fewer than `min_batch` local documents, and scopes whose
/// listing fails, are resolved with per-document probes instead.
#[derive(Debug, Default)]
pub struct IndexResolver {
    min_batch: usize,
    collections: Option<HashSet<String>>,
    items: Option<(String, HashSet<String>)>,
}

impl IndexResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only build an index for scopes with at least `min_batch` documents.
    pub fn with_min_batch(min_batch: usize) -> Self {
        Self {
            min_batch,
            ..Self::default()
        }
    }

    /// Returns true if keys of `scope` are answered from an index.
    pub fn is_indexed(&self, scope: &Scope) -> bool {
        self.index_for(scope).is_some()
    }

    fn index_for(&self, scope: &Scope) -> Option<&HashSet<String>> {
        match scope {
            Scope::Collections => self.collections.as_ref(),
            Scope::Items(collection) => match &self.items {
                Some((indexed, ids)) if indexed == collection => Some(ids),
                _ => None,
            },
        }
    }
}

#[async_trait]
impl IdentityResolver for IndexResolver {
    async fn enter_scope(&mut self, client: &dyn CatalogClient, scope: &Scope, expected: usize) {
        match scope {
            Scope::Collections => self.collections = None,
            Scope::Items(_) => self.items = None,
        }

        if expected == 0 || expected < self.min_batch {
            debug!(?scope, expected, "Scope below index threshold, probing per document");
            return;
        }

        let listing = match scope {
            Scope::Collections => client.list_collection_ids().await,
            Scope::Items(collection) => client.list_item_ids(collection).await,
        };

        match listing {
            Ok(ids) => {
                debug!(?scope, known = ids.len(), "Built existence index");
                let ids: HashSet<String> = ids.into_iter().collect();
                match scope {
                    Scope::Collections => self.collections = Some(ids),
                    Scope::Items(collection) => self.items = Some((collection.clone(), ids)),
                }
            }
            Err(e) => {
                warn!(?scope, error = %e, "Index listing failed, probing per document");
            }
        }
    }

    async fn resolve(
        &self,
        client: &dyn CatalogClient,
        key: &ResourceKey,
    ) -> Result<Resolution, SyncError> {
        match self.index_for(&Scope::of(key)) {
            Some(ids) => Ok(if ids.contains(key.id()) {
                Resolution::Exists(None)
            } else {
                Resolution::Absent
            }),
            None => probe(client, key).await,
        }
    }

    fn name(&self) -> &'static str {
        "index"
    }
}

/// Builds the resolver selected by `config`.
pub fn build_resolver(config: &SyncConfig) -> Box<dyn IdentityResolver> {
    match config.resolver {
        ResolverStrategy::Probe => Box::new(ProbeResolver),
        ResolverStrategy::Index => Box::new(IndexResolver::new()),
        ResolverStrategy::Auto => Box::new(IndexResolver::with_min_batch(config.index_threshold)),
    }
}
