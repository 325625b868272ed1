//! Reconciliation of a local document tree against a remote catalog service.
//!
//! Each document walks `Unknown → {Exists, Absent} → {Updated, Created} → done`,
//! or ends in `Errored` from any step. Collections are processed first and
//! each collection's items right after it; a failed document is logged,
//! recorded and skipped, and the run carries on.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::merge::merge;
use crate::models::{CollectionDoc, Loaded, ResourceKey, ResourceKind, Stored};
use crate::remote::{CatalogClient, Document};
use crate::resolver::{IdentityResolver, Resolution, Scope};
use crate::source::{check_collection, check_item, ResourceSource};

/// Position of a single document in the reconciliation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Unknown,
    Exists,
    Absent,
    Created,
    Updated,
    Unchanged,
    Errored,
}

/// Outcome of processing a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Absent remotely, created from the local document
    Created,
    /// Present remotely, replaced by the merged document
    Updated,
    /// Present remotely and the merge changed nothing
    Unchanged,
    /// Processing failed for this document
    Failed,
    /// Not attempted because its collection failed
    Skipped,
}

/// Counters for one kind of document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SyncStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Failed => self.failed += 1,
            SyncOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Adds another tracker's counters to this one.
    pub fn absorb(&mut self, other: &SyncStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// Returns the total number of documents seen.
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.failed + self.skipped
    }

    /// Returns the number of documents whose upsert completed.
    pub fn successful(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// Whether a merged document has to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceDecision {
    pub needs_write: bool,
    pub outcome: SyncOutcome,
    pub reason: &'static str,
}

/// Decides whether `merged` must replace `remote`.
///
/// Without `skip_unchanged` every existing document is replaced, so each
/// run issues the same writes. With it, a merge that changes nothing is left
/// alone.
pub fn needs_replace(
    remote: &Document,
    merged: &Document,
    skip_unchanged: bool,
) -> ReplaceDecision {
    if remote != merged {
        ReplaceDecision {
            needs_write: true,
            outcome: SyncOutcome::Updated,
            reason: "merged document differs",
        }
    } else if skip_unchanged {
        ReplaceDecision {
            needs_write: false,
            outcome: SyncOutcome::Unchanged,
            reason: "merged document identical",
        }
    } else {
        ReplaceDecision {
            needs_write: true,
            outcome: SyncOutcome::Updated,
            reason: "replace requested for identical document",
        }
    }
}

/// A document that could not be reconciled.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub kind: ResourceKind,
    /// Remote identity, when the document got far enough to have one.
    pub key: Option<String>,
    pub path: Option<PathBuf>,
    pub error: String,
}

/// Result of reconciling one collection and its items.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    pub collection_id: Option<String>,
    pub path: Option<PathBuf>,
    pub outcome: SyncOutcome,
    pub items: SyncStats,
}

/// Aggregated result of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub resolver: &'static str,
    pub collections: SyncStats,
    pub items: SyncStats,
    pub results: Vec<CollectionResult>,
    pub failures: Vec<DocumentFailure>,
}

impl SyncReport {
    fn new(dry_run: bool, resolver: &'static str) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            resolver,
            collections: SyncStats::new(),
            items: SyncStats::new(),
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn add(&mut self, result: CollectionResult) {
        self.collections.record(result.outcome);
        self.items.absorb(&result.items);
        self.results.push(result);
    }

    /// Number of collection and item upserts that completed.
    pub fn completed_upserts(&self) -> usize {
        self.collections.successful() + self.items.successful()
    }

    /// Number of documents that failed.
    pub fn failed_count(&self) -> usize {
        self.collections.failed + self.items.failed
    }

    /// Returns true if no document failed.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Applies a local document tree to a remote catalog service.
///
/// Calls are awaited one at a time. The resolver decides how existence is
/// checked; the merge keeps remote-only fields alive.
///
/// # Examples
///
/// ```
/// use catsync_core::memory::MemoryCatalog;
/// use catsync_core::resolver::ProbeResolver;
/// use catsync_core::sync::Reconciler;
///
/// let catalog = MemoryCatalog::new();
/// let reconciler = Reconciler::new(&catalog, Box::new(ProbeResolver)).dry_run(true);
/// assert!(reconciler.is_dry_run());
/// ```
pub struct Reconciler<'a> {
    client: &'a dyn CatalogClient,
    resolver: Box<dyn IdentityResolver>,
    skip_unchanged: bool,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn CatalogClient, resolver: Box<dyn IdentityResolver>) -> Self {
        Self {
            client,
            resolver,
            skip_unchanged: false,
            dry_run: false,
        }
    }

    /// Leave existing documents alone when merging changes nothing.
    pub fn skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    /// Resolve and merge, but never create or replace.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reconciles every collection of `source`, each followed by its items.
    ///
    /// # Errors
    ///
    /// Only fails when `source` cannot be enumerated at all. Per-document
    /// failures are recorded in the returned report.
    pub async fn run(&mut self, source: &dyn ResourceSource) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(self.dry_run, self.resolver.name());
        let collections = source.list_collections()?;

        let expected = collections.iter().filter(|c| c.is_ok()).count();
        info!(
            collections = expected,
            resolver = self.resolver.name(),
            dry_run = self.dry_run,
            "Starting reconciliation"
        );
        self.resolver
            .enter_scope(self.client, &Scope::Collections, expected)
            .await;

        let total = collections.len();
        for (i, entry) in collections.into_iter().enumerate() {
            let result = self.sync_collection(source, entry, &mut report.failures).await;
            match &result.collection_id {
                Some(id) => info!(
                    "[{}/{}] {} {:?}: {} items created, {} updated, {} failed",
                    i + 1,
                    total,
                    id,
                    result.outcome,
                    result.items.created,
                    result.items.updated,
                    result.items.failed
                ),
                None => warn!("[{}/{}] Skipped unreadable collection", i + 1, total),
            }
            report.add(result);
        }

        report.finished_at = Some(Utc::now());
        info!(
            completed = report.completed_upserts(),
            failed = report.failed_count(),
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn sync_collection(
        &mut self,
        source: &dyn ResourceSource,
        entry: Loaded<CollectionDoc>,
        failures: &mut Vec<DocumentFailure>,
    ) -> CollectionResult {
        let stored = match entry.and_then(|s| check_collection(&s).map(|_| s)) {
            Ok(stored) => stored,
            Err(e) => {
                failures.push(failure(ResourceKind::Collection, None, &e));
                error!(kind = "collection", error = %e, "Rejected local document");
                return CollectionResult {
                    collection_id: None,
                    path: failure_path(&e),
                    outcome: SyncOutcome::Failed,
                    items: SyncStats::new(),
                };
            }
        };

        let Stored { path, doc, raw } = stored;
        let collection_id = doc.id.clone();
        let outcome = self.upsert_or_record(doc.key(), &path, &raw, failures).await;

        let items = match source.list_items(&collection_id) {
            Ok(items) => items,
            Err(e) => {
                error!(collection = %collection_id, error = %e, "Cannot list items");
                failures.push(failure(ResourceKind::Item, None, &e));
                let mut stats = SyncStats::new();
                stats.record(SyncOutcome::Failed);
                return CollectionResult {
                    collection_id: Some(collection_id),
                    path: Some(path),
                    outcome,
                    items: stats,
                };
            }
        };
        if items.is_empty() {
            debug!(collection = %collection_id, "No items");
        }

        let mut stats = SyncStats::new();
        if outcome == SyncOutcome::Failed {
            if !items.is_empty() {
                warn!(
                    collection = %collection_id,
                    items = items.len(),
                    "Skipping items of failed collection"
                );
            }
            for _ in &items {
                stats.record(SyncOutcome::Skipped);
            }
        } else {
            let expected = items.iter().filter(|i| i.is_ok()).count();
            self.resolver
                .enter_scope(self.client, &Scope::Items(collection_id.clone()), expected)
                .await;

            for entry in items {
                let checked = entry.and_then(|s| check_item(&s, &collection_id).map(|_| s));
                let outcome = match checked {
                    Ok(Stored { path, doc, raw }) => {
                        self.upsert_or_record(doc.key(), &path, &raw, failures).await
                    }
                    Err(e) => {
                        error!(
                            kind = "item",
                            collection = %collection_id,
                            error = %e,
                            "Rejected local document"
                        );
                        failures.push(failure(ResourceKind::Item, None, &e));
                        SyncOutcome::Failed
                    }
                };
                stats.record(outcome);
            }
        }

        CollectionResult {
            collection_id: Some(collection_id),
            path: Some(path),
            outcome,
            items: stats,
        }
    }

    async fn upsert_or_record(
        &self,
        key: ResourceKey,
        path: &Path,
        local: &Document,
        failures: &mut Vec<DocumentFailure>,
    ) -> SyncOutcome {
        match self.upsert(&key, local).await {
            Ok(outcome) => {
                debug!(kind = %key.kind(), id = key.id(), ?outcome, "Document reconciled");
                outcome
            }
            Err(e) => {
                error!(
                    kind = %key.kind(),
                    id = key.id(),
                    path = %path.display(),
                    state = ?DocumentState::Errored,
                    error = %e,
                    "Failed to reconcile document"
                );
                failures.push(DocumentFailure {
                    kind: key.kind(),
                    key: Some(key.to_string()),
                    path: Some(path.to_path_buf()),
                    error: e.to_string(),
                });
                SyncOutcome::Failed
            }
        }
    }

    /// Creates `local` verbatim if absent, otherwise merges it onto the
    /// remote copy and replaces the whole remote document.
    pub async fn upsert(
        &self,
        key: &ResourceKey,
        local: &Document,
    ) -> Result<SyncOutcome, SyncError> {
        debug!(kind = %key.kind(), id = key.id(), state = ?DocumentState::Unknown);

        let remote = match self.resolver.resolve(self.client, key).await? {
            Resolution::Absent => None,
            Resolution::Exists(Some(remote)) => Some(remote),
            Resolution::Exists(None) => {
                let fetched = self.client.fetch(key).await?;
                if fetched.is_none() {
                    warn!(%key, "Listed in index but not found, creating");
                }
                fetched
            }
        };

        match remote {
            None => {
                debug!(kind = %key.kind(), id = key.id(), state = ?DocumentState::Absent);
                if !self.dry_run {
                    self.client.create(key, local).await?;
                }
                debug!(kind = %key.kind(), id = key.id(), state = ?DocumentState::Created);
                Ok(SyncOutcome::Created)
            }
            Some(remote) => {
                debug!(kind = %key.kind(), id = key.id(), state = ?DocumentState::Exists);
                let merged = merge(&remote, local);
                let decision = needs_replace(&remote, &merged, self.skip_unchanged);
                if !decision.needs_write {
                    debug!(
                        kind = %key.kind(),
                        id = key.id(),
                        state = ?DocumentState::Unchanged,
                        reason = decision.reason
                    );
                    return Ok(decision.outcome);
                }
                if !self.dry_run {
                    self.client.replace(key, &merged).await?;
                }
                debug!(
                    kind = %key.kind(),
                    id = key.id(),
                    state = ?DocumentState::Updated,
                    reason = decision.reason
                );
                Ok(decision.outcome)
            }
        }
    }
}

fn failure_path(error: &SyncError) -> Option<PathBuf> {
    match error {
        SyncError::Consistency { path, .. } | SyncError::InvalidDocument { path, .. } => {
            Some(path.clone())
        }
        _ => None,
    }
}

fn failure(kind: ResourceKind, key: Option<String>, error: &SyncError) -> DocumentFailure {
    DocumentFailure {
        kind,
        key,
        path: failure_path(error),
        error: error.to_string(),
    }
}
