use std::path::PathBuf;

use thiserror::Error;

use crate::models::ResourceKind;

/// Errors raised while loading, resolving, merging or uploading resource documents.
///
/// Most variants are scoped to a single document: the reconciler logs them,
/// records the document as failed and moves on. Only [`SyncError::StoreUnreadable`]
/// aborts a whole run.
///
/// # Error Conversion
///
/// - `serde_json::Error` → `SyncError::Serialization`
///
/// # Examples
///
/// ```
/// use catsync_core::error::SyncError;
/// use catsync_core::models::ResourceKind;
///
/// let err = SyncError::Consistency {
///     kind: ResourceKind::Collection,
///     path: "collections/a.json".into(),
///     expected: "a".to_string(),
///     actual: "b".to_string(),
/// };
/// assert!(err.is_document_scoped());
/// ```
#[derive(Error, Debug)]
pub enum SyncError {
    /// A document's storage identity disagrees with its content.
    ///
    /// Raised when a file stem differs from the document `id`, or when an
    /// item's `collection` differs from its enclosing collection folder.
    /// Never sent to the remote service.
    #[error("Consistency error in {kind} at {}: expected `{expected}`, found `{actual}`", path.display())]
    Consistency {
        kind: ResourceKind,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A local document could not be read or parsed.
    #[error("Invalid {kind} document at {}: {reason}", path.display())]
    InvalidDocument {
        kind: ResourceKind,
        path: PathBuf,
        reason: String,
    },

    /// The remote service answered with a non-2xx status.
    #[error("{method} {url} rejected with HTTP {status}: {body}")]
    RemoteRejected {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The remote service could not be reached.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The local store root cannot be enumerated. Fatal for the run.
    #[error("Local store at {} is unreadable: {reason}", path.display())]
    StoreUnreadable { path: PathBuf, reason: String },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A catalog tree node with this id already exists.
    #[error("Catalog node already exists: {0}")]
    DuplicateNode(String),

    /// A catalog tree node with this id does not exist.
    #[error("Catalog node not found: {0}")]
    UnknownNode(String),

    /// Generic error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl SyncError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Consistency { kind, path, .. } => {
                format!(
                    "{}\n   Rename {} or fix the {} document so both identifiers agree.",
                    self,
                    path.display(),
                    kind
                )
            }
            SyncError::RemoteRejected { status, .. } if *status == 401 || *status == 403 => {
                format!(
                    "{}\n   Check CATSYNC_USER and CATSYNC_PASSWORD.",
                    self
                )
            }
            SyncError::Transport(msg) => {
                format!(
                    "Cannot reach the catalog service: {}\n   Check the remote URL and your network connection.",
                    msg
                )
            }
            SyncError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The catalog service may be overloaded. Re-run the sync later.",
                    secs
                )
            }
            SyncError::StoreUnreadable { path, .. } => {
                format!(
                    "{}\n   Expected a directory containing collections/{{id}}.json files: {}",
                    self,
                    path.display()
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if the error only affects the document being processed.
    ///
    /// `false` marks errors about the whole store or configuration. The
    /// reconciler never records those in a report; they come back as the
    /// `Err` of [`crate::sync::Reconciler::run`] or of config loading.
    ///
    /// # Examples
    ///
    /// ```
    /// use catsync_core::error::SyncError;
    ///
    /// assert!(SyncError::Transport("connection reset".to_string()).is_document_scoped());
    /// assert!(!SyncError::StoreUnreadable {
    ///     path: "/nope".into(),
    ///     reason: "not found".to_string(),
    /// }
    /// .is_document_scoped());
    /// ```
    pub fn is_document_scoped(&self) -> bool {
        !matches!(self, SyncError::StoreUnreadable { .. } | SyncError::Config(_))
    }

    /// Returns true if the remote answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::RemoteRejected { status: 404, .. })
    }
}
