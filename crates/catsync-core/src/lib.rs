//! catsync core - resource model, merge engine and reconciler.
//!
//! - [`models`] - collection, item and link documents
//! - [`merge`] - right-biased recursive merge
//! - [`resolver`] - remote existence checks (per-document probe or per-scope index)
//! - [`sync`] - the reconciler and its run report
//! - [`tree`] - nested catalog construction with symmetric parent/child links

pub mod config;
pub mod error;
pub mod memory;
pub mod merge;
pub mod models;
pub mod remote;
pub mod resolver;
pub mod source;
pub mod sync;
pub mod tree;

pub use config::{
    default_config_path, load_config, CatsyncConfig, HttpConfig, RemoteConfig, ResolverStrategy,
    StoreConfig, SyncConfig,
};
pub use error::SyncError;
pub use models::{CollectionDoc, ItemDoc, Link, Loaded, ResourceKey, ResourceKind, Stored};
pub use remote::{CatalogClient, Document};
pub use resolver::{build_resolver, IdentityResolver, IndexResolver, ProbeResolver};
pub use source::{audit, Audit, ResourceSource};
pub use sync::{Reconciler, SyncOutcome, SyncReport, SyncStats};
pub use tree::CatalogTree;
