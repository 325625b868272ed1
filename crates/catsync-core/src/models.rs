//! Resource documents: collections (and catalogs) plus the items they hold.

use std::fmt;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Media type used for catalog and collection links.
pub const JSON: &str = "application/json";

/// Media type used for item links.
pub const GEO_JSON: &str = "application/geo+json";

/// The two resource kinds the reconciler moves between local and remote.
///
/// Catalogs are stored and uploaded as collections with `type = "Catalog"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Collection,
    Item,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Collection => f.write_str("collection"),
            ResourceKind::Item => f.write_str("item"),
        }
    }
}

/// Remote identity of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Collection(String),
    Item { collection: String, id: String },
}

impl ResourceKey {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceKey::Collection(_) => ResourceKind::Collection,
            ResourceKey::Item { .. } => ResourceKind::Item,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ResourceKey::Collection(id) => id,
            ResourceKey::Item { id, .. } => id,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Collection(id) => write!(f, "collections/{}", id),
            ResourceKey::Item { collection, id } => {
                write!(f, "collections/{}/items/{}", collection, id)
            }
        }
    }
}

/// A relation record inside `links`.
///
/// # Examples
///
/// ```
/// use catsync_core::models::Link;
///
/// let link = Link::new("child-1", "child").media_type("application/json");
/// let json = serde_json::to_value(&link).unwrap();
/// assert_eq!(json["type"], "application/json");
/// assert!(json.get("title").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hreflang: Option<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            media_type: None,
            title: None,
            hreflang: None,
            extras: Map::new(),
        }
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn title(mut self, title: Option<impl Into<String>>) -> Self {
        self.title = title.map(Into::into);
        self
    }
}

/// A collection (or catalog) document.
///
/// Optional fields keep their absence on round-trip: a local document without
/// `links` leaves the remote `links` untouched on merge, while `"links": []`
/// clears them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDoc {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    /// Every other field (assets, keywords, providers, ...).
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl CollectionDoc {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            title: None,
            description: None,
            extent: None,
            license: None,
            crs: None,
            links: None,
            extras: Map::new(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::Collection(self.id.clone())
    }
}

/// An item (feature) document scoped to one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDoc {
    pub id: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl ItemDoc {
    pub fn new(id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            geometry: None,
            properties: None,
            bbox: None,
            links: None,
            extras: Map::new(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::Item {
            collection: self.collection.clone(),
            id: self.id.clone(),
        }
    }
}

/// Converts a typed document into the JSON object sent over the wire.
pub fn to_object<T: Serialize>(doc: &T) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(doc)? {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::Generic(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// A document together with the path it was loaded from.
///
/// `raw` is the JSON object exactly as read, including `null` members and
/// number formatting; it is what the remote service receives. `doc` is the
/// typed view used for identity checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub path: PathBuf,
    pub doc: T,
    pub raw: Map<String, Value>,
}

impl<T: DeserializeOwned> Stored<T> {
    /// Builds the typed view of `raw`.
    pub fn parse(path: PathBuf, raw: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let doc = serde_json::from_value(Value::Object(raw.clone()))?;
        Ok(Self { path, doc, raw })
    }
}

impl<T: Serialize> Stored<T> {
    /// Wraps a document built in memory.
    pub fn from_doc(path: PathBuf, doc: T) -> Result<Self, SyncError> {
        let raw = to_object(&doc)?;
        Ok(Self { path, doc, raw })
    }
}

/// One entry of a store listing: either a consistent document or the reason
/// it was rejected.
pub type Loaded<T> = Result<Stored<T>, SyncError>;
