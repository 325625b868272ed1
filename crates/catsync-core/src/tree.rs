//! Nested catalog trees.
//!
//! Nodes live in an arena keyed by id and hold explicit parent, child and
//! item edges. `links` are only written when documents are exported, from
//! those edges, so every `child` link has its `parent` counterpart and every
//! `item` link has the item's `parent` link.

use std::collections::HashMap;

use crate::error::SyncError;
use crate::models::{CollectionDoc, ItemDoc, Link, GEO_JSON, JSON};

/// A node of a [`CatalogTree`].
#[derive(Debug, Clone)]
pub struct CatalogNode {
    doc: CollectionDoc,
    parent: Option<String>,
    children: Vec<String>,
    items: Vec<(String, String)>,
}

impl CatalogNode {
    pub fn doc(&self) -> &CollectionDoc {
        &self.doc
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A catalog hierarchy rooted at one collection.
///
/// # Examples
///
/// ```
/// use catsync_core::models::CollectionDoc;
/// use catsync_core::tree::CatalogTree;
///
/// let mut root = CollectionDoc::new("forecasts");
/// root.title = Some("Forecasts".to_string());
///
/// let mut tree = CatalogTree::new(root);
/// tree.add_child("forecasts", "grib2", "Forecasts - GRIB2").unwrap();
///
/// let docs = tree.documents();
/// assert_eq!(docs.len(), 2);
/// assert_eq!(docs[1].kind.as_deref(), Some("Catalog"));
/// ```
#[derive(Debug, Clone)]
pub struct CatalogTree {
    root: String,
    nodes: HashMap<String, CatalogNode>,
    order: Vec<String>,
}

impl CatalogTree {
    pub fn new(root: CollectionDoc) -> Self {
        let id = root.id.clone();
        let node = CatalogNode {
            doc: root,
            parent: None,
            children: Vec::new(),
            items: Vec::new(),
        };
        Self {
            root: id.clone(),
            nodes: HashMap::from([(id.clone(), node)]),
            order: vec![id],
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root
    }

    pub fn get(&self, id: &str) -> Option<&CatalogNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Adds a catalog below `parent_id`.
    ///
    /// The child starts as a copy of its parent's metadata (description,
    /// extent, license, crs and any extra fields) with its own id and title,
    /// `type = "Catalog"` and no links of its own.
    pub fn add_child(
        &mut self,
        parent_id: &str,
        child_id: &str,
        title: &str,
    ) -> Result<&CatalogNode, SyncError> {
        if self.nodes.contains_key(child_id) {
            return Err(SyncError::DuplicateNode(child_id.to_string()));
        }
        let parent = self
            .nodes
            .get_mut(parent_id)
            .ok_or_else(|| SyncError::UnknownNode(parent_id.to_string()))?;

        let mut doc = parent.doc.clone();
        doc.id = child_id.to_string();
        doc.kind = Some("Catalog".to_string());
        doc.title = Some(title.to_string());
        doc.links = None;

        parent.children.push(child_id.to_string());
        self.nodes.insert(
            child_id.to_string(),
            CatalogNode {
                doc,
                parent: Some(parent_id.to_string()),
                children: Vec::new(),
                items: Vec::new(),
            },
        );
        self.order.push(child_id.to_string());

        self.nodes
            .get(child_id)
            .ok_or_else(|| SyncError::UnknownNode(child_id.to_string()))
    }

    /// Hangs `item` below the catalog `parent_id` and gives the item its
    /// `parent` link.
    pub fn attach_item(&mut self, parent_id: &str, item: &mut ItemDoc) -> Result<(), SyncError> {
        let parent = self
            .nodes
            .get_mut(parent_id)
            .ok_or_else(|| SyncError::UnknownNode(parent_id.to_string()))?;

        let edge = (item.collection.clone(), item.id.clone());
        if parent.items.contains(&edge) {
            return Err(SyncError::DuplicateNode(format!(
                "{}/items/{}",
                item.collection, item.id
            )));
        }
        parent.items.push(edge);

        item.links.get_or_insert_with(Vec::new).push(
            Link::new(format!("../../{}", parent_id), "parent")
                .media_type(JSON)
                .title(parent.doc.title.clone()),
        );
        Ok(())
    }

    /// Exports every node, root first, with links built from the edges.
    pub fn documents(&self) -> Vec<CollectionDoc> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| self.materialize(node))
            .collect()
    }

    fn materialize(&self, node: &CatalogNode) -> CollectionDoc {
        let mut doc = node.doc.clone();
        let mut links = doc.links.take().unwrap_or_default();

        if let Some(parent) = node.parent.as_ref().and_then(|id| self.nodes.get(id)) {
            links.push(
                Link::new(parent.doc.id.clone(), "parent")
                    .media_type(JSON)
                    .title(parent.doc.title.clone()),
            );
        }
        for child in node.children.iter().filter_map(|id| self.nodes.get(id)) {
            links.push(
                Link::new(child.doc.id.clone(), "child")
                    .media_type(JSON)
                    .title(child.doc.title.clone()),
            );
        }
        for (collection, id) in &node.items {
            let href = format!("{}/items/{}", collection, id);
            links.push(Link::new(href, "item").media_type(GEO_JSON));
        }

        doc.links = Some(links);
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> CollectionDoc {
        let mut doc = CollectionDoc::new("root");
        doc.title = Some("Root".to_string());
        doc.license = Some("various".to_string());
        doc.extent = Some(json!({"spatial": {"bbox": [[5.96, 45.82, 10.49, 47.81]]}}));
        doc.links = Some(vec![Link::new("https://example.com/md", "metadata")]);
        doc
    }

    fn links_with_rel<'a>(doc: &'a CollectionDoc, rel: &str) -> Vec<&'a Link> {
        doc.links
            .iter()
            .flatten()
            .filter(|l| l.rel == rel)
            .collect()
    }

    fn find<'a>(docs: &'a [CollectionDoc], id: &str) -> &'a CollectionDoc {
        docs.iter().find(|d| d.id == id).unwrap()
    }

    #[test]
    fn test_child_inherits_parent_metadata() {
        let mut tree = CatalogTree::new(root());
        let child = tree.add_child("root", "a", "Root - A").unwrap();

        assert_eq!(child.doc().kind.as_deref(), Some("Catalog"));
        assert_eq!(child.doc().title.as_deref(), Some("Root - A"));
        assert_eq!(child.doc().license.as_deref(), Some("various"));
        assert!(child.doc().extent.is_some());
        assert!(child.doc().links.is_none());
        assert_eq!(child.parent(), Some("root"));
    }

    #[test]
    fn test_parent_child_link_symmetry() {
        let mut tree = CatalogTree::new(root());
        tree.add_child("root", "a", "Root - A").unwrap();
        tree.add_child("a", "a1", "Root - A - 1").unwrap();
        tree.add_child("a", "a2", "Root - A - 2").unwrap();

        let docs = tree.documents();
        assert_eq!(docs.len(), 4);

        for doc in &docs {
            for child_link in links_with_rel(doc, "child") {
                let child = find(&docs, &child_link.href);
                let back = links_with_rel(child, "parent");
                assert_eq!(back.len(), 1);
                assert_eq!(back[0].href, doc.id);
                assert_eq!(back[0].title, doc.title);
            }
            for parent_link in links_with_rel(doc, "parent") {
                let parent = find(&docs, &parent_link.href);
                assert!(links_with_rel(parent, "child").iter().any(|l| l.href == doc.id));
            }
        }

        let root = find(&docs, "root");
        assert!(links_with_rel(root, "parent").is_empty());
        assert_eq!(links_with_rel(root, "metadata").len(), 1);
        assert_eq!(links_with_rel(root, "child").len(), 1);
        assert_eq!(links_with_rel(find(&docs, "a"), "child").len(), 2);
    }

    #[test]
    fn test_children_do_not_inherit_parent_links() {
        let mut tree = CatalogTree::new(root());
        tree.add_child("root", "a", "A").unwrap();
        let docs = tree.documents();
        assert!(links_with_rel(find(&docs, "a"), "metadata").is_empty());
    }

    #[test]
    fn test_attach_item() {
        let mut tree = CatalogTree::new(root());
        tree.add_child("root", "a", "Root - A").unwrap();

        let mut item = ItemDoc::new("member_000", "root");
        tree.attach_item("a", &mut item).unwrap();

        let parent_links: Vec<_> = item
            .links
            .iter()
            .flatten()
            .filter(|l| l.rel == "parent")
            .collect();
        assert_eq!(parent_links.len(), 1);
        assert_eq!(parent_links[0].href, "../../a");
        assert_eq!(parent_links[0].title.as_deref(), Some("Root - A"));

        let docs = tree.documents();
        let item_links = links_with_rel(find(&docs, "a"), "item");
        assert_eq!(item_links.len(), 1);
        assert_eq!(item_links[0].href, "root/items/member_000");
        assert_eq!(item_links[0].media_type.as_deref(), Some(GEO_JSON));
        assert_eq!(tree.get("a").unwrap().item_count(), 1);
    }

    #[test]
    fn test_duplicate_child_rejected() {
        let mut tree = CatalogTree::new(root());
        tree.add_child("root", "a", "A").unwrap();
        let err = tree.add_child("root", "a", "A again").unwrap_err();
        assert!(matches!(err, SyncError::DuplicateNode(id) if id == "a"));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut tree = CatalogTree::new(root());
        let err = tree.add_child("nope", "a", "A").unwrap_err();
        assert!(matches!(err, SyncError::UnknownNode(id) if id == "nope"));

        let mut item = ItemDoc::new("x", "root");
        assert!(tree.attach_item("nope", &mut item).is_err());
        assert!(item.links.is_none());
    }

    #[test]
    fn test_duplicate_item_rejected() {
        let mut tree = CatalogTree::new(root());
        let mut item = ItemDoc::new("x", "root");
        tree.attach_item("root", &mut item).unwrap();
        assert!(tree.attach_item("root", &mut item).is_err());
        assert_eq!(item.links.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_documents_keep_insertion_order() {
        let mut tree = CatalogTree::new(root());
        for id in ["c", "a", "b"] {
            tree.add_child("root", id, id).unwrap();
        }
        let ids: Vec<_> = tree.documents().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["root", "c", "a", "b"]);
        assert_eq!(tree.get("root").unwrap().children(), ["c", "a", "b"]);
    }
}
