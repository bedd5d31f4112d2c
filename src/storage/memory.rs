//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses plain hash maps protected by RwLock.
//!
//! ## Limitations
//!
//! - **Single-writer only**: per-collection locks mean multi-step mutations
//!   are NOT atomic. Callers serialize mutation and query.
//! - **No indexes**: children are found by scanning every node.
//!
//! Every mutation bumps `revision()`. Anything a caller derives from the
//! graph (search results, feature vectors) is stale once the revision moves.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{GraphStore, StoreConfig};
use crate::model::*;
use crate::spatial::Space;
use crate::{Error, Result};

// ============================================================================
// MemoryGraph
// ============================================================================

/// In-memory hierarchical graph.
#[derive(Clone)]
pub struct MemoryGraph {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    config: StoreConfig,
    nodes: RwLock<HashMap<NodeId, Node>>,
    relations: RwLock<HashMap<RelId, Relation>>,
    spaces: RwLock<HashMap<NodeId, Space>>,
    categories: RwLock<HashMap<CategoryId, Category>>,
    enums: RwLock<HashMap<EnumId, EnumDef>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    revision: AtomicU64,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraph")
            .field("nodes", &self.inner.nodes.read().len())
            .field("relations", &self.inner.relations.read().len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                config,
                nodes: RwLock::new(HashMap::new()),
                relations: RwLock::new(HashMap::new()),
                spaces: RwLock::new(HashMap::new()),
                categories: RwLock::new(HashMap::new()),
                enums: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                revision: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.config
    }

    /// Mutation counter.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    fn touch(&self) {
        self.inner.revision.fetch_add(1, Ordering::AcqRel);
    }

    fn ensure_node(&self, id: NodeId) -> Result<()> {
        if self.inner.nodes.read().contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NodeNotFound(id))
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    pub fn relation_count(&self) -> usize {
        self.inner.relations.read().len()
    }

    // ========================================================================
    // Schema
    // ========================================================================

    pub fn add_category(&self, category: Category) {
        debug!(category = %category.id, ty = %category.ty, "category added");
        self.inner.categories.write().insert(category.id.clone(), category);
        self.touch();
    }

    pub fn remove_category(&self, id: &CategoryId) -> bool {
        let removed = self.inner.categories.write().remove(id).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    pub fn add_enum(&self, def: EnumDef) {
        debug!(enum_id = %def.id, entries = def.len(), "enum added");
        self.inner.enums.write().insert(def.id.clone(), def);
        self.touch();
    }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a root node.
    pub fn create_node(&self, name: &str) -> NodeId {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        self.inner.nodes.write().insert(id, Node::new(id).with_name(name));
        debug!(node = %id, name, "node created");
        self.touch();
        id
    }

    /// Create a node under `parent`.
    pub fn create_child(&self, name: &str, parent: NodeId) -> Result<NodeId> {
        self.ensure_node(parent)?;
        let id = self.create_node(name);
        self.set_super_node(id, Some(parent))?;
        Ok(id)
    }

    /// Insert a fully built node as-is, replacing any node with the same id.
    ///
    /// No hierarchy validation happens here; the ancestor walks catch cycles.
    pub fn insert_node(&self, node: Node) {
        self.inner.next_node_id.fetch_max(node.id.0 + 1, Ordering::Relaxed);
        self.inner.nodes.write().insert(node.id, node);
        self.touch();
    }

    /// Delete a node together with its relations and space. Children keep
    /// their dangling super link and behave as roots until relinked.
    pub fn delete_node(&self, id: NodeId) -> bool {
        let Some(node) = self.inner.nodes.write().remove(&id) else {
            return false;
        };
        for rid in &node.relations {
            self.delete_relation(*rid);
        }
        self.inner.spaces.write().remove(&id);
        debug!(node = %id, "node deleted");
        self.touch();
        true
    }

    /// Relink a node. Fails if the new parent is missing or would close a cycle.
    pub fn set_super_node(&self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
        self.ensure_node(id)?;
        if let Some(parent) = parent.filter(|p| *p != id) {
            self.ensure_node(parent)?;
            if self.ancestors(parent)?.contains(&id) {
                return Err(Error::CycleDetected(id));
            }
        }
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.super_node = parent;
        drop(nodes);
        debug!(node = %id, parent = ?parent, "super node set");
        self.touch();
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Set a local attribute, returning the content it replaced.
    pub fn set_attribute(
        &self,
        id: NodeId,
        category: &CategoryId,
        content: AttributeContent,
    ) -> Result<Option<AttributeContent>> {
        let cat = self.require_category(category)?;
        if cat.ty != content.ty() {
            return Err(Error::TypeMismatch {
                category: category.clone(),
                expected: cat.ty,
                got: content.ty(),
            });
        }
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        let old = match node.attributes.get_mut(category) {
            Some(attr) => Some(attr.replace_content(content)?),
            None => {
                node.attributes.insert(category.clone(), Attribute::new(category.clone(), content));
                None
            }
        };
        drop(nodes);
        self.touch();
        Ok(old)
    }

    /// Remove a local attribute; the node falls back to its ancestors again.
    pub fn remove_attribute(&self, id: NodeId, category: &CategoryId) -> Result<Option<Attribute>> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        let removed = node.attributes.remove(category);
        drop(nodes);
        if removed.is_some() {
            self.touch();
        }
        Ok(removed)
    }

    // ========================================================================
    // Relations
    // ========================================================================

    pub fn create_relation(&self, a: NodeId, b: NodeId) -> Result<RelId> {
        self.ensure_node(a)?;
        self.ensure_node(b)?;
        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        self.inner.relations.write().insert(id, Relation::new(id, a, b));

        let mut nodes = self.inner.nodes.write();
        for end in [a, b] {
            if let Some(node) = nodes.get_mut(&end) {
                if !node.relations.contains(&id) {
                    node.relations.push(id);
                }
            }
        }
        drop(nodes);
        debug!(relation = %id, %a, %b, "relation created");
        self.touch();
        Ok(id)
    }

    pub fn set_attribute_relation(
        &self,
        id: RelId,
        category: &CategoryId,
        relation: AttributeRelation,
    ) -> Result<()> {
        let mut rels = self.inner.relations.write();
        let rel = rels.get_mut(&id).ok_or(Error::RelationNotFound(id))?;
        rel.attribute_relations.insert(category.clone(), relation);
        drop(rels);
        self.touch();
        Ok(())
    }

    pub fn delete_relation(&self, id: RelId) -> bool {
        let Some(rel) = self.inner.relations.write().remove(&id) else {
            return false;
        };
        let mut nodes = self.inner.nodes.write();
        for end in [rel.a, rel.b] {
            if let Some(node) = nodes.get_mut(&end) {
                node.relations.retain(|r| *r != id);
            }
        }
        drop(nodes);
        self.touch();
        true
    }

    // ========================================================================
    // Spaces
    // ========================================================================

    /// Attach a space. Degenerate geometry is rejected before it can reach a query.
    pub fn set_space(&self, id: NodeId, space: Space) -> Result<()> {
        self.ensure_node(id)?;
        space.validate()?;
        self.inner.spaces.write().insert(id, space);
        self.touch();
        Ok(())
    }

    pub fn remove_space(&self, id: NodeId) -> Option<Space> {
        let removed = self.inner.spaces.write().remove(&id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }
}

// ============================================================================
// Schema + GraphStore impls
// ============================================================================

impl Schema for MemoryGraph {
    fn category(&self, id: &CategoryId) -> Option<Category> {
        self.inner.categories.read().get(id).cloned()
    }

    fn enum_def(&self, id: &EnumId) -> Option<EnumDef> {
        self.inner.enums.read().get(id).cloned()
    }

    fn max_enum_size(&self) -> usize {
        self.inner.config.max_enum_size
    }
}

impl GraphStore for MemoryGraph {
    fn node(&self, id: NodeId) -> Option<Node> {
        self.inner.nodes.read().get(&id).cloned()
    }

    fn all_nodes(&self) -> Vec<Node> {
        self.inner.nodes.read().values().cloned().collect()
    }

    fn relation(&self, id: RelId) -> Option<Relation> {
        self.inner.relations.read().get(&id).cloned()
    }

    fn space_of(&self, id: NodeId) -> Option<Space> {
        self.inner.spaces.read().get(&id).copied()
    }

    fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.inner.nodes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Scan without cloning node payloads.
    fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .inner
            .nodes
            .read()
            .values()
            .filter(|n| n.parent() == Some(id))
            .map(|n| n.id)
            .collect();
        out.sort_unstable();
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn with_height() -> MemoryGraph {
        let g = MemoryGraph::new();
        g.add_category(Category::new("height", AttributeContent::Float(0.0)).with_range(0.0, 10.0));
        g
    }

    #[test]
    fn test_create_and_get_node() {
        let g = MemoryGraph::new();
        let id = g.create_node("forest");
        let node = g.node(id).unwrap();
        assert_eq!(node.name, "forest");
        assert_eq!(node.super_node, None);
    }

    #[test]
    fn test_children_and_ancestors() {
        let g = MemoryGraph::new();
        let a = g.create_node("a");
        let b = g.create_child("b", a).unwrap();
        let c = g.create_child("c", b).unwrap();
        let d = g.create_child("d", a).unwrap();
        assert_eq!(g.children(a), vec![b, d]);
        assert_eq!(g.ancestors(c).unwrap(), vec![b, a]);
        assert_eq!(g.subtree_root(c).unwrap(), a);
        assert_eq!(g.subtree_root(a).unwrap(), a);
        assert_eq!(g.roots(), vec![a]);
    }

    #[test]
    fn test_relink_rejects_cycle() {
        let g = MemoryGraph::new();
        let a = g.create_node("a");
        let b = g.create_child("b", a).unwrap();
        assert!(matches!(g.set_super_node(a, Some(b)), Err(Error::CycleDetected(_))));
        // A self link is allowed and means "no parent".
        g.set_super_node(a, Some(a)).unwrap();
        assert_eq!(g.parent(a), None);
    }

    #[test]
    fn test_imported_cycle_is_detected_by_walks() {
        let g = with_height();
        g.insert_node(Node::new(NodeId(10)).with_super_node(NodeId(11)));
        g.insert_node(Node::new(NodeId(11)).with_super_node(NodeId(10)));
        assert!(matches!(g.ancestors(NodeId(10)), Err(Error::CycleDetected(NodeId(10)))));
        assert!(matches!(
            g.effective_attribute(NodeId(10), &"height".into()),
            Err(Error::CycleDetected(_))
        ));
        // Fresh ids continue past imported ones.
        assert_eq!(g.create_node("next"), NodeId(12));
    }

    #[test]
    fn test_set_attribute_validates_category() {
        let g = with_height();
        let n = g.create_node("n");
        assert!(matches!(
            g.set_attribute(n, &"nope".into(), AttributeContent::Float(1.0)),
            Err(Error::CategoryNotFound(_))
        ));
        assert!(matches!(
            g.set_attribute(n, &"height".into(), AttributeContent::Boolean(true)),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(g.set_attribute(n, &"height".into(), AttributeContent::Float(1.0)).unwrap(), None);
        assert_eq!(
            g.set_attribute(n, &"height".into(), AttributeContent::Float(2.0)).unwrap(),
            Some(AttributeContent::Float(1.0))
        );
    }

    #[test]
    fn test_relations_and_neighbors() {
        let g = MemoryGraph::new();
        let a = g.create_node("a");
        let b = g.create_node("b");
        let c = g.create_node("c");
        let ab = g.create_relation(a, b).unwrap();
        g.create_relation(c, a).unwrap();
        assert_eq!(g.neighbors(a), vec![b, c]);
        assert_eq!(g.neighbors(b), vec![a]);

        assert!(g.delete_relation(ab));
        assert_eq!(g.neighbors(a), vec![c]);
        assert!(g.neighbors(b).is_empty());
    }

    #[test]
    fn test_delete_node_detaches() {
        let g = MemoryGraph::new();
        let a = g.create_node("a");
        let b = g.create_child("b", a).unwrap();
        let c = g.create_node("c");
        g.create_relation(a, c).unwrap();
        assert!(g.delete_node(a));
        assert_eq!(g.relation_count(), 0);
        assert!(g.neighbors(c).is_empty());
        // The orphan behaves as a root.
        assert_eq!(g.parent(b), None);
        assert_eq!(g.subtree_root(b).unwrap(), b);
    }

    #[test]
    fn test_revision_moves_on_mutation() {
        let g = MemoryGraph::new();
        let before = g.revision();
        let n = g.create_node("n");
        assert!(g.revision() > before);
        let mid = g.revision();
        g.set_space(n, Space::Implicit).unwrap();
        assert!(g.revision() > mid);
    }

    #[test]
    fn test_unknown_node_errors() {
        let g = MemoryGraph::new();
        assert!(matches!(g.ancestors(NodeId(99)), Err(Error::NodeNotFound(NodeId(99)))));
        assert!(matches!(g.create_relation(NodeId(1), NodeId(2)), Err(Error::NodeNotFound(_))));
        assert!(g.set_space(NodeId(5), Space::Implicit).is_err());
    }

    #[test]
    fn test_degenerate_space_is_rejected() {
        use crate::spatial::{Shape, Transform};
        use glam::Vec3;

        let g = MemoryGraph::new();
        let n = g.create_node("n");
        let capsule = Space::Solid {
            transform: Transform::default(),
            shape: Shape::Capsule { radius: 1.0, half_height: -1.0 },
        };
        assert!(matches!(g.set_space(n, capsule), Err(Error::Degenerate(_))));
        assert!(matches!(g.set_space(n, Space::atomic(Vec3::new(f32::NAN, 0.0, 0.0))), Err(Error::Degenerate(_))));
        assert!(matches!(g.set_space(n, Space::atomic(Vec3::splat(f32::INFINITY))), Err(Error::Degenerate(_))));
        assert!(g.space_of(n).is_none());
        g.set_space(n, Space::atomic(Vec3::ONE)).unwrap();
    }
}
