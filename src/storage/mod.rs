//! # Graph Store Trait
//!
//! This is THE contract between the query core and whatever owns the graph.
//! The required methods are the resolve-interfaces the core consumes:
//!
//! ```text
//! resolve(nodeId)     -> node()       superNode, local attributes, relations
//! resolve(categoryId) -> category()   (via Schema)
//! resolveEnum(enumId) -> enum_def()   (via Schema)
//! shapeOf(node)       -> space_of()
//! ```
//!
//! Everything else (children, ancestors, fallback attributes, feature
//! vectors) is derived from those on demand. Nothing is cached, so a query
//! always sees the graph as it is when the call is made.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryGraph` | `memory` | In-memory reference store for tools and tests |

pub mod memory;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::feature::FeatureVector;
use crate::model::*;
use crate::spatial::Space;
use crate::{Error, Result};

pub use memory::MemoryGraph;

/// Hard cap on super-node chain length. Anything longer is treated as a cycle.
pub const MAX_ANCESTOR_DEPTH: usize = 4096;

// ============================================================================
// Store configuration
// ============================================================================

/// Configuration of a store's encoding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Width of enum one-hot / multi-hot encodings.
    pub max_enum_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_enum_size: MAX_ENUM_SIZE }
    }
}

// ============================================================================
// GraphStore trait
// ============================================================================

/// Read access to a hierarchical graph.
///
/// Callers serialize mutation and query; implementations need no
/// cross-call consistency beyond that.
pub trait GraphStore: Schema + Send + Sync {
    // ========================================================================
    // Resolution
    // ========================================================================

    /// Get a node by ID. Returns None if not found.
    fn node(&self, id: NodeId) -> Option<Node>;

    /// Return all nodes.
    fn all_nodes(&self) -> Vec<Node>;

    /// Get a relation by ID.
    fn relation(&self, id: RelId) -> Option<Relation>;

    /// Spatial extent of a node, if one is attached.
    fn space_of(&self, id: NodeId) -> Option<Space>;

    fn require_node(&self, id: NodeId) -> Result<Node> {
        self.node(id).ok_or(Error::NodeNotFound(id))
    }

    /// All node ids in ascending order.
    fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.all_nodes().into_iter().map(|n| n.id).collect();
        ids.sort_unstable();
        ids
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Effective parent: self-links and links to missing nodes count as none.
    fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent()?;
        self.node(parent).map(|_| parent)
    }

    /// Direct children in ascending id order.
    ///
    /// Default: linear scan of all nodes.
    fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .all_nodes()
            .into_iter()
            .filter(|n| n.parent() == Some(id))
            .map(|n| n.id)
            .collect();
        out.sort_unstable();
        out
    }

    /// Nodes without an effective parent, in ascending id order.
    fn roots(&self) -> Vec<NodeId> {
        self.node_ids().into_iter().filter(|id| self.parent(*id).is_none()).collect()
    }

    /// Ancestors from the nearest (parent) to the topmost.
    ///
    /// Fails with `CycleDetected` when the chain revisits a node or exceeds
    /// `MAX_ANCESTOR_DEPTH`.
    fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.require_node(id)?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id);
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent) || out.len() >= MAX_ANCESTOR_DEPTH {
                return Err(Error::CycleDetected(id));
            }
            out.push(parent);
            current = parent;
        }
        Ok(out)
    }

    /// Topmost ancestor, or the node itself when it has none.
    fn subtree_root(&self, id: NodeId) -> Result<NodeId> {
        Ok(self.ancestors(id)?.last().copied().unwrap_or(id))
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Nodes related to `id`, deduplicated, in ascending id order.
    fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut out: Vec<NodeId> = node
            .relations
            .iter()
            .filter_map(|rid| self.relation(*rid))
            .filter_map(|rel| rel.other_node(id))
            .filter(|other| *other != id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    // ========================================================================
    // Fallback attributes
    // ========================================================================

    /// Local attribute if present, else the nearest ancestor's.
    fn effective_attribute(&self, id: NodeId, category: &CategoryId) -> Result<Option<Attribute>> {
        let chain = std::iter::once(id).chain(self.ancestors(id)?);
        for node_id in chain {
            if let Some(attr) = self.node(node_id).and_then(|n| n.attributes.get(category).cloned()) {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// Every category visible from `id`, local values overriding inherited ones.
    fn effective_attributes(&self, id: NodeId) -> Result<AttributeMap> {
        let mut chain = self.ancestors(id)?;
        chain.reverse();
        chain.push(id);
        let mut out = AttributeMap::new();
        for node_id in chain {
            if let Some(node) = self.node(node_id) {
                out.extend(node.attributes);
            }
        }
        Ok(out)
    }

    /// Encode the effective attributes of `id`.
    fn feature_vector_of(&self, id: NodeId, normalized: bool) -> Result<FeatureVector> {
        let node = self.require_node(id)?;
        let attributes = self.effective_attributes(id)?;
        let name = if node.name.is_empty() { format!("node-{id}") } else { node.name };
        let mut fv = FeatureVector::from_attributes(name, attributes.values(), self)?;
        if normalized {
            fv.normalize(self)?;
        }
        Ok(fv)
    }
}
