//! Node in the hierarchical graph.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Attribute, AttributeContent, AttributeMap, CategoryId, RelId};

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A region or object in the graph.
///
/// `attributes` holds only the *local* overrides. Inherited values are
/// resolved through the store (see `GraphStore::effective_attribute`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Tree parent. A link to `id` itself means "no parent".
    pub super_node: Option<NodeId>,
    pub relations: SmallVec<[RelId; 4]>,
    pub attributes: AttributeMap,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: String::new(),
            super_node: None,
            relations: SmallVec::new(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_super_node(mut self, parent: NodeId) -> Self {
        self.super_node = Some(parent);
        self
    }

    pub fn with_attribute(mut self, category: impl Into<CategoryId>, content: AttributeContent) -> Self {
        let category = category.into();
        self.attributes.insert(category.clone(), Attribute::new(category, content));
        self
    }

    /// The fallback target, with self-links treated as absent.
    pub fn parent(&self) -> Option<NodeId> {
        self.super_node.filter(|p| *p != self.id)
    }

    pub fn local_attribute(&self, category: &CategoryId) -> Option<&Attribute> {
        self.attributes.get(category)
    }
}
