//! Relation (undirected edge) between two nodes.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{CategoryId, NodeId};

/// Opaque relation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Easing used when blending a category across a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Curve {
    #[default]
    Linear,
    Step,
    SmoothStep,
    EaseIn,
    EaseOut,
}

impl Curve {
    /// Map `t` (clamped to `[0, 1]`) through the curve.
    pub fn evaluate(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Linear => t,
            Curve::Step => if t < 0.5 { 0.0 } else { 1.0 },
            Curve::SmoothStep => t * t * (3.0 - 2.0 * t),
            Curve::EaseIn => t * t,
            Curve::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

/// Per-category metadata carried by a relation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeRelation {
    pub curve: Curve,
}

/// An unordered edge. `a`/`b` order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelId,
    pub a: NodeId,
    pub b: NodeId,
    pub attribute_relations: HashMap<CategoryId, AttributeRelation>,
}

impl Relation {
    pub fn new(id: RelId, a: NodeId, b: NodeId) -> Self {
        Self { id, a, b, attribute_relations: HashMap::new() }
    }

    pub fn with_curve(mut self, category: impl Into<CategoryId>, curve: Curve) -> Self {
        self.attribute_relations.insert(category.into(), AttributeRelation { curve });
        self
    }

    /// The "other" end of the relation from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.a { Some(self.b) }
        else if from == self.b { Some(self.a) }
        else { None }
    }

    pub fn connects(&self, x: NodeId, y: NodeId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    /// Curve for `category`, linear when none is recorded.
    pub fn curve_for(&self, category: &CategoryId) -> Curve {
        self.attribute_relations.get(category).map(|r| r.curve).unwrap_or_default()
    }
}
