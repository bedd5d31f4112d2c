//! # Hybrid Graph/Spatial Search
//!
//! One-shot query: nothing survives between calls.
//!
//! ```text
//! point ──► containing_node (or nearest solid space) ──┐
//!                                                       ▼
//! target ──► subtree root ──► depth-first walk ──► found set
//!                                  │ prune when d > max_distance
//!                                  ▼
//!            open neighborhood of (found ∪ target) over relations
//!                                  │ depth-first walk from each neighbor
//!                                  ▼
//!            + target at 0 ──► post-filters (implicit spaces, ancestors)
//! ```
//!
//! Distances are measured to the query position when one is given, else to
//! the target's anchor point. Nodes without any space cannot be measured:
//! they are left out but their children are still walked. A node reached
//! along several paths keeps the smallest distance found.

use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::model::NodeId;
use crate::spatial::{self, Space, SpatialMeasure};
use crate::storage::GraphStore;
use crate::{Error, Result};

// ============================================================================
// Settings
// ============================================================================

/// Options recognized by [`search`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Branches farther than this are pruned.
    pub max_distance: f32,
    /// Include nodes with a solid or implicit space.
    pub select_spaces: bool,
    /// Include point-like nodes.
    pub select_atomics: bool,
    /// Remove the target's ancestors from the result.
    pub exclude_ancestors: bool,
    /// Resolve a point outside every space to the nearest solid space.
    pub fallback_nearest_space: bool,
    /// Remove implicit spaces from the result.
    pub exclude_implicit_spaces: bool,
    pub spatial_measure: SpatialMeasure,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            select_spaces: true,
            select_atomics: true,
            exclude_ancestors: false,
            fallback_nearest_space: false,
            exclude_implicit_spaces: false,
            spatial_measure: SpatialMeasure::Surface,
        }
    }
}

impl SearchSettings {
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn excluding_ancestors(mut self) -> Self {
        self.exclude_ancestors = true;
        self
    }

    pub fn excluding_implicit_spaces(mut self) -> Self {
        self.exclude_implicit_spaces = true;
        self
    }

    pub fn with_fallback_nearest_space(mut self) -> Self {
        self.fallback_nearest_space = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_distance.is_nan() || self.max_distance < 0.0 {
            return Err(Error::Config(format!(
                "max_distance must be a non-negative number, got {}",
                self.max_distance
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Query / Result
// ============================================================================

/// What to search around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SearchQuery {
    Node { node: NodeId, position: Option<Vec3> },
    Point(Vec3),
}

impl SearchQuery {
    pub fn node(node: NodeId) -> Self {
        SearchQuery::Node { node, position: None }
    }

    pub fn node_at(node: NodeId, position: Vec3) -> Self {
        SearchQuery::Node { node, position: Some(position) }
    }

    pub fn point(position: Vec3) -> Self {
        SearchQuery::Point(position)
    }
}

/// Parallel node / distance lists. Order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub nodes: Vec<NodeId>,
    pub distances: Vec<f32>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, f32)> + '_ {
        self.nodes.iter().copied().zip(self.distances.iter().copied())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn distance_of(&self, node: NodeId) -> Option<f32> {
        self.iter().find(|(n, _)| *n == node).map(|(_, d)| d)
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// The most specific node containing `point`, or the nearest solid space
/// when `fallback_nearest_space` is set.
pub fn find_containing_node<S: GraphStore + ?Sized>(
    store: &S,
    point: Vec3,
    settings: &SearchSettings,
) -> Result<Option<NodeId>> {
    ensure_finite(point)?;
    Ok(spatial::containing_node(store, point).or_else(|| {
        if settings.fallback_nearest_space {
            spatial::nearest_space(store, point).map(|(id, _)| id)
        } else {
            None
        }
    }))
}

fn ensure_finite(position: Vec3) -> Result<()> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(Error::Degenerate(format!("query position {position} is not finite")))
    }
}

/// Run one search. A point that resolves to no node yields an empty result.
pub fn search<S: GraphStore + ?Sized>(
    store: &S,
    query: &SearchQuery,
    settings: &SearchSettings,
) -> Result<SearchResult> {
    settings.validate()?;
    let (target, position) = match *query {
        SearchQuery::Node { node, position } => {
            if let Some(p) = position {
                ensure_finite(p)?;
            }
            (node, position)
        }
        SearchQuery::Point(p) => match find_containing_node(store, p, settings)? {
            Some(node) => (node, Some(p)),
            None => {
                debug!(point = %p, "no space contains the query point");
                return Ok(SearchResult::default());
            }
        },
    };
    store.require_node(target)?;

    let ancestors = store.ancestors(target)?;
    let root = ancestors.last().copied().unwrap_or(target);
    let origin = position.or_else(|| spatial::node_anchor(store, target));

    let mut walk = Walk {
        store,
        settings,
        target,
        origin,
        found: HashMap::new(),
        visited: HashSet::new(),
    };

    if origin.is_some() {
        walk.subtree(root);

        let mut seeds: Vec<NodeId> = walk.found.keys().copied().collect();
        seeds.push(target);
        let mut neighborhood: Vec<NodeId> = seeds
            .into_iter()
            .flat_map(|n| store.neighbors(n))
            .filter(|n| *n != target && !walk.found.contains_key(n))
            .collect();
        neighborhood.sort_unstable();
        neighborhood.dedup();
        trace!(count = neighborhood.len(), "expanding relation neighborhood");
        for neighbor in neighborhood {
            walk.subtree(neighbor);
        }
    } else {
        debug!(%target, "target has no anchor and no position was given");
    }

    let mut found = walk.found;
    found.insert(target, 0.0);

    if settings.exclude_implicit_spaces {
        found.retain(|id, _| *id == target || !matches!(store.space_of(*id), Some(Space::Implicit)));
    }
    if settings.exclude_ancestors {
        for ancestor in &ancestors {
            found.remove(ancestor);
        }
    }

    let mut pairs: Vec<(NodeId, f32)> = found.into_iter().collect();
    pairs.sort_unstable_by_key(|(id, _)| *id);
    let (nodes, distances) = pairs.into_iter().unzip();
    let result = SearchResult { nodes, distances };
    debug!(%target, root = %root, results = result.len(), "search finished");
    Ok(result)
}

// ============================================================================
// Walk
// ============================================================================

struct Walk<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    settings: &'a SearchSettings,
    target: NodeId,
    origin: Option<Vec3>,
    found: HashMap<NodeId, f32>,
    visited: HashSet<NodeId>,
}

impl<S: GraphStore + ?Sized> Walk<'_, S> {
    fn record(&mut self, node: NodeId, distance: f32) {
        self.found
            .entry(node)
            .and_modify(|d| *d = d.min(distance))
            .or_insert(distance);
    }

    fn selected(&self, space: &Space) -> bool {
        match space {
            Space::Atomic { .. } => self.settings.select_atomics,
            Space::Implicit | Space::Solid { .. } => self.settings.select_spaces,
        }
    }

    fn subtree(&mut self, root: NodeId) {
        let Some(origin) = self.origin else {
            return;
        };
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if !self.visited.insert(current) {
                continue;
            }
            if current != self.target {
                match self.store.space_of(current) {
                    None => trace!(node = %current, "no space, not measured"),
                    Some(space) => {
                        match spatial::node_distance(self.store, current, origin, self.settings.spatial_measure) {
                            Some(d) if !d.is_finite() => {
                                warn!(node = %current, distance = d, "non-finite distance, discarded");
                            }
                            Some(d) if d > self.settings.max_distance => {
                                trace!(node = %current, distance = d, "pruned");
                                continue;
                            }
                            Some(d) => {
                                if self.selected(&space) {
                                    self.record(current, d);
                                }
                            }
                            None => warn!(node = %current, "space has no geometry, discarded"),
                        }
                    }
                }
            }
            let mut children = self.store.children(current);
            children.reverse();
            stack.extend(children);
        }
    }
}
