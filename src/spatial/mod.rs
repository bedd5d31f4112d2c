//! # Spatial Queries
//!
//! Geometry of individual spaces lives in [`shape`]. This module adds the
//! graph-aware parts:
//!
//! - composite containment: an implicit space claims a point iff one of its
//!   children does, and a claiming child is a more specific match than its
//!   parent, so resolution descends until no child claims the point;
//! - implicit-space distance: the closest distance of any descendant;
//! - nearest-space fallback for points outside every space.

pub mod shape;

use glam::Vec3;
use hashbrown::HashSet;

pub use shape::{Shape, Space, SpatialMeasure, Transform};

use crate::model::NodeId;
use crate::storage::GraphStore;

/// Whether `node` (or, for implicit spaces, one of its children) contains `point`.
pub fn claims<S: GraphStore + ?Sized>(store: &S, node: NodeId, point: Vec3) -> bool {
    claims_inner(store, node, point, &mut HashSet::new())
}

fn claims_inner<S: GraphStore + ?Sized>(
    store: &S,
    node: NodeId,
    point: Vec3,
    seen: &mut HashSet<NodeId>,
) -> bool {
    if !seen.insert(node) {
        return false;
    }
    match store.space_of(node) {
        Some(Space::Implicit) => store
            .children(node)
            .into_iter()
            .any(|c| claims_inner(store, c, point, seen)),
        Some(space) => space.is_point_inside(point),
        None => false,
    }
}

/// The most specific node whose space contains `point`.
///
/// Roots are tried in id order. Returns `None` when no root claims the point.
pub fn containing_node<S: GraphStore + ?Sized>(store: &S, point: Vec3) -> Option<NodeId> {
    let mut current = store.roots().into_iter().find(|r| claims(store, *r, point))?;
    let mut seen = HashSet::new();
    seen.insert(current);
    while let Some(child) = store
        .children(current)
        .into_iter()
        .find(|c| !seen.contains(c) && claims(store, *c, point))
    {
        seen.insert(child);
        current = child;
    }
    Some(current)
}

/// The solid space closest to `point`; ties go to the lower id.
pub fn nearest_space<S: GraphStore + ?Sized>(store: &S, point: Vec3) -> Option<(NodeId, f32)> {
    store
        .node_ids()
        .into_iter()
        .filter_map(|id| match store.space_of(id) {
            Some(space @ Space::Solid { .. }) => space.distance(point).map(|(d, _)| (id, d)),
            _ => None,
        })
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
}

/// Distance from `point` to a node's geometry. Implicit spaces answer with
/// their closest descendant, looking through children that have no space;
/// nodes without any geometry answer `None`.
pub fn node_distance<S: GraphStore + ?Sized>(
    store: &S,
    node: NodeId,
    point: Vec3,
    measure: SpatialMeasure,
) -> Option<f32> {
    match store.space_of(node)? {
        Space::Implicit => {
            let mut seen = HashSet::new();
            seen.insert(node);
            closest_descendant(store, node, point, measure, &mut seen)
        }
        space => space.measure(point, measure),
    }
}

fn closest_descendant<S: GraphStore + ?Sized>(
    store: &S,
    node: NodeId,
    point: Vec3,
    measure: SpatialMeasure,
    seen: &mut HashSet<NodeId>,
) -> Option<f32> {
    let mut best: Option<f32> = None;
    for child in store.children(node) {
        if !seen.insert(child) {
            continue;
        }
        let d = match store.space_of(child) {
            Some(Space::Implicit) | None => closest_descendant(store, child, point, measure, seen),
            Some(space) => space.measure(point, measure),
        };
        if let Some(d) = d {
            best = Some(best.map_or(d, |b| b.min(d)));
        }
    }
    best
}

/// Representative point of a node: its own center, or the mean of its
/// children's anchors for implicit spaces.
pub fn node_anchor<S: GraphStore + ?Sized>(store: &S, node: NodeId) -> Option<Vec3> {
    anchor_inner(store, node, &mut HashSet::new())
}

fn anchor_inner<S: GraphStore + ?Sized>(store: &S, node: NodeId, seen: &mut HashSet<NodeId>) -> Option<Vec3> {
    if !seen.insert(node) {
        return None;
    }
    match store.space_of(node)? {
        Space::Implicit => {
            let anchors: Vec<Vec3> = store
                .children(node)
                .into_iter()
                .filter_map(|c| anchor_inner(store, c, seen))
                .collect();
            if anchors.is_empty() {
                None
            } else {
                Some(anchors.iter().copied().sum::<Vec3>() / anchors.len() as f32)
            }
        }
        space => space.center(),
    }
}
