//! Blending and picking over search results.
//!
//! These are the hooks placement code builds on: turn a set of nearby
//! nodes into one feature vector, or choose one candidate by weight.

use hashbrown::HashMap;

use crate::distance::DistanceMeasure;
use crate::feature::{FeatureEntry, FeatureVector};
use crate::model::{CategoryId, RelId};
use crate::search::SearchResult;
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Weight of a node at spatial distance `d`: `1 / (1 + d)`.
pub fn similarity_weight(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Weighted mean of every result node's feature vector.
///
/// Each category is divided by the weights of the nodes that actually carry
/// it, so a category known to one node only keeps that node's value.
pub fn inverse_distance_blend<S: GraphStore + ?Sized>(
    store: &S,
    result: &SearchResult,
    normalized: bool,
) -> Result<FeatureVector> {
    let mut sum = FeatureVector::new("blend");
    let mut weights: HashMap<CategoryId, f32> = HashMap::new();

    for (node, distance) in result.iter() {
        let fv = store.feature_vector_of(node, normalized)?;
        let w = similarity_weight(distance);
        for id in fv.keys() {
            *weights.entry(id.clone()).or_default() += w;
        }
        sum = &sum + &(fv * w);
    }
    for (id, total) in &weights {
        sum.scale_category(id, 1.0 / total);
    }
    Ok(sum)
}

/// Blend the two ends of a relation at `t` (0 = `a`, 1 = `b`), easing each
/// category along the relation's curve for it. Categories found on one end
/// only pass through unchanged.
pub fn blend_across_relation<S: GraphStore + ?Sized>(
    store: &S,
    relation: RelId,
    t: f32,
    normalized: bool,
) -> Result<FeatureVector> {
    let rel = store.relation(relation).ok_or(Error::RelationNotFound(relation))?;
    let a = store.feature_vector_of(rel.a, normalized)?;
    let b = store.feature_vector_of(rel.b, normalized)?;

    let mut out = FeatureVector::new(format!("{}~{}", a.name(), b.name()));
    for (id, ea) in a.iter() {
        let entry = match b.get(id) {
            Some(eb) => lerp_entry(id, ea, eb, rel.curve_for(id).evaluate(t))?,
            None => ea.clone(),
        };
        out.insert(id.clone(), entry);
    }
    for (id, eb) in b.iter().filter(|(id, _)| !a.contains(id)) {
        out.insert(id.clone(), eb.clone());
    }
    Ok(out)
}

fn lerp_entry(id: &CategoryId, a: &FeatureEntry, b: &FeatureEntry, s: f32) -> Result<FeatureEntry> {
    if a.ty != b.ty {
        return Err(Error::TypeMismatch { category: id.clone(), expected: a.ty, got: b.ty });
    }
    if a.data.len() != b.data.len() {
        return Err(Error::LengthMismatch {
            category: Some(id.clone()),
            expected: a.data.len(),
            got: b.data.len(),
        });
    }
    let data = a.data.iter().zip(&b.data).map(|(x, y)| x + (y - x) * s).collect::<Vec<_>>();
    Ok(FeatureEntry::new(a.ty, data))
}

/// Candidate indices ordered by ascending feature distance to `query`.
/// Equal scores keep their input order.
pub fn rank_by_similarity<M: DistanceMeasure + ?Sized>(
    measure: &M,
    query: &FeatureVector,
    candidates: &[FeatureVector],
    normalized: bool,
) -> Result<Vec<(usize, f64)>> {
    let mut ranked = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| Ok((i, measure.feature_distance(query, c, normalized)?)))
        .collect::<Result<Vec<_>>>()?;
    ranked.sort_by(|x, y| x.1.total_cmp(&y.1));
    Ok(ranked)
}

/// Roulette selection. `sample` is a uniform draw in `[0, 1)` supplied by
/// the caller; weights that are not positive and finite never win.
pub fn weighted_pick(weights: &[f64], sample: f64) -> Option<usize> {
    let usable = |w: f64| w.is_finite() && w > 0.0;
    let total: f64 = weights.iter().copied().filter(|w| usable(*w)).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    let threshold = sample.clamp(0.0, 1.0) * total;
    let mut acc = 0.0;
    let mut last = None;
    for (i, w) in weights.iter().copied().enumerate().filter(|(_, w)| usable(*w)) {
        acc += w;
        last = Some(i);
        if threshold < acc {
            return Some(i);
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{Euclidean, MeasureConfig};
    use crate::model::{AttributeContent, AttributeRelation, AttributeType, Category, Curve, NodeId};
    use crate::storage::MemoryGraph;

    fn graph() -> (MemoryGraph, NodeId, NodeId) {
        let g = MemoryGraph::new();
        g.add_category(Category::new("h", AttributeContent::Float(0.0)).with_range(0.0, 10.0));
        g.add_category(Category::new("wet", AttributeContent::Boolean(false)));
        let a = g.create_node("a");
        let b = g.create_node("b");
        g.set_attribute(a, &"h".into(), AttributeContent::Float(2.0)).unwrap();
        g.set_attribute(b, &"h".into(), AttributeContent::Float(6.0)).unwrap();
        g.set_attribute(b, &"wet".into(), AttributeContent::Boolean(true)).unwrap();
        (g, a, b)
    }

    fn value(fv: &FeatureVector, id: &str) -> f32 {
        fv.get(&id.into()).unwrap().data[0]
    }

    #[test]
    fn test_inverse_distance_blend() {
        let (g, a, b) = graph();
        // Weights 1/(1+0) = 1 and 1/(1+1) = 0.5.
        let result = SearchResult { nodes: vec![a, b], distances: vec![0.0, 1.0] };
        let fv = inverse_distance_blend(&g, &result, false).unwrap();
        assert!((value(&fv, "h") - (2.0 + 3.0) / 1.5).abs() < 1e-5);
        // Only b carries "wet", so it keeps b's value.
        assert!((value(&fv, "wet") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_blend_of_empty_result_is_empty() {
        let (g, ..) = graph();
        let fv = inverse_distance_blend(&g, &SearchResult::default(), true).unwrap();
        assert!(fv.is_empty());
    }

    #[test]
    fn test_blend_across_relation_uses_curve() {
        let (g, a, b) = graph();
        let rel = g.create_relation(a, b).unwrap();
        let linear = blend_across_relation(&g, rel, 0.25, false).unwrap();
        assert!((value(&linear, "h") - 3.0).abs() < 1e-5);
        assert_eq!(linear.get(&"wet".into()).unwrap().ty, AttributeType::Boolean);

        g.set_attribute_relation(rel, &"h".into(), AttributeRelation { curve: Curve::Step }).unwrap();
        let stepped = blend_across_relation(&g, rel, 0.25, false).unwrap();
        assert!((value(&stepped, "h") - 2.0).abs() < 1e-5);

        assert!(matches!(
            blend_across_relation(&g, RelId(99), 0.5, false),
            Err(Error::RelationNotFound(_))
        ));
    }

    #[test]
    fn test_rank_by_similarity() {
        let m = Euclidean::new(MeasureConfig::default());
        let entry = |v: f32| FeatureEntry::scalar(AttributeType::Float, v);
        let make = |v: f32| FeatureVector::from_parts("c", vec!["h".into()], vec![entry(v)]).unwrap();
        let query = make(0.5);
        let ranked = rank_by_similarity(&m, &query, &[make(0.9), make(0.5), make(0.4)], false).unwrap();
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(ranked[0].1, 0.0);
    }

    #[test]
    fn test_weighted_pick() {
        let w = [1.0, 0.0, 3.0];
        assert_eq!(weighted_pick(&w, 0.0), Some(0));
        assert_eq!(weighted_pick(&w, 0.24), Some(0));
        assert_eq!(weighted_pick(&w, 0.26), Some(2));
        assert_eq!(weighted_pick(&w, 1.0), Some(2));
        assert_eq!(weighted_pick(&[0.0, f64::NAN], 0.5), None);
        assert_eq!(weighted_pick(&[], 0.5), None);
    }

    #[test]
    fn test_similarity_weight() {
        assert_eq!(similarity_weight(0.0), 1.0);
        assert_eq!(similarity_weight(3.0), 0.25);
    }
}
