//! End-to-end tests for feature encoding and similarity scoring.

use hgraph::distance::attribute_pair_distance;
use hgraph::{
    Attribute, AttributeContent, AttributeType, Category, DistanceMeasure, EnumDef, Error, Euclidean,
    FeatureEntry, FeatureVector, HGraph, Manhattan, MeasureConfig, SchemaMap,
};
use pretty_assertions::assert_eq;

fn float(v: f32) -> FeatureEntry {
    FeatureEntry::scalar(AttributeType::Float, v)
}

fn vector(pairs: Vec<(&str, FeatureEntry)>) -> FeatureVector {
    let (ids, entries): (Vec<_>, Vec<_>) = pairs.into_iter().map(|(k, e)| (k.into(), e)).unzip();
    FeatureVector::from_parts("v", ids, entries).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ============================================================================
// 1. Plain vectors
// ============================================================================

#[test]
fn test_euclidean_scalar_scenario() {
    let m = Euclidean::default();
    let a = vector(vec![("h", float(0.2))]);
    let b = vector(vec![("h", float(0.8))]);
    assert!(close(m.feature_distance(&a, &b, false).unwrap(), 0.6));
}

#[test]
fn test_mismatched_categories_cost_the_penalty() {
    let m = Euclidean::new(MeasureConfig { attribute_mismatch_distance: 0.25, ..Default::default() });
    let a = vector(vec![("h", float(0.5)), ("t", float(0.1))]);
    let b = vector(vec![("h", float(0.5)), ("w", float(0.9))]);
    // h: 0, t: 0.25, w: 0.25
    assert!(close(m.feature_distance(&a, &b, false).unwrap(), 0.5));
    assert!(close(m.feature_distance(&a, &b, true).unwrap(), 0.5 / 3.0));
}

#[test]
fn test_nothing_in_common() {
    let m = Manhattan::default();
    let a = vector(vec![("x", float(0.0))]);
    let b = vector(vec![("y", float(0.0)), ("z", float(0.0))]);
    assert!(close(m.feature_distance(&a, &b, false).unwrap(), 3.0));

    let empty = FeatureVector::new("empty");
    assert_eq!(m.feature_distance(&empty, &empty, false).unwrap(), 0.0);
    assert_eq!(m.feature_distance(&empty, &empty, true).unwrap(), 0.0);
}

// ============================================================================
// 2. Ranges
// ============================================================================

#[test]
fn test_range_scenarios() {
    let m = Euclidean::default();
    let range = vector(vec![("slope", FeatureEntry::range(0.2, 0.4))]);
    let inside = vector(vec![("slope", float(0.3))]);
    let outside = vector(vec![("slope", float(0.9))]);
    assert_eq!(m.feature_distance(&range, &inside, false).unwrap(), 0.0);
    assert_eq!(m.feature_distance(&range, &outside, false).unwrap(), 1.0);
    assert_eq!(m.feature_distance(&outside, &range, false).unwrap(), 1.0);
}

#[test]
fn test_range_policies_can_be_relaxed() {
    let m = Euclidean::new(MeasureConfig {
        max_distance_if_out_of_range: false,
        min_distance_if_inside_range: false,
        ..Default::default()
    });
    let range = vector(vec![("slope", FeatureEntry::range(0.2, 0.4))]);
    let inside = vector(vec![("slope", float(0.25))]);
    let outside = vector(vec![("slope", float(0.9))]);
    assert!(close(m.feature_distance(&range, &inside, false).unwrap(), 0.05));
    assert!(close(m.feature_distance(&range, &outside, false).unwrap(), 0.5));
}

#[test]
fn test_inverted_range_is_rejected() {
    let m = Euclidean::default();
    let bad = vector(vec![("slope", FeatureEntry::range(0.4, 0.2))]);
    let scalar = vector(vec![("slope", float(0.3))]);
    assert!(matches!(m.feature_distance(&bad, &scalar, false), Err(Error::Degenerate(_))));
}

// ============================================================================
// 3. Attribute pairs against a schema
// ============================================================================

#[test]
fn test_attribute_pair_distance_rescales_to_category() {
    let schema = SchemaMap::new()
        .with_category(Category::new("height", AttributeContent::Float(0.0)).with_range(0.0, 10.0));
    let a = Attribute::new("height", AttributeContent::Float(2.0));
    let b = Attribute::new("height", AttributeContent::Float(8.0));
    let d = attribute_pair_distance(&Euclidean::default(), &schema, &a, &b).unwrap();
    assert!((d - 0.6).abs() < 1e-6);
}

#[test]
fn test_attribute_pair_distance_errors() {
    let schema = SchemaMap::new()
        .with_category(Category::new("height", AttributeContent::Float(0.0)).with_range(0.0, 10.0))
        .with_category(Category::new("flat", AttributeContent::Float(0.0)).with_range(3.0, 3.0));
    let m = Euclidean::default();
    let h = Attribute::new("height", AttributeContent::Float(2.0));
    let w = Attribute::new("width", AttributeContent::Float(2.0));
    assert!(matches!(attribute_pair_distance(&m, &schema, &h, &w), Err(Error::CategoryMismatch { .. })));
    assert!(matches!(attribute_pair_distance(&m, &schema, &w, &w), Err(Error::CategoryNotFound(_))));

    let flat = Attribute::new("flat", AttributeContent::Float(3.0));
    assert!(matches!(attribute_pair_distance(&m, &schema, &flat, &flat), Err(Error::Degenerate(_))));
}

// ============================================================================
// 4. Enums through a whole graph
// ============================================================================

#[test]
fn test_enum_nodes_compare_through_facade() {
    let graph = HGraph::open_memory();
    let store = graph.store();
    store.add_enum(EnumDef::new("biome", [("desert", 0), ("forest", 1), ("tundra", 2)]));
    store.add_category(Category::new(
        "biome",
        AttributeContent::Enum { enum_id: "biome".into(), ordinal: 0 },
    ));
    let a = store.create_node("a");
    let b = store.create_node("b");
    let c = store.create_node("c");
    store.set_attribute(a, &"biome".into(), AttributeContent::Enum { enum_id: "biome".into(), ordinal: 1 }).unwrap();
    store.set_attribute(b, &"biome".into(), AttributeContent::Enum { enum_id: "biome".into(), ordinal: 1 }).unwrap();
    store.set_attribute(c, &"biome".into(), AttributeContent::Enum { enum_id: "biome".into(), ordinal: 2 }).unwrap();

    assert_eq!(graph.node_distance(a, b, false).unwrap(), 0.0);
    // Two differing one-hot slots, enum norm 1.
    assert!(close(graph.node_distance(a, c, false).unwrap(), 2f64.sqrt()));

    let fv = graph.feature_vector_of(a, true).unwrap();
    assert_eq!(fv.get(&"biome".into()).unwrap().data.len(), hgraph::MAX_ENUM_SIZE);
    assert!(matches!(fv.decode_category(&"biome".into()), Err(Error::Unsupported(_))));
}
