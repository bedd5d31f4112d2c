//! # hgraph — Hierarchical Attributed Region Graph
//!
//! A graph of spatial regions and objects, arranged in a single-parent tree
//! plus an undirected relation graph, with typed attributes that fall back
//! to the nearest ancestor when not set locally.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the query core and storage
//! 2. **Plain data**: `Node`, `Attribute`, `FeatureVector` cross all boundaries
//! 3. **No hidden state**: fallback attributes and feature vectors are computed on demand
//! 4. **Stateless measures**: a `DistanceMeasure` holds configuration only
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hgraph::{AttributeContent, Category, HGraph, SearchQuery};
//!
//! # fn example() -> hgraph::Result<()> {
//! let graph = HGraph::open_memory();
//! let store = graph.store();
//! store.add_category(Category::new("height", AttributeContent::Float(0.0)).with_range(0.0, 10.0));
//!
//! let valley = store.create_node("valley");
//! let meadow = store.create_child("meadow", valley)?;
//! store.set_attribute(valley, &"height".into(), AttributeContent::Float(5.0))?;
//!
//! // The meadow inherits the valley's height.
//! let height = graph.effective_attribute(meadow, &"height".into())?;
//! assert!(height.is_some());
//!
//! let nearby = graph.search(&SearchQuery::node(meadow))?;
//! for (node, distance) in nearby.iter() {
//!     println!("{node}: {distance}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryGraph` | `storage::memory` | In-memory graph for tools and tests |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod feature;
pub mod distance;
pub mod spatial;
pub mod storage;
pub mod search;
pub mod interpolate;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Attribute, AttributeContent, AttributeMap, AttributeRelation, AttributeType,
    Category, CategoryId, Color, Curve, EnumDef, EnumId, FeatureData, Node, NodeId,
    RelId, Relation, Schema, SchemaMap, MAX_ENUM_SIZE,
};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use config::QueryConfig;
pub use distance::{DistanceMeasure, Euclidean, Manhattan, MeasureConfig, MeasureKind};
pub use feature::{FeatureEntry, FeatureVector};
pub use search::{SearchQuery, SearchResult, SearchSettings};
pub use spatial::{Shape, Space, SpatialMeasure, Transform};
pub use storage::{GraphStore, MemoryGraph, StoreConfig};

// ============================================================================
// Top-level HGraph handle
// ============================================================================

/// The primary entry point. An `HGraph` wraps a store and answers search
/// and similarity queries against it with one query configuration.
pub struct HGraph<S: GraphStore> {
    store: S,
    config: QueryConfig,
    measure: Box<dyn DistanceMeasure>,
}

impl<S: GraphStore> HGraph<S> {
    /// Create an HGraph over the given store with default configuration.
    pub fn with_store(store: S) -> Self {
        let config = QueryConfig::default();
        let measure = config.build_measure();
        Self { store, config, measure }
    }

    /// Wrap a store with a custom config. Rejects the same configs as [`HGraph::set_config`].
    pub fn with_config(store: S, config: QueryConfig) -> Result<Self> {
        config.validate()?;
        let measure = config.build_measure();
        Ok(Self { store, config, measure })
    }

    /// Access the underlying store (for mutation and raw walks).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: QueryConfig) -> Result<()> {
        config.validate()?;
        self.measure = config.build_measure();
        self.config = config;
        Ok(())
    }

    pub fn measure(&self) -> &dyn DistanceMeasure {
        self.measure.as_ref()
    }

    /// Search with the configured settings.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        search::search(&self.store, query, &self.config.search)
    }

    /// Search with one-off settings.
    pub fn search_with(&self, query: &SearchQuery, settings: &SearchSettings) -> Result<SearchResult> {
        search::search(&self.store, query, settings)
    }

    pub fn feature_vector_of(&self, node: NodeId, normalized: bool) -> Result<FeatureVector> {
        self.store.feature_vector_of(node, normalized)
    }

    /// Score two feature vectors with the configured measure.
    pub fn distance(&self, a: &FeatureVector, b: &FeatureVector, normalized: bool) -> Result<f64> {
        self.measure.feature_distance(a, b, normalized)
    }

    /// Score the (normalized) effective attributes of two nodes.
    pub fn node_distance(&self, a: NodeId, b: NodeId, normalized: bool) -> Result<f64> {
        let fa = self.store.feature_vector_of(a, true)?;
        let fb = self.store.feature_vector_of(b, true)?;
        self.measure.feature_distance(&fa, &fb, normalized)
    }

    pub fn effective_attribute(&self, node: NodeId, category: &CategoryId) -> Result<Option<Attribute>> {
        self.store.effective_attribute(node, category)
    }

    /// Blend the feature vectors of a search result, nearer nodes weighing more.
    pub fn blend(&self, result: &SearchResult, normalized: bool) -> Result<FeatureVector> {
        interpolate::inverse_distance_blend(&self.store, result, normalized)
    }
}

/// In-memory graph for tools and tests.
impl HGraph<MemoryGraph> {
    pub fn open_memory() -> Self {
        Self::with_store(MemoryGraph::new())
    }
}

// ============================================================================
// Error Types
// ============================================================================

fn category_suffix(category: &Option<CategoryId>) -> String {
    match category {
        Some(id) => format!(" in category '{id}'"),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Category not found: '{0}'")]
    CategoryNotFound(CategoryId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Relation not found: {0}")]
    RelationNotFound(RelId),

    #[error("Enum not found: '{0}'")]
    EnumNotFound(EnumId),

    #[error("Attributes belong to different categories: '{left}' vs '{right}'")]
    CategoryMismatch { left: CategoryId, right: CategoryId },

    #[error("Argument count mismatch: {ids} category ids for {entries} entries")]
    ArgumentCount { ids: usize, entries: usize },

    #[error("Length mismatch{}: expected {expected}, got {got}", category_suffix(.category))]
    LengthMismatch { category: Option<CategoryId>, expected: usize, got: usize },

    #[error("Type mismatch in category '{category}': expected {expected}, got {got}")]
    TypeMismatch { category: CategoryId, expected: AttributeType, got: AttributeType },

    #[error("Cycle in super-node chain of node {0}")]
    CycleDetected(NodeId),

    #[error("Enum '{enum_id}' needs {size} slots, limit is {max}")]
    EnumOverflow { enum_id: EnumId, size: usize, max: usize },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Degenerate input: {0}")]
    Degenerate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
