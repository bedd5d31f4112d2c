//! # Graph Model
//!
//! Plain DTOs shared by every layer: attributes and their encodings,
//! categories, nodes and relations.
//!
//! Design rule: no storage, no geometry, no search here. This module is
//! pure data plus the encoding rules that belong to the data itself.

pub mod attribute;
pub mod category;
pub mod node;
pub mod relation;

pub use attribute::{
    Attribute, AttributeContent, AttributeMap, AttributeType, FeatureData, MAX_ENUM_SIZE,
};
pub use category::{Category, CategoryId, Color, EnumDef, EnumId, Schema, SchemaMap};
pub use node::{Node, NodeId};
pub use relation::{AttributeRelation, Curve, RelId, Relation};
