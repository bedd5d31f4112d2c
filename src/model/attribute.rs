//! Typed attribute values and their fixed-length numeric encodings.

use std::fmt;

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use super::category::{CategoryId, EnumId, Schema};
use crate::{Error, Result};

/// Default width of one-hot / multi-hot enum encodings.
pub const MAX_ENUM_SIZE: usize = 16;

/// Encoded attribute. Inline for everything but enums.
pub type FeatureData = SmallVec<[f32; 4]>;

/// Local attributes of a node, keyed by category.
pub type AttributeMap = HashMap<CategoryId, Attribute>;

// ============================================================================
// AttributeType
// ============================================================================

/// The value kinds an attribute slot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Nominal,
    Float,
    Enum,
    FlagsEnum,
    Range,
    Vector2,
    Vector3,
    Boolean,
}

impl AttributeType {
    pub const ALL: [AttributeType; 8] = [
        AttributeType::Nominal,
        AttributeType::Float,
        AttributeType::Enum,
        AttributeType::FlagsEnum,
        AttributeType::Range,
        AttributeType::Vector2,
        AttributeType::Vector3,
        AttributeType::Boolean,
    ];

    /// Length of the encoded vector for this type.
    pub fn feature_length(self, max_enum_size: usize) -> usize {
        match self {
            AttributeType::Nominal | AttributeType::Float | AttributeType::Boolean => 1,
            AttributeType::Enum | AttributeType::FlagsEnum => max_enum_size,
            AttributeType::Range | AttributeType::Vector2 => 2,
            AttributeType::Vector3 => 3,
        }
    }

    /// Numeric types are rescaled by their category's `[min, max]`.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            AttributeType::Float | AttributeType::Range | AttributeType::Vector2 | AttributeType::Vector3
        )
    }

    /// One-hot / multi-hot encoded types. These cannot be decoded.
    pub fn is_categorical(self) -> bool {
        matches!(self, AttributeType::Enum | AttributeType::FlagsEnum)
    }

    pub fn is_range(self) -> bool {
        self == AttributeType::Range
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Nominal => "Nominal",
            AttributeType::Float => "Float",
            AttributeType::Enum => "Enum",
            AttributeType::FlagsEnum => "FlagsEnum",
            AttributeType::Range => "Range",
            AttributeType::Vector2 => "Vector2",
            AttributeType::Vector3 => "Vector3",
            AttributeType::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// AttributeContent
// ============================================================================

/// A raw attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeContent {
    Nominal(i32),
    Float(f32),
    Enum { enum_id: EnumId, ordinal: u32 },
    FlagsEnum { enum_id: EnumId, flags: u32 },
    Range { low: f32, high: f32 },
    Vector2(Vec2),
    Vector3(Vec3),
    Boolean(bool),
}

impl AttributeContent {
    pub fn ty(&self) -> AttributeType {
        match self {
            AttributeContent::Nominal(_) => AttributeType::Nominal,
            AttributeContent::Float(_) => AttributeType::Float,
            AttributeContent::Enum { .. } => AttributeType::Enum,
            AttributeContent::FlagsEnum { .. } => AttributeType::FlagsEnum,
            AttributeContent::Range { .. } => AttributeType::Range,
            AttributeContent::Vector2(_) => AttributeType::Vector2,
            AttributeContent::Vector3(_) => AttributeType::Vector3,
            AttributeContent::Boolean(_) => AttributeType::Boolean,
        }
    }

    pub fn feature_length(&self, max_enum_size: usize) -> usize {
        self.ty().feature_length(max_enum_size)
    }

    /// Encode into a vector of length `ty().feature_length(schema.max_enum_size())`.
    ///
    /// Flags enums are resolved through `schema` to learn which ordinals
    /// make up the flags value.
    pub fn encode<S: Schema + ?Sized>(&self, schema: &S) -> Result<FeatureData> {
        let max = schema.max_enum_size();
        let data = match self {
            AttributeContent::Nominal(v) => smallvec![*v as f32],
            AttributeContent::Float(v) => smallvec![*v],
            AttributeContent::Boolean(b) => smallvec![if *b { 1.0 } else { 0.0 }],
            AttributeContent::Range { low, high } => smallvec![*low, *high],
            AttributeContent::Vector2(v) => smallvec![v.x, v.y],
            AttributeContent::Vector3(v) => smallvec![v.x, v.y, v.z],
            AttributeContent::Enum { enum_id, ordinal } => {
                let ordinal = *ordinal as usize;
                if ordinal >= max {
                    return Err(Error::EnumOverflow {
                        enum_id: enum_id.clone(),
                        size: ordinal + 1,
                        max,
                    });
                }
                let mut data: FeatureData = smallvec![0.0; max];
                data[ordinal] = 1.0;
                data
            }
            AttributeContent::FlagsEnum { enum_id, flags } => {
                let def = schema
                    .enum_def(enum_id)
                    .ok_or_else(|| Error::EnumNotFound(enum_id.clone()))?;
                if def.len() > max {
                    return Err(Error::EnumOverflow {
                        enum_id: enum_id.clone(),
                        size: def.len(),
                        max,
                    });
                }
                let mut data: FeatureData = smallvec![0.0; max];
                for (ordinal, (_, value)) in def.entries.iter().enumerate() {
                    // A zero entry ("None") is only set by an empty flags value.
                    let set = if *value == 0 { *flags == 0 } else { flags & value == *value };
                    if set {
                        data[ordinal] = 1.0;
                    }
                }
                data
            }
        };
        Ok(data)
    }

    /// Rebuild a value from its encoding. Enum types do not round-trip
    /// without their definition and report `Unsupported`.
    pub fn decode(ty: AttributeType, data: &[f32]) -> Result<Self> {
        let expected = ty.feature_length(MAX_ENUM_SIZE);
        let content = match (ty, data) {
            (AttributeType::Enum | AttributeType::FlagsEnum, _) => {
                return Err(Error::Unsupported(format!("decoding {ty} feature data")));
            }
            (AttributeType::Nominal, [v]) => AttributeContent::Nominal(v.round() as i32),
            (AttributeType::Float, [v]) => AttributeContent::Float(*v),
            (AttributeType::Boolean, [v]) => AttributeContent::Boolean(*v >= 0.5),
            (AttributeType::Range, [low, high]) => AttributeContent::Range { low: *low, high: *high },
            (AttributeType::Vector2, [x, y]) => AttributeContent::Vector2(Vec2::new(*x, *y)),
            (AttributeType::Vector3, [x, y, z]) => AttributeContent::Vector3(Vec3::new(*x, *y, *z)),
            _ => {
                return Err(Error::LengthMismatch { category: None, expected, got: data.len() });
            }
        };
        Ok(content)
    }

    /// Scalar view for single-valued types.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            AttributeContent::Nominal(v) => Some(*v as f32),
            AttributeContent::Float(v) => Some(*v),
            AttributeContent::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<(f32, f32)> {
        match self {
            AttributeContent::Range { low, high } => Some((*low, *high)),
            _ => None,
        }
    }
}

impl From<f32> for AttributeContent { fn from(v: f32) -> Self { AttributeContent::Float(v) } }
impl From<bool> for AttributeContent { fn from(v: bool) -> Self { AttributeContent::Boolean(v) } }
impl From<Vec2> for AttributeContent { fn from(v: Vec2) -> Self { AttributeContent::Vector2(v) } }
impl From<Vec3> for AttributeContent { fn from(v: Vec3) -> Self { AttributeContent::Vector3(v) } }

impl fmt::Display for AttributeContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeContent::Nominal(v) => write!(f, "#{v}"),
            AttributeContent::Float(v) => write!(f, "{v}"),
            AttributeContent::Boolean(b) => write!(f, "{b}"),
            AttributeContent::Range { low, high } => write!(f, "[{low}, {high}]"),
            AttributeContent::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            AttributeContent::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            AttributeContent::Enum { enum_id, ordinal } => write!(f, "{enum_id}::{ordinal}"),
            AttributeContent::FlagsEnum { enum_id, flags } => write!(f, "{enum_id}::{flags:#b}"),
        }
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// A node's value for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub category: CategoryId,
    content: AttributeContent,
}

impl Attribute {
    pub fn new(category: impl Into<CategoryId>, content: AttributeContent) -> Self {
        Self { category: category.into(), content }
    }

    pub fn ty(&self) -> AttributeType {
        self.content.ty()
    }

    pub fn content(&self) -> &AttributeContent {
        &self.content
    }

    /// Swap in new content of the same type, returning the old content.
    pub fn replace_content(&mut self, content: AttributeContent) -> Result<AttributeContent> {
        if content.ty() != self.ty() {
            return Err(Error::TypeMismatch {
                category: self.category.clone(),
                expected: self.ty(),
                got: content.ty(),
            });
        }
        Ok(std::mem::replace(&mut self.content, content))
    }

    pub fn encode<S: Schema + ?Sized>(&self, schema: &S) -> Result<FeatureData> {
        self.content.encode(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::{EnumDef, SchemaMap};

    fn schema() -> SchemaMap {
        SchemaMap::new().with_enum(
            EnumDef::new("biome", [("None", 0), ("Wet", 1), ("Cold", 2), ("Rocky", 4)]).flags(),
        )
    }

    #[test]
    fn test_every_type_encodes_to_its_feature_length() {
        let s = schema();
        let samples = [
            AttributeContent::Nominal(3),
            AttributeContent::Float(0.25),
            AttributeContent::Enum { enum_id: "biome".into(), ordinal: 2 },
            AttributeContent::FlagsEnum { enum_id: "biome".into(), flags: 3 },
            AttributeContent::Range { low: 1.0, high: 2.0 },
            AttributeContent::Vector2(Vec2::new(1.0, 2.0)),
            AttributeContent::Vector3(Vec3::new(1.0, 2.0, 3.0)),
            AttributeContent::Boolean(true),
        ];
        for content in samples {
            let data = content.encode(&s).unwrap();
            assert_eq!(data.len(), content.ty().feature_length(MAX_ENUM_SIZE), "{content}");
        }
    }

    #[test]
    fn test_enum_is_one_hot() {
        let data = AttributeContent::Enum { enum_id: "biome".into(), ordinal: 3 }
            .encode(&schema())
            .unwrap();
        assert_eq!(data.iter().filter(|v| **v == 1.0).count(), 1);
        assert_eq!(data[3], 1.0);
    }

    #[test]
    fn test_flags_enum_is_multi_hot() {
        let data = AttributeContent::FlagsEnum { enum_id: "biome".into(), flags: 0b101 }
            .encode(&schema())
            .unwrap();
        assert_eq!(&data[..4], &[0.0, 1.0, 0.0, 1.0]);
        assert!(data[4..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_empty_flags_sets_zero_entry() {
        let data = AttributeContent::FlagsEnum { enum_id: "biome".into(), flags: 0 }
            .encode(&schema())
            .unwrap();
        assert_eq!(data[0], 1.0);
        assert_eq!(data.iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_flags_enum_needs_definition() {
        let err = AttributeContent::FlagsEnum { enum_id: "nope".into(), flags: 1 }
            .encode(&SchemaMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::EnumNotFound(_)));
    }

    #[test]
    fn test_enum_ordinal_past_width_overflows() {
        let err = AttributeContent::Enum { enum_id: "biome".into(), ordinal: 16 }
            .encode(&schema())
            .unwrap_err();
        assert!(matches!(err, Error::EnumOverflow { max: 16, .. }));
    }

    #[test]
    fn test_decode_rejects_categorical() {
        let err = AttributeContent::decode(AttributeType::Enum, &[0.0; 16]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        let err = AttributeContent::decode(AttributeType::FlagsEnum, &[0.0; 16]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_decode_checks_length() {
        let err = AttributeContent::decode(AttributeType::Vector3, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 3, got: 2, .. }));
    }

    #[test]
    fn test_replace_content_keeps_type() {
        let mut attr = Attribute::new("h", AttributeContent::Float(1.0));
        let old = attr.replace_content(AttributeContent::Float(2.0)).unwrap();
        assert_eq!(old, AttributeContent::Float(1.0));
        assert!(attr.replace_content(AttributeContent::Boolean(true)).is_err());
        assert_eq!(attr.content(), &AttributeContent::Float(2.0));
    }
}
