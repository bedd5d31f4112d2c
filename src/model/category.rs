//! Categories (attribute slots) and the enum definitions they refer to.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::attribute::{AttributeContent, AttributeType, MAX_ENUM_SIZE};
use crate::{Error, Result};

/// Graph-global identifier of an attribute slot (e.g. `"height"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        CategoryId(s.to_owned())
    }
}

impl From<String> for CategoryId {
    fn from(s: String) -> Self {
        CategoryId(s)
    }
}

/// Identifier of a named enum definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnumId(pub String);

impl fmt::Display for EnumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EnumId {
    fn from(s: &str) -> Self {
        EnumId(s.to_owned())
    }
}

/// RGBA display color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// A named enum: ordered `(name, value)` entries.
///
/// For flags enums the values are bit masks; the entry's position in
/// `entries` is the ordinal used by the multi-hot encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub id: EnumId,
    pub entries: Vec<(String, u32)>,
    pub is_flags: bool,
}

impl EnumDef {
    pub fn new(id: impl Into<EnumId>, entries: impl IntoIterator<Item = (impl Into<String>, u32)>) -> Self {
        Self {
            id: id.into(),
            entries: entries.into_iter().map(|(n, v)| (n.into(), v)).collect(),
            is_flags: false,
        }
    }

    pub fn flags(mut self) -> Self {
        self.is_flags = true;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value_of(&self, name: &str) -> Option<u32> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Definition of an attribute slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub ty: AttributeType,
    /// Lower bound of the numeric domain. Only meaningful for numeric types.
    pub min: f32,
    /// Upper bound of the numeric domain. Only meaningful for numeric types.
    pub max: f32,
    pub default: AttributeContent,
    pub color: Color,
}

impl Category {
    /// Create a category whose type is taken from its default content.
    pub fn new(id: impl Into<CategoryId>, default: AttributeContent) -> Self {
        let id = id.into();
        Self {
            name: id.0.clone(),
            id,
            ty: default.ty(),
            min: 0.0,
            max: 1.0,
            default,
            color: Color::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// `(min, max)` used for normalization: the declared domain for
    /// numeric types, `(0, 1)` for everything else.
    pub fn numeric_range(&self) -> (f32, f32) {
        if self.ty.is_numeric() {
            (self.min, self.max)
        } else {
            (0.0, 1.0)
        }
    }

    /// Map `value` from the category domain to `[0, 1]`.
    pub fn normalize_value(&self, value: f32) -> Result<f32> {
        let (min, max) = self.numeric_range();
        let width = max - min;
        if width == 0.0 || !width.is_finite() {
            return Err(Error::Degenerate(format!(
                "category '{}' has zero-width range [{min}, {max}]",
                self.id
            )));
        }
        Ok((value - min) / width)
    }
}

// ============================================================================
// Schema lookup
// ============================================================================

/// Resolves categories and enum definitions by id.
///
/// This is the `resolve(categoryId)` / `resolveEnum(enumId)` half of the
/// storage contract. Everything that encodes or normalizes goes through it.
pub trait Schema {
    fn category(&self, id: &CategoryId) -> Option<Category>;

    fn enum_def(&self, id: &EnumId) -> Option<EnumDef>;

    /// Width of one-hot / multi-hot enum encodings.
    fn max_enum_size(&self) -> usize {
        MAX_ENUM_SIZE
    }

    fn require_category(&self, id: &CategoryId) -> Result<Category> {
        self.category(id).ok_or_else(|| Error::CategoryNotFound(id.clone()))
    }
}

/// Plain map-backed schema, useful on its own for asset-side encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMap {
    pub categories: HashMap<CategoryId, Category>,
    pub enums: HashMap<EnumId, EnumDef>,
    pub max_enum_size: usize,
}

impl Default for SchemaMap {
    fn default() -> Self {
        Self {
            categories: HashMap::new(),
            enums: HashMap::new(),
            max_enum_size: MAX_ENUM_SIZE,
        }
    }
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.insert(category.id.clone(), category);
        self
    }

    pub fn with_enum(mut self, def: EnumDef) -> Self {
        self.enums.insert(def.id.clone(), def);
        self
    }
}

impl Schema for SchemaMap {
    fn category(&self, id: &CategoryId) -> Option<Category> {
        self.categories.get(id).cloned()
    }

    fn enum_def(&self, id: &EnumId) -> Option<EnumDef> {
        self.enums.get(id).cloned()
    }

    fn max_enum_size(&self) -> usize {
        self.max_enum_size
    }
}
