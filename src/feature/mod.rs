//! # Feature Vectors
//!
//! A feature vector is the numeric encoding of a node's (or an asset's)
//! attributes, keyed by category:
//!
//! ```text
//! "height"  -> (Float,  [0.4])
//! "biome"   -> (Enum,   [0, 0, 1, 0, ... 0])     // MAX_ENUM_SIZE wide
//! "slope"   -> (Range,  [0.1, 0.3])
//! ```
//!
//! Arithmetic is key-wise. Keys present on only one side pass through
//! unchanged, so `a + b` over disjoint schemas is a plain union. That makes
//! the operators usable for weighted blending of several nodes.
//!
//! The set of keys is tracked by an order-independent fingerprint so that
//! "same schema?" checks do not have to compare key sets.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::{Add, Div, Mul, Sub};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Attribute, AttributeContent, AttributeType, CategoryId, FeatureData, Schema};
use crate::{Error, Result};

/// One category's encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub ty: AttributeType,
    pub data: FeatureData,
}

impl FeatureEntry {
    pub fn new(ty: AttributeType, data: impl Into<FeatureData>) -> Self {
        Self { ty, data: data.into() }
    }

    pub fn scalar(ty: AttributeType, value: f32) -> Self {
        Self::new(ty, FeatureData::from_slice(&[value]))
    }

    pub fn range(low: f32, high: f32) -> Self {
        Self::new(AttributeType::Range, FeatureData::from_slice(&[low, high]))
    }

    fn zip_with(&self, other: &FeatureEntry, f: impl Fn(f32, f32) -> f32) -> FeatureEntry {
        debug_assert_eq!(self.data.len(), other.data.len(), "feature length is fixed per category");
        FeatureEntry {
            ty: self.ty,
            data: self.data.iter().zip(&other.data).map(|(a, b)| f(*a, *b)).collect(),
        }
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> FeatureEntry {
        FeatureEntry { ty: self.ty, data: self.data.iter().map(|v| f(*v)).collect() }
    }
}

fn key_hash(id: &CategoryId) -> u64 {
    let mut h = DefaultHasher::new();
    id.hash(&mut h);
    h.finish()
}

/// Named mapping `category -> (type, data)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    name: String,
    entries: HashMap<CategoryId, FeatureEntry>,
    fingerprint: u64,
}

impl FeatureVector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: HashMap::new(), fingerprint: 0 }
    }

    /// Build from parallel id / entry lists.
    pub fn from_parts(
        name: impl Into<String>,
        ids: Vec<CategoryId>,
        entries: Vec<FeatureEntry>,
    ) -> Result<Self> {
        if ids.len() != entries.len() {
            return Err(Error::ArgumentCount { ids: ids.len(), entries: entries.len() });
        }
        let mut fv = Self::new(name);
        for (id, entry) in ids.into_iter().zip(entries) {
            fv.insert(id, entry);
        }
        Ok(fv)
    }

    /// Encode a set of attributes.
    pub fn from_attributes<'a, S: Schema + ?Sized>(
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = &'a Attribute>,
        schema: &S,
    ) -> Result<Self> {
        let mut fv = Self::new(name);
        for attr in attributes {
            let data = attr.encode(schema)?;
            fv.insert(attr.category.clone(), FeatureEntry::new(attr.ty(), data));
        }
        Ok(fv)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &CategoryId) -> Option<&FeatureEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &CategoryId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CategoryId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CategoryId, &FeatureEntry)> {
        self.entries.iter()
    }

    pub fn insert(&mut self, id: CategoryId, entry: FeatureEntry) -> Option<FeatureEntry> {
        let hash = key_hash(&id);
        let old = self.entries.insert(id, entry);
        if old.is_none() {
            self.fingerprint = self.fingerprint.wrapping_add(hash);
        }
        old
    }

    pub fn remove(&mut self, id: &CategoryId) -> Option<FeatureEntry> {
        let old = self.entries.remove(id);
        if old.is_some() {
            self.fingerprint = self.fingerprint.wrapping_sub(key_hash(id));
        }
        old
    }

    /// Order-independent hash of the key set.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Whether both vectors are keyed by the same categories.
    pub fn same_shape(&self, other: &FeatureVector) -> bool {
        self.fingerprint == other.fingerprint && self.len() == other.len()
    }

    /// Multiply one category by `factor`, leaving every other key alone.
    /// Returns false when the category is absent.
    pub fn scale_category(&mut self, id: &CategoryId, factor: f32) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.data.iter_mut().for_each(|v| *v *= factor);
                true
            }
            None => false,
        }
    }

    /// Decode one category back into attribute content.
    pub fn decode_category(&self, id: &CategoryId) -> Result<AttributeContent> {
        let entry = self.get(id).ok_or_else(|| Error::CategoryNotFound(id.clone()))?;
        AttributeContent::decode(entry.ty, &entry.data)
    }

    /// Rescale numeric categories to `(v - min) / (max - min)` in place.
    /// Non-numeric categories are left untouched.
    pub fn normalize<S: Schema + ?Sized>(&mut self, schema: &S) -> Result<()> {
        for (id, entry) in self.entries.iter_mut() {
            let category = schema.require_category(id)?;
            if !entry.ty.is_numeric() {
                continue;
            }
            for v in entry.data.iter_mut() {
                *v = category.normalize_value(*v)?;
            }
        }
        Ok(())
    }

    pub fn normalized<S: Schema + ?Sized>(&self, schema: &S) -> Result<Self> {
        let mut copy = self.clone();
        copy.normalize(schema)?;
        Ok(copy)
    }

    fn combine(&self, other: &FeatureVector, f: impl Fn(f32, f32) -> f32) -> FeatureVector {
        let mut out = self.clone();
        for (id, theirs) in &other.entries {
            match self.entries.get(id) {
                Some(ours) => {
                    out.entries.insert(id.clone(), ours.zip_with(theirs, &f));
                }
                None => {
                    out.insert(id.clone(), theirs.clone());
                }
            }
        }
        out
    }

    fn map_all(&self, f: impl Fn(f32) -> f32) -> FeatureVector {
        FeatureVector {
            name: self.name.clone(),
            entries: self.entries.iter().map(|(k, e)| (k.clone(), e.map(&f))).collect(),
            fingerprint: self.fingerprint,
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

macro_rules! keywise_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&FeatureVector> for &FeatureVector {
            type Output = FeatureVector;
            fn $method(self, rhs: &FeatureVector) -> FeatureVector {
                self.combine(rhs, |a, b| a $op b)
            }
        }

        impl $trait for FeatureVector {
            type Output = FeatureVector;
            fn $method(self, rhs: FeatureVector) -> FeatureVector {
                (&self).$method(&rhs)
            }
        }
    };
}

keywise_op!(Add, add, +);
keywise_op!(Sub, sub, -);
keywise_op!(Mul, mul, *);
keywise_op!(Div, div, /);

impl Mul<f32> for &FeatureVector {
    type Output = FeatureVector;
    fn mul(self, rhs: f32) -> FeatureVector {
        self.map_all(|v| v * rhs)
    }
}

impl Mul<f32> for FeatureVector {
    type Output = FeatureVector;
    fn mul(self, rhs: f32) -> FeatureVector {
        &self * rhs
    }
}

impl Div<f32> for &FeatureVector {
    type Output = FeatureVector;
    fn div(self, rhs: f32) -> FeatureVector {
        self.map_all(|v| v / rhs)
    }
}

impl Div<f32> for FeatureVector {
    type Output = FeatureVector;
    fn div(self, rhs: f32) -> FeatureVector {
        &self / rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, SchemaMap};
    use pretty_assertions::assert_eq;

    fn fv(name: &str, entries: &[(&str, FeatureEntry)]) -> FeatureVector {
        let mut v = FeatureVector::new(name);
        for (k, e) in entries {
            v.insert((*k).into(), e.clone());
        }
        v
    }

    fn height(v: f32) -> FeatureEntry {
        FeatureEntry::scalar(AttributeType::Float, v)
    }

    #[test]
    fn test_from_parts_counts_must_match() {
        let err = FeatureVector::from_parts("x", vec!["a".into(), "b".into()], vec![height(1.0)]).unwrap_err();
        assert!(matches!(err, Error::ArgumentCount { ids: 2, entries: 1 }));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = fv("a", &[("h", height(1.0)), ("w", height(2.0))]);
        let b = fv("b", &[("w", height(5.0)), ("h", height(7.0))]);
        let c = fv("c", &[("h", height(1.0))]);
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }

    #[test]
    fn test_fingerprint_tracks_removal() {
        let mut a = fv("a", &[("h", height(1.0)), ("w", height(2.0))]);
        let c = fv("c", &[("h", height(1.0))]);
        a.remove(&"w".into());
        assert_eq!(a.fingerprint(), c.fingerprint());
        // Re-inserting an existing key does not move the fingerprint.
        a.insert("h".into(), height(9.0));
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_add_passes_unmatched_keys_through() {
        let a = fv("a", &[("h", height(1.0)), ("only_a", height(3.0))]);
        let b = fv("b", &[("h", height(2.0)), ("only_b", height(4.0))]);
        let sum = &a + &b;
        assert_eq!(sum.get(&"h".into()).unwrap().data.as_slice(), &[3.0]);
        assert_eq!(sum.get(&"only_a".into()).unwrap().data.as_slice(), &[3.0]);
        assert_eq!(sum.get(&"only_b".into()).unwrap().data.as_slice(), &[4.0]);
        assert_eq!(sum.len(), 3);
    }

    #[test]
    fn test_sub_copies_rhs_only_keys_unchanged() {
        let a = fv("a", &[("h", height(5.0))]);
        let b = fv("b", &[("h", height(2.0)), ("w", height(4.0))]);
        let diff = a - b;
        assert_eq!(diff.get(&"h".into()).unwrap().data.as_slice(), &[3.0]);
        assert_eq!(diff.get(&"w".into()).unwrap().data.as_slice(), &[4.0]);
    }

    #[test]
    fn test_scalar_ops_touch_every_key() {
        let a = fv("a", &[("h", height(2.0)), ("r", FeatureEntry::range(1.0, 3.0))]);
        let scaled = &a * 2.0;
        assert_eq!(scaled.get(&"h".into()).unwrap().data.as_slice(), &[4.0]);
        assert_eq!(scaled.get(&"r".into()).unwrap().data.as_slice(), &[2.0, 6.0]);
        let halved = scaled / 4.0;
        assert_eq!(halved.get(&"r".into()).unwrap().data.as_slice(), &[0.5, 1.5]);
    }

    #[test]
    fn test_scale_category_is_local() {
        let mut a = fv("a", &[("h", height(2.0)), ("w", height(2.0))]);
        assert!(a.scale_category(&"h".into(), 3.0));
        assert!(!a.scale_category(&"missing".into(), 3.0));
        assert_eq!(a.get(&"h".into()).unwrap().data.as_slice(), &[6.0]);
        assert_eq!(a.get(&"w".into()).unwrap().data.as_slice(), &[2.0]);
    }

    #[test]
    fn test_normalize_numeric_only() {
        let schema = SchemaMap::new()
            .with_category(Category::new("h", AttributeContent::Float(0.0)).with_range(0.0, 10.0))
            .with_category(Category::new("wet", AttributeContent::Boolean(false)));
        let a = fv("a", &[("h", height(5.0)), ("wet", FeatureEntry::scalar(AttributeType::Boolean, 1.0))]);
        let n = a.normalized(&schema).unwrap();
        assert_eq!(n.get(&"h".into()).unwrap().data.as_slice(), &[0.5]);
        assert_eq!(n.get(&"wet".into()).unwrap().data.as_slice(), &[1.0]);
        // The original is untouched.
        assert_eq!(a.get(&"h".into()).unwrap().data.as_slice(), &[5.0]);
    }

    #[test]
    fn test_normalize_unknown_category_fails() {
        let a = fv("a", &[("h", height(5.0))]);
        let err = a.normalized(&SchemaMap::new()).unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound(id) if id.0 == "h"));
    }

    #[test]
    fn test_decode_category() {
        let a = fv("a", &[("r", FeatureEntry::range(0.2, 0.4))]);
        assert_eq!(
            a.decode_category(&"r".into()).unwrap(),
            AttributeContent::Range { low: 0.2, high: 0.4 }
        );
    }
}
