//! # Distance Measures — Feature Similarity Scoring
//!
//! Compares two feature vectors category by category and folds the
//! per-category distances into one score.
//!
//! ```text
//! category in both        ->  attribute distance / attribute norm
//!   either side a Range   ->  range-aware distance (policy below)
//! category on one side    ->  attribute_mismatch_distance
//!                               |
//!                           aggregate (sum)  [/ count when normalized]
//! ```
//!
//! # Norms
//!
//! Multi-dimensional encodings would dominate scalar ones purely by their
//! length, so every plain attribute distance is divided by a per-type norm:
//! `sqrt(len)` for Euclidean, `len` for Manhattan, and `1` for enum types
//! (a one-hot pair differs in at most two slots whatever the width).
//!
//! # Range policy
//!
//! | Shape                 | Policy                                                   |
//! |-----------------------|----------------------------------------------------------|
//! | scalar inside range   | `0` if `min_distance_if_inside_range`, else to midpoint  |
//! | scalar outside range  | `1` if `max_distance_if_out_of_range`, else to nearest end |
//! | range FullyIncludes   | inner midpoint against outer range (inside policy)       |
//! | range Disjoint        | outside policy, gap between nearest ends                 |
//! | range Intersect       | overlap length against non-overlap length                |
//!
//! Range-aware distances skip the norm: the policy values already sit on the
//! normalized scale. A range `[0.2, 0.4]` against a scalar `0.9` scores `1`;
//! dividing by the Euclidean Range norm (`sqrt(2)`, the encoded length) would
//! turn that into `0.707` and let an out-of-range value look partly similar.
//!
//! The Intersect row measures two lengths with the plain attribute distance.
//! It is kept as is; treat it as a candidate for revision before relying on
//! it with new aggregation strategies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureEntry, FeatureVector};
use crate::model::{Attribute, AttributeType, CategoryId, MAX_ENUM_SIZE, Schema};
use crate::{Error, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Default penalty for a category present on only one side.
pub const DEFAULT_MISMATCH_DISTANCE: f32 = 1.0;

/// Policy knobs shared by every measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    pub attribute_mismatch_distance: f32,
    pub max_distance_if_out_of_range: bool,
    pub min_distance_if_inside_range: bool,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            attribute_mismatch_distance: DEFAULT_MISMATCH_DISTANCE,
            max_distance_if_out_of_range: true,
            min_distance_if_inside_range: true,
        }
    }
}

/// Which measure to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MeasureKind {
    #[default]
    Euclidean,
    Manhattan,
}

impl MeasureKind {
    pub fn build(self, config: MeasureConfig) -> Box<dyn DistanceMeasure> {
        match self {
            MeasureKind::Euclidean => Box::new(Euclidean::new(config)),
            MeasureKind::Manhattan => Box::new(Manhattan::new(config)),
        }
    }
}

// ============================================================================
// Range classification
// ============================================================================

/// How two ranges sit relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeRelation {
    Disjoint,
    Intersect,
    /// One range contains the other (including equal ranges).
    FullyIncludes,
}

fn contains(outer: (f32, f32), inner: (f32, f32)) -> bool {
    outer.0 <= inner.0 && inner.1 <= outer.1
}

fn midpoint(r: (f32, f32)) -> f32 {
    (r.0 + r.1) * 0.5
}

/// Classify `a` against `b`. Symmetric in its arguments.
pub fn classify_ranges(a: (f32, f32), b: (f32, f32)) -> RangeRelation {
    if a.1 < b.0 || b.1 < a.0 {
        RangeRelation::Disjoint
    } else if contains(a, b) || contains(b, a) {
        RangeRelation::FullyIncludes
    } else {
        RangeRelation::Intersect
    }
}

fn range_of(category: &CategoryId, entry: &FeatureEntry) -> Result<(f32, f32)> {
    let (low, high) = match entry.data.as_slice() {
        [low, high] => (*low, *high),
        other => {
            return Err(Error::LengthMismatch {
                category: Some(category.clone()),
                expected: 2,
                got: other.len(),
            });
        }
    };
    if !low.is_finite() || !high.is_finite() || low >= high {
        return Err(Error::Degenerate(format!(
            "category '{category}' has degenerate range [{low}, {high}]"
        )));
    }
    Ok((low, high))
}

fn scalar_of(category: &CategoryId, entry: &FeatureEntry) -> Result<f32> {
    match entry.data.as_slice() {
        [v] => Ok(*v),
        _ => Err(Error::TypeMismatch {
            category: category.clone(),
            expected: AttributeType::Float,
            got: entry.ty,
        }),
    }
}

// ============================================================================
// DistanceMeasure
// ============================================================================

/// A similarity strategy. Holds configuration only, so one instance can
/// serve any number of calls.
pub trait DistanceMeasure: Send + Sync + fmt::Debug {
    fn config(&self) -> &MeasureConfig;

    /// Distance between two equal-length encodings (no ranges).
    fn attribute_distance(&self, a: &[f32], b: &[f32]) -> f64;

    /// Divisor applied to `attribute_distance` for a category of type `ty`.
    fn attribute_norm(&self, ty: AttributeType) -> f64;

    /// Fold per-category distances into one score.
    fn aggregate(&self, distances: &[f64]) -> f64 {
        distances.iter().sum()
    }

    /// Scalar against a `(low, high)` range.
    fn scalar_range_distance(&self, value: f32, range: (f32, f32)) -> f64 {
        let config = self.config();
        let (low, high) = range;
        if low <= value && value <= high {
            if config.min_distance_if_inside_range {
                0.0
            } else {
                self.attribute_distance(&[value], &[midpoint(range)])
            }
        } else if config.max_distance_if_out_of_range {
            1.0
        } else {
            let to_low = self.attribute_distance(&[value], &[low]);
            let to_high = self.attribute_distance(&[value], &[high]);
            to_low.min(to_high)
        }
    }

    /// Range against range.
    fn range_range_distance(&self, a: (f32, f32), b: (f32, f32)) -> f64 {
        match classify_ranges(a, b) {
            RangeRelation::FullyIncludes => {
                let (outer, inner) = if contains(a, b) { (a, b) } else { (b, a) };
                self.scalar_range_distance(midpoint(inner), outer)
            }
            RangeRelation::Disjoint => {
                if self.config().max_distance_if_out_of_range {
                    1.0
                } else if a.1 < b.0 {
                    self.attribute_distance(&[a.1], &[b.0])
                } else {
                    self.attribute_distance(&[b.1], &[a.0])
                }
            }
            RangeRelation::Intersect => {
                let overlap = a.1.min(b.1) - a.0.max(b.0);
                let span = a.1.max(b.1) - a.0.min(b.0);
                self.attribute_distance(&[overlap], &[span - overlap])
            }
        }
    }

    /// Range-aware distance for one category where at least one side is a
    /// range. Scalar-vs-scalar input is a type error.
    fn range_attribute_distance(
        &self,
        category: &CategoryId,
        a: &FeatureEntry,
        b: &FeatureEntry,
    ) -> Result<f64> {
        match (a.ty.is_range(), b.ty.is_range()) {
            (true, true) => Ok(self.range_range_distance(range_of(category, a)?, range_of(category, b)?)),
            (true, false) => Ok(self.scalar_range_distance(scalar_of(category, b)?, range_of(category, a)?)),
            (false, true) => Ok(self.scalar_range_distance(scalar_of(category, a)?, range_of(category, b)?)),
            (false, false) => Err(Error::TypeMismatch {
                category: category.clone(),
                expected: AttributeType::Range,
                got: a.ty,
            }),
        }
    }

    /// Distance of one shared category, normed for plain attributes.
    fn category_distance(&self, category: &CategoryId, a: &FeatureEntry, b: &FeatureEntry) -> Result<f64> {
        // Not normed; see the module docs.
        if a.ty.is_range() || b.ty.is_range() {
            return self.range_attribute_distance(category, a, b);
        }
        if a.data.len() != b.data.len() {
            return Err(Error::LengthMismatch {
                category: Some(category.clone()),
                expected: a.data.len(),
                got: b.data.len(),
            });
        }
        Ok(self.attribute_distance(&a.data, &b.data) / self.attribute_norm(a.ty))
    }

    /// Score two feature vectors. With `normalized` the aggregate is divided
    /// by the number of compared categories (union of both key sets).
    fn feature_distance(&self, a: &FeatureVector, b: &FeatureVector, normalized: bool) -> Result<f64> {
        let mismatch = f64::from(self.config().attribute_mismatch_distance);
        let mut per_category: Vec<(&CategoryId, f64)> = Vec::with_capacity(a.len().max(b.len()));

        for (id, ea) in a.iter() {
            let d = match b.get(id) {
                Some(eb) => self.category_distance(id, ea, eb)?,
                None => mismatch,
            };
            per_category.push((id, d));
        }
        for id in b.keys().filter(|id| !a.contains(id)) {
            per_category.push((id, mismatch));
        }

        // Fixed summation order keeps the score symmetric to the last bit.
        per_category.sort_by(|x, y| x.0.cmp(y.0));
        let distances: Vec<f64> = per_category.iter().map(|(_, d)| *d).collect();
        let total = self.aggregate(&distances);

        if !total.is_finite() {
            return Err(Error::Degenerate(format!(
                "feature distance between '{}' and '{}' is {total}",
                a.name(),
                b.name()
            )));
        }
        if normalized {
            if distances.is_empty() {
                return Ok(0.0);
            }
            return Ok(total / distances.len() as f64);
        }
        Ok(total)
    }
}

/// Distance between two attributes of the same category, both rescaled to
/// the category's numeric domain first.
pub fn attribute_pair_distance<M, S>(measure: &M, schema: &S, a: &Attribute, b: &Attribute) -> Result<f64>
where
    M: DistanceMeasure + ?Sized,
    S: Schema + ?Sized,
{
    if a.category != b.category {
        return Err(Error::CategoryMismatch { left: a.category.clone(), right: b.category.clone() });
    }
    let category = schema.require_category(&a.category)?;

    let mut ea = FeatureEntry::new(a.ty(), a.encode(schema)?);
    let mut eb = FeatureEntry::new(b.ty(), b.encode(schema)?);
    for entry in [&mut ea, &mut eb] {
        for v in entry.data.iter_mut() {
            *v = category.normalize_value(*v)?;
        }
    }

    if ea.ty.is_range() || eb.ty.is_range() {
        return measure.range_attribute_distance(&category.id, &ea, &eb);
    }
    if ea.data.len() != eb.data.len() {
        return Err(Error::LengthMismatch {
            category: Some(category.id.clone()),
            expected: ea.data.len(),
            got: eb.data.len(),
        });
    }
    Ok(measure.attribute_distance(&ea.data, &eb.data))
}

// ============================================================================
// Strategies
// ============================================================================

/// `sqrt(Σ (a - b)²)`.
#[derive(Debug, Clone, Default)]
pub struct Euclidean {
    config: MeasureConfig,
}

impl Euclidean {
    pub fn new(config: MeasureConfig) -> Self {
        Self { config }
    }
}

impl DistanceMeasure for Euclidean {
    fn config(&self) -> &MeasureConfig {
        &self.config
    }

    fn attribute_distance(&self, a: &[f32], b: &[f32]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let d = f64::from(*x) - f64::from(*y);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    fn attribute_norm(&self, ty: AttributeType) -> f64 {
        if ty.is_categorical() {
            1.0
        } else {
            (ty.feature_length(MAX_ENUM_SIZE) as f64).sqrt()
        }
    }
}

/// `Σ |a - b|`.
#[derive(Debug, Clone, Default)]
pub struct Manhattan {
    config: MeasureConfig,
}

impl Manhattan {
    pub fn new(config: MeasureConfig) -> Self {
        Self { config }
    }
}

impl DistanceMeasure for Manhattan {
    fn config(&self) -> &MeasureConfig {
        &self.config
    }

    fn attribute_distance(&self, a: &[f32], b: &[f32]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (f64::from(*x) - f64::from(*y)).abs()).sum()
    }

    fn attribute_norm(&self, ty: AttributeType) -> f64 {
        if ty.is_categorical() {
            1.0
        } else {
            ty.feature_length(MAX_ENUM_SIZE) as f64
        }
    }
}
