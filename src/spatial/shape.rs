//! Collider-like primitives evaluated in a local transformed frame.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Transform
// ============================================================================

/// Local-to-world transform: scale, then rotate, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTransform")]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
}

#[derive(Deserialize)]
struct RawTransform {
    position: Vec3,
    #[serde(default = "identity_rotation")]
    rotation: Quat,
    #[serde(default = "unit_scale")]
    scale: Vec3,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl TryFrom<RawTransform> for Transform {
    type Error = Error;

    fn try_from(raw: RawTransform) -> Result<Self> {
        Transform::new(raw.position, raw.rotation, raw.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Zero or non-finite scale components cannot be inverted and are rejected.
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Result<Self> {
        if !position.is_finite() || !rotation.is_finite() || rotation.length_squared() == 0.0 {
            return Err(Error::Degenerate(format!(
                "transform position {position} / rotation {rotation} is not usable"
            )));
        }
        if !scale.is_finite() || scale.cmpeq(Vec3::ZERO).any() {
            return Err(Error::Degenerate(format!("transform scale {scale} is not invertible")));
        }
        Ok(Self { position, rotation: rotation.normalize(), scale })
    }

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::IDENTITY }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        (self.rotation.inverse() * (world - self.position)) / self.scale
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.rotation * (local * self.scale) + self.position
    }
}

// ============================================================================
// Shape
// ============================================================================

/// Primitive centred on the local origin.
///
/// Deserialization runs [`Shape::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawShape")]
pub enum Shape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Segment from `-half_height` to `+half_height` on local Y, swept by `radius`.
    Capsule { radius: f32, half_height: f32 },
}

#[derive(Deserialize)]
enum RawShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Capsule { radius: f32, half_height: f32 },
}

impl TryFrom<RawShape> for Shape {
    type Error = Error;

    fn try_from(raw: RawShape) -> Result<Self> {
        let shape = match raw {
            RawShape::Box { half_extents } => Shape::Box { half_extents },
            RawShape::Sphere { radius } => Shape::Sphere { radius },
            RawShape::Capsule { radius, half_height } => Shape::Capsule { radius, half_height },
        };
        shape.validate()?;
        Ok(shape)
    }
}

impl Shape {
    /// Extents must be finite and positive; a capsule may have zero height.
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Shape::Box { half_extents } => half_extents.is_finite() && half_extents.cmpgt(Vec3::ZERO).all(),
            Shape::Sphere { radius } => radius.is_finite() && radius > 0.0,
            Shape::Capsule { radius, half_height } => {
                radius.is_finite() && radius > 0.0 && half_height.is_finite() && half_height >= 0.0
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Degenerate(format!("shape {self:?} has non-positive or non-finite extents")))
        }
    }

    pub fn contains_local(&self, p: Vec3) -> bool {
        match *self {
            Shape::Box { half_extents } => p.abs().cmple(half_extents).all(),
            Shape::Sphere { radius } => p.length_squared() <= radius * radius,
            Shape::Capsule { radius, half_height } => {
                let axis = Vec3::new(0.0, p.y.max(-half_height).min(half_height), 0.0);
                (p - axis).length_squared() <= radius * radius
            }
        }
    }

    /// Closest point on or in the shape; a point inside is its own answer.
    pub fn closest_local(&self, p: Vec3) -> Vec3 {
        if self.contains_local(p) {
            return p;
        }
        match *self {
            Shape::Box { half_extents } => p.max(-half_extents).min(half_extents),
            Shape::Sphere { radius } => p.normalize_or_zero() * radius,
            Shape::Capsule { radius, half_height } => {
                let axis = Vec3::new(0.0, p.y.max(-half_height).min(half_height), 0.0);
                axis + (p - axis).normalize_or_zero() * radius
            }
        }
    }
}

// ============================================================================
// Space
// ============================================================================

/// Which point of a space distances are measured to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpatialMeasure {
    /// Closest point of the shape (zero inside).
    #[default]
    Surface,
    /// Origin of the shape's transform.
    Center,
}

/// Spatial extent attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Space {
    /// Point-like object. Has no interior.
    Atomic { position: Vec3 },
    /// Grouping node without geometry of its own; defers to its children.
    Implicit,
    /// Concrete primitive under a transform.
    Solid { transform: Transform, shape: Shape },
}

impl Space {
    pub fn atomic(position: Vec3) -> Self {
        Space::Atomic { position }
    }

    pub fn solid(transform: Transform, shape: Shape) -> Result<Self> {
        shape.validate()?;
        Ok(Space::Solid { transform, shape })
    }

    /// Reject geometry that would make containment or distances meaningless.
    pub fn validate(&self) -> Result<()> {
        match self {
            Space::Atomic { position } if !position.is_finite() => Err(Error::Degenerate(format!(
                "atomic position {position} is not finite"
            ))),
            Space::Atomic { .. } | Space::Implicit => Ok(()),
            Space::Solid { shape, .. } => shape.validate(),
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Space::Atomic { .. })
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, Space::Implicit)
    }

    /// Containment of the space's own geometry. Atomic and implicit spaces
    /// never contain a point by themselves.
    pub fn is_point_inside(&self, point: Vec3) -> bool {
        match self {
            Space::Solid { transform, shape } => shape.contains_local(transform.to_local(point)),
            Space::Atomic { .. } | Space::Implicit => false,
        }
    }

    /// Distance to the closest point, and that point in world space.
    /// Atomic spaces answer with their own position.
    pub fn distance(&self, point: Vec3) -> Option<(f32, Vec3)> {
        match self {
            Space::Atomic { position } => Some((point.distance(*position), *position)),
            Space::Solid { transform, shape } => {
                let closest = transform.to_world(shape.closest_local(transform.to_local(point)));
                Some((point.distance(closest), closest))
            }
            Space::Implicit => None,
        }
    }

    pub fn center(&self) -> Option<Vec3> {
        match self {
            Space::Atomic { position } => Some(*position),
            Space::Solid { transform, .. } => Some(transform.position()),
            Space::Implicit => None,
        }
    }

    pub fn measure(&self, point: Vec3, measure: SpatialMeasure) -> Option<f32> {
        match measure {
            SpatialMeasure::Surface => self.distance(point).map(|(d, _)| d),
            SpatialMeasure::Center => self.center().map(|c| point.distance(c)),
        }
    }
}
