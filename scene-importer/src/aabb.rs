//! Axis-aligned bounding boxes for meshes and whole scenes

use crate::types::{Matrix4x4, Vector3D};

/// An axis-aligned bounding box in 3D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vector3D,
    /// Maximum corner of the bounding box
    pub max: Vector3D,
}

impl AABB {
    /// Create a new AABB with the given minimum and maximum points
    pub fn new(min: Vector3D, max: Vector3D) -> Self {
        Self { min, max }
    }

    /// Create an empty AABB (min > max, indicating no volume)
    pub fn empty() -> Self {
        Self {
            min: Vector3D::splat(f32::INFINITY),
            max: Vector3D::splat(f32::NEG_INFINITY),
        }
    }

    /// Create an AABB from a collection of points
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vector3D>,
    {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.expand_to_include_point(p);
            aabb
        })
    }

    /// Check if this AABB is empty (has no volume)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center point of the AABB
    pub fn center(&self) -> Vector3D {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extent) of the AABB
    pub fn size(&self) -> Vector3D {
        if self.is_empty() {
            Vector3D::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Expand the AABB to include a point
    pub fn expand_to_include_point(&mut self, point: Vector3D) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Expand the AABB to include another AABB
    pub fn expand_to_include_aabb(&mut self, other: &AABB) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Check if a point is inside the AABB (borders included)
    pub fn contains_point(&self, point: Vector3D) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Bounds of this box after transforming its eight corners
    pub fn transformed(&self, matrix: &Matrix4x4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let (lo, hi) = (self.min, self.max);
        Self::from_points((0..8).map(|i| {
            let corner = Vector3D::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            matrix.transform_point3(corner)
        }))
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::empty()
    }
}
