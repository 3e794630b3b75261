use glam::Vec3;

/// Provides simple axis-aligned bounding box functionality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Location with the lowest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub min: Vec3,
    /// Location with the highest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub max: Vec3,
}

impl BoundingBox {
    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline(always)]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Constructs a bounding box that contains nothing and acts as the identity for merging.
    #[inline(always)]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(-f32::MAX),
        }
    }

    /// Returns true if the box describes a non-inverted interval on every axis.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Expands the box to contain the given point.
    #[inline(always)]
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Expands the box to contain another box.
    #[inline(always)]
    pub fn merge(&mut self, other: &BoundingBox) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline(always)]
    pub fn merged(a: &BoundingBox, b: &BoundingBox) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Determines if a bounding box intersects another bounding box.
    #[inline(always)]
    pub fn intersects(a: &BoundingBox, b: &BoundingBox) -> bool {
        a.max.x >= b.min.x
            && a.max.y >= b.min.y
            && a.max.z >= b.min.z
            && b.max.x >= a.min.x
            && b.max.y >= a.min.y
            && b.max.z >= a.min.z
    }

    /// Determines if the box contains the given point. Points on the boundary count as contained.
    #[inline(always)]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Center of the box.
    #[inline(always)]
    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Half extents of the box; the box spans `center() - extent()` to `center() + extent()`.
    #[inline(always)]
    pub fn extent(&self) -> Vec3 {
        0.5 * (self.max - self.min)
    }

    /// Full size of the box.
    #[inline(always)]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Computes the surface area heuristic metric for the box.
    /// This is proportional to surface area; the constant factor is irrelevant for cost comparisons.
    #[inline(always)]
    pub fn half_area(&self) -> f32 {
        let offset = self.max - self.min;
        offset.x * offset.y + offset.y * offset.z + offset.z * offset.x
    }
}
