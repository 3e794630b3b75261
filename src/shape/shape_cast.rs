use glam::Vec3;

use crate::geometry::bounding_box::BoundingBox;

/// A convex shape swept along a direction, expressed in the mesh's space.
#[derive(Clone, Copy, Debug)]
pub struct ShapeCast {
    /// Direction and length of the sweep; fractions are relative to it.
    pub direction: Vec3,
    /// Bounds of the cast shape at its starting position.
    pub shape_bounds: BoundingBox,
}

impl ShapeCast {
    #[inline(always)]
    pub fn new(direction: Vec3, shape_bounds: BoundingBox) -> Self {
        Self {
            direction,
            shape_bounds,
        }
    }
}
