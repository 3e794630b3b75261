use glam::{Mat4, Vec3};

use super::bounding_box::BoundingBox;

/// A box with an arbitrary rigid orientation.
/// `orientation` maps the box's local space (centered on the box) into the
/// target space; `half_extents` are the box's half dimensions along its
/// local axes.
#[derive(Clone, Copy, Debug)]
pub struct OrientedBox {
    pub orientation: Mat4,
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// Creates an oriented box that covers `bounds` transformed by `orientation`.
    #[inline]
    pub fn new(orientation: Mat4, bounds: &BoundingBox) -> Self {
        Self {
            orientation: orientation * Mat4::from_translation(bounds.center()),
            half_extents: bounds.extent(),
        }
    }
}
