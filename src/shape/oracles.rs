//! Narrow phase seams.
//!
//! Contact generation between a convex shape and an individual triangle is
//! the engine's business; the mesh shape only walks its tree and hands
//! every candidate triangle, together with its three active edge bits and
//! sub shape ID, to one of these oracles.

use glam::Vec3;

use super::sub_shape_id::SubShapeId;

/// Per-triangle callback for sweeping a convex shape through the mesh.
pub trait ICastShapeVsTriangles {
    /// Casts the convex shape against one triangle. `active_edges` holds
    /// one bit per edge in local order 0-1, 1-2, 2-0; only active edges
    /// may carry edge contact normals.
    fn cast(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, active_edges: u8, sub_shape_id: SubShapeId);

    /// True once the cast can stop entirely.
    fn should_early_out(&self) -> bool {
        false
    }

    /// Fraction along the cast beyond which hits no longer matter.
    fn early_out_fraction(&self) -> f32 {
        f32::MAX
    }
}

/// Per-triangle callback for overlapping a convex shape with the mesh.
pub trait ICollideShapeVsTriangles {
    /// Collides the convex shape with one triangle. `active_edges` holds
    /// one bit per edge in local order 0-1, 1-2, 2-0.
    fn collide(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, active_edges: u8, sub_shape_id: SubShapeId);

    /// True once the query can stop entirely.
    fn should_early_out(&self) -> bool {
        false
    }
}
