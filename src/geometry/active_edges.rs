//! Active edge detection.
//!
//! During contact generation against a convex shape, only active edges may
//! produce edge contacts; interior edges of a smooth surface would cause
//! spurious contact normals. An edge is active when it lies on a boundary,
//! a non-manifold fan, or a crease that is not convex-coplanar.

use std::collections::HashMap;

use glam::Vec3;

use super::indexed_triangle::IndexedTriangle;

/// Default coplanarity threshold: cos(5 degrees). Adjacent faces whose
/// normals agree at least this much are treated as coplanar unless the
/// dihedral is concave.
pub const DEFAULT_ACTIVE_EDGE_COS_THRESHOLD: f32 = 0.996_195;

/// Determines if the edge between two faces is active.
///
/// `normal1` and `normal2` are the face normals (counterclockwise winding),
/// `edge_direction` points along the edge as it appears in the winding of
/// the first face. The edge is active when the faces are not coplanar
/// within `cos_threshold`, or when the dihedral is concave seen from the
/// front side.
#[inline]
pub fn is_edge_active(normal1: Vec3, normal2: Vec3, edge_direction: Vec3, cos_threshold: f32) -> bool {
    normal1.dot(normal2) < cos_threshold || normal1.cross(normal2).dot(edge_direction) < 0.0
}

/// An undirected edge key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct Edge {
    idx1: u32,
    idx2: u32,
}

impl Edge {
    #[inline(always)]
    fn new(a: u32, b: u32) -> Self {
        Self {
            idx1: a.min(b),
            idx2: a.max(b),
        }
    }

    /// Local index of this edge within the given triangle.
    fn index_in_triangle(&self, triangle: &IndexedTriangle) -> usize {
        for edge_idx in 0..3 {
            if *self == Edge::new(triangle.idx[edge_idx], triangle.idx[(edge_idx + 1) % 3]) {
                return edge_idx;
            }
        }
        unreachable!("Edge does not belong to the triangle.");
    }
}

/// Face normal of the triangle as seen from its counterclockwise side,
/// anchored on the edge starting at local index `edge_idx`.
fn face_normal(vertices: &[Vec3], triangle: &IndexedTriangle, edge_idx: usize) -> Vec3 {
    let e1 = vertices[triangle.idx[edge_idx] as usize];
    let e2 = vertices[triangle.idx[(edge_idx + 1) % 3] as usize];
    let op = vertices[triangle.idx[(edge_idx + 2) % 3] as usize];
    (e2 - e1).cross(op - e1).normalize_or_zero()
}

/// Fills in the active edge bits of every triangle.
pub fn find_active_edges(vertices: &[Vec3], triangles: &mut [IndexedTriangle], cos_threshold: f32) {
    // Map every undirected edge to the triangles that reference it.
    let mut edge_to_triangle: HashMap<Edge, Vec<u32>> = HashMap::with_capacity(triangles.len() * 3);
    for (triangle_idx, triangle) in triangles.iter().enumerate() {
        for edge_idx in 0..3 {
            let edge = Edge::new(triangle.idx[edge_idx], triangle.idx[(edge_idx + 1) % 3]);
            edge_to_triangle.entry(edge).or_default().push(triangle_idx as u32);
        }
    }

    for (edge, referencing) in &edge_to_triangle {
        let active = match referencing.as_slice() {
            // An unshared edge is always active.
            [_] => true,
            [t1, t2] => {
                let triangle1 = &triangles[*t1 as usize];
                let triangle2 = &triangles[*t2 as usize];
                let edge_idx1 = edge.index_in_triangle(triangle1);
                let edge_idx2 = edge.index_in_triangle(triangle2);

                let normal1 = face_normal(vertices, triangle1, edge_idx1);
                let normal2 = face_normal(vertices, triangle2, edge_idx2);
                let e1 = vertices[triangle1.idx[edge_idx1] as usize];
                let e2 = vertices[triangle1.idx[(edge_idx1 + 1) % 3] as usize];
                is_edge_active(normal1, normal2, e2 - e1, cos_threshold)
            }
            // Non-manifold fan, assume active.
            _ => true,
        };

        if active {
            for triangle_idx in referencing {
                let triangle = &mut triangles[*triangle_idx as usize];
                let edge_idx = edge.index_in_triangle(triangle);
                triangle.set_edge_active(edge_idx);
            }
        }
    }
}
