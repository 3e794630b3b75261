use std::collections::HashMap;

use glam::Vec3;

use super::indexed_triangle::IndexedTriangle;

/// A triangle given by explicit vertex positions, the flat input form.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub material_index: u32,
}

impl Triangle {
    #[inline(always)]
    pub fn new(a: Vec3, b: Vec3, c: Vec3, material_index: u32) -> Self {
        Self {
            a,
            b,
            c,
            material_index,
        }
    }
}

/// Converts a flat triangle list into a vertex table plus indexed triangles,
/// welding vertices whose positions are bitwise equal.
pub fn indexify(triangles: &[Triangle]) -> (Vec<Vec3>, Vec<IndexedTriangle>) {
    let mut vertex_map: HashMap<[u32; 3], u32> = HashMap::with_capacity(triangles.len() * 3);
    let mut vertices = Vec::new();
    let mut indexed = Vec::with_capacity(triangles.len());

    let mut index_of = |vertex: Vec3, vertices: &mut Vec<Vec3>| -> u32 {
        let key = [vertex.x.to_bits(), vertex.y.to_bits(), vertex.z.to_bits()];
        *vertex_map.entry(key).or_insert_with(|| {
            vertices.push(vertex);
            vertices.len() as u32 - 1
        })
    };

    for triangle in triangles {
        let i0 = index_of(triangle.a, &mut vertices);
        let i1 = index_of(triangle.b, &mut vertices);
        let i2 = index_of(triangle.c, &mut vertices);
        indexed.push(IndexedTriangle::new(i0, i1, i2, triangle.material_index));
    }

    (vertices, indexed)
}
