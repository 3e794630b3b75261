//! Leaf triangle block codec.
//!
//! A block stores up to [`MAX_TRIANGLES_PER_LEAF`] triangles as indices
//! into a block-local vertex table so shared vertices pack once. Vertex
//! components are quantized to one byte against the buffer-wide frame in
//! the triangle header and laid out in structure-of-arrays order (all X
//! bytes, then all Y, then all Z), followed by one flag byte per triangle.
//!
//! Block layout:
//! ```text
//! u8            triangle count
//! u8            vertex count
//! u8 * 3n       vertex indices per triangle
//! u8 * v        X components
//! u8 * v        Y components
//! u8 * v        Z components
//! u8 * n        triangle flags
//! ```

use std::collections::HashMap;

use glam::Vec3;

use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::indexed_triangle::IndexedTriangle;
use crate::geometry::ray::ray_triangle;

use super::node_codec::HEADER_SIZE;

/// Maximum number of triangles a leaf block may hold.
pub const MAX_TRIANGLES_PER_LEAF: usize = 8;

/// Serialized size of [`TriangleHeader`].
pub const TRIANGLE_HEADER_SIZE: usize = 24;

/// Buffer-wide quantization frame: `decoded = offset + quantized * scale`.
#[derive(Clone, Copy, Debug)]
pub struct TriangleHeader {
    pub offset: Vec3,
    pub scale: Vec3,
}

impl TriangleHeader {
    /// Frame covering the given bounds with 256 steps per axis.
    /// A zero-extent axis stores scale 0 and decodes exactly to the offset.
    pub fn for_bounds(bounds: &BoundingBox) -> Self {
        Self {
            offset: bounds.min,
            scale: bounds.size() * (1.0 / 255.0),
        }
    }

    pub fn write(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= TRIANGLE_HEADER_SIZE);
        for (i, value) in [
            self.offset.x,
            self.offset.y,
            self.offset.z,
            self.scale.x,
            self.scale.y,
            self.scale.z,
        ]
        .into_iter()
        .enumerate()
        {
            out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn read(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= TRIANGLE_HEADER_SIZE);
        let mut values = [0.0f32; 6];
        for (i, value) in values.iter_mut().enumerate() {
            *value = f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        Self {
            offset: Vec3::new(values[0], values[1], values[2]),
            scale: Vec3::new(values[3], values[4], values[5]),
        }
    }

    /// Quantizes a position to three bytes, rounding to the nearest step.
    #[inline(always)]
    pub fn quantize(&self, position: Vec3) -> [u8; 3] {
        let mut quantized = [0u8; 3];
        for axis in 0..3 {
            let scale = self.scale[axis];
            quantized[axis] = if scale <= 0.0 {
                0
            } else {
                ((position[axis] - self.offset[axis]) / scale)
                    .round()
                    .clamp(0.0, 255.0) as u8
            };
        }
        quantized
    }

    /// Reconstructs a position from three quantized bytes.
    #[inline(always)]
    pub fn dequantize(&self, quantized: [u8; 3]) -> Vec3 {
        self.offset
            + Vec3::new(
                quantized[0] as f32,
                quantized[1] as f32,
                quantized[2] as f32,
            ) * self.scale
    }
}

/// Appends one triangle block for the given triangles to `out`.
pub fn encode_triangle_block(
    vertices: &[Vec3],
    triangles: &[IndexedTriangle],
    triangle_indices: &[u32],
    header: &TriangleHeader,
    out: &mut Vec<u8>,
) {
    debug_assert!(
        !triangle_indices.is_empty() && triangle_indices.len() <= MAX_TRIANGLES_PER_LEAF,
        "Leaf triangle count out of range."
    );

    // Block-local vertex table, shared vertices pack once.
    let mut local_vertices: Vec<u32> = Vec::with_capacity(triangle_indices.len() * 3);
    let mut remap: HashMap<u32, u8> = HashMap::with_capacity(triangle_indices.len() * 3);
    let mut local_indices: Vec<u8> = Vec::with_capacity(triangle_indices.len() * 3);
    for &t in triangle_indices {
        for &vertex_idx in &triangles[t as usize].idx {
            let local = *remap.entry(vertex_idx).or_insert_with(|| {
                local_vertices.push(vertex_idx);
                (local_vertices.len() - 1) as u8
            });
            local_indices.push(local);
        }
    }

    out.push(triangle_indices.len() as u8);
    out.push(local_vertices.len() as u8);
    out.extend_from_slice(&local_indices);
    for axis in 0..3 {
        for &vertex_idx in &local_vertices {
            let quantized = header.quantize(vertices[vertex_idx as usize]);
            out.push(quantized[axis]);
        }
    }
    for &t in triangle_indices {
        out.push((triangles[t as usize].flags & 0xff) as u8);
    }
}

/// Reads triangle blocks back out of a serialized tree.
#[derive(Clone, Copy)]
pub struct TriangleDecodingContext {
    header: TriangleHeader,
}

#[inline(always)]
fn block_counts(block: &[u8]) -> (usize, usize) {
    (block[0] as usize, block[1] as usize)
}

impl TriangleDecodingContext {
    pub fn new(tree: &[u8]) -> Self {
        Self {
            header: TriangleHeader::read(&tree[HEADER_SIZE..]),
        }
    }

    /// Number of triangles stored in a block.
    #[inline(always)]
    pub fn num_triangles(block: &[u8]) -> usize {
        block[0] as usize
    }

    /// Dequantizes every triangle of a block into `out` (three vertices per
    /// triangle) and returns the triangle count.
    pub fn unpack(&self, block: &[u8], out: &mut [Vec3]) -> usize {
        let (num_triangles, num_vertices) = block_counts(block);
        debug_assert!(out.len() >= num_triangles * 3);
        let indices = &block[2..2 + num_triangles * 3];
        let xs = &block[2 + num_triangles * 3..][..num_vertices];
        let ys = &block[2 + num_triangles * 3 + num_vertices..][..num_vertices];
        let zs = &block[2 + num_triangles * 3 + 2 * num_vertices..][..num_vertices];
        for (slot, &local) in indices.iter().enumerate() {
            let local = local as usize;
            out[slot] = self
                .header
                .dequantize([xs[local], ys[local], zs[local]]);
        }
        num_triangles
    }

    /// Copies the per-triangle flag bytes of a block into `out` without
    /// decoding any geometry. Returns the triangle count.
    pub fn get_flags(block: &[u8], out: &mut [u8]) -> usize {
        let (num_triangles, num_vertices) = block_counts(block);
        debug_assert!(out.len() >= num_triangles);
        let flags_offset = 2 + num_triangles * 3 + 3 * num_vertices;
        out[..num_triangles].copy_from_slice(&block[flags_offset..flags_offset + num_triangles]);
        num_triangles
    }

    /// Flag byte of a single triangle in a block.
    pub fn get_flag(block: &[u8], triangle_idx: usize) -> u8 {
        let (num_triangles, num_vertices) = block_counts(block);
        debug_assert!(triangle_idx < num_triangles);
        block[2 + num_triangles * 3 + 3 * num_vertices + triangle_idx]
    }

    /// Decodes a single triangle of a block.
    pub fn get_triangle(&self, block: &[u8], triangle_idx: usize) -> (Vec3, Vec3, Vec3) {
        let (num_triangles, num_vertices) = block_counts(block);
        debug_assert!(triangle_idx < num_triangles);
        let indices = &block[2 + triangle_idx * 3..2 + triangle_idx * 3 + 3];
        let xs = &block[2 + num_triangles * 3..][..num_vertices];
        let ys = &block[2 + num_triangles * 3 + num_vertices..][..num_vertices];
        let zs = &block[2 + num_triangles * 3 + 2 * num_vertices..][..num_vertices];
        let fetch = |local: u8| {
            let local = local as usize;
            self.header.dequantize([xs[local], ys[local], zs[local]])
        };
        (fetch(indices[0]), fetch(indices[1]), fetch(indices[2]))
    }

    /// Fused decode plus closest ray test over a whole block.
    /// Returns the closest fraction below `early_out_fraction` (or
    /// `early_out_fraction` unchanged if nothing is closer) and the index
    /// of the winning triangle within the block.
    pub fn test_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        block: &[u8],
        early_out_fraction: f32,
    ) -> (f32, u32) {
        let mut vertices = [Vec3::ZERO; MAX_TRIANGLES_PER_LEAF * 3];
        let num_triangles = self.unpack(block, &mut vertices);
        let mut best_fraction = early_out_fraction;
        let mut best_idx = 0;
        for triangle_idx in 0..num_triangles {
            let v = &vertices[triangle_idx * 3..];
            let fraction = ray_triangle(origin, direction, v[0], v[1], v[2]);
            if fraction < best_fraction {
                best_fraction = fraction;
                best_idx = triangle_idx as u32;
            }
        }
        (best_fraction, best_idx)
    }
}
