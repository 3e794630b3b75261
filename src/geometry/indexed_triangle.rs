use glam::Vec3;

use super::bounding_box::BoundingBox;

/// Number of low bits in a triangle's flags word holding its material index.
pub const FLAGS_MATERIAL_BITS: u32 = 5;
/// Mask extracting the material index from a flags word.
pub const FLAGS_MATERIAL_MASK: u32 = (1 << FLAGS_MATERIAL_BITS) - 1;
/// Bit position of the first active edge bit.
/// Edge `i` runs from vertex `i` to vertex `(i + 1) % 3`.
pub const FLAGS_ACTIVE_EDGE_SHIFT: u32 = FLAGS_MATERIAL_BITS;
/// Mask of the three active edge bits after shifting.
pub const FLAGS_ACTIVE_EDGE_MASK: u32 = 0b111;

/// A triangle referencing three vertices in a shared vertex table.
///
/// The flags word packs the material index in its low bits and the three
/// active edge bits above it, so the whole word survives a round trip
/// through the one-byte per-triangle flag storage of the serialized tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexedTriangle {
    pub idx: [u32; 3],
    pub flags: u32,
}

impl IndexedTriangle {
    #[inline(always)]
    pub fn new(i0: u32, i1: u32, i2: u32, material_index: u32) -> Self {
        debug_assert!(material_index <= FLAGS_MATERIAL_MASK, "Material index does not fit the flag bits.");
        Self {
            idx: [i0, i1, i2],
            flags: material_index,
        }
    }

    /// Material index stored in the flags word.
    #[inline(always)]
    pub fn material_index(&self) -> u32 {
        self.flags & FLAGS_MATERIAL_MASK
    }

    /// True if two or three vertex indices coincide.
    #[inline(always)]
    pub fn is_degenerate(&self) -> bool {
        self.idx[0] == self.idx[1] || self.idx[1] == self.idx[2] || self.idx[2] == self.idx[0]
    }

    /// Rotates the indices so the lowest one comes first, preserving winding.
    /// Two triangles that are equal up to rotation have equal canonical forms.
    pub fn lowest_index_first(&self) -> Self {
        let [a, b, c] = self.idx;
        let rotated = if a <= b && a <= c {
            [a, b, c]
        } else if b <= a && b <= c {
            [b, c, a]
        } else {
            [c, a, b]
        };
        Self {
            idx: rotated,
            flags: self.flags,
        }
    }

    /// Marks the edge with the given local index as active.
    #[inline(always)]
    pub fn set_edge_active(&mut self, edge_idx: usize) {
        debug_assert!(edge_idx < 3);
        self.flags |= 1 << (edge_idx as u32 + FLAGS_ACTIVE_EDGE_SHIFT);
    }

    /// The three active edge bits of this triangle.
    #[inline(always)]
    pub fn active_edges(&self) -> u32 {
        (self.flags >> FLAGS_ACTIVE_EDGE_SHIFT) & FLAGS_ACTIVE_EDGE_MASK
    }

    /// Bounding box of the triangle in the given vertex table.
    pub fn bounds(&self, vertices: &[Vec3]) -> BoundingBox {
        let a = vertices[self.idx[0] as usize];
        let b = vertices[self.idx[1] as usize];
        let c = vertices[self.idx[2] as usize];
        BoundingBox::new(a.min(b).min(c), a.max(b).max(c))
    }

    /// Centroid of the triangle in the given vertex table.
    #[inline(always)]
    pub fn centroid(&self, vertices: &[Vec3]) -> Vec3 {
        (vertices[self.idx[0] as usize] + vertices[self.idx[1] as usize] + vertices[self.idx[2] as usize]) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_rotation_invariant() {
        let a = IndexedTriangle::new(5, 1, 9, 0);
        let b = IndexedTriangle::new(1, 9, 5, 0);
        let c = IndexedTriangle::new(9, 5, 1, 0);
        assert_eq!(a.lowest_index_first(), b.lowest_index_first());
        assert_eq!(b.lowest_index_first(), c.lowest_index_first());
        assert_eq!(a.lowest_index_first().idx, [1, 9, 5]);

        // Opposite winding stays distinct.
        let d = IndexedTriangle::new(1, 5, 9, 0);
        assert_ne!(a.lowest_index_first(), d.lowest_index_first());
    }

    #[test]
    fn degeneracy() {
        assert!(IndexedTriangle::new(0, 0, 1, 0).is_degenerate());
        assert!(IndexedTriangle::new(0, 1, 1, 0).is_degenerate());
        assert!(IndexedTriangle::new(1, 0, 1, 0).is_degenerate());
        assert!(!IndexedTriangle::new(0, 1, 2, 0).is_degenerate());
    }

    #[test]
    fn flags_pack_material_and_edges() {
        let mut triangle = IndexedTriangle::new(0, 1, 2, 13);
        triangle.set_edge_active(0);
        triangle.set_edge_active(2);
        assert_eq!(triangle.material_index(), 13);
        assert_eq!(triangle.active_edges(), 0b101);
        // The full word fits one byte.
        assert!(triangle.flags <= 0xff);
    }
}
