use glam::Vec3;

use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::indexed_triangle::IndexedTriangle;

/// Number of equal-population bins considered per axis when searching for a split.
pub const NUM_BINS: usize = 32;

/// Partitions triangle ranges with a binned surface area heuristic.
///
/// All three axes are evaluated; candidate splits are the boundaries of
/// `NUM_BINS` equal-population bins over the centroid-sorted order. Ties
/// keep the lowest axis so a fixed input ordering always produces the
/// same tree.
pub struct BinningSplitter {
    centroids: Vec<Vec3>,
    bounds: Vec<BoundingBox>,
}

impl BinningSplitter {
    pub fn new(vertices: &[Vec3], triangles: &[IndexedTriangle]) -> Self {
        Self {
            centroids: triangles.iter().map(|t| t.centroid(vertices)).collect(),
            bounds: triangles.iter().map(|t| t.bounds(vertices)).collect(),
        }
    }

    /// Splits a range of triangle indices in two, reordering the range in
    /// place. Both halves are non-empty.
    pub fn split<'a>(&self, indices: &'a mut [u32]) -> (&'a mut [u32], &'a mut [u32]) {
        let len = indices.len();
        debug_assert!(len >= 2, "Splitting requires at least two triangles.");

        let mut best_cost = f32::MAX;
        let mut best_axis = 0;
        let mut best_pos = len / 2;

        let mut order: Vec<u32> = Vec::with_capacity(len);
        let mut prefix_area = vec![0.0f32; len + 1];
        let mut suffix_area = vec![0.0f32; len + 1];

        for axis in 0..3 {
            order.clear();
            order.extend_from_slice(indices);
            order.sort_by(|&a, &b| {
                self.centroids[a as usize][axis].total_cmp(&self.centroids[b as usize][axis])
            });

            let mut bounds = BoundingBox::empty();
            for i in 0..len {
                bounds.merge(&self.bounds[order[i] as usize]);
                prefix_area[i + 1] = bounds.half_area();
            }
            let mut bounds = BoundingBox::empty();
            for i in (0..len).rev() {
                bounds.merge(&self.bounds[order[i] as usize]);
                suffix_area[i] = bounds.half_area();
            }

            let mut previous_pos = 0;
            for bin in 1..NUM_BINS {
                let pos = bin * len / NUM_BINS;
                if pos == 0 || pos == len || pos == previous_pos {
                    continue;
                }
                previous_pos = pos;
                let cost =
                    pos as f32 * prefix_area[pos] + (len - pos) as f32 * suffix_area[pos];
                if cost < best_cost {
                    best_cost = cost;
                    best_axis = axis;
                    best_pos = pos;
                }
            }
        }

        // Re-establish the winning axis ordering on the caller's range.
        indices.sort_by(|&a, &b| {
            self.centroids[a as usize][best_axis].total_cmp(&self.centroids[b as usize][best_axis])
        });
        indices.split_at_mut(best_pos)
    }
}
