use glam::Vec3;

use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::indexed_triangle::IndexedTriangle;

use super::splitter::BinningSplitter;

/// An in-memory tree node, only alive during construction.
pub struct BuilderNode {
    pub bounds: BoundingBox,
    pub kind: BuilderNodeKind,
}

pub enum BuilderNodeKind {
    /// Indices into the shape's triangle list.
    Leaf(Vec<u32>),
    /// Up to four children; empty slots serialize as sentinels.
    Internal([Option<Box<BuilderNode>>; 4]),
}

/// Counters accumulated while building.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub triangle_count: usize,
    pub max_depth: usize,
}

/// Builds a 4-ary bounding volume tree over a triangle list.
pub struct AabbTreeBuilder<'a> {
    vertices: &'a [Vec3],
    triangles: &'a [IndexedTriangle],
    max_triangles_per_leaf: usize,
}

impl<'a> AabbTreeBuilder<'a> {
    pub fn new(
        vertices: &'a [Vec3],
        triangles: &'a [IndexedTriangle],
        max_triangles_per_leaf: usize,
    ) -> Self {
        debug_assert!(max_triangles_per_leaf >= 1);
        Self {
            vertices,
            triangles,
            max_triangles_per_leaf,
        }
    }

    pub fn build(&self) -> (BuilderNode, BuildStats) {
        debug_assert!(!self.triangles.is_empty(), "Cannot build a tree without triangles.");
        let splitter = BinningSplitter::new(self.vertices, self.triangles);
        let mut indices: Vec<u32> = (0..self.triangles.len() as u32).collect();
        let mut stats = BuildStats {
            triangle_count: self.triangles.len(),
            ..BuildStats::default()
        };
        let root = self.build_node(&splitter, &mut indices, 1, &mut stats);
        (root, stats)
    }

    fn bounds_of(&self, indices: &[u32]) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for &i in indices {
            bounds.merge(&self.triangles[i as usize].bounds(self.vertices));
        }
        bounds
    }

    fn build_node(
        &self,
        splitter: &BinningSplitter,
        indices: &mut [u32],
        depth: usize,
        stats: &mut BuildStats,
    ) -> BuilderNode {
        stats.node_count += 1;
        stats.max_depth = stats.max_depth.max(depth);

        if indices.len() <= self.max_triangles_per_leaf {
            stats.leaf_count += 1;
            return BuilderNode {
                bounds: self.bounds_of(indices),
                kind: BuilderNodeKind::Leaf(indices.to_vec()),
            };
        }

        // Split in two, then split oversized halves again so internal nodes
        // carry up to four children.
        let (left, right) = splitter.split(indices);
        let mut children: [Option<Box<BuilderNode>>; 4] = [None, None, None, None];
        let mut slot = 0;
        for half in [left, right] {
            if half.len() > self.max_triangles_per_leaf {
                let (a, b) = splitter.split(half);
                children[slot] = Some(Box::new(self.build_node(splitter, a, depth + 1, stats)));
                children[slot + 1] = Some(Box::new(self.build_node(splitter, b, depth + 1, stats)));
                slot += 2;
            } else {
                children[slot] = Some(Box::new(self.build_node(splitter, half, depth + 1, stats)));
                slot += 1;
            }
        }

        let mut bounds = BoundingBox::empty();
        for child in children.iter().flatten() {
            bounds.merge(&child.bounds);
        }
        BuilderNode {
            bounds,
            kind: BuilderNodeKind::Internal(children),
        }
    }
}
