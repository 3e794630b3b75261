//! The static triangle mesh collision shape.
//!
//! A shape is built once from its settings, becomes immutable, and answers
//! ray casts, point containment, convex sweeps, convex overlaps, and
//! triangle extraction against its serialized tree. Queries are pure reads;
//! any number of threads may query the same shape concurrently as long as
//! each brings its own collector and context.

use std::io::{Read, Write};

use glam::{Mat4, Quat, UVec4, Vec3, Vec4};
use log::debug;

use crate::error::MeshError;
use crate::geometry::aabox4::{
    aabox4_enlarge_with_extent, aabox4_invalid, aabox4_scale, aabox4_vs_box, partition_hits_first,
    ray_aabox4, sort4_reverse_and_shift,
};
use crate::geometry::active_edges::{find_active_edges, DEFAULT_ACTIVE_EDGE_COS_THRESHOLD};
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::indexed_triangle::{
    IndexedTriangle, FLAGS_ACTIVE_EDGE_MASK, FLAGS_ACTIVE_EDGE_SHIFT, FLAGS_MATERIAL_MASK,
};
use crate::geometry::indexify::{indexify, Triangle};
use crate::geometry::oriented_box::OrientedBox;
use crate::geometry::ray::{ray_triangle, RayCast, RayInvDirection};
use crate::tree::builder::AabbTreeBuilder;
use crate::tree::node_codec::{
    self, ITreeVisitor, NodeDecodingContext, DIRECTORY_OFFSET, STACK_SIZE,
};
use crate::tree::to_buffer::aabb_tree_to_buffer;
use crate::tree::triangle_codec::{TriangleDecodingContext, MAX_TRIANGLES_PER_LEAF};

use super::collector::{
    AllHitCollector, BackFaceMode, CollidePointResult, ICollector, RayCastResult, RayCastSettings,
};
use super::material::{DefaultPhysicsMaterial, PhysicsMaterialRef};
use super::oracles::{ICastShapeVsTriangles, ICollideShapeVsTriangles};
use super::shape_cast::ShapeCast;
use super::sub_shape_id::{SubShapeId, SubShapeIdCreator};

/// Bits a mesh pushes onto a sub shape ID for the triangle index inside a
/// leaf block.
pub const NUM_TRIANGLE_BITS: u32 = 3;

/// Construction description for a mesh shape.
pub struct MeshShapeSettings {
    pub triangle_vertices: Vec<Vec3>,
    pub indexed_triangles: Vec<IndexedTriangle>,
    /// Materials addressed by the triangles' material indices. Empty means
    /// every triangle uses index 0 and lookups return `default_material`.
    pub materials: Vec<PhysicsMaterialRef>,
    /// Material reported when no material list is present.
    pub default_material: PhysicsMaterialRef,
    /// Leaf capacity of the tree, at most [`MAX_TRIANGLES_PER_LEAF`].
    pub max_triangles_per_leaf: usize,
    /// Adjacent faces whose normals agree at least this much count as
    /// coplanar for active edge detection.
    pub active_edge_cos_threshold: f32,
}

impl MeshShapeSettings {
    /// Creates settings from a pre-indexed mesh. The input is taken as is;
    /// degenerate triangles fail the build unless [`Self::sanitize`] runs
    /// first.
    pub fn new(
        triangle_vertices: Vec<Vec3>,
        indexed_triangles: Vec<IndexedTriangle>,
        materials: Vec<PhysicsMaterialRef>,
    ) -> Self {
        Self {
            triangle_vertices,
            indexed_triangles,
            materials,
            default_material: std::sync::Arc::new(DefaultPhysicsMaterial),
            max_triangles_per_leaf: MAX_TRIANGLES_PER_LEAF,
            active_edge_cos_threshold: DEFAULT_ACTIVE_EDGE_COS_THRESHOLD,
        }
    }

    /// Creates settings from a flat triangle list: welds vertices, then
    /// silently drops degenerate and duplicate triangles.
    pub fn from_triangles(triangles: &[Triangle], materials: Vec<PhysicsMaterialRef>) -> Self {
        let (vertices, indexed) = indexify(triangles);
        let mut settings = Self::new(vertices, indexed, materials);
        settings.sanitize();
        settings
    }

    /// Removes degenerate triangles and triangles that duplicate an earlier
    /// one up to index rotation.
    pub fn sanitize(&mut self) {
        let mut seen = std::collections::HashSet::with_capacity(self.indexed_triangles.len());
        self.indexed_triangles
            .retain(|triangle| !triangle.is_degenerate() && seen.insert(triangle.lowest_index_first().idx));
    }
}

/// Counters reported by [`MeshShape::get_stats`].
#[derive(Clone, Copy, Debug)]
pub struct ShapeStats {
    pub size_bytes: usize,
    pub num_triangles: usize,
}

/// Static triangle mesh collision shape.
pub struct MeshShape {
    /// The serialized tree; nodes first, then triangle blocks.
    tree: Vec<u8>,
    materials: Vec<PhysicsMaterialRef>,
    default_material: PhysicsMaterialRef,
}

impl MeshShape {
    /// Builds the shape: validates the input, marks active edges, builds
    /// and serializes the tree.
    pub fn new(settings: &MeshShapeSettings) -> Result<Self, MeshError> {
        if settings.indexed_triangles.is_empty() {
            return Err(MeshError::EmptyInput);
        }

        let vertex_count = settings.triangle_vertices.len();
        for (t, triangle) in settings.indexed_triangles.iter().enumerate() {
            if triangle.is_degenerate() {
                return Err(MeshError::DegenerateTriangle(t));
            }
            for (component, &index) in triangle.idx.iter().enumerate() {
                if index as usize >= vertex_count {
                    return Err(MeshError::IndexOutOfRange {
                        triangle: t,
                        component,
                        index,
                        vertex_count,
                    });
                }
            }
        }

        let material_count = settings.materials.len();
        if material_count > FLAGS_MATERIAL_MASK as usize + 1 {
            return Err(MeshError::TooManyMaterials {
                count: material_count,
                limit: FLAGS_MATERIAL_MASK as usize + 1,
            });
        }
        for (t, triangle) in settings.indexed_triangles.iter().enumerate() {
            let index = triangle.material_index();
            if material_count == 0 {
                if index != 0 {
                    return Err(MeshError::MaterialsAbsentNonzeroIndex { triangle: t, index });
                }
            } else if index as usize >= material_count {
                return Err(MeshError::MaterialIndexOutOfRange {
                    triangle: t,
                    index,
                    material_count,
                });
            }
        }

        // The active edge bits are added to a copy of the input triangles.
        let mut triangles = settings.indexed_triangles.clone();
        find_active_edges(
            &settings.triangle_vertices,
            &mut triangles,
            settings.active_edge_cos_threshold,
        );

        let max_per_leaf = settings.max_triangles_per_leaf.clamp(1, MAX_TRIANGLES_PER_LEAF);
        let builder = AabbTreeBuilder::new(&settings.triangle_vertices, &triangles, max_per_leaf);
        let (mut root, build_stats) = builder.build();

        let (tree, convert_stats) =
            aabb_tree_to_buffer(&settings.triangle_vertices, &triangles, &mut root)
                .map_err(MeshError::TreeConversionFailed)?;

        debug!(
            "built mesh shape: {} triangles, {} nodes ({} leaves), depth {}, {} bytes ({:.1} per triangle)",
            build_stats.triangle_count,
            convert_stats.node_count,
            convert_stats.leaf_count,
            build_stats.max_depth,
            convert_stats.buffer_size,
            convert_stats.buffer_size as f32 / build_stats.triangle_count as f32,
        );

        let shape = Self {
            tree,
            materials: settings.materials.clone(),
            default_material: settings.default_material.clone(),
        };
        if shape.get_sub_shape_id_bits() > SubShapeId::MAX_BITS {
            return Err(MeshError::SubShapeIdOverflow);
        }
        Ok(shape)
    }

    /// Bounds of the mesh in local space.
    pub fn get_local_bounds(&self) -> BoundingBox {
        node_codec::read_root_bounds(&self.tree)
    }

    /// Number of sub shape ID bits this shape consumes.
    pub fn get_sub_shape_id_bits(&self) -> u32 {
        node_codec::triangle_block_id_bits(&self.tree) + NUM_TRIANGLE_BITS
    }

    fn triangle_block_id_bits(&self) -> u32 {
        node_codec::triangle_block_id_bits(&self.tree)
    }

    fn walk_tree<V: ITreeVisitor>(&self, visitor: &mut V) {
        let mut ctx = NodeDecodingContext::new(&self.tree);
        let triangle_ctx = TriangleDecodingContext::new(&self.tree);
        ctx.walk_tree(&self.tree, &triangle_ctx, visitor);
    }

    /// Resolves a sub shape ID into its triangle block and triangle index.
    fn decode_sub_shape_id(&self, sub_shape_id: SubShapeId) -> (&[u8], u32) {
        let (block_id, remainder) = sub_shape_id.pop_id(self.triangle_block_id_bits());
        let (triangle_idx, remainder) = remainder.pop_id(NUM_TRIANGLE_BITS);
        debug_assert!(remainder.is_empty(), "Invalid sub shape ID.");
        let offset = node_codec::triangle_block_offset(&self.tree, block_id);
        (&self.tree[offset..], triangle_idx)
    }

    /// Material of the triangle a sub shape ID refers to.
    pub fn get_material(&self, sub_shape_id: SubShapeId) -> PhysicsMaterialRef {
        if self.materials.is_empty() {
            return self.default_material.clone();
        }
        let (block, triangle_idx) = self.decode_sub_shape_id(sub_shape_id);
        let flags = TriangleDecodingContext::get_flag(block, triangle_idx as usize);
        self.materials[(flags as u32 & FLAGS_MATERIAL_MASK) as usize].clone()
    }

    /// Face normal of the triangle a sub shape ID refers to. The surface
    /// position is unused; mesh triangles have one normal.
    pub fn get_surface_normal(&self, sub_shape_id: SubShapeId, _local_surface_position: Vec3) -> Vec3 {
        let (block, triangle_idx) = self.decode_sub_shape_id(sub_shape_id);
        let ctx = TriangleDecodingContext::new(&self.tree);
        let (v0, v1, v2) = ctx.get_triangle(block, triangle_idx as usize);
        (v2 - v1).cross(v0 - v1).normalize()
    }

    /// Casts a ray and returns the closest hit, if any. Fractions are in
    /// units of the ray direction; hits beyond the direction vector are
    /// not reported.
    pub fn cast_ray(
        &self,
        ray: &RayCast,
        sub_shape_id_creator: SubShapeIdCreator,
    ) -> Option<RayCastResult> {
        let mut visitor = ClosestRayCastVisitor {
            hit: RayCastResult::default(),
            ray_origin: ray.origin,
            ray_direction: ray.direction,
            inv_direction: RayInvDirection::new(ray.direction),
            triangle_block_id_bits: self.triangle_block_id_bits(),
            sub_shape_id_creator,
            found: false,
            distance_stack: [0.0; STACK_SIZE],
        };
        self.walk_tree(&mut visitor);
        visitor.found.then_some(visitor.hit)
    }

    /// Casts a ray and hands every hit under the collector's early out
    /// fraction to the collector.
    pub fn cast_ray_all<C: ICollector<Result = RayCastResult>>(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut C,
    ) {
        let mut visitor = AllHitRayCastVisitor {
            collector,
            ray_origin: ray.origin,
            ray_direction: ray.direction,
            inv_direction: RayInvDirection::new(ray.direction),
            back_face_mode: settings.back_face_mode,
            triangle_block_id_bits: self.triangle_block_id_bits(),
            sub_shape_id_creator,
            distance_stack: [0.0; STACK_SIZE],
        };
        self.walk_tree(&mut visitor);
    }

    /// Tests if a point is inside the mesh by counting surface crossings of
    /// a ray along +Y; an odd count means inside. Intended for closed
    /// watertight meshes.
    pub fn collide_point<C: ICollector<Result = CollidePointResult>>(
        &self,
        point: Vec3,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut C,
    ) {
        let bounds = self.get_local_bounds();
        if !bounds.contains_point(point) {
            return;
        }

        // Cast a ray that is 10% longer than the height of the bounds.
        let ray = RayCast::new(point, Vec3::Y * (1.1 * bounds.size().y));
        let settings = RayCastSettings {
            back_face_mode: BackFaceMode::CollideWithBackFaces,
        };
        let mut hits = AllHitCollector::<RayCastResult>::default();
        self.cast_ray_all(&ray, &settings, sub_shape_id_creator, &mut hits);

        if hits.hits.len() % 2 == 1 {
            collector.add_hit(CollidePointResult {
                sub_shape_id: hits.hits.last().unwrap().sub_shape_id,
            });
        }
    }

    /// Sweeps a convex shape through the scaled mesh, handing every
    /// candidate triangle to the oracle together with its active edges.
    pub fn cast_shape<O: ICastShapeVsTriangles>(
        &self,
        shape_cast: &ShapeCast,
        scale: Vec3,
        sub_shape_id_creator: SubShapeIdCreator,
        oracle: &mut O,
    ) {
        let mut visitor = CastShapeVisitor {
            oracle,
            inv_direction: RayInvDirection::new(shape_cast.direction),
            box_center: shape_cast.shape_bounds.center(),
            box_extent: shape_cast.shape_bounds.extent(),
            scale,
            triangle_block_id_bits: self.triangle_block_id_bits(),
            sub_shape_id_creator,
            distance_stack: [0.0; STACK_SIZE],
        };
        self.walk_tree(&mut visitor);
    }

    /// Overlaps a convex shape, given as an oriented box in mesh space,
    /// with the scaled mesh, handing every candidate triangle to the
    /// oracle together with its active edges.
    pub fn collide_convex_vs_mesh<O: ICollideShapeVsTriangles>(
        &self,
        convex_bounds: &OrientedBox,
        scale: Vec3,
        sub_shape_id_creator: SubShapeIdCreator,
        oracle: &mut O,
    ) {
        let mut visitor = CollideConvexVisitor {
            oracle,
            convex_bounds: *convex_bounds,
            scale,
            triangle_block_id_bits: self.triangle_block_id_bits(),
            sub_shape_id_creator,
        };
        self.walk_tree(&mut visitor);
    }

    /// Begins streaming the triangles that intersect `box_` out of the
    /// mesh, positioned by `position_com` and `rotation` and scaled by
    /// `scale`.
    pub fn get_triangles_start(
        &self,
        box_: &BoundingBox,
        position_com: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> GetTrianglesContext {
        let world_to_local = Mat4::from_quat(rotation.conjugate()) * Mat4::from_translation(-position_com);
        GetTrianglesContext {
            walker: NodeDecodingContext::new(&self.tree),
            local_box: OrientedBox::new(world_to_local, box_),
            mesh_scale: scale,
            local_to_world: Mat4::from_rotation_translation(rotation, position_com)
                * Mat4::from_scale(scale),
            is_inside_out: is_inside_out(scale),
            state: WalkState::NotStarted,
        }
    }

    /// Continues streaming triangles, appending at most
    /// `max_triangles_requested` triangles (three vertices each) to
    /// `out_vertices` and, when requested, one material per triangle to
    /// `out_materials`. Returns the number of triangles appended; 0 means
    /// the walk is done. `max_triangles_requested` must be at least
    /// [`MAX_TRIANGLES_PER_LEAF`] to guarantee progress.
    pub fn get_triangles_next(
        &self,
        ctx: &mut GetTrianglesContext,
        max_triangles_requested: usize,
        out_vertices: &mut Vec<Vec3>,
        mut out_materials: Option<&mut Vec<PhysicsMaterialRef>>,
    ) -> usize {
        debug_assert!(
            max_triangles_requested >= MAX_TRIANGLES_PER_LEAF,
            "Too small a batch cannot make progress."
        );
        if matches!(ctx.state, WalkState::Done) {
            return 0;
        }
        ctx.state = WalkState::Walking;

        let mut visitor = GetTrianglesVisitor {
            local_box: ctx.local_box,
            mesh_scale: ctx.mesh_scale,
            local_to_world: ctx.local_to_world,
            is_inside_out: ctx.is_inside_out,
            max_triangles_requested,
            num_found: 0,
            abort: false,
            out_vertices,
            out_materials: out_materials.as_deref_mut(),
            materials: &self.materials,
            default_material: &self.default_material,
        };
        let triangle_ctx = TriangleDecodingContext::new(&self.tree);
        ctx.walker.walk_tree(&self.tree, &triangle_ctx, &mut visitor);

        let found = visitor.num_found;
        if ctx.walker.is_done_walking() {
            ctx.state = WalkState::Done;
        }
        found
    }

    /// Counts the stored triangles by walking the whole tree.
    pub fn get_stats(&self) -> ShapeStats {
        let mut visitor = CountTrianglesVisitor { num_triangles: 0 };
        self.walk_tree(&mut visitor);
        ShapeStats {
            size_bytes: std::mem::size_of::<Self>()
                + self.materials.len() * std::mem::size_of::<PhysicsMaterialRef>()
                + self.tree.len(),
            num_triangles: visitor.num_triangles,
        }
    }

    /// Writes the serialized tree, length-prefixed, to the stream.
    /// Materials travel separately through [`Self::save_material_state`].
    pub fn save_binary_state<W: Write>(&self, stream: &mut W) -> std::io::Result<()> {
        stream.write_all(&(self.tree.len() as u64).to_le_bytes())?;
        stream.write_all(&self.tree)
    }

    /// Restores a shape written by [`Self::save_binary_state`]. The
    /// returned shape has no materials until
    /// [`Self::restore_material_state`] runs.
    pub fn restore_binary_state<R: Read>(
        stream: &mut R,
        default_material: PhysicsMaterialRef,
    ) -> Result<Self, MeshError> {
        let mut length = [0u8; 8];
        stream.read_exact(&mut length)?;
        let length = u64::from_le_bytes(length) as usize;
        if length < DIRECTORY_OFFSET + 4 {
            return Err(MeshError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "serialized tree is too small",
            )));
        }
        let mut tree = vec![0u8; length];
        stream.read_exact(&mut tree)?;
        if DIRECTORY_OFFSET + 4 + 4 * node_codec::num_triangle_blocks(&tree) > tree.len() {
            return Err(MeshError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "triangle block directory is truncated",
            )));
        }
        Ok(Self {
            tree,
            materials: Vec::new(),
            default_material,
        })
    }

    /// The material list, for the enclosing registry to persist.
    pub fn save_material_state(&self) -> Vec<PhysicsMaterialRef> {
        self.materials.clone()
    }

    /// Replaces the material list, used after [`Self::restore_binary_state`].
    pub fn restore_material_state(&mut self, materials: &[PhysicsMaterialRef]) {
        self.materials = materials.to_vec();
    }
}

#[inline(always)]
fn is_inside_out(scale: Vec3) -> bool {
    scale.x * scale.y * scale.z < 0.0
}

/// Resumable state of a triangle extraction walk.
pub struct GetTrianglesContext {
    walker: NodeDecodingContext,
    local_box: OrientedBox,
    mesh_scale: Vec3,
    local_to_world: Mat4,
    is_inside_out: bool,
    state: WalkState,
}

enum WalkState {
    NotStarted,
    Walking,
    Done,
}

// ── Query visitors ─────────────────────────────────────────────────────────

struct ClosestRayCastVisitor {
    hit: RayCastResult,
    ray_origin: Vec3,
    ray_direction: Vec3,
    inv_direction: RayInvDirection,
    triangle_block_id_bits: u32,
    sub_shape_id_creator: SubShapeIdCreator,
    found: bool,
    distance_stack: [f32; STACK_SIZE],
}

impl ITreeVisitor for ClosestRayCastVisitor {
    fn should_abort(&self) -> bool {
        self.hit.fraction <= 0.0
    }

    fn should_visit_node(&self, stack_top: usize) -> bool {
        self.distance_stack[stack_top] < self.hit.fraction
    }

    fn visit_nodes(
        &mut self,
        bounds_min_x: Vec4,
        bounds_min_y: Vec4,
        bounds_min_z: Vec4,
        bounds_max_x: Vec4,
        bounds_max_y: Vec4,
        bounds_max_z: Vec4,
        properties: &mut UVec4,
        stack_top: usize,
    ) -> usize {
        let distance = ray_aabox4(
            self.ray_origin,
            &self.inv_direction,
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let early_out = self.hit.fraction;
        sort4_reverse_and_shift(
            distance,
            properties,
            early_out,
            &mut self.distance_stack[stack_top..stack_top + 4],
        )
    }

    fn visit_triangles(
        &mut self,
        triangle_ctx: &TriangleDecodingContext,
        _root_bounds_min: Vec3,
        _root_bounds_max: Vec3,
        block: &[u8],
        _num_triangles: usize,
        triangle_block_id: u32,
    ) {
        let (fraction, triangle_idx) =
            triangle_ctx.test_ray(self.ray_origin, self.ray_direction, block, self.hit.fraction);
        if fraction < self.hit.fraction {
            self.hit.fraction = fraction;
            self.hit.sub_shape_id = self
                .sub_shape_id_creator
                .push_id(triangle_block_id, self.triangle_block_id_bits)
                .push_id(triangle_idx, NUM_TRIANGLE_BITS)
                .get_id();
            self.found = true;
        }
    }
}

struct AllHitRayCastVisitor<'a, C> {
    collector: &'a mut C,
    ray_origin: Vec3,
    ray_direction: Vec3,
    inv_direction: RayInvDirection,
    back_face_mode: BackFaceMode,
    triangle_block_id_bits: u32,
    sub_shape_id_creator: SubShapeIdCreator,
    distance_stack: [f32; STACK_SIZE],
}

impl<C: ICollector<Result = RayCastResult>> AllHitRayCastVisitor<'_, C> {
    /// The ray is a segment: whatever the collector still accepts, hits
    /// beyond the direction vector are never reported.
    #[inline(always)]
    fn early_out_fraction(&self) -> f32 {
        self.collector.early_out_fraction().min(1.0 + f32::EPSILON)
    }
}

impl<C: ICollector<Result = RayCastResult>> ITreeVisitor for AllHitRayCastVisitor<'_, C> {
    fn should_abort(&self) -> bool {
        self.collector.should_early_out()
    }

    fn should_visit_node(&self, stack_top: usize) -> bool {
        self.distance_stack[stack_top] < self.early_out_fraction()
    }

    fn visit_nodes(
        &mut self,
        bounds_min_x: Vec4,
        bounds_min_y: Vec4,
        bounds_min_z: Vec4,
        bounds_max_x: Vec4,
        bounds_max_y: Vec4,
        bounds_max_z: Vec4,
        properties: &mut UVec4,
        stack_top: usize,
    ) -> usize {
        let distance = ray_aabox4(
            self.ray_origin,
            &self.inv_direction,
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let early_out = self.early_out_fraction();
        sort4_reverse_and_shift(
            distance,
            properties,
            early_out,
            &mut self.distance_stack[stack_top..stack_top + 4],
        )
    }

    fn visit_triangles(
        &mut self,
        triangle_ctx: &TriangleDecodingContext,
        _root_bounds_min: Vec3,
        _root_bounds_max: Vec3,
        block: &[u8],
        num_triangles: usize,
        triangle_block_id: u32,
    ) {
        debug_assert!(num_triangles <= MAX_TRIANGLES_PER_LEAF);
        let block_sub_shape_id = self
            .sub_shape_id_creator
            .push_id(triangle_block_id, self.triangle_block_id_bits);

        let mut vertices = [Vec3::ZERO; MAX_TRIANGLES_PER_LEAF * 3];
        triangle_ctx.unpack(block, &mut vertices);

        for triangle_idx in 0..num_triangles {
            let v = &vertices[triangle_idx * 3..triangle_idx * 3 + 3];

            if self.back_face_mode == BackFaceMode::IgnoreBackFaces
                && (v[2] - v[0]).cross(v[1] - v[0]).dot(self.ray_direction) < 0.0
            {
                continue;
            }

            let fraction = ray_triangle(self.ray_origin, self.ray_direction, v[0], v[1], v[2]);
            if fraction < self.early_out_fraction() {
                self.collector.add_hit(RayCastResult {
                    fraction,
                    sub_shape_id: block_sub_shape_id
                        .push_id(triangle_idx as u32, NUM_TRIANGLE_BITS)
                        .get_id(),
                });
            }
        }
    }
}

struct CastShapeVisitor<'a, O> {
    oracle: &'a mut O,
    inv_direction: RayInvDirection,
    box_center: Vec3,
    box_extent: Vec3,
    scale: Vec3,
    triangle_block_id_bits: u32,
    sub_shape_id_creator: SubShapeIdCreator,
    distance_stack: [f32; STACK_SIZE],
}

impl<O: ICastShapeVsTriangles> ITreeVisitor for CastShapeVisitor<'_, O> {
    fn should_abort(&self) -> bool {
        self.oracle.should_early_out()
    }

    fn should_visit_node(&self, stack_top: usize) -> bool {
        self.distance_stack[stack_top] < self.oracle.early_out_fraction()
    }

    fn visit_nodes(
        &mut self,
        bounds_min_x: Vec4,
        bounds_min_y: Vec4,
        bounds_min_z: Vec4,
        bounds_max_x: Vec4,
        bounds_max_y: Vec4,
        bounds_max_z: Vec4,
        properties: &mut UVec4,
        stack_top: usize,
    ) -> usize {
        // Empty slots must be rejected up front; a negative scale component
        // would turn their inverted bounds into valid boxes.
        let invalid = aabox4_invalid(
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let (mut min_x, mut min_y, mut min_z, mut max_x, mut max_y, mut max_z) = aabox4_scale(
            self.scale,
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        aabox4_enlarge_with_extent(
            self.box_extent,
            &mut min_x,
            &mut min_y,
            &mut min_z,
            &mut max_x,
            &mut max_y,
            &mut max_z,
        );
        let mut distance = ray_aabox4(
            self.box_center,
            &self.inv_direction,
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        );
        distance = Vec4::select(invalid, Vec4::splat(f32::MAX), distance);
        let early_out = self.oracle.early_out_fraction();
        sort4_reverse_and_shift(
            distance,
            properties,
            early_out,
            &mut self.distance_stack[stack_top..stack_top + 4],
        )
    }

    fn visit_triangles(
        &mut self,
        triangle_ctx: &TriangleDecodingContext,
        _root_bounds_min: Vec3,
        _root_bounds_max: Vec3,
        block: &[u8],
        num_triangles: usize,
        triangle_block_id: u32,
    ) {
        debug_assert!(num_triangles <= MAX_TRIANGLES_PER_LEAF);
        let block_sub_shape_id = self
            .sub_shape_id_creator
            .push_id(triangle_block_id, self.triangle_block_id_bits);

        let mut vertices = [Vec3::ZERO; MAX_TRIANGLES_PER_LEAF * 3];
        triangle_ctx.unpack(block, &mut vertices);
        let mut flags = [0u8; MAX_TRIANGLES_PER_LEAF];
        TriangleDecodingContext::get_flags(block, &mut flags);

        for triangle_idx in 0..num_triangles {
            let v = &vertices[triangle_idx * 3..triangle_idx * 3 + 3];
            let active_edges =
                (flags[triangle_idx] >> FLAGS_ACTIVE_EDGE_SHIFT) & FLAGS_ACTIVE_EDGE_MASK as u8;
            let sub_shape_id = block_sub_shape_id
                .push_id(triangle_idx as u32, NUM_TRIANGLE_BITS)
                .get_id();
            self.oracle.cast(v[0], v[1], v[2], active_edges, sub_shape_id);
            if self.oracle.should_early_out() {
                break;
            }
        }
    }
}

struct CollideConvexVisitor<'a, O> {
    oracle: &'a mut O,
    convex_bounds: OrientedBox,
    scale: Vec3,
    triangle_block_id_bits: u32,
    sub_shape_id_creator: SubShapeIdCreator,
}

impl<O: ICollideShapeVsTriangles> ITreeVisitor for CollideConvexVisitor<'_, O> {
    fn should_abort(&self) -> bool {
        self.oracle.should_early_out()
    }

    fn should_visit_node(&self, _stack_top: usize) -> bool {
        true
    }

    fn visit_nodes(
        &mut self,
        bounds_min_x: Vec4,
        bounds_min_y: Vec4,
        bounds_min_z: Vec4,
        bounds_max_x: Vec4,
        bounds_max_y: Vec4,
        bounds_max_z: Vec4,
        properties: &mut UVec4,
        _stack_top: usize,
    ) -> usize {
        let invalid = aabox4_invalid(
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let (min_x, min_y, min_z, max_x, max_y, max_z) = aabox4_scale(
            self.scale,
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let mut hits = aabox4_vs_box(&self.convex_bounds, min_x, min_y, min_z, max_x, max_y, max_z);
        for (lane, hit) in hits.iter_mut().enumerate() {
            *hit = *hit && !invalid.test(lane);
        }
        partition_hits_first(hits, properties)
    }

    fn visit_triangles(
        &mut self,
        triangle_ctx: &TriangleDecodingContext,
        _root_bounds_min: Vec3,
        _root_bounds_max: Vec3,
        block: &[u8],
        num_triangles: usize,
        triangle_block_id: u32,
    ) {
        debug_assert!(num_triangles <= MAX_TRIANGLES_PER_LEAF);
        let block_sub_shape_id = self
            .sub_shape_id_creator
            .push_id(triangle_block_id, self.triangle_block_id_bits);

        let mut vertices = [Vec3::ZERO; MAX_TRIANGLES_PER_LEAF * 3];
        triangle_ctx.unpack(block, &mut vertices);
        let mut flags = [0u8; MAX_TRIANGLES_PER_LEAF];
        TriangleDecodingContext::get_flags(block, &mut flags);

        for triangle_idx in 0..num_triangles {
            let v = &vertices[triangle_idx * 3..triangle_idx * 3 + 3];
            let active_edges =
                (flags[triangle_idx] >> FLAGS_ACTIVE_EDGE_SHIFT) & FLAGS_ACTIVE_EDGE_MASK as u8;
            let sub_shape_id = block_sub_shape_id
                .push_id(triangle_idx as u32, NUM_TRIANGLE_BITS)
                .get_id();
            self.oracle
                .collide(v[0], v[1], v[2], active_edges, sub_shape_id);
            if self.oracle.should_early_out() {
                break;
            }
        }
    }
}

struct GetTrianglesVisitor<'a> {
    local_box: OrientedBox,
    mesh_scale: Vec3,
    local_to_world: Mat4,
    is_inside_out: bool,
    max_triangles_requested: usize,
    num_found: usize,
    abort: bool,
    out_vertices: &'a mut Vec<Vec3>,
    out_materials: Option<&'a mut Vec<PhysicsMaterialRef>>,
    materials: &'a [PhysicsMaterialRef],
    default_material: &'a PhysicsMaterialRef,
}

impl ITreeVisitor for GetTrianglesVisitor<'_> {
    fn should_abort(&self) -> bool {
        self.abort
    }

    fn should_visit_node(&self, _stack_top: usize) -> bool {
        true
    }

    fn visit_nodes(
        &mut self,
        bounds_min_x: Vec4,
        bounds_min_y: Vec4,
        bounds_min_z: Vec4,
        bounds_max_x: Vec4,
        bounds_max_y: Vec4,
        bounds_max_z: Vec4,
        properties: &mut UVec4,
        _stack_top: usize,
    ) -> usize {
        let invalid = aabox4_invalid(
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let (min_x, min_y, min_z, max_x, max_y, max_z) = aabox4_scale(
            self.mesh_scale,
            bounds_min_x,
            bounds_min_y,
            bounds_min_z,
            bounds_max_x,
            bounds_max_y,
            bounds_max_z,
        );
        let mut hits = aabox4_vs_box(&self.local_box, min_x, min_y, min_z, max_x, max_y, max_z);
        for (lane, hit) in hits.iter_mut().enumerate() {
            *hit = *hit && !invalid.test(lane);
        }
        partition_hits_first(hits, properties)
    }

    fn visit_triangles(
        &mut self,
        triangle_ctx: &TriangleDecodingContext,
        _root_bounds_min: Vec3,
        _root_bounds_max: Vec3,
        block: &[u8],
        num_triangles: usize,
        _triangle_block_id: u32,
    ) {
        // When this leaf would overflow the caller's buffer, pause the walk;
        // the next call resumes at this leaf.
        if self.num_found + num_triangles > self.max_triangles_requested {
            self.abort = true;
            return;
        }

        debug_assert!(num_triangles <= MAX_TRIANGLES_PER_LEAF);
        let mut vertices = [Vec3::ZERO; MAX_TRIANGLES_PER_LEAF * 3];
        triangle_ctx.unpack(block, &mut vertices);

        for triangle_idx in 0..num_triangles {
            let v = &vertices[triangle_idx * 3..triangle_idx * 3 + 3];
            if self.is_inside_out {
                // An odd number of negative scale components mirrors the
                // mesh; flip the winding to keep faces oriented.
                self.out_vertices.push(self.local_to_world.transform_point3(v[0]));
                self.out_vertices.push(self.local_to_world.transform_point3(v[2]));
                self.out_vertices.push(self.local_to_world.transform_point3(v[1]));
            } else {
                for &vertex in v {
                    self.out_vertices.push(self.local_to_world.transform_point3(vertex));
                }
            }
        }

        if let Some(out_materials) = self.out_materials.as_deref_mut() {
            if self.materials.is_empty() {
                for _ in 0..num_triangles {
                    out_materials.push(self.default_material.clone());
                }
            } else {
                let mut flags = [0u8; MAX_TRIANGLES_PER_LEAF];
                TriangleDecodingContext::get_flags(block, &mut flags);
                for &flag in &flags[..num_triangles] {
                    out_materials
                        .push(self.materials[(flag as u32 & FLAGS_MATERIAL_MASK) as usize].clone());
                }
            }
        }

        self.num_found += num_triangles;
    }
}

struct CountTrianglesVisitor {
    num_triangles: usize,
}

impl ITreeVisitor for CountTrianglesVisitor {
    fn should_abort(&self) -> bool {
        false
    }

    fn should_visit_node(&self, _stack_top: usize) -> bool {
        true
    }

    fn visit_nodes(
        &mut self,
        bounds_min_x: Vec4,
        bounds_min_y: Vec4,
        bounds_min_z: Vec4,
        bounds_max_x: Vec4,
        bounds_max_y: Vec4,
        bounds_max_z: Vec4,
        properties: &mut UVec4,
        _stack_top: usize,
    ) -> usize {
        // Visit every non-sentinel child.
        let valid = bounds_min_x.cmplt(bounds_max_x)
            | bounds_min_y.cmplt(bounds_max_y)
            | bounds_min_z.cmplt(bounds_max_z);
        let hits = [valid.test(0), valid.test(1), valid.test(2), valid.test(3)];
        partition_hits_first(hits, properties)
    }

    fn visit_triangles(
        &mut self,
        _triangle_ctx: &TriangleDecodingContext,
        _root_bounds_min: Vec3,
        _root_bounds_max: Vec3,
        _block: &[u8],
        num_triangles: usize,
        _triangle_block_id: u32,
    ) {
        self.num_triangles += num_triangles;
    }
}
