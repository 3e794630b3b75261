//! Static triangle mesh collision shape.
//!
//! Takes an arbitrary indexed triangle soup, compiles it into a compact
//! serialized 4-wide bounding volume hierarchy with half float node bounds
//! and byte-quantized leaf triangles, and answers ray casts, point
//! containment, convex sweeps and overlaps, and triangle extraction
//! against it. Shapes are immutable after construction and safe to query
//! from any number of threads.

mod error;
mod geometry;
mod shape;
mod tree;

pub use error::MeshError;
pub use geometry::active_edges::{find_active_edges, is_edge_active, DEFAULT_ACTIVE_EDGE_COS_THRESHOLD};
pub use geometry::bounding_box::BoundingBox;
pub use geometry::half_float::{
    half_to_float, half_to_float4, to_half_float_round_down, to_half_float_round_up, HALF_FLT_MAX,
    HALF_FLT_MAX_BITS,
};
pub use geometry::indexed_triangle::{
    IndexedTriangle, FLAGS_ACTIVE_EDGE_MASK, FLAGS_ACTIVE_EDGE_SHIFT, FLAGS_MATERIAL_BITS,
    FLAGS_MATERIAL_MASK,
};
pub use geometry::indexify::{indexify, Triangle};
pub use geometry::oriented_box::OrientedBox;
pub use geometry::ray::{ray_aabox, ray_triangle, RayCast, RayInvDirection};
pub use shape::collector::{
    AllHitCollector, AnyHitCollector, BackFaceMode, ClosestHitCollector, CollidePointResult,
    ICollector, RayCastResult, RayCastSettings,
};
pub use shape::material::{DefaultPhysicsMaterial, IPhysicsMaterial, PhysicsMaterialRef};
pub use shape::mesh_shape::{
    GetTrianglesContext, MeshShape, MeshShapeSettings, ShapeStats, NUM_TRIANGLE_BITS,
};
pub use shape::oracles::{ICastShapeVsTriangles, ICollideShapeVsTriangles};
pub use shape::shape_cast::ShapeCast;
pub use shape::sub_shape_id::{SubShapeId, SubShapeIdCreator};
pub use tree::triangle_codec::MAX_TRIANGLES_PER_LEAF;
