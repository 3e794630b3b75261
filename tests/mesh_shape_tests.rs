//! Whole-shape scenarios: build, query, serialize, extract.

use std::sync::Arc;

use glam::{Quat, Vec3};

use trimesh_shape::{
    AllHitCollector, BackFaceMode, BoundingBox, CollidePointResult, DefaultPhysicsMaterial,
    ICastShapeVsTriangles, ICollideShapeVsTriangles, IPhysicsMaterial, IndexedTriangle, MeshError,
    MeshShape, MeshShapeSettings, OrientedBox, PhysicsMaterialRef, RayCast, RayCastResult,
    RayCastSettings, ShapeCast, SubShapeId, SubShapeIdCreator, MAX_TRIANGLES_PER_LEAF,
    NUM_TRIANGLE_BITS,
};

#[derive(Debug)]
struct NamedMaterial(&'static str);

impl IPhysicsMaterial for NamedMaterial {
    fn debug_name(&self) -> &str {
        self.0
    }
}

fn material(name: &'static str) -> PhysicsMaterialRef {
    Arc::new(NamedMaterial(name))
}

/// Unit quad in the y = 0 plane, two triangles with upward normals.
fn quad_settings(materials: Vec<PhysicsMaterialRef>) -> MeshShapeSettings {
    let vertices = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];
    let triangles = vec![
        IndexedTriangle::new(0, 2, 1, 0),
        IndexedTriangle::new(0, 3, 2, if materials.len() > 1 { 1 } else { 0 }),
    ];
    MeshShapeSettings::new(vertices, triangles, materials)
}

/// Unit cube with outward counterclockwise winding, 12 triangles.
fn cube_settings() -> MeshShapeSettings {
    let vertices = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(0.0, 1.0, 1.0),
    ];
    let triangles = vec![
        IndexedTriangle::new(0, 2, 1, 0),
        IndexedTriangle::new(0, 3, 2, 0),
        IndexedTriangle::new(4, 5, 6, 0),
        IndexedTriangle::new(4, 6, 7, 0),
        IndexedTriangle::new(0, 1, 5, 0),
        IndexedTriangle::new(0, 5, 4, 0),
        IndexedTriangle::new(3, 7, 6, 0),
        IndexedTriangle::new(3, 6, 2, 0),
        IndexedTriangle::new(0, 4, 7, 0),
        IndexedTriangle::new(0, 7, 3, 0),
        IndexedTriangle::new(1, 2, 6, 0),
        IndexedTriangle::new(1, 6, 5, 0),
    ];
    MeshShapeSettings::new(vertices, triangles, Vec::new())
}

/// Tetrahedron with outward counterclockwise winding.
fn tetrahedron_settings() -> MeshShapeSettings {
    let vertices = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];
    let triangles = vec![
        IndexedTriangle::new(0, 2, 1, 0),
        IndexedTriangle::new(0, 1, 3, 0),
        IndexedTriangle::new(0, 3, 2, 0),
        IndexedTriangle::new(1, 2, 3, 0),
    ];
    MeshShapeSettings::new(vertices, triangles, Vec::new())
}

/// Height field style grid, `2 * width * depth` triangles.
fn grid_settings(width: usize, depth: usize) -> MeshShapeSettings {
    let mut vertices = Vec::new();
    for z in 0..=depth {
        for x in 0..=width {
            vertices.push(Vec3::new(
                x as f32,
                ((x + z) % 3) as f32 * 0.25,
                z as f32,
            ));
        }
    }
    let stride = (width + 1) as u32;
    let mut triangles = Vec::new();
    for z in 0..depth as u32 {
        for x in 0..width as u32 {
            let v00 = z * stride + x;
            triangles.push(IndexedTriangle::new(v00, v00 + stride + 1, v00 + 1, 0));
            triangles.push(IndexedTriangle::new(v00, v00 + stride, v00 + stride + 1, 0));
        }
    }
    MeshShapeSettings::new(vertices, triangles, Vec::new())
}

fn extract_all(shape: &MeshShape) -> Vec<Vec3> {
    let bounds = shape.get_local_bounds();
    let mut ctx = shape.get_triangles_start(
        &BoundingBox::new(bounds.min - Vec3::ONE, bounds.max + Vec3::ONE),
        Vec3::ZERO,
        Quat::IDENTITY,
        Vec3::ONE,
    );
    let mut vertices = Vec::new();
    while shape.get_triangles_next(&mut ctx, usize::MAX / 4, &mut vertices, None) > 0 {}
    vertices
}

#[derive(Default)]
struct RecordingCastOracle {
    calls: Vec<(Vec3, Vec3, Vec3, u8, SubShapeId)>,
}

impl ICastShapeVsTriangles for RecordingCastOracle {
    fn cast(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, active_edges: u8, sub_shape_id: SubShapeId) {
        self.calls.push((v0, v1, v2, active_edges, sub_shape_id));
    }
}

#[derive(Default)]
struct RecordingCollideOracle {
    calls: Vec<(Vec3, Vec3, Vec3, u8, SubShapeId)>,
}

impl ICollideShapeVsTriangles for RecordingCollideOracle {
    fn collide(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, active_edges: u8, sub_shape_id: SubShapeId) {
        self.calls.push((v0, v1, v2, active_edges, sub_shape_id));
    }
}

// ── Scenario: single quad ──────────────────────────────────────────────────

#[test]
fn quad_closest_ray_cast() {
    let shape = MeshShape::new(&quad_settings(Vec::new())).unwrap();

    let hit = shape
        .cast_ray(
            &RayCast::new(Vec3::new(0.5, 1.0, 0.5), Vec3::new(0.0, -1.0, 0.0)),
            SubShapeIdCreator::new(),
        )
        .expect("ray down onto the quad must hit");
    assert!((hit.fraction - 1.0).abs() < 1.0e-6);

    // A ray that stops short of the plane misses.
    assert!(shape
        .cast_ray(
            &RayCast::new(Vec3::new(0.5, 1.0, 0.5), Vec3::new(0.0, -0.5, 0.0)),
            SubShapeIdCreator::new(),
        )
        .is_none());

    // A ray outside the bounds misses.
    assert!(shape
        .cast_ray(
            &RayCast::new(Vec3::new(3.0, 1.0, 0.5), Vec3::new(0.0, -1.0, 0.0)),
            SubShapeIdCreator::new(),
        )
        .is_none());
}

#[test]
fn quad_materials_and_surface_normal() {
    let materials = vec![material("a"), material("b")];
    let shape = MeshShape::new(&quad_settings(materials)).unwrap();

    // Triangle 1 covers the z > x half of the quad.
    let hit = shape
        .cast_ray(
            &RayCast::new(Vec3::new(0.25, 1.0, 0.75), Vec3::new(0.0, -1.0, 0.0)),
            SubShapeIdCreator::new(),
        )
        .unwrap();
    assert_eq!(shape.get_material(hit.sub_shape_id).debug_name(), "b");

    let normal = shape.get_surface_normal(hit.sub_shape_id, Vec3::new(0.25, 0.0, 0.75));
    assert!((normal - Vec3::Y).length() < 1.0e-6);

    let hit = shape
        .cast_ray(
            &RayCast::new(Vec3::new(0.75, 1.0, 0.25), Vec3::new(0.0, -1.0, 0.0)),
            SubShapeIdCreator::new(),
        )
        .unwrap();
    assert_eq!(shape.get_material(hit.sub_shape_id).debug_name(), "a");
}

#[test]
fn quad_back_face_modes() {
    let shape = MeshShape::new(&quad_settings(Vec::new())).unwrap();
    let ray_from_below = RayCast::new(Vec3::new(0.25, -1.0, 0.75), Vec3::new(0.0, 2.0, 0.0));

    let mut collector = AllHitCollector::<RayCastResult>::default();
    shape.cast_ray_all(
        &ray_from_below,
        &RayCastSettings {
            back_face_mode: BackFaceMode::IgnoreBackFaces,
        },
        SubShapeIdCreator::new(),
        &mut collector,
    );
    assert!(collector.hits.is_empty());

    let mut collector = AllHitCollector::<RayCastResult>::default();
    shape.cast_ray_all(
        &ray_from_below,
        &RayCastSettings {
            back_face_mode: BackFaceMode::CollideWithBackFaces,
        },
        SubShapeIdCreator::new(),
        &mut collector,
    );
    assert_eq!(collector.hits.len(), 1);
    assert!((collector.hits[0].fraction - 0.5).abs() < 1.0e-6);
}

#[test]
fn quad_active_edges_via_cast_shape() {
    let shape = MeshShape::new(&quad_settings(Vec::new())).unwrap();

    let mut oracle = RecordingCastOracle::default();
    shape.cast_shape(
        &ShapeCast::new(
            Vec3::new(0.0, -4.0, 0.0),
            BoundingBox::new(Vec3::new(0.4, 1.9, 0.4), Vec3::new(0.6, 2.1, 0.6)),
        ),
        Vec3::ONE,
        SubShapeIdCreator::new(),
        &mut oracle,
    );
    assert_eq!(oracle.calls.len(), 2);

    // Boundary edges are active, the shared diagonal is not. Triangle 0's
    // diagonal is its first edge, triangle 1's is its last.
    let mut masks = [0u8; 2];
    for (_, _, _, active_edges, sub_shape_id) in &oracle.calls {
        let (triangle_idx, rest) = sub_shape_id.pop_id(NUM_TRIANGLE_BITS);
        assert!(rest.is_empty());
        masks[triangle_idx as usize] = *active_edges;
    }
    assert_eq!(masks[0], 0b110);
    assert_eq!(masks[1], 0b011);
}

// ── Scenario: unit cube ────────────────────────────────────────────────────

#[test]
fn cube_point_containment() {
    let shape = MeshShape::new(&cube_settings()).unwrap();

    let mut collector = AllHitCollector::<CollidePointResult>::default();
    shape.collide_point(
        Vec3::new(0.5, 0.25, 0.25),
        SubShapeIdCreator::new(),
        &mut collector,
    );
    assert_eq!(collector.hits.len(), 1, "an interior point reports one hit");

    let mut collector = AllHitCollector::<CollidePointResult>::default();
    shape.collide_point(Vec3::new(2.0, 2.0, 2.0), SubShapeIdCreator::new(), &mut collector);
    assert!(collector.hits.is_empty(), "an exterior point reports none");
}

#[test]
fn cube_closest_ray_fraction() {
    let shape = MeshShape::new(&cube_settings()).unwrap();
    let hit = shape
        .cast_ray(
            &RayCast::new(Vec3::new(0.5, 2.0, 0.5), Vec3::new(0.0, -2.0, 0.0)),
            SubShapeIdCreator::new(),
        )
        .unwrap();
    assert!((hit.fraction - 0.5).abs() < 1.0e-6);
}

#[test]
fn cube_edges_active_diagonals_not() {
    let shape = MeshShape::new(&cube_settings()).unwrap();

    // Overlap a box covering the whole cube so the oracle sees every
    // triangle with its active edge bits.
    let mut oracle = RecordingCollideOracle::default();
    shape.collide_convex_vs_mesh(
        &OrientedBox::new(
            glam::Mat4::IDENTITY,
            &BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(2.0)),
        ),
        Vec3::ONE,
        SubShapeIdCreator::new(),
        &mut oracle,
    );
    assert_eq!(oracle.calls.len(), 12);

    // Every triangle carries two cube edges (active) and one face diagonal
    // (inactive between coplanar faces).
    for (_, _, _, active_edges, _) in &oracle.calls {
        assert_eq!(active_edges.count_ones(), 2, "mask {active_edges:#05b}");
    }
}

// ── Sanitization and build failures ────────────────────────────────────────

#[test]
fn duplicate_triangles_collapse() {
    let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Z];
    let triangles = vec![
        IndexedTriangle::new(0, 1, 2, 0),
        // Same triangle, rotated indices.
        IndexedTriangle::new(1, 2, 0, 0),
    ];
    let mut settings = MeshShapeSettings::new(vertices, triangles, Vec::new());
    settings.sanitize();
    assert_eq!(settings.indexed_triangles.len(), 1);
    let shape = MeshShape::new(&settings).unwrap();
    assert_eq!(shape.get_stats().num_triangles, 1);
}

#[test]
fn permissive_construction_drops_degenerates() {
    use trimesh_shape::Triangle;
    let triangles = [
        Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z, 0),
        // Degenerate: two corners coincide.
        Triangle::new(Vec3::X, Vec3::X, Vec3::Z, 0),
    ];
    let settings = MeshShapeSettings::from_triangles(&triangles, Vec::new());
    let shape = MeshShape::new(&settings).unwrap();
    assert_eq!(shape.get_stats().num_triangles, 1);
}

#[test]
fn build_failures() {
    // Empty input.
    let settings = MeshShapeSettings::new(Vec::new(), Vec::new(), Vec::new());
    assert!(matches!(MeshShape::new(&settings), Err(MeshError::EmptyInput)));

    // Strict path reports degenerates.
    let settings = MeshShapeSettings::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        vec![
            IndexedTriangle::new(0, 1, 2, 0),
            IndexedTriangle::new(1, 1, 2, 0),
        ],
        Vec::new(),
    );
    assert!(matches!(
        MeshShape::new(&settings),
        Err(MeshError::DegenerateTriangle(1))
    ));

    // Vertex index beyond the vertex list.
    let settings = MeshShapeSettings::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        vec![IndexedTriangle::new(0, 1, 5, 0)],
        Vec::new(),
    );
    assert!(matches!(
        MeshShape::new(&settings),
        Err(MeshError::IndexOutOfRange {
            triangle: 0,
            component: 2,
            index: 5,
            vertex_count: 3,
        })
    ));

    // One more material than the flag bits can address.
    let materials: Vec<PhysicsMaterialRef> =
        (0..33).map(|_| material("m")).collect();
    let settings = MeshShapeSettings::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        vec![IndexedTriangle::new(0, 1, 2, 0)],
        materials,
    );
    assert!(matches!(
        MeshShape::new(&settings),
        Err(MeshError::TooManyMaterials { count: 33, limit: 32 })
    ));

    // Material index beyond the material list.
    let settings = MeshShapeSettings::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        vec![IndexedTriangle::new(0, 1, 2, 1)],
        vec![material("only")],
    );
    assert!(matches!(
        MeshShape::new(&settings),
        Err(MeshError::MaterialIndexOutOfRange {
            triangle: 0,
            index: 1,
            material_count: 1,
        })
    ));

    // Nonzero material index without a material list.
    let settings = MeshShapeSettings::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        vec![IndexedTriangle::new(0, 1, 2, 3)],
        Vec::new(),
    );
    assert!(matches!(
        MeshShape::new(&settings),
        Err(MeshError::MaterialsAbsentNonzeroIndex { triangle: 0, index: 3 })
    ));
}

// ── Quantization fidelity ──────────────────────────────────────────────────

#[test]
fn decoded_geometry_matches_input_within_tolerance() {
    let settings = grid_settings(8, 6);
    let shape = MeshShape::new(&settings).unwrap();

    let extracted = extract_all(&shape);
    assert_eq!(extracted.len(), settings.indexed_triangles.len() * 3);

    let bounds = shape.get_local_bounds();
    let tolerance = (bounds.size() * (1.0 / 255.0)).max(Vec3::splat(1.0e-6));

    // Every extracted triangle matches some input triangle vertexwise.
    for triangle in extracted.chunks_exact(3) {
        let found = settings.indexed_triangles.iter().any(|input| {
            (0..3).all(|corner| {
                let expected = settings.triangle_vertices[input.idx[corner] as usize];
                let error = (triangle[corner] - expected).abs();
                error.cmple(tolerance).all()
            })
        });
        assert!(found, "extracted triangle {triangle:?} matches no input");
    }
}

#[test]
fn closest_ray_matches_brute_force_over_decoded_triangles() {
    let shape = MeshShape::new(&grid_settings(8, 6)).unwrap();
    let extracted = extract_all(&shape);

    for (origin, direction) in [
        (Vec3::new(3.4, 10.0, 2.6), Vec3::new(0.0, -20.0, 0.0)),
        (Vec3::new(0.6, 10.0, 5.2), Vec3::new(0.0, -20.0, 0.0)),
        (Vec3::new(-1.0, 0.4, 0.5), Vec3::new(20.0, 0.0, 0.0)),
        (Vec3::new(7.5, 8.0, 4.5), Vec3::new(-3.0, -9.0, -2.0)),
    ] {
        let expected = extracted
            .chunks_exact(3)
            .map(|v| trimesh_ray_triangle(origin, direction, v[0], v[1], v[2]))
            .fold(f32::MAX, f32::min);

        match shape.cast_ray(&RayCast::new(origin, direction), SubShapeIdCreator::new()) {
            Some(hit) => assert_eq!(hit.fraction, expected),
            None => assert!(expected > 1.0, "missed but brute force found {expected}"),
        }
    }
}

/// Reference ray/triangle test matching the shape's convention: two-sided,
/// fraction in units of the direction vector, `f32::MAX` on a miss.
fn trimesh_ray_triangle(origin: Vec3, direction: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> f32 {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1.0e-12 {
        return f32::MAX;
    }
    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return f32::MAX;
    }
    let q = s.cross(e1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return f32::MAX;
    }
    let t = e2.dot(q) * inv_det;
    if t < 0.0 {
        return f32::MAX;
    }
    t
}

// ── Convex overlap culling ─────────────────────────────────────────────────

#[test]
fn convex_overlap_culls_distant_leaves() {
    let settings = grid_settings(8, 8);
    let total = settings.indexed_triangles.len();
    let shape = MeshShape::new(&settings).unwrap();

    let query = BoundingBox::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.5, 2.0, 1.5));
    let mut oracle = RecordingCollideOracle::default();
    shape.collide_convex_vs_mesh(
        &OrientedBox::new(glam::Mat4::IDENTITY, &query),
        Vec3::ONE,
        SubShapeIdCreator::new(),
        &mut oracle,
    );

    assert!(!oracle.calls.is_empty());
    assert!(oracle.calls.len() < total, "distant leaves must be culled");

    // Necessity: every input triangle overlapping the query box is reported.
    let reported: Vec<Vec3> = oracle
        .calls
        .iter()
        .map(|(v0, v1, v2, _, _)| (*v0 + *v1 + *v2) / 3.0)
        .collect();
    for input in &settings.indexed_triangles {
        let bounds = input.bounds(&settings.triangle_vertices);
        if BoundingBox::intersects(&bounds, &query) {
            let centroid = input.centroid(&settings.triangle_vertices);
            assert!(
                reported.iter().any(|r| (*r - centroid).length() < 0.1),
                "triangle at {centroid} missing"
            );
        }
    }
}

// ── Triangle extraction ────────────────────────────────────────────────────

#[test]
fn chunked_extraction_matches_one_shot() {
    let shape = MeshShape::new(&grid_settings(8, 6)).unwrap();
    let one_shot = extract_all(&shape);
    assert_eq!(one_shot.len(), 96 * 3);

    let bounds = shape.get_local_bounds();
    let query = BoundingBox::new(bounds.min - Vec3::ONE, bounds.max + Vec3::ONE);
    let mut ctx = shape.get_triangles_start(&query, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
    let mut chunked = Vec::new();
    let mut batches = 0;
    loop {
        let got = shape.get_triangles_next(&mut ctx, MAX_TRIANGLES_PER_LEAF, &mut chunked, None);
        if got == 0 {
            break;
        }
        assert!(got <= MAX_TRIANGLES_PER_LEAF);
        batches += 1;
    }
    assert!(batches > 1, "small batches must suspend and resume");
    assert_eq!(chunked.len(), one_shot.len());

    let key = |v: &Vec3| (v.x.to_bits(), v.y.to_bits(), v.z.to_bits());
    let mut a: Vec<_> = one_shot.chunks_exact(3).map(|t| [key(&t[0]), key(&t[1]), key(&t[2])]).collect();
    let mut b: Vec<_> = chunked.chunks_exact(3).map(|t| [key(&t[0]), key(&t[1]), key(&t[2])]).collect();
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
}

#[test]
fn extraction_applies_transform_and_materials() {
    let materials = vec![material("a"), material("b")];
    let shape = MeshShape::new(&quad_settings(materials)).unwrap();

    let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
    let translation = Vec3::new(10.0, 0.0, -3.0);
    let query = BoundingBox::new(Vec3::splat(-100.0), Vec3::splat(100.0));
    let mut ctx = shape.get_triangles_start(&query, translation, rotation, Vec3::splat(2.0));
    let mut vertices = Vec::new();
    let mut out_materials = Vec::new();
    let count = shape.get_triangles_next(&mut ctx, 64, &mut vertices, Some(&mut out_materials));
    assert_eq!(count, 2);
    assert_eq!(out_materials.len(), 2);
    assert_eq!(out_materials[0].debug_name(), "a");
    assert_eq!(out_materials[1].debug_name(), "b");

    // First stored vertex is the origin; it lands on the translation.
    assert!((vertices[0] - translation).length() < 1.0e-5);
    // Vertex (1, 0, 0) scaled by 2 and rotated +90 degrees about y points
    // toward -z.
    assert!((vertices[2] - (translation + Vec3::new(0.0, 0.0, -2.0))).length() < 1.0e-4);
}

#[test]
fn inside_out_scale_reverses_winding() {
    let shape = MeshShape::new(&tetrahedron_settings()).unwrap();
    let query = BoundingBox::new(Vec3::splat(-10.0), Vec3::splat(10.0));

    let mut plain = Vec::new();
    let mut ctx = shape.get_triangles_start(&query, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
    assert_eq!(shape.get_triangles_next(&mut ctx, 64, &mut plain, None), 4);

    let mirror = Vec3::new(-1.0, 1.0, 1.0);
    let mut mirrored = Vec::new();
    let mut ctx = shape.get_triangles_start(&query, Vec3::ZERO, Quat::IDENTITY, mirror);
    let mut materials = Vec::new();
    assert_eq!(
        shape.get_triangles_next(&mut ctx, 64, &mut mirrored, Some(&mut materials)),
        4
    );
    assert_eq!(materials.len(), 4);

    // Same triangles, mirrored and with the winding flipped: (v0, v1, v2)
    // becomes (-v0, -v2, -v1) componentwise on x.
    for t in 0..4 {
        let p = &plain[t * 3..t * 3 + 3];
        let m = &mirrored[t * 3..t * 3 + 3];
        assert_eq!(m[0], p[0] * mirror);
        assert_eq!(m[1], p[2] * mirror);
        assert_eq!(m[2], p[1] * mirror);
    }
}

// ── Serialization round trip ───────────────────────────────────────────────

#[test]
fn save_restore_round_trip() {
    let materials = vec![material("a"), material("b")];
    let shape = MeshShape::new(&quad_settings(materials)).unwrap();

    let mut bytes = Vec::new();
    shape.save_binary_state(&mut bytes).unwrap();
    let mut restored = MeshShape::restore_binary_state(
        &mut bytes.as_slice(),
        Arc::new(DefaultPhysicsMaterial),
    )
    .unwrap();
    restored.restore_material_state(&shape.save_material_state());

    assert_eq!(shape.get_stats().num_triangles, restored.get_stats().num_triangles);
    assert_eq!(shape.get_local_bounds(), restored.get_local_bounds());

    let ray = RayCast::new(Vec3::new(0.25, 1.0, 0.75), Vec3::new(0.0, -1.0, 0.0));
    let original_hit = shape.cast_ray(&ray, SubShapeIdCreator::new()).unwrap();
    let restored_hit = restored.cast_ray(&ray, SubShapeIdCreator::new()).unwrap();
    assert_eq!(original_hit.fraction.to_bits(), restored_hit.fraction.to_bits());
    assert_eq!(original_hit.sub_shape_id, restored_hit.sub_shape_id);
    assert_eq!(
        restored.get_material(restored_hit.sub_shape_id).debug_name(),
        "b"
    );

    // A truncated stream fails instead of producing a shape.
    assert!(MeshShape::restore_binary_state(
        &mut bytes[..bytes.len() - 4].as_ref(),
        Arc::new(DefaultPhysicsMaterial),
    )
    .is_err());
}

// ── Invariants ─────────────────────────────────────────────────────────────

#[test]
fn sub_shape_id_bit_budget_holds() {
    for settings in [
        quad_settings(Vec::new()),
        cube_settings(),
        grid_settings(16, 16),
    ] {
        let shape = MeshShape::new(&settings).unwrap();
        assert!(shape.get_sub_shape_id_bits() <= SubShapeId::MAX_BITS);
        assert!(shape.get_sub_shape_id_bits() >= NUM_TRIANGLE_BITS);
    }
}

#[test]
fn stats_count_matches_input() {
    let settings = grid_settings(16, 16);
    let expected = settings.indexed_triangles.len();
    let shape = MeshShape::new(&settings).unwrap();
    let stats = shape.get_stats();
    assert_eq!(stats.num_triangles, expected);
    assert!(stats.size_bytes > 0);
}
