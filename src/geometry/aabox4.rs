//! Helpers that test four axis aligned boxes at once.
//!
//! The serialized tree stores the bounds of four children per node in
//! structure-of-arrays form: one `Vec4` per axis per plane, lane `i`
//! belonging to child `i`. Empty child slots carry inverted bounds
//! (min > max on every axis) and must fail every test here.

use glam::{BVec4A, UVec4, Vec3, Vec4};

use super::oriented_box::OrientedBox;
use super::ray::RayInvDirection;

/// Mask of lanes whose bounds are inverted on at least one axis.
///
/// Used to reject empty child slots before a scale is applied; a negative
/// scale component would otherwise turn an inverted sentinel into a huge
/// valid box.
#[inline(always)]
pub fn aabox4_invalid(
    bounds_min_x: Vec4,
    bounds_min_y: Vec4,
    bounds_min_z: Vec4,
    bounds_max_x: Vec4,
    bounds_max_y: Vec4,
    bounds_max_z: Vec4,
) -> BVec4A {
    bounds_min_x.cmpgt(bounds_max_x)
        | bounds_min_y.cmpgt(bounds_max_y)
        | bounds_min_z.cmpgt(bounds_max_z)
}

/// Scales four boxes componentwise, renormalizing min/max so a negative
/// scale still yields min <= max.
#[inline(always)]
pub fn aabox4_scale(
    scale: Vec3,
    bounds_min_x: Vec4,
    bounds_min_y: Vec4,
    bounds_min_z: Vec4,
    bounds_max_x: Vec4,
    bounds_max_y: Vec4,
    bounds_max_z: Vec4,
) -> (Vec4, Vec4, Vec4, Vec4, Vec4, Vec4) {
    let x1 = bounds_min_x * Vec4::splat(scale.x);
    let x2 = bounds_max_x * Vec4::splat(scale.x);
    let y1 = bounds_min_y * Vec4::splat(scale.y);
    let y2 = bounds_max_y * Vec4::splat(scale.y);
    let z1 = bounds_min_z * Vec4::splat(scale.z);
    let z2 = bounds_max_z * Vec4::splat(scale.z);
    (
        x1.min(x2),
        y1.min(y2),
        z1.min(z2),
        x1.max(x2),
        y1.max(y2),
        z1.max(z2),
    )
}

/// Enlarges four boxes by a half extent on every side.
#[inline(always)]
pub fn aabox4_enlarge_with_extent(
    extent: Vec3,
    bounds_min_x: &mut Vec4,
    bounds_min_y: &mut Vec4,
    bounds_min_z: &mut Vec4,
    bounds_max_x: &mut Vec4,
    bounds_max_y: &mut Vec4,
    bounds_max_z: &mut Vec4,
) {
    *bounds_min_x -= Vec4::splat(extent.x);
    *bounds_min_y -= Vec4::splat(extent.y);
    *bounds_min_z -= Vec4::splat(extent.z);
    *bounds_max_x += Vec4::splat(extent.x);
    *bounds_max_y += Vec4::splat(extent.y);
    *bounds_max_z += Vec4::splat(extent.z);
}

/// Tests a ray against four boxes, returning the entry fraction per lane or
/// `f32::MAX` for lanes the ray misses. Lanes with inverted bounds miss.
pub fn ray_aabox4(
    origin: Vec3,
    inv_direction: &RayInvDirection,
    bounds_min_x: Vec4,
    bounds_min_y: Vec4,
    bounds_min_z: Vec4,
    bounds_max_x: Vec4,
    bounds_max_y: Vec4,
    bounds_max_z: Vec4,
) -> Vec4 {
    let mut t_min = Vec4::splat(-f32::MAX);
    let mut t_max = Vec4::splat(f32::MAX);
    let mut no_hit = aabox4_invalid(
        bounds_min_x,
        bounds_min_y,
        bounds_min_z,
        bounds_max_x,
        bounds_max_y,
        bounds_max_z,
    );

    let axes = [
        (origin.x, inv_direction.inv_direction.x, inv_direction.is_parallel[0], bounds_min_x, bounds_max_x),
        (origin.y, inv_direction.inv_direction.y, inv_direction.is_parallel[1], bounds_min_y, bounds_max_y),
        (origin.z, inv_direction.inv_direction.z, inv_direction.is_parallel[2], bounds_min_z, bounds_max_z),
    ];
    for (o, inv, parallel, lo, hi) in axes {
        if parallel {
            let o4 = Vec4::splat(o);
            no_hit |= lo.cmpgt(o4) | hi.cmplt(o4);
        } else {
            let t1 = (lo - Vec4::splat(o)) * Vec4::splat(inv);
            let t2 = (hi - Vec4::splat(o)) * Vec4::splat(inv);
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
    }

    no_hit |= t_min.cmpgt(t_max) | t_max.cmplt(Vec4::ZERO);
    Vec4::select(no_hit, Vec4::splat(f32::MAX), t_min)
}

/// Tests an oriented box against four axis aligned boxes with a separating
/// axis test over the six face normals. The test is conservative: it can
/// report an overlap for a pair that is narrowly separated on a cross
/// product axis, which only costs a few extra per-triangle tests downstream.
pub fn aabox4_vs_box(
    box_: &OrientedBox,
    bounds_min_x: Vec4,
    bounds_min_y: Vec4,
    bounds_min_z: Vec4,
    bounds_max_x: Vec4,
    bounds_max_y: Vec4,
    bounds_max_z: Vec4,
) -> [bool; 4] {
    let orientation = &box_.orientation;
    let center = orientation.w_axis.truncate();
    let axis_x = orientation.x_axis.truncate();
    let axis_y = orientation.y_axis.truncate();
    let axis_z = orientation.z_axis.truncate();
    let he = box_.half_extents;

    // Oriented box projected onto the three world axes.
    let radius = axis_x.abs() * he.x + axis_y.abs() * he.y + axis_z.abs() * he.z;
    let mut overlaps = (Vec4::splat(center.x - radius.x)).cmple(bounds_max_x)
        & (Vec4::splat(center.x + radius.x)).cmpge(bounds_min_x)
        & (Vec4::splat(center.y - radius.y)).cmple(bounds_max_y)
        & (Vec4::splat(center.y + radius.y)).cmpge(bounds_min_y)
        & (Vec4::splat(center.z - radius.z)).cmple(bounds_max_z)
        & (Vec4::splat(center.z + radius.z)).cmpge(bounds_min_z);

    // The four AABBs projected onto the oriented box axes.
    let center_x4 = 0.5 * (bounds_min_x + bounds_max_x);
    let center_y4 = 0.5 * (bounds_min_y + bounds_max_y);
    let center_z4 = 0.5 * (bounds_min_z + bounds_max_z);
    let extent_x4 = 0.5 * (bounds_max_x - bounds_min_x);
    let extent_y4 = 0.5 * (bounds_max_y - bounds_min_y);
    let extent_z4 = 0.5 * (bounds_max_z - bounds_min_z);

    for (axis, box_radius) in [(axis_x, he.x), (axis_y, he.y), (axis_z, he.z)] {
        let projected_center = center_x4 * Vec4::splat(axis.x)
            + center_y4 * Vec4::splat(axis.y)
            + center_z4 * Vec4::splat(axis.z);
        let projected_radius = extent_x4 * Vec4::splat(axis.x.abs())
            + extent_y4 * Vec4::splat(axis.y.abs())
            + extent_z4 * Vec4::splat(axis.z.abs());
        let distance = (projected_center - Vec4::splat(axis.dot(center))).abs();
        overlaps &= distance.cmple(projected_radius + Vec4::splat(box_radius));
    }

    [
        overlaps.test(0),
        overlaps.test(1),
        overlaps.test(2),
        overlaps.test(3),
    ]
}

/// Sorts four lanes by descending distance, drops lanes whose distance is
/// not below `early_out_fraction`, and shifts the survivors to the front of
/// `properties` (descending order preserved, so the last survivor is the
/// closest). Surviving distances are written to `distance_out`.
/// Returns the survivor count.
#[inline]
pub fn sort4_reverse_and_shift(
    distance: Vec4,
    properties: &mut UVec4,
    early_out_fraction: f32,
    distance_out: &mut [f32],
) -> usize {
    let mut d = distance.to_array();
    let mut p = properties.to_array();

    // Five comparator sorting network, largest distance first.
    for (a, b) in [(0, 1), (2, 3), (0, 2), (1, 3), (1, 2)] {
        if d[a] < d[b] {
            d.swap(a, b);
            p.swap(a, b);
        }
    }

    let mut survivors = 0;
    for value in d {
        if value < early_out_fraction {
            survivors += 1;
        }
    }
    let shift = 4 - survivors;
    for i in 0..survivors {
        d[i] = d[i + shift];
        p[i] = p[i + shift];
    }
    *properties = UVec4::from_array(p);
    distance_out[..survivors].copy_from_slice(&d[..survivors]);
    survivors
}

/// Moves the properties of hit lanes to the front, preserving their order.
/// Returns the hit count.
#[inline]
pub fn partition_hits_first(hits: [bool; 4], properties: &mut UVec4) -> usize {
    let p = properties.to_array();
    let mut out = [0u32; 4];
    let mut count = 0;
    for i in 0..4 {
        if hits[i] {
            out[count] = p[i];
            count += 1;
        }
    }
    let mut tail = count;
    for i in 0..4 {
        if !hits[i] {
            out[tail] = p[i];
            tail += 1;
        }
    }
    *properties = UVec4::from_array(out);
    count
}
