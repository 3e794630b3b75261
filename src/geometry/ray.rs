use glam::Vec3;

/// A ray starting at `origin` and extending over the full length of `direction`.
/// Hit fractions are expressed in units of the direction vector, so a fraction
/// of 1 lands exactly on `origin + direction`.
#[derive(Clone, Copy, Debug)]
pub struct RayCast {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl RayCast {
    #[inline(always)]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point on the ray at the given fraction.
    #[inline(always)]
    pub fn point_at(&self, fraction: f32) -> Vec3 {
        self.origin + fraction * self.direction
    }
}

/// Reciprocal ray direction with per-axis parallel flags, precomputed once per query.
#[derive(Clone, Copy, Debug)]
pub struct RayInvDirection {
    pub inv_direction: Vec3,
    pub is_parallel: [bool; 3],
}

impl RayInvDirection {
    pub fn new(direction: Vec3) -> Self {
        const EPSILON: f32 = 1.0e-20;
        let parallel = [
            direction.x.abs() <= EPSILON,
            direction.y.abs() <= EPSILON,
            direction.z.abs() <= EPSILON,
        ];
        // The reciprocal of a parallel axis is never read; zero keeps it finite.
        Self {
            inv_direction: Vec3::new(
                if parallel[0] { 0.0 } else { 1.0 / direction.x },
                if parallel[1] { 0.0 } else { 1.0 / direction.y },
                if parallel[2] { 0.0 } else { 1.0 / direction.z },
            ),
            is_parallel: parallel,
        }
    }
}

/// Tests a ray against a single axis aligned box, returning the entry fraction
/// or `f32::MAX` when the ray misses. An origin inside the box yields a
/// non-positive entry fraction.
pub fn ray_aabox(origin: Vec3, inv: &RayInvDirection, bounds_min: Vec3, bounds_max: Vec3) -> f32 {
    let mut t_min = -f32::MAX;
    let mut t_max = f32::MAX;
    for axis in 0..3 {
        let (o, lo, hi) = (origin[axis], bounds_min[axis], bounds_max[axis]);
        if lo > hi {
            return f32::MAX;
        }
        if inv.is_parallel[axis] {
            if o < lo || o > hi {
                return f32::MAX;
            }
        } else {
            let d = inv.inv_direction[axis];
            let t1 = (lo - o) * d;
            let t2 = (hi - o) * d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
    }
    if t_min > t_max || t_max < 0.0 {
        f32::MAX
    } else {
        t_min
    }
}

/// Intersects a ray with the triangle (v0, v1, v2).
/// The test is two-sided; back face culling is a concern of the caller.
/// Returns the hit fraction in units of `direction`, or `f32::MAX` on a miss.
#[inline]
pub fn ray_triangle(origin: Vec3, direction: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> f32 {
    const EPSILON: f32 = 1.0e-12;

    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPSILON {
        return f32::MAX;
    }
    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(p) * inv_det;
    if u < 0.0 || u > 1.0 {
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
