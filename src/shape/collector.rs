use super::sub_shape_id::SubShapeId;

/// Result of a ray cast against a mesh.
#[derive(Clone, Copy, Debug)]
pub struct RayCastResult {
    /// Hit fraction in units of the ray direction vector.
    pub fraction: f32,
    /// Path of the triangle that was hit.
    pub sub_shape_id: SubShapeId,
}

impl Default for RayCastResult {
    fn default() -> Self {
        // Hits at the very end of the ray are still reported; anything
        // beyond is not.
        Self {
            fraction: 1.0 + f32::EPSILON,
            sub_shape_id: SubShapeId::EMPTY,
        }
    }
}

/// Result of a point containment query.
#[derive(Clone, Copy, Debug)]
pub struct CollidePointResult {
    /// Path of a triangle the parity ray passed through.
    pub sub_shape_id: SubShapeId,
}

/// How ray casts treat triangles facing away from the ray.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BackFaceMode {
    /// Triangles whose front side faces away from the ray are skipped.
    #[default]
    IgnoreBackFaces,
    /// Back facing triangles report hits too.
    CollideWithBackFaces,
}

/// Settings for collecting ray casts.
#[derive(Clone, Copy, Debug, Default)]
pub struct RayCastSettings {
    pub back_face_mode: BackFaceMode,
}

/// Receives hits during a query.
///
/// `early_out_fraction` bounds the hits the caller is still interested in;
/// the traversal culls nodes and triangles at or beyond it. A collector
/// that lowers it as hits arrive narrows the remaining search.
pub trait ICollector {
    type Result;

    fn add_hit(&mut self, result: Self::Result);

    /// True once the query can stop entirely.
    #[inline(always)]
    fn should_early_out(&self) -> bool {
        false
    }

    /// Fraction beyond which hits are no longer interesting.
    #[inline(always)]
    fn early_out_fraction(&self) -> f32 {
        f32::MAX
    }
}

/// Collects every hit in encounter order.
#[derive(Debug)]
pub struct AllHitCollector<R> {
    pub hits: Vec<R>,
}

impl<R> Default for AllHitCollector<R> {
    fn default() -> Self {
        Self { hits: Vec::new() }
    }
}

impl<R> ICollector for AllHitCollector<R> {
    type Result = R;

    #[inline(always)]
    fn add_hit(&mut self, result: R) {
        self.hits.push(result);
    }
}

/// Keeps only the closest ray hit and narrows the search as it goes.
#[derive(Debug, Default)]
pub struct ClosestHitCollector {
    pub hit: Option<RayCastResult>,
}

impl ICollector for ClosestHitCollector {
    type Result = RayCastResult;

    #[inline]
    fn add_hit(&mut self, result: RayCastResult) {
        if result.fraction < self.early_out_fraction() {
            self.hit = Some(result);
        }
    }

    #[inline(always)]
    fn early_out_fraction(&self) -> f32 {
        self.hit.map_or(f32::MAX, |hit| hit.fraction)
    }
}

/// Stops at the first hit.
#[derive(Debug)]
pub struct AnyHitCollector<R> {
    pub hit: Option<R>,
}

impl<R> Default for AnyHitCollector<R> {
    fn default() -> Self {
        Self { hit: None }
    }
}

impl<R> ICollector for AnyHitCollector<R> {
    type Result = R;

    #[inline(always)]
    fn add_hit(&mut self, result: R) {
        if self.hit.is_none() {
            self.hit = Some(result);
        }
    }

    #[inline(always)]
    fn should_early_out(&self) -> bool {
        self.hit.is_some()
    }
}
