use glam::DVec3;

use crate::spatial::bvh::BoundsProvider;
use crate::types::Aabb;

/// Relative Gram-determinant threshold below which a triangle counts as flat.
const DEGENERATE_EPS: f64 = 1e-12;

/// A mesh triangle with owned corner positions.
///
/// `normal` and `centroid` are derived once at construction. Moving a corner
/// afterwards requires building a new `Triangle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v1: DVec3,
    pub v2: DVec3,
    pub v3: DVec3,
    /// Ordinal of the triangle in the source index buffer.
    pub index: usize,
    normal: DVec3,
    centroid: DVec3,
    bounds: Aabb,
}

impl Triangle {
    pub fn new(v1: DVec3, v2: DVec3, v3: DVec3, index: usize) -> Self {
        let normal = (v2 - v1).cross(v3 - v1).normalize_or_zero();
        let centroid = (v1 + v2 + v3) / 3.0;
        let bounds = Aabb::from_points([v1, v2, v3]);
        Self {
            v1,
            v2,
            v3,
            index,
            normal,
            centroid,
            bounds,
        }
    }

    /// Unit face normal (CCW winding), zero for a degenerate triangle.
    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn centroid(&self) -> DVec3 {
        self.centroid
    }

    pub fn vertices(&self) -> [DVec3; 3] {
        [self.v1, self.v2, self.v3]
    }

    pub fn area(&self) -> f64 {
        (self.v2 - self.v1).cross(self.v3 - self.v1).length() * 0.5
    }

    /// Zero-area triangles have no usable plane.
    pub fn is_degenerate(&self) -> bool {
        self.normal == DVec3::ZERO
    }

    /// Signed distance from `point` to the supporting plane.
    pub fn plane_distance(&self, point: DVec3) -> f64 {
        (point - self.v1).dot(self.normal)
    }

    /// Orthogonal projection of `point` onto the supporting plane.
    pub fn project_to_plane(&self, point: DVec3) -> DVec3 {
        point - self.normal * self.plane_distance(point)
    }

    /// Barycentric weights `(alpha, beta, gamma)` of `point` with respect to
    /// `(v1, v2, v3)`, using the dot-product formulation. `point` is expected
    /// to lie in the plane. Returns `None` for a degenerate triangle.
    pub fn barycentric(&self, point: DVec3) -> Option<DVec3> {
        let e0 = self.v2 - self.v1;
        let e1 = self.v3 - self.v1;
        let e2 = point - self.v1;

        let d00 = e0.dot(e0);
        let d01 = e0.dot(e1);
        let d11 = e1.dot(e1);
        let d20 = e2.dot(e0);
        let d21 = e2.dot(e1);

        let denom = d00 * d11 - d01 * d01;
        if denom.abs() <= DEGENERATE_EPS * d00 * d11 {
            return None;
        }

        let beta = (d11 * d20 - d01 * d21) / denom;
        let gamma = (d00 * d21 - d01 * d20) / denom;
        Some(DVec3::new(1.0 - beta - gamma, beta, gamma))
    }

    /// Point reconstructed from barycentric weights.
    pub fn from_barycentric(&self, weights: DVec3) -> DVec3 {
        self.v1 * weights.x + self.v2 * weights.y + self.v3 * weights.z
    }

    /// Inside test for a point already lying in the plane.
    fn contains_projected(&self, projected: DVec3) -> bool {
        match self.barycentric(projected) {
            Some(w) => w.y >= 0.0 && w.z >= 0.0 && w.y + w.z <= 1.0,
            None => false,
        }
    }

    /// Smallest squared distance from `point` to the three edge segments.
    fn squared_distance_to_edges(&self, point: DVec3) -> f64 {
        [(self.v1, self.v2), (self.v2, self.v3), (self.v3, self.v1)]
            .into_iter()
            .map(|(start, end)| segment_squared_distance(point, start, end))
            .fold(f64::INFINITY, f64::min)
    }

    /// Squared distance from `point` to the closest point on the triangle.
    pub fn closest_squared_distance(&self, point: DVec3) -> f64 {
        let plane_distance = self.plane_distance(point);
        let projected = point - self.normal * plane_distance;
        if self.contains_projected(projected) {
            return plane_distance * plane_distance;
        }
        self.squared_distance_to_edges(point)
    }

    /// Like [`Triangle::closest_squared_distance`] but signed by the side of
    /// the plane `point` lies on.
    pub fn signed_distance(&self, point: DVec3) -> f64 {
        let plane_distance = self.plane_distance(point);
        let projected = point - self.normal * plane_distance;
        if self.contains_projected(projected) {
            return plane_distance;
        }
        let magnitude = self.squared_distance_to_edges(point).sqrt();
        if plane_distance < 0.0 {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl BoundsProvider for Triangle {
    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// Squared distance from `point` to segment `[start, end]`.
pub(crate) fn segment_squared_distance(point: DVec3, start: DVec3, end: DVec3) -> f64 {
    let dir = end - start;
    let len_sq = dir.length_squared();
    let to_start = point - start;
    if len_sq == 0.0 {
        return to_start.length_squared();
    }
    let t = (to_start.dot(dir) / len_sq).clamp(0.0, 1.0);
    (point - (start + dir * t)).length_squared()
}
