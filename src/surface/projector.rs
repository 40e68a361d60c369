use glam::DVec3;
use tracing::{debug, warn};

use crate::config::{ProjectionConfig, SearchConfig, TreeConfig};
use crate::error::Result;
use crate::spatial::TriangleIndex;
use crate::types::{IndexedMesh, Triangle};

/// Where a point lands on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Point as supplied by the caller.
    pub source: DVec3,
    /// Orthogonal projection onto the face plane.
    pub point: DVec3,
    /// Triangle ordinal in the index buffer.
    pub face_id: usize,
    /// Weights `(alpha, beta, gamma)` of the face corners, summing to 1.
    pub barycentric: DVec3,
    pub is_on_edge: bool,
    /// Mesh vertex indices of the edge the point lies on.
    pub edge_vertices: Option<[u32; 2]>,
    /// Mesh vertex created for this point, set once it is materialized.
    pub vertex_index: Option<u32>,
}

/// How a set of barycentric weights relates to its triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Interior,
    /// On the edge opposite the given corner (0, 1 or 2).
    Edge(usize),
    Outside,
}

/// Classify barycentric weights with tolerance `epsilon`.
///
/// Interior requires every weight `>= epsilon`; on-edge requires exactly one
/// weight within `epsilon` of zero with the other two positive.
pub(crate) fn classify(weights: DVec3, epsilon: f64) -> Placement {
    let w = weights.to_array();
    if (w.iter().sum::<f64>() - 1.0).abs() > epsilon {
        return Placement::Outside;
    }
    if w.iter().all(|&x| x >= epsilon) {
        return Placement::Interior;
    }
    let near_zero: Vec<usize> = (0..3).filter(|&i| w[i].abs() < epsilon).collect();
    match near_zero.as_slice() {
        [i] if (0..3).all(|j| j == *i || w[j] >= epsilon) => Placement::Edge(*i),
        _ => Placement::Outside,
    }
}

/// Corners (local 0..3) spanning the edge opposite `corner`.
pub(crate) fn edge_opposite(corner: usize) -> [usize; 2] {
    match corner {
        0 => [1, 2],
        1 => [2, 0],
        _ => [0, 1],
    }
}

/// Projects points onto a mesh through a [`TriangleIndex`].
///
/// Holds a shared borrow of the mesh, so it must be dropped before the mesh
/// is edited.
pub struct PointProjector<'m> {
    mesh: &'m IndexedMesh,
    index: TriangleIndex,
    config: ProjectionConfig,
}

impl<'m> PointProjector<'m> {
    pub fn new(
        mesh: &'m IndexedMesh,
        tree: TreeConfig,
        search: SearchConfig,
        config: ProjectionConfig,
    ) -> Result<Self> {
        let index = TriangleIndex::build(mesh, tree, search)?;
        Ok(Self {
            mesh,
            index,
            config,
        })
    }

    /// Projector with default parameters.
    pub fn from_mesh(mesh: &'m IndexedMesh) -> Result<Self> {
        Self::new(
            mesh,
            TreeConfig::default(),
            SearchConfig::default(),
            ProjectionConfig::default(),
        )
    }

    pub fn index(&self) -> &TriangleIndex {
        &self.index
    }

    /// Project `point` onto its nearest triangle.
    ///
    /// Returns `None` when no triangle is found or when the projection falls
    /// outside the nearest triangle (including exactly on one of its corners).
    pub fn project(&self, point: DVec3) -> Option<ProjectedPoint> {
        let triangle = self.index.find_closest_triangle(point)?;
        self.project_onto(triangle, point)
    }

    fn project_onto(&self, triangle: &Triangle, point: DVec3) -> Option<ProjectedPoint> {
        let projected = triangle.project_to_plane(point);
        let weights = triangle.barycentric(projected)?;
        let corners = self.mesh.triangle(triangle.index);

        let (is_on_edge, edge_vertices) = match classify(weights, self.config.epsilon) {
            Placement::Interior => (false, None),
            Placement::Edge(corner) => {
                let [a, b] = edge_opposite(corner);
                (true, Some([corners[a], corners[b]]))
            }
            Placement::Outside => return None,
        };

        Some(ProjectedPoint {
            source: point,
            point: projected,
            face_id: triangle.index,
            barycentric: weights,
            is_on_edge,
            edge_vertices,
            vertex_index: None,
        })
    }

    /// Project every polyline point, dropping the ones that fail.
    ///
    /// Fewer than two input points yields an empty result.
    pub fn project_polyline(&self, points: &[DVec3]) -> Vec<ProjectedPoint> {
        if points.len() < 2 {
            return Vec::new();
        }
        let projected: Vec<ProjectedPoint> = points
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| {
                let result = self.project(p);
                if result.is_none() {
                    warn!(index = i, ?p, "Polyline point did not project onto the surface");
                }
                result
            })
            .collect();
        debug!(
            input = points.len(),
            projected = projected.len(),
            "Projected polyline"
        );
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{grid, tetrahedron};
    use approx::assert_relative_eq;

    #[test]
    fn classify_weights() {
        let eps = 1e-6;
        assert_eq!(classify(DVec3::splat(1.0 / 3.0), eps), Placement::Interior);
        assert_eq!(classify(DVec3::new(0.0, 0.5, 0.5), eps), Placement::Edge(0));
        assert_eq!(classify(DVec3::new(0.5, 0.0, 0.5), eps), Placement::Edge(1));
        assert_eq!(classify(DVec3::new(0.5, 0.5, 0.0), eps), Placement::Edge(2));
        assert_eq!(classify(DVec3::new(1.0, 0.0, 0.0), eps), Placement::Outside);
        assert_eq!(classify(DVec3::new(-0.1, 0.6, 0.5), eps), Placement::Outside);
    }

    #[test]
    fn centroid_projects_to_interior() {
        let mesh = tetrahedron();
        let projector = PointProjector::from_mesh(&mesh).unwrap();
        let [a, b, c] = mesh.triangle_positions(2);
        let centroid = (a + b + c) / 3.0;

        let p = projector.project(centroid).unwrap();
        assert_eq!(p.face_id, 2);
        assert!(!p.is_on_edge);
        assert!(p.edge_vertices.is_none());
        assert!(p.vertex_index.is_none());
        for w in p.barycentric.to_array() {
            assert_relative_eq!(w, 1.0 / 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn point_above_surface_lands_on_plane() {
        let mesh = grid(4);
        let projector = PointProjector::from_mesh(&mesh).unwrap();
        let p = projector.project(DVec3::new(0.3, 0.1, 0.5)).unwrap();
        assert_relative_eq!(p.point.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.point.x, 0.3, epsilon = 1e-9);
        assert_eq!(p.source, DVec3::new(0.3, 0.1, 0.5));
        let sum: f64 = p.barycentric.to_array().iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn point_on_shared_edge_reports_edge_vertices() {
        let mesh = grid(1);
        let projector = PointProjector::from_mesh(&mesh).unwrap();
        // The diagonal of the single quad runs from vertex 0 to vertex 3.
        let p = projector.project(DVec3::new(0.5, 0.5, 0.0)).unwrap();
        assert!(p.is_on_edge);
        let mut edge = p.edge_vertices.unwrap();
        edge.sort();
        assert_eq!(edge, [0, 3]);
    }

    #[test]
    fn polyline_drops_failed_points() {
        let mesh = grid(2);
        let projector = PointProjector::from_mesh(&mesh).unwrap();
        // A mesh corner projects onto a triangle corner and is rejected.
        let points = [
            DVec3::new(0.2, 0.1, 0.0),
            DVec3::ZERO,
            DVec3::new(0.8, 0.9, 0.0),
        ];
        let projected = projector.project_polyline(&points);
        assert_eq!(projected.len(), 2);
        assert!(projector.project_polyline(&points[..1]).is_empty());
    }
}
