use std::collections::{HashMap, HashSet};

use glam::DVec3;
use tracing::{debug, info, warn};

use crate::config::CarveConfig;
use crate::error::{CarveError, Result};
use crate::surface::graph::SurfaceGraph;
use crate::surface::projector::{PointProjector, ProjectedPoint};
use crate::surface::subdivide::{MeshEdit, materialize_projected_points};
use crate::types::{IndexedMesh, compact_mesh};

/// A traced path over mesh vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfacePath {
    /// Vertex indices in walk order; a joint between two legs appears once.
    pub vertices: Vec<u32>,
    /// Positions of `vertices`.
    pub points: Vec<DVec3>,
    /// Sum of edge lengths along the path.
    pub length: f64,
    /// Polyline points that projected, with their inserted vertex indices.
    pub anchors: Vec<ProjectedPoint>,
}

impl SurfacePath {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether the path returns to its first vertex.
    pub fn is_closed(&self) -> bool {
        self.vertices.len() > 2 && self.vertices.first() == self.vertices.last()
    }
}

/// Composes projection, vertex insertion and shortest paths.
#[derive(Debug, Clone, Default)]
pub struct GeodesicSplit {
    config: CarveConfig,
}

impl GeodesicSplit {
    pub fn new(config: CarveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CarveConfig {
        &self.config
    }

    /// Project polyline points onto `mesh`. Points that miss are dropped.
    pub fn project_polyline(
        &self,
        mesh: &IndexedMesh,
        polyline: &[DVec3],
    ) -> Result<Vec<ProjectedPoint>> {
        if polyline.len() < 2 {
            return Ok(Vec::new());
        }
        let projector = PointProjector::new(
            mesh,
            self.config.tree,
            self.config.search,
            self.config.projection,
        )?;
        Ok(projector.project_polyline(polyline))
    }

    /// Insert projected points as mesh vertices.
    pub fn materialize(
        &self,
        mesh: &mut IndexedMesh,
        projected: &mut [ProjectedPoint],
    ) -> Result<Vec<MeshEdit>> {
        materialize_projected_points(mesh, projected, self.config.projection.epsilon)
    }

    /// Shortest edge path between two vertices on a fresh graph of `mesh`.
    pub fn geodesic_path(&self, mesh: &IndexedMesh, start: u32, end: u32) -> Result<Vec<u32>> {
        SurfaceGraph::build_from(mesh)?.shortest_path(start, end)
    }

    /// Project `polyline`, insert its points into `mesh` and join consecutive
    /// points with shortest paths.
    ///
    /// Fewer than two input points yields an empty path and leaves the mesh
    /// alone. If fewer than two points land on the surface, or any leg has
    /// no path, the mesh is left unchanged and an error is returned.
    pub fn trace(&self, mesh: &mut IndexedMesh, polyline: &[DVec3]) -> Result<SurfacePath> {
        if polyline.len() < 2 {
            return Ok(SurfacePath::default());
        }

        let mut anchors = self.project_polyline(mesh, polyline)?;
        if anchors.len() < 2 {
            return Err(CarveError::NotFound(format!(
                "only {} of {} polyline points landed on the surface",
                anchors.len(),
                polyline.len()
            )));
        }
        if anchors.len() < polyline.len() {
            warn!(
                dropped = polyline.len() - anchors.len(),
                "Some polyline points were dropped"
            );
        }

        let mut work = mesh.clone();
        let mut graph = SurfaceGraph::build_from(&work)?;
        let edits = self.materialize(&mut work, &mut anchors)?;
        for edit in &edits {
            graph.apply_edit(&work, edit);
        }

        let stops: Vec<u32> = anchors.iter().filter_map(|a| a.vertex_index).collect();
        let mut vertices: Vec<u32> = Vec::new();
        let mut length = 0.0;
        for leg in stops.windows(2) {
            let (start, end) = (leg[0], leg[1]);
            if start == end {
                continue;
            }
            let (path, leg_length) = graph.shortest_path_with_length(start, end)?;
            let skip = usize::from(vertices.last() == Some(&start));
            vertices.extend_from_slice(&path[skip..]);
            length += leg_length;
        }
        if vertices.is_empty() {
            vertices.extend(stops.first().copied());
        }

        let points = vertices.iter().map(|&v| work.position(v as usize)).collect();
        *mesh = work;

        info!(
            anchors = anchors.len(),
            vertices = vertices.len(),
            length,
            "Traced surface path"
        );
        Ok(SurfacePath {
            vertices,
            points,
            length,
            anchors,
        })
    }
}

/// Cut `mesh` into two meshes along a closed vertex path.
///
/// Triangles are grouped by flooding across edges that are not on the path.
/// The group holding triangle 0 becomes the first mesh and every other
/// triangle the second; vertices on the cut appear in both. The path must be
/// closed (first vertex repeated at the end), have at least three distinct
/// vertices, follow existing mesh edges and actually separate the surface.
pub fn partition_along_path(
    mesh: &IndexedMesh,
    path: &[u32],
) -> Result<(IndexedMesh, IndexedMesh)> {
    mesh.validate()?;

    if path.len() < 4 || path.first() != path.last() {
        return Err(CarveError::Input(
            "partition needs a closed path (first vertex repeated at the end)".into(),
        ));
    }
    let distinct: HashSet<u32> = path.iter().copied().collect();
    if distinct.len() < 3 {
        return Err(CarveError::Input(
            "partition path needs at least three distinct vertices".into(),
        ));
    }

    let mut edge_triangles: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (t, [a, b, c]) in mesh.triangles().enumerate() {
        for (s, e) in [(a, b), (b, c), (c, a)] {
            edge_triangles.entry(edge_key(s, e)).or_default().push(t);
        }
    }

    let cut: HashSet<(u32, u32)> = path.windows(2).map(|w| edge_key(w[0], w[1])).collect();
    if let Some(&(a, b)) = cut.iter().find(|e| !edge_triangles.contains_key(e)) {
        return Err(CarveError::Input(format!(
            "path step ({a}, {b}) is not a mesh edge"
        )));
    }

    let triangle_count = mesh.triangle_count();
    let mut on_first_side = vec![false; triangle_count];
    on_first_side[0] = true;
    let mut stack = vec![0usize];
    while let Some(t) = stack.pop() {
        let [a, b, c] = mesh.triangle(t);
        for (s, e) in [(a, b), (b, c), (c, a)] {
            let key = edge_key(s, e);
            if cut.contains(&key) {
                continue;
            }
            for &other in &edge_triangles[&key] {
                if !on_first_side[other] {
                    on_first_side[other] = true;
                    stack.push(other);
                }
            }
        }
    }

    let mut first = Vec::new();
    let mut second = Vec::new();
    for (t, tri) in mesh.triangles().enumerate() {
        if on_first_side[t] {
            first.extend_from_slice(&tri);
        } else {
            second.extend_from_slice(&tri);
        }
    }

    if second.is_empty() {
        return Err(CarveError::Input(
            "path does not separate the surface".into(),
        ));
    }

    debug!(
        first = first.len() / 3,
        second = second.len() / 3,
        cut_edges = cut.len(),
        "Partitioned mesh along path"
    );
    Ok((compact_mesh(&first, mesh), compact_mesh(&second, mesh)))
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{cube, grid};
    use approx::assert_relative_eq;

    #[test]
    fn trace_joins_consecutive_points() {
        let mut mesh = grid(4);
        let split = GeodesicSplit::default();
        let polyline = [
            DVec3::new(0.1, 0.05, 0.2),
            DVec3::new(0.6, 0.4, 0.2),
            DVec3::new(0.9, 0.85, 0.2),
        ];
        let vertices_before = mesh.vertex_count();

        let path = split.trace(&mut mesh, &polyline).unwrap();

        assert_eq!(path.anchors.len(), 3);
        assert_eq!(mesh.vertex_count(), vertices_before + 3);
        let first = path.anchors[0].vertex_index.unwrap();
        let last = path.anchors[2].vertex_index.unwrap();
        assert_eq!(path.vertices.first(), Some(&first));
        assert_eq!(path.vertices.last(), Some(&last));
        assert!(path.vertices.contains(&path.anchors[1].vertex_index.unwrap()));
        assert!(path.vertices.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(path.points.len(), path.vertices.len());

        let walked: f64 = path.points.windows(2).map(|w| w[0].distance(w[1])).sum();
        assert_relative_eq!(walked, path.length, epsilon = 1e-9);
        let straight = path.points[0].distance(*path.points.last().unwrap());
        assert!(path.length >= straight - 1e-9);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn trace_short_polyline_is_empty() {
        let mut mesh = grid(2);
        let before = mesh.clone();
        let path = GeodesicSplit::default()
            .trace(&mut mesh, &[DVec3::new(0.2, 0.1, 0.0)])
            .unwrap();
        assert!(path.is_empty());
        assert_eq!(mesh, before);
    }

    #[test]
    fn trace_off_surface_is_not_found() {
        let mut mesh = grid(2);
        let before = mesh.clone();
        let split = GeodesicSplit::new(CarveConfig {
            search: crate::config::SearchConfig {
                max_radius: 2.0,
                ..Default::default()
            },
            ..Default::default()
        });
        let err = split
            .trace(&mut mesh, &[DVec3::splat(50.0), DVec3::new(0.2, 0.1, 0.0)])
            .unwrap_err();
        assert!(matches!(err, CarveError::NotFound(_)));
        assert_eq!(mesh, before);
    }

    #[test]
    fn geodesic_path_on_grid() {
        let mesh = grid(2);
        let path = GeodesicSplit::default().geodesic_path(&mesh, 0, 8).unwrap();
        assert_eq!(path, vec![0, 4, 8]);
    }

    #[test]
    fn partition_cube_along_bottom_face() {
        let mesh = cube();
        let (bottom, rest) = partition_along_path(&mesh, &[0, 1, 2, 3, 0]).unwrap();
        assert_eq!(bottom.triangle_count(), 2);
        assert_eq!(bottom.vertex_count(), 4);
        assert_eq!(rest.triangle_count(), 10);
        assert_eq!(rest.vertex_count(), 8);
        assert_relative_eq!(
            bottom.surface_area() + rest.surface_area(),
            mesh.surface_area(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn partition_grid_around_star() {
        let mesh = grid(2);
        let (star, rest) = partition_along_path(&mesh, &[0, 1, 5, 8, 7, 3, 0]).unwrap();
        assert_eq!(star.triangle_count(), 6);
        assert_eq!(rest.triangle_count(), 2);
        assert!(star.has_normals());
    }

    #[test]
    fn partition_rejects_bad_paths() {
        let mesh = grid(1);
        // Open path.
        assert!(partition_along_path(&mesh, &[0, 1, 3]).is_err());
        // Too few distinct vertices.
        assert!(partition_along_path(&mesh, &[0, 1, 0, 1, 0]).is_err());
        // Step 1-2 is not an edge.
        assert!(partition_along_path(&mesh, &[0, 1, 2, 0]).is_err());
        // The outer boundary does not separate anything.
        assert!(partition_along_path(&mesh, &[0, 1, 3, 2, 0]).is_err());
    }
}
