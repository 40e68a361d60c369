use std::collections::{HashMap, HashSet};

use glam::DVec3;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::IndexedMesh;

/// One closed run of boundary positions.
///
/// Points are ordered so that walking them runs against the winding of the
/// triangles along the boundary: a triangle `(p[i], p[i + 1], x)` built on
/// the loop faces the same way as its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLoop {
    pub points: Vec<DVec3>,
}

impl BoundaryLoop {
    /// Number of edges (equal to the number of points).
    pub fn edge_count(&self) -> usize {
        self.points.len()
    }

    pub fn centroid(&self) -> DVec3 {
        if self.points.is_empty() {
            return DVec3::ZERO;
        }
        self.points.iter().sum::<DVec3>() / self.points.len() as f64
    }

    /// Sum of edge lengths around the loop.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(self.points[(i + 1) % n]))
            .sum()
    }
}

/// Edges used by exactly one triangle, directed as they appear in it.
///
/// Edges used by more than two triangles (non-manifold) are not reported.
pub fn find_boundary_edges(mesh: &IndexedMesh) -> Vec<[u32; 2]> {
    let mut counts: HashMap<(u32, u32), (u32, [u32; 2])> = HashMap::new();
    for [a, b, c] in mesh.triangles() {
        for (s, e) in [(a, b), (b, c), (c, a)] {
            let entry = counts.entry((s.min(e), s.max(e))).or_insert((0, [s, e]));
            entry.0 += 1;
        }
    }

    let mut edges: Vec<[u32; 2]> = counts
        .into_values()
        .filter(|(count, _)| *count == 1)
        .map(|(_, edge)| edge)
        .collect();
    edges.sort_unstable();
    edges
}

/// Boundary edges as position pairs, for drawing.
pub fn boundary_edge_segments(mesh: &IndexedMesh) -> Vec<[DVec3; 2]> {
    find_boundary_edges(mesh)
        .into_iter()
        .map(|[a, b]| [mesh.position(a as usize), mesh.position(b as usize)])
        .collect()
}

/// Hashable identity of a position. Signed zeros compare equal.
fn point_key(p: DVec3) -> [u64; 3] {
    [
        (p.x + 0.0).to_bits(),
        (p.y + 0.0).to_bits(),
        (p.z + 0.0).to_bits(),
    ]
}

/// Chain boundary segments into loops by shared positions.
///
/// Vertices with the same coordinates are treated as one, so unwelded
/// meshes still produce connected loops. Each walk follows the first
/// unvisited neighbour that is not the previous point, and stops at a dead
/// end or a visited point. Walks of two points or fewer are dropped.
///
/// Two holes touching at a single vertex come back as two loops, and only
/// the first walk through that vertex keeps it.
pub fn group_into_loops(segments: &[[DVec3; 2]]) -> Vec<BoundaryLoop> {
    let mut neighbors: HashMap<[u64; 3], Vec<DVec3>> = HashMap::new();
    let mut directed: HashSet<([u64; 3], [u64; 3])> = HashSet::new();
    for &[p0, p1] in segments {
        let (k0, k1) = (point_key(p0), point_key(p1));
        neighbors.entry(k0).or_default().push(p1);
        neighbors.entry(k1).or_default().push(p0);
        directed.insert((k0, k1));
    }

    let mut visited: HashSet<[u64; 3]> = HashSet::new();
    let mut loops = Vec::new();

    for &[start, _] in segments {
        if visited.contains(&point_key(start)) {
            continue;
        }

        let mut points = Vec::new();
        let mut current = start;
        let mut previous: Option<[u64; 3]> = None;
        loop {
            let key = point_key(current);
            visited.insert(key);
            points.push(current);

            let next = neighbors.get(&key).and_then(|candidates| {
                candidates.iter().copied().find(|&n| {
                    let nk = point_key(n);
                    Some(nk) != previous && !visited.contains(&nk)
                })
            });
            match next {
                Some(n) => {
                    previous = Some(key);
                    current = n;
                }
                None => break,
            }
        }

        if points.len() <= 2 {
            debug!(points = points.len(), "Dropping short boundary walk");
            continue;
        }

        // Run against the owning triangles' winding.
        if directed.contains(&(point_key(points[0]), point_key(points[1]))) {
            points.reverse();
        }
        loops.push(BoundaryLoop { points });
    }

    loops
}

/// Every boundary loop of `mesh`.
pub fn extract_boundary_loops(mesh: &IndexedMesh) -> Result<Vec<BoundaryLoop>> {
    mesh.validate()?;
    let segments = boundary_edge_segments(mesh);
    let loops = group_into_loops(&segments);
    info!(
        boundary_edges = segments.len(),
        loops = loops.len(),
        sizes = ?loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>(),
        "Extracted boundary loops"
    );
    Ok(loops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{cube, grid, tetrahedron};
    use approx::assert_relative_eq;

    fn without_triangle(mesh: &IndexedMesh, t: usize) -> IndexedMesh {
        let mut out = mesh.clone();
        out.indices.drain(t * 3..t * 3 + 3);
        out
    }

    #[test]
    fn closed_meshes_have_no_loops() {
        assert!(find_boundary_edges(&tetrahedron()).is_empty());
        assert!(extract_boundary_loops(&tetrahedron()).unwrap().is_empty());
        assert!(extract_boundary_loops(&cube()).unwrap().is_empty());
    }

    #[test]
    fn removed_triangle_leaves_one_triangular_loop() {
        let mesh = without_triangle(&tetrahedron(), 2);
        let edges = find_boundary_edges(&mesh);
        assert_eq!(edges.len(), 3);

        let loops = extract_boundary_loops(&mesh).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].edge_count(), 3);

        // The loop runs like the removed face (1, 2, 3), whose normal points out.
        let p = &loops[0].points;
        let normal = (p[1] - p[0]).cross(p[2] - p[0]);
        assert!(normal.dot(DVec3::ONE) > 0.0);
    }

    #[test]
    fn grid_border_is_one_loop() {
        let mesh = grid(3);
        let segments = boundary_edge_segments(&mesh);
        assert_eq!(segments.len(), 12);
        let loops = group_into_loops(&segments);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].edge_count(), 12);
        assert_relative_eq!(loops[0].perimeter(), 4.0, epsilon = 1e-6);
        assert_relative_eq!(loops[0].centroid().x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn two_holes_give_two_loops() {
        // Bottom (0, 2, 1) and top (4, 5, 6) share no vertex.
        let mesh = without_triangle(&without_triangle(&cube(), 2), 0);
        let loops = extract_boundary_loops(&mesh).unwrap();
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.edge_count() == 3));
    }

    #[test]
    fn unwelded_duplicates_join_by_position() {
        // Two triangles sharing an edge geometrically but not by index.
        let mesh = IndexedMesh {
            positions: vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ],
            normals: vec![],
            indices: vec![0, 1, 2, 3, 4, 5],
        };
        // Every index edge is open, yet the walk traces the square's border.
        assert_eq!(find_boundary_edges(&mesh).len(), 6);
        let loops = extract_boundary_loops(&mesh).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].edge_count(), 4);
    }

    #[test]
    fn holes_touching_at_a_vertex_split_into_two_loops() {
        let o = DVec3::ZERO;
        let square = |dir: f64| {
            [
                DVec3::new(dir, 0.0, 0.0),
                DVec3::new(dir, dir, 0.0),
                DVec3::new(0.0, dir, 0.0),
            ]
        };
        let mut segments = Vec::new();
        for [p1, p2, p3] in [square(1.0), square(-1.0)] {
            segments.extend_from_slice(&[[o, p1], [p1, p2], [p2, p3], [p3, o]]);
        }

        let loops = group_into_loops(&segments);
        let lengths: Vec<usize> = loops.iter().map(BoundaryLoop::edge_count).collect();
        assert_eq!(lengths, vec![4, 3]);
        assert!(loops[0].points.contains(&o));
        assert!(!loops[1].points.contains(&o));
    }

    #[test]
    fn short_walks_are_dropped() {
        let segments = [[DVec3::ZERO, DVec3::X]];
        assert!(group_into_loops(&segments).is_empty());
    }
}
