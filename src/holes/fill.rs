use glam::{DVec2, DVec3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::FillConfig;
use crate::error::{CarveError, Result};
use crate::holes::boundary::{BoundaryLoop, extract_boundary_loops};
use crate::repair::compute_vertex_normals;
use crate::types::IndexedMesh;

/// Triangulation method applied to a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    CentroidFan,
    Earcut,
    AdvancingFront,
}

impl FillStrategy {
    /// Strategy for a loop with `edge_count` edges.
    pub fn for_edge_count(edge_count: usize, config: &FillConfig) -> Self {
        if edge_count <= config.fan_max_edges {
            FillStrategy::CentroidFan
        } else if edge_count <= config.earcut_max_edges {
            FillStrategy::Earcut
        } else {
            FillStrategy::AdvancingFront
        }
    }
}

impl std::fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FillStrategy::CentroidFan => "centroid-fan",
            FillStrategy::Earcut => "earcut",
            FillStrategy::AdvancingFront => "advancing-front",
        };
        f.write_str(name)
    }
}

/// Result of filling one loop.
#[derive(Debug, Clone)]
pub struct FillOutcome {
    pub fragment: IndexedMesh,
    /// Strategy that produced `fragment` (after any fallback).
    pub strategy: FillStrategy,
    /// Edge count of the filled loop.
    pub edges: usize,
    /// False when the advancing front ran out of valid ears.
    pub complete: bool,
}

impl FillOutcome {
    /// The fragment, or [`CarveError::Incomplete`] for a partial fill.
    pub fn into_complete(self) -> Result<IndexedMesh> {
        if self.complete {
            Ok(self.fragment)
        } else {
            Err(CarveError::Incomplete(format!(
                "{} left the hole partly open ({} triangles emitted)",
                self.strategy,
                self.fragment.triangle_count()
            )))
        }
    }
}

/// Fill one loop with the strategy its size selects.
pub fn fill_hole(boundary: &BoundaryLoop, config: &FillConfig) -> Result<FillOutcome> {
    let n = boundary.edge_count();
    if n < 3 {
        return Err(CarveError::Input(format!(
            "a hole needs at least 3 boundary points, got {n}"
        )));
    }
    if boundary.points.iter().any(|p| !p.is_finite()) {
        return Err(CarveError::Input("boundary loop has non-finite points".into()));
    }

    let strategy = FillStrategy::for_edge_count(n, config);
    debug!(edges = n, %strategy, "Filling hole");

    let (fragment, strategy, complete) = match strategy {
        FillStrategy::CentroidFan => (centroid_fan(&boundary.points), strategy, true),
        FillStrategy::Earcut => match earcut_fill(&boundary.points, config) {
            Some(fragment) => (fragment, strategy, true),
            None => {
                warn!(edges = n, "Earcut could not close the hole, using centroid fan");
                (centroid_fan(&boundary.points), FillStrategy::CentroidFan, true)
            }
        },
        FillStrategy::AdvancingFront => {
            let (fragment, complete) = advancing_front(&boundary.points, config);
            if !complete {
                warn!(
                    edges = n,
                    triangles = fragment.triangle_count(),
                    "Advancing front ran out of valid ears"
                );
            }
            (fragment, strategy, complete)
        }
    };
    Ok(FillOutcome {
        fragment,
        strategy,
        edges: n,
        complete,
    })
}

/// Fill independent loops in parallel.
pub fn fill_holes(loops: &[BoundaryLoop], config: &FillConfig) -> Result<Vec<FillOutcome>> {
    loops.par_iter().map(|l| fill_hole(l, config)).collect()
}

/// Fill every hole of `mesh` and merge the complete fragments into a copy.
///
/// Incomplete fills are reported in the returned outcomes but not merged.
pub fn close_holes(
    mesh: &IndexedMesh,
    config: &FillConfig,
) -> Result<(IndexedMesh, Vec<FillOutcome>)> {
    let loops = extract_boundary_loops(mesh)?;
    let outcomes = fill_holes(&loops, config)?;

    let mut closed = mesh.clone();
    let mut merged = 0usize;
    for outcome in outcomes.iter().filter(|o| o.complete) {
        closed.append(&outcome.fragment);
        merged += 1;
    }

    info!(
        holes = loops.len(),
        merged,
        incomplete = outcomes.len() - merged,
        triangles = closed.triangle_count(),
        "Closed holes"
    );
    Ok((closed, outcomes))
}

/// Fan of `n` triangles joining each loop edge to the loop centroid.
///
/// The centroid is the last vertex of the fragment.
pub fn centroid_fan(points: &[DVec3]) -> IndexedMesh {
    let n = points.len();
    let centroid = points.iter().sum::<DVec3>() / n as f64;

    let mut positions: Vec<DVec3> = points.to_vec();
    positions.push(centroid);

    let c = n as u32;
    let indices = (0..n as u32).flat_map(|i| [i, (i + 1) % c, c]).collect();
    fragment(&positions, indices)
}

/// Earcut triangulation in a plane fitted through the loop.
///
/// The plane normal is the cross product of the first two edges, falling
/// back to the Newell normal when those are collinear. Triangles facing away
/// from the configured viewpoint are dropped. A single missing triangle whose
/// three vertices are otherwise unused is patched in; any other shortfall
/// returns `None`.
pub fn earcut_fill(points: &[DVec3], config: &FillConfig) -> Option<IndexedMesh> {
    let vertices = dedup_points(points, config.dedup_tolerance);
    let n = vertices.len();
    if n < 3 {
        return None;
    }

    let winding = newell_normal(&vertices);
    let first = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[0]);
    let normal = if first.length() >= config.degenerate_tolerance {
        first.normalize()
    } else {
        winding.try_normalize()?
    };

    let mut tangent = normal.cross(DVec3::X);
    if tangent.length() < 1e-6 {
        tangent = normal.cross(DVec3::Y);
    }
    let tangent = tangent.normalize();
    let bitangent = normal.cross(tangent);

    let centroid = vertices.iter().sum::<DVec3>() / n as f64;
    let flattened: Vec<f64> = vertices
        .iter()
        .flat_map(|&v| {
            let local = v - centroid;
            let uv = DVec2::new(local.dot(tangent), local.dot(bitangent));
            [uv.x, uv.y]
        })
        .collect();

    let raw = match earcutr::earcut(&flattened, &[], 2) {
        Ok(raw) => raw,
        Err(_) => {
            debug!("Earcut rejected the projected loop");
            return None;
        }
    };

    let mut triangles: Vec<[usize; 3]> = raw
        .chunks_exact(3)
        .map(|t| orient([t[0], t[1], t[2]], &vertices, winding))
        .collect();

    if let Some(viewpoint) = config.viewpoint {
        triangles.retain(|&[a, b, c]| {
            let face = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
            let center = (vertices[a] + vertices[b] + vertices[c]) / 3.0;
            face.dot(viewpoint - center) >= 0.0
        });
    }

    if triangles.len() < n - 2 {
        let patch = missing_triangle(&triangles, n)?;
        debug!("Patching the one triangle earcut left out");
        triangles.push(orient(patch, &vertices, winding));
    }

    let indices = triangles
        .iter()
        .flat_map(|t| t.map(|v| v as u32))
        .collect();
    Some(fragment(&vertices, indices))
}

/// The triangle over the three vertices `triangles` leaves unreferenced, if
/// exactly three are left.
fn missing_triangle(triangles: &[[usize; 3]], n: usize) -> Option<[usize; 3]> {
    let mut used = vec![false; n];
    for t in triangles {
        for &v in t {
            used[v] = true;
        }
    }
    let unused: Vec<usize> = (0..n).filter(|&v| !used[v]).collect();
    match unused[..] {
        [a, b, c] => Some([a, b, c]),
        _ => None,
    }
}

/// Advancing-front ear clipping.
///
/// Each step clips the vertex with the smallest interior angle among the
/// valid ears (see [`is_ear`]). Stops when three vertices remain, when no
/// valid ear exists, or after twice the loop length in steps. Returns the
/// fragment and whether the hole was fully closed.
pub fn advancing_front(points: &[DVec3], config: &FillConfig) -> (IndexedMesh, bool) {
    let vertices = dedup_points(points, config.dedup_tolerance);
    let n = vertices.len();
    let normal = newell_normal(&vertices);

    let mut front: Vec<usize> = (0..n).collect();
    let mut indices: Vec<u32> = Vec::with_capacity(n.saturating_sub(2) * 3);
    let mut iterations = 2 * n;

    while front.len() > 3 && iterations > 0 {
        iterations -= 1;
        let m = front.len();

        let best = (0..m)
            .filter(|&i| is_ear(&vertices, &front, i, normal, config.degenerate_tolerance))
            .map(|i| (i, interior_angle(&vertices, &front, i)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let Some((i, _)) = best else {
            break;
        };
        let (prev, next) = ((i + m - 1) % m, (i + 1) % m);
        indices.extend_from_slice(&[front[prev] as u32, front[i] as u32, front[next] as u32]);
        front.remove(i);
    }

    let complete = front.len() == 3;
    if complete {
        indices.extend(front.iter().map(|&v| v as u32));
    }
    (fragment(&vertices, indices), complete)
}

/// Whether front vertex `i` can be clipped.
///
/// The candidate `(prev, i, next)` must be non-degenerate, turn the same way
/// as the loop (convex with respect to `normal`), and contain no other front
/// vertex once everything is projected onto its plane.
fn is_ear(vertices: &[DVec3], front: &[usize], i: usize, normal: DVec3, tolerance: f64) -> bool {
    let m = front.len();
    let (prev, next) = ((i + m - 1) % m, (i + 1) % m);
    let (a, b, c) = (vertices[front[prev]], vertices[front[i]], vertices[front[next]]);

    let cross = (b - a).cross(c - b);
    if (b - a).cross(c - a).length() < tolerance {
        return false;
    }
    if cross.dot(normal) <= 0.0 {
        return false;
    }

    front.iter().enumerate().all(|(j, &v)| {
        if j == i || j == prev || j == next {
            return true;
        }
        let p = vertices[v];
        if p == a || p == b || p == c {
            return true;
        }
        !point_in_triangle(p, a, b, c, tolerance)
    })
}

/// Angle at front vertex `i` between its two neighbours, in radians.
fn interior_angle(vertices: &[DVec3], front: &[usize], i: usize) -> f64 {
    let m = front.len();
    let prev = vertices[front[(i + m - 1) % m]];
    let curr = vertices[front[i]];
    let next = vertices[front[(i + 1) % m]];
    let u = (prev - curr).normalize_or_zero();
    let v = (next - curr).normalize_or_zero();
    u.dot(v).clamp(-1.0, 1.0).acos()
}

/// Point-in-triangle after projecting `p` onto the triangle's plane.
fn point_in_triangle(p: DVec3, a: DVec3, b: DVec3, c: DVec3, tolerance: f64) -> bool {
    let normal = (b - a).cross(c - a).normalize_or_zero();
    let p = p - normal * (p - a).dot(normal);

    let (v0, v1, v2) = (b - a, c - a, p - a);
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < tolerance {
        return false;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    u >= -tolerance && v >= -tolerance && w >= -tolerance
}

/// Area vector of a closed polygon (Newell's method), oriented by the
/// vertex order.
fn newell_normal(points: &[DVec3]) -> DVec3 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].cross(points[(i + 1) % n]))
        .sum::<DVec3>()
        * 0.5
}

/// Flip `tri` if it faces against `winding`.
fn orient(tri: [usize; 3], vertices: &[DVec3], winding: DVec3) -> [usize; 3] {
    let [a, b, c] = tri;
    let face = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
    if face.dot(winding) < 0.0 {
        [a, c, b]
    } else {
        tri
    }
}

/// Drop points closer than `tolerance` to an earlier kept point.
fn dedup_points(points: &[DVec3], tolerance: f64) -> Vec<DVec3> {
    let mut unique: Vec<DVec3> = Vec::with_capacity(points.len());
    for &p in points {
        if !unique.iter().any(|u| u.distance(p) < tolerance) {
            unique.push(p);
        }
    }
    unique
}

/// Fragment mesh with generated normals.
fn fragment(positions: &[DVec3], indices: Vec<u32>) -> IndexedMesh {
    let positions: Vec<f32> = positions
        .iter()
        .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    let normals = compute_vertex_normals(&positions, &indices);
    IndexedMesh {
        positions,
        normals,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::holes::boundary::find_boundary_edges;
    use crate::types::fixtures::{polygon_loop, tetrahedron};
    use approx::assert_relative_eq;

    /// Star-shaped, non-convex loop on the XY plane with `2 * spikes` points.
    fn star_loop(spikes: usize) -> Vec<DVec3> {
        (0..spikes * 2)
            .map(|i| {
                let a = i as f64 / (spikes * 2) as f64 * std::f64::consts::TAU;
                let r = if i % 2 == 0 { 1.0 } else { 0.5 };
                DVec3::new(a.cos() * r, a.sin() * r, 0.0)
            })
            .collect()
    }

    fn polygon_area(points: &[DVec3]) -> f64 {
        newell_normal(points).length()
    }

    /// Every loop point appears as a referenced fragment vertex.
    fn assert_covers(points: &[DVec3], fragment: &IndexedMesh) {
        let referenced: HashSet<u32> = fragment.indices.iter().copied().collect();
        for p in points {
            let found = (0..fragment.vertex_count()).any(|i| {
                referenced.contains(&(i as u32)) && fragment.position(i).distance(*p) < 1e-6
            });
            assert!(found, "loop point {p:?} missing from fragment");
        }
        assert!(fragment.validate().is_ok());
        assert_eq!(fragment.normals.len(), fragment.positions.len());
    }

    fn assert_faces(fragment: &IndexedMesh, normal: DVec3) {
        for t in 0..fragment.triangle_count() {
            let [a, b, c] = fragment.triangle_positions(t);
            assert!((b - a).cross(c - a).dot(normal) >= 0.0, "triangle {t} is flipped");
        }
    }

    #[test]
    fn strategy_by_size() {
        let config = FillConfig::default();
        assert_eq!(FillStrategy::for_edge_count(3, &config), FillStrategy::CentroidFan);
        assert_eq!(FillStrategy::for_edge_count(6, &config), FillStrategy::CentroidFan);
        assert_eq!(FillStrategy::for_edge_count(7, &config), FillStrategy::Earcut);
        assert_eq!(FillStrategy::for_edge_count(50, &config), FillStrategy::Earcut);
        assert_eq!(FillStrategy::for_edge_count(51, &config), FillStrategy::AdvancingFront);
    }

    #[test]
    fn fan_emits_one_triangle_per_edge() {
        let config = FillConfig::default();
        for n in 3..=6 {
            let boundary = BoundaryLoop {
                points: polygon_loop(n),
            };
            let outcome = fill_hole(&boundary, &config).unwrap();
            assert_eq!(outcome.strategy, FillStrategy::CentroidFan);
            assert!(outcome.complete);
            assert_eq!(outcome.fragment.triangle_count(), n);
            assert_eq!(outcome.fragment.vertex_count(), n + 1);
            assert_covers(&boundary.points, &outcome.fragment);
            assert_faces(&outcome.fragment, DVec3::Z);
        }
    }

    #[test]
    fn earcut_closes_concave_loop() {
        let points = star_loop(6);
        let boundary = BoundaryLoop {
            points: points.clone(),
        };
        let outcome = fill_hole(&boundary, &FillConfig::default()).unwrap();
        assert_eq!(outcome.strategy, FillStrategy::Earcut);
        assert!(outcome.complete);
        assert_eq!(outcome.fragment.triangle_count(), points.len() - 2);
        assert_covers(&points, &outcome.fragment);
        assert_faces(&outcome.fragment, DVec3::Z);
        assert_relative_eq!(
            outcome.fragment.surface_area(),
            polygon_area(&points),
            epsilon = 1e-5
        );
    }

    #[test]
    fn earcut_follows_reversed_winding() {
        let mut points = polygon_loop(10);
        points.reverse();
        let fragment = earcut_fill(&points, &FillConfig::default()).unwrap();
        assert_faces(&fragment, -DVec3::Z);
    }

    #[test]
    fn earcut_drops_duplicate_points() {
        let mut points = polygon_loop(8);
        points.insert(3, points[3] + DVec3::splat(1e-9));
        let fragment = earcut_fill(&points, &FillConfig::default()).unwrap();
        assert_eq!(fragment.vertex_count(), 8);
        assert_eq!(fragment.triangle_count(), 6);
    }

    #[test]
    fn earcut_back_faces_fall_back_to_fan() {
        let boundary = BoundaryLoop {
            points: polygon_loop(12),
        };
        let config = FillConfig {
            viewpoint: Some(DVec3::new(0.0, 0.0, -10.0)),
            ..Default::default()
        };
        let outcome = fill_hole(&boundary, &config).unwrap();
        assert_eq!(outcome.strategy, FillStrategy::CentroidFan);
        assert_eq!(outcome.fragment.triangle_count(), 12);

        let facing = FillConfig {
            viewpoint: Some(DVec3::new(0.0, 0.0, 10.0)),
            ..Default::default()
        };
        let outcome = fill_hole(&boundary, &facing).unwrap();
        assert_eq!(outcome.strategy, FillStrategy::Earcut);
    }

    #[test]
    fn earcut_patches_single_back_facing_triangle() {
        // Seven boundary points that collapse onto one CCW triangle.
        let e = DVec3::splat(1e-9);
        let (a, b, c) = (DVec3::ZERO, DVec3::X, DVec3::Y);
        let boundary = BoundaryLoop {
            points: vec![a, a + e, b, b + e, b - e, c, c + e],
        };
        let config = FillConfig {
            viewpoint: Some(DVec3::new(0.0, 0.0, -10.0)),
            ..Default::default()
        };
        let outcome = fill_hole(&boundary, &config).unwrap();
        assert_eq!(outcome.strategy, FillStrategy::Earcut);
        assert!(outcome.complete);
        assert_eq!(outcome.fragment.triangle_count(), 1);
        assert_eq!(outcome.fragment.vertex_count(), 3);
        assert_faces(&outcome.fragment, DVec3::Z);
    }

    #[test]
    fn missing_triangle_needs_exactly_three_unused() {
        assert_eq!(missing_triangle(&[], 3), Some([0, 1, 2]));
        assert_eq!(missing_triangle(&[[0, 1, 2]], 5), None);
        assert_eq!(missing_triangle(&[[0, 1, 2]], 6), Some([3, 4, 5]));
        assert_eq!(missing_triangle(&[], 4), None);
    }

    #[test]
    fn advancing_front_closes_large_loop() {
        let points = star_loop(30);
        let boundary = BoundaryLoop {
            points: points.clone(),
        };
        let outcome = fill_hole(&boundary, &FillConfig::default()).unwrap();
        assert_eq!(outcome.strategy, FillStrategy::AdvancingFront);
        assert!(outcome.complete);
        assert_eq!(outcome.fragment.triangle_count(), points.len() - 2);
        assert_covers(&points, &outcome.fragment);
        assert_faces(&outcome.fragment, DVec3::Z);
        assert_relative_eq!(
            outcome.fragment.surface_area(),
            polygon_area(&points),
            epsilon = 1e-5
        );
        assert!(outcome.into_complete().is_ok());
    }

    #[test]
    fn advancing_front_reports_stuck_front() {
        // Every point on one line: no ear is ever valid.
        let points: Vec<DVec3> = (0..60).map(|i| DVec3::new(i as f64, 0.0, 0.0)).collect();
        let (fragment, complete) = advancing_front(&points, &FillConfig::default());
        assert!(!complete);
        assert_eq!(fragment.triangle_count(), 0);

        let outcome = fill_hole(&BoundaryLoop { points }, &FillConfig::default()).unwrap();
        assert!(!outcome.complete);
        assert!(matches!(outcome.into_complete(), Err(CarveError::Incomplete(_))));
    }

    #[test]
    fn short_loops_are_rejected() {
        let boundary = BoundaryLoop {
            points: vec![DVec3::ZERO, DVec3::X],
        };
        assert!(fill_hole(&boundary, &FillConfig::default()).is_err());
    }

    #[test]
    fn closing_a_tetrahedron_hole_makes_it_watertight() {
        let mut mesh = tetrahedron();
        mesh.indices.drain(6..9);
        let (closed, outcomes) = close_holes(&mesh, &FillConfig::default()).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(closed.triangle_count(), 3 + 3);

        // Fragment vertices are separate copies, so weld before checking.
        let welded = crate::repair::weld_vertices(&closed, 1e-6).unwrap();
        assert_eq!(welded.vertex_count(), 5);
        let open = find_boundary_edges(&welded);
        assert!(open.is_empty(), "open edges left: {open:?}");

        // The fan faces outward like the removed face.
        let fragment = &outcomes[0].fragment;
        assert_faces(fragment, DVec3::ONE);
    }

    #[test]
    fn parallel_fill_matches_sequential() {
        let loops: Vec<BoundaryLoop> = [4, 9, 60]
            .into_iter()
            .map(|n| BoundaryLoop {
                points: polygon_loop(n),
            })
            .collect();
        let config = FillConfig::default();
        let outcomes = fill_holes(&loops, &config).unwrap();
        assert_eq!(outcomes.len(), 3);
        for (l, o) in loops.iter().zip(&outcomes) {
            let single = fill_hole(l, &config).unwrap();
            assert_eq!(single.fragment, o.fragment);
            assert_eq!(single.strategy, o.strategy);
        }
    }
}
