use std::ops::Range;

use glam::DVec3;
use tracing::{debug, trace};

use crate::error::{CarveError, Result};
use crate::surface::projector::{Placement, ProjectedPoint, classify, edge_opposite};
use crate::types::{IndexedMesh, Triangle};

/// Topology change produced by one vertex insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshEdit {
    /// The inserted vertex.
    pub vertex: u32,
    /// Undirected edges that no longer exist.
    pub removed_edges: Vec<[u32; 2]>,
    /// Undirected edges introduced by the insertion.
    pub added_edges: Vec<[u32; 2]>,
    /// Triangles whose indices were overwritten in place.
    pub rewritten: Vec<usize>,
    /// Ordinals of the appended triangles.
    pub appended: Range<usize>,
}

/// Split triangle `triangle_id` into three around `point`.
///
/// `(v1, v2, v3)` becomes `(v1, v2, P)` in place, and `(v2, v3, P)` and
/// `(v3, v1, P)` are appended. When the mesh carries normals, P receives the
/// normalized average of the three new face normals; existing normals are
/// left untouched. Any index or graph built over the mesh is stale afterwards.
pub fn subdivide_triangle(
    mesh: &mut IndexedMesh,
    triangle_id: usize,
    point: DVec3,
) -> Result<MeshEdit> {
    check_triangle(mesh, triangle_id)?;
    check_point(point)?;

    let [v1, v2, v3] = mesh.triangle(triangle_id);
    let [a, b, c] = mesh.triangle_positions(triangle_id);

    let normal = [(a, b), (b, c), (c, a)]
        .into_iter()
        .map(|(s, e)| (e - s).cross(point - s).normalize_or_zero())
        .sum::<DVec3>()
        .normalize_or_zero();

    let p = mesh.push_vertex(point, normal);

    let base = triangle_id * 3;
    mesh.indices[base..base + 3].copy_from_slice(&[v1, v2, p]);
    let first_new = mesh.triangle_count();
    mesh.indices.extend_from_slice(&[v2, v3, p, v3, v1, p]);

    trace!(triangle = triangle_id, vertex = p, "Subdivided triangle");

    Ok(MeshEdit {
        vertex: p,
        removed_edges: Vec::new(),
        added_edges: vec![[v1, p], [v2, p], [v3, p]],
        rewritten: vec![triangle_id],
        appended: first_new..first_new + 2,
    })
}

/// Split every triangle sharing the edge `[a, b]` in two at `point`.
///
/// Each triangle `(a, b, c)` (in its own winding) becomes `(a, P, c)` in
/// place plus an appended `(P, b, c)`, which keeps the mesh conforming
/// along the edge.
pub fn split_edge(mesh: &mut IndexedMesh, edge: [u32; 2], point: DVec3) -> Result<MeshEdit> {
    check_point(point)?;
    let [ea, eb] = edge;

    // (triangle, a, b, c) with a -> b being the directed edge in that triangle.
    let sharing: Vec<(usize, u32, u32, u32)> = mesh
        .triangles()
        .enumerate()
        .filter_map(|(t, tri)| {
            (0..3).find_map(|k| {
                let (s, e, o) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
                ((s == ea && e == eb) || (s == eb && e == ea)).then_some((t, s, e, o))
            })
        })
        .collect();

    if sharing.is_empty() {
        return Err(CarveError::Input(format!(
            "edge ({ea}, {eb}) is not part of any triangle"
        )));
    }
    if mesh.has_normals() && mesh.normals.len() != mesh.positions.len() {
        return Err(CarveError::Input("normal buffer does not match positions".into()));
    }

    let normal = sharing
        .iter()
        .map(|&(_, s, _, o)| {
            let (ps, po) = (mesh.position(s as usize), mesh.position(o as usize));
            (point - ps).cross(po - ps).normalize_or_zero()
        })
        .sum::<DVec3>()
        .normalize_or_zero();

    let p = mesh.push_vertex(point, normal);
    let first_new = mesh.triangle_count();

    let mut added_edges = vec![[ea, p], [p, eb]];
    let mut rewritten = Vec::with_capacity(sharing.len());
    for &(t, s, e, o) in &sharing {
        mesh.indices[t * 3..t * 3 + 3].copy_from_slice(&[s, p, o]);
        mesh.indices.extend_from_slice(&[p, e, o]);
        added_edges.push([o, p]);
        rewritten.push(t);
    }

    trace!(a = ea, b = eb, vertex = p, triangles = sharing.len(), "Split edge");

    Ok(MeshEdit {
        vertex: p,
        removed_edges: vec![[ea, eb]],
        added_edges,
        rewritten,
        appended: first_new..first_new + sharing.len(),
    })
}

/// Where a point sits relative to the current mesh.
enum Location {
    Interior(usize),
    Edge([u32; 2]),
    Vertex(u32),
}

/// Insert every projected point into the mesh and record its vertex index.
///
/// Points are located against the triangles their original face was split
/// into by earlier insertions, so several points on one face are handled.
/// Interior points subdivide their triangle; on-edge points split the edge.
/// A point coinciding with an existing vertex reuses it. The mesh is only
/// replaced once every point has been inserted.
pub fn materialize_projected_points(
    mesh: &mut IndexedMesh,
    points: &mut [ProjectedPoint],
    epsilon: f64,
) -> Result<Vec<MeshEdit>> {
    mesh.validate()?;
    let triangle_count = mesh.triangle_count();
    if let Some(bad) = points.iter().find(|p| p.face_id >= triangle_count) {
        return Err(CarveError::Input(format!(
            "projected point references triangle {} but the mesh has {triangle_count}",
            bad.face_id
        )));
    }

    let mut work = mesh.clone();
    // Triangles appended when each triangle was split.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); triangle_count];
    let mut edits = Vec::with_capacity(points.len());
    let mut vertex_indices = Vec::with_capacity(points.len());

    for projected in points.iter() {
        let location = locate(&work, &children, projected.face_id, projected.point, epsilon)
            .ok_or_else(|| {
                CarveError::Degenerate(format!(
                    "projected point {:?} no longer lies on face {} or its splits",
                    projected.point, projected.face_id
                ))
            })?;

        let edit = match location {
            Location::Vertex(v) => {
                vertex_indices.push(v);
                continue;
            }
            Location::Interior(t) => {
                let edit = subdivide_triangle(&mut work, t, projected.point)?;
                children.resize(work.triangle_count(), Vec::new());
                children[t].extend(edit.appended.clone());
                edit
            }
            Location::Edge(edge) => {
                let edit = split_edge(&mut work, edge, projected.point)?;
                children.resize(work.triangle_count(), Vec::new());
                for (&parent, child) in edit.rewritten.iter().zip(edit.appended.clone()) {
                    children[parent].push(child);
                }
                edit
            }
        };

        vertex_indices.push(edit.vertex);
        edits.push(edit);
    }

    *mesh = work;
    for (projected, v) in points.iter_mut().zip(vertex_indices) {
        projected.vertex_index = Some(v);
    }

    debug!(
        points = points.len(),
        edits = edits.len(),
        vertices = mesh.vertex_count(),
        "Materialized projected points"
    );
    Ok(edits)
}

/// Find the triangle (among `face` and everything split off it) that
/// contains `point`, and classify the point against it.
fn locate(
    mesh: &IndexedMesh,
    children: &[Vec<usize>],
    face: usize,
    point: DVec3,
    epsilon: f64,
) -> Option<Location> {
    let mut stack = vec![face];
    let mut candidates = Vec::new();
    while let Some(t) = stack.pop() {
        candidates.push(t);
        stack.extend(children[t].iter().copied());
    }

    for t in candidates {
        let [a, b, c] = mesh.triangle_positions(t);
        let corners = mesh.triangle(t);
        let triangle = Triangle::new(a, b, c, t);
        let Some(weights) = triangle.barycentric(triangle.project_to_plane(point)) else {
            continue;
        };

        let w = weights.to_array();
        if let Some(k) = (0..3).find(|&k| (w[k] - 1.0).abs() < epsilon) {
            if (0..3).all(|j| j == k || w[j].abs() < epsilon) {
                return Some(Location::Vertex(corners[k]));
            }
        }

        match classify(weights, epsilon) {
            Placement::Interior => return Some(Location::Interior(t)),
            Placement::Edge(corner) => {
                let [i, j] = edge_opposite(corner);
                return Some(Location::Edge([corners[i], corners[j]]));
            }
            Placement::Outside => {}
        }
    }
    None
}

fn check_triangle(mesh: &IndexedMesh, triangle_id: usize) -> Result<()> {
    if triangle_id >= mesh.triangle_count() {
        return Err(CarveError::Input(format!(
            "triangle {triangle_id} out of range (mesh has {})",
            mesh.triangle_count()
        )));
    }
    let vertex_count = mesh.vertex_count();
    if mesh.triangle(triangle_id).iter().any(|&v| v as usize >= vertex_count) {
        return Err(CarveError::Input(format!(
            "triangle {triangle_id} references a vertex out of range"
        )));
    }
    if mesh.has_normals() && mesh.normals.len() != mesh.positions.len() {
        return Err(CarveError::Input("normal buffer does not match positions".into()));
    }
    Ok(())
}

fn check_point(point: DVec3) -> Result<()> {
    if !point.is_finite() {
        return Err(CarveError::Input(format!("cannot insert non-finite point {point:?}")));
    }
    Ok(())
}
