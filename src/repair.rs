use std::collections::{HashMap, HashSet};

use glam::DVec3;
use tracing::debug;

use crate::error::{CarveError, Result};
use crate::types::IndexedMesh;

/// Merge vertices whose coordinates quantize to the same cell.
///
/// Each coordinate is mapped to `round(c / tolerance)`; vertices with equal
/// keys collapse onto the first one seen, which also keeps its normal.
/// Triangles are remapped but otherwise kept as they are.
pub fn weld_vertices(mesh: &IndexedMesh, tolerance: f64) -> Result<IndexedMesh> {
    weld_appended(mesh, 0, tolerance)
}

/// Weld only the vertices from index `first` onwards.
///
/// Vertices before `first` are never merged with each other, so splits the
/// source mesh carries on purpose (hard edges, UV seams) survive. Each later
/// vertex snaps onto an earlier vertex in the same cell, preferring one that
/// lies on an open edge of the triangles built only from vertices before
/// `first`.
pub fn weld_appended(mesh: &IndexedMesh, first: usize, tolerance: f64) -> Result<IndexedMesh> {
    mesh.validate()?;
    if !(tolerance > 0.0) || !tolerance.is_finite() {
        return Err(CarveError::Input(format!(
            "weld tolerance must be positive, got {tolerance}"
        )));
    }
    let first = first.min(mesh.vertex_count());

    let key = |p: DVec3| {
        [
            (p.x / tolerance).round() as i64,
            (p.y / tolerance).round() as i64,
            (p.z / tolerance).round() as i64,
        ]
    };

    let mut welded = IndexedMesh::default();
    let mut remap = Vec::with_capacity(mesh.vertex_count());
    let mut cells: HashMap<[i64; 3], u32> = HashMap::new();

    // The prefix is copied as is, so its welded indices equal its source ones.
    let open = open_vertices(mesh, first);
    for i in 0..first as u32 {
        push_vertex(&mut welded, mesh, i as usize);
        remap.push(i);
        let cell = cells.entry(key(mesh.position(i as usize))).or_insert(i);
        if open.contains(&i) && !open.contains(cell) {
            *cell = i;
        }
    }
    for i in first..mesh.vertex_count() {
        let next = welded.vertex_count() as u32;
        let target = *cells.entry(key(mesh.position(i))).or_insert_with(|| {
            push_vertex(&mut welded, mesh, i);
            next
        });
        remap.push(target);
    }
    welded.indices = mesh.indices.iter().map(|&i| remap[i as usize]).collect();

    debug!(
        before = mesh.vertex_count(),
        after = welded.vertex_count(),
        first,
        tolerance,
        "Welded vertices"
    );
    Ok(welded)
}

/// Vertices before `first` that sit on an edge used by exactly one triangle
/// built only from such vertices.
fn open_vertices(mesh: &IndexedMesh, first: usize) -> HashSet<u32> {
    let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
    for tri in mesh.indices.chunks_exact(3) {
        if tri.iter().any(|&v| v as usize >= first) {
            continue;
        }
        for (s, e) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            *counts.entry((s.min(e), s.max(e))).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count == 1)
        .flat_map(|((a, b), _)| [a, b])
        .collect()
}

fn push_vertex(welded: &mut IndexedMesh, mesh: &IndexedMesh, i: usize) {
    welded.positions.extend_from_slice(&mesh.positions[i * 3..i * 3 + 3]);
    if mesh.has_normals() {
        welded.normals.extend_from_slice(&mesh.normals[i * 3..i * 3 + 3]);
    }
}

/// Area-weighted vertex normals for `positions` / `indices`.
///
/// Vertices with no non-degenerate incident triangle get a zero normal.
pub fn compute_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let position = |i: u32| {
        let i = i as usize * 3;
        DVec3::new(
            positions[i] as f64,
            positions[i + 1] as f64,
            positions[i + 2] as f64,
        )
    };

    let mut accum = vec![DVec3::ZERO; vertex_count];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (position(tri[0]), position(tri[1]), position(tri[2]));
        // Unnormalized cross product weights by twice the area.
        let face = (b - a).cross(c - a);
        for &v in tri {
            accum[v as usize] += face;
        }
    }

    accum
        .into_iter()
        .flat_map(|n| {
            let n = n.normalize_or_zero();
            [n.x as f32, n.y as f32, n.z as f32]
        })
        .collect()
}

/// Copy of `mesh` with every vertex moved `distance` along its normal.
///
/// Normals are computed when the mesh has none; the result always carries
/// them.
pub fn offset_along_normals(mesh: &IndexedMesh, distance: f64) -> Result<IndexedMesh> {
    mesh.validate()?;
    if !distance.is_finite() {
        return Err(CarveError::Input(format!(
            "offset distance must be finite, got {distance}"
        )));
    }

    let normals = if mesh.has_normals() {
        mesh.normals.clone()
    } else {
        compute_vertex_normals(&mesh.positions, &mesh.indices)
    };

    let positions = mesh
        .positions
        .chunks_exact(3)
        .zip(normals.chunks_exact(3))
        .flat_map(|(p, n)| {
            let moved = DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64)
                + DVec3::new(n[0] as f64, n[1] as f64, n[2] as f64) * distance;
            [moved.x as f32, moved.y as f32, moved.z as f32]
        })
        .collect();

    Ok(IndexedMesh {
        positions,
        normals,
        indices: mesh.indices.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{cube, grid};
    use approx::assert_relative_eq;

    #[test]
    fn weld_merges_coincident_vertices() {
        let mesh = IndexedMesh {
            positions: vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ],
            normals: vec![],
            indices: vec![0, 1, 2, 3, 4, 5],
        };
        let welded = weld_vertices(&mesh, 1e-6).unwrap();
        assert_eq!(welded.vertex_count(), 4);
        assert_eq!(welded.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(welded.validate().is_ok());
    }

    #[test]
    fn weld_respects_tolerance() {
        let mesh = IndexedMesh {
            positions: vec![0.0, 0.0, 0.0, 0.001, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
        };
        assert_eq!(weld_vertices(&mesh, 1e-6).unwrap().vertex_count(), 3);
        let coarse = weld_vertices(&mesh, 0.01).unwrap();
        assert_eq!(coarse.vertex_count(), 2);
        // First occurrence wins.
        assert_eq!(coarse.normal(0), Some(DVec3::Z));
        assert!(weld_vertices(&mesh, 0.0).is_err());
        assert!(weld_vertices(&mesh, f64::NAN).is_err());
    }

    #[test]
    fn appended_weld_keeps_source_splits() {
        // Two triangles sharing a split edge, plus a copy of vertex 2 appended
        // by a later triangle.
        let mesh = IndexedMesh {
            positions: vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, //
                1.0, 1.0, 0.0, 2.0, 1.0, 0.0, 1.0, 2.0, 0.0,
            ],
            normals: vec![],
            indices: vec![0, 1, 2, 3, 4, 5, 6, 7, 8],
        };
        let welded = weld_appended(&mesh, 6, 1e-6).unwrap();
        assert_eq!(welded.vertex_count(), 8);
        assert_eq!(&welded.indices[..6], &mesh.indices[..6]);
        assert_eq!(welded.indices[6], 2);

        assert_eq!(weld_vertices(&mesh, 1e-6).unwrap().vertex_count(), 6);
    }

    #[test]
    fn appended_weld_prefers_open_vertices() {
        // Vertex 0 duplicates vertex 1 but is not on any open edge, so the
        // appended copy of the origin must land on vertex 1.
        let mesh = IndexedMesh {
            positions: vec![
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0,
            ],
            normals: vec![],
            indices: vec![1, 2, 3, 4, 5, 6],
        };
        let welded = weld_appended(&mesh, 4, 1e-6).unwrap();
        assert_eq!(welded.vertex_count(), 5);
        assert_eq!(welded.indices[3..], [1, 4, 2]);
    }

    #[test]
    fn flat_grid_normals_point_up() {
        let mesh = grid(3);
        let normals = compute_vertex_normals(&mesh.positions, &mesh.indices);
        assert_eq!(normals.len(), mesh.positions.len());
        for n in normals.chunks_exact(3) {
            assert_relative_eq!(n[2], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn unreferenced_vertex_gets_zero_normal() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 5.0, 5.0, 5.0];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2]);
        assert_eq!(&normals[9..12], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn offset_cube_grows_outward() {
        let mesh = cube();
        let grown = offset_along_normals(&mesh, 0.5).unwrap();
        assert!(grown.has_normals());
        for i in 0..mesh.vertex_count() {
            assert_relative_eq!(grown.position(i).distance(mesh.position(i)), 0.5, epsilon = 1e-5);
        }
        // Corner (1, 1, 1) moves away from the cube on every axis.
        let p = grown.position(6);
        assert!(p.x > 1.0 && p.y > 1.0 && p.z > 1.0);
        assert!(grown.surface_area() > mesh.surface_area());
    }

    #[test]
    fn offset_uses_existing_normals() {
        let mesh = grid(2);
        let lifted = offset_along_normals(&mesh, -0.25).unwrap();
        for i in 0..lifted.vertex_count() {
            assert_relative_eq!(lifted.position(i).z, -0.25, epsilon = 1e-6);
        }
        assert!(offset_along_normals(&mesh, f64::INFINITY).is_err());
    }
}
