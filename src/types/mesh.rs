use glam::DVec3;

use crate::error::{CarveError, Result};

/// The fundamental geometry container.
///
/// All buffers are contiguous `Vec<f32>` / `Vec<u32>` so callers can hand them
/// straight to a renderer. Geometry math promotes to `f64` via [`DVec3`].
/// Hole-fill fragments use the same type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    /// Interleaved positions: [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Interleaved normals: [nx, ny, nz, ...] or empty
    pub normals: Vec<f32>,
    /// Triangle indices into the vertex buffers (CCW winding)
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles (indices / 3).
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether normals are present.
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Whether the mesh contains no geometry.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of vertex `i`, promoted to f64.
    pub fn position(&self, i: usize) -> DVec3 {
        DVec3::new(
            self.positions[i * 3] as f64,
            self.positions[i * 3 + 1] as f64,
            self.positions[i * 3 + 2] as f64,
        )
    }

    /// Normal of vertex `i`, if normals are present.
    pub fn normal(&self, i: usize) -> Option<DVec3> {
        if !self.has_normals() {
            return None;
        }
        Some(DVec3::new(
            self.normals[i * 3] as f64,
            self.normals[i * 3 + 1] as f64,
            self.normals[i * 3 + 2] as f64,
        ))
    }

    /// Vertex indices of triangle `t`.
    pub fn triangle(&self, t: usize) -> [u32; 3] {
        [
            self.indices[t * 3],
            self.indices[t * 3 + 1],
            self.indices[t * 3 + 2],
        ]
    }

    /// Corner positions of triangle `t`.
    pub fn triangle_positions(&self, t: usize) -> [DVec3; 3] {
        let [a, b, c] = self.triangle(t);
        [
            self.position(a as usize),
            self.position(b as usize),
            self.position(c as usize),
        ]
    }

    /// Iterate over triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Append a vertex and return its index. A normal is pushed only when the
    /// mesh already carries normals.
    pub fn push_vertex(&mut self, p: DVec3, normal: DVec3) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions
            .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        if self.has_normals() {
            self.normals
                .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
        }
        index
    }

    /// Check the buffer invariants every core operation relies on.
    ///
    /// Positions and indices must be non-empty multiples of three, every index
    /// must address an existing vertex, and normals (when present) must have
    /// the same cardinality as positions.
    pub fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(CarveError::Input("mesh has no position data".into()));
        }
        if self.indices.is_empty() {
            return Err(CarveError::Input("mesh has no index data".into()));
        }
        if self.positions.len() % 3 != 0 {
            return Err(CarveError::Input(format!(
                "position buffer length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(CarveError::Input(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if self.has_normals() && self.normals.len() != self.positions.len() {
            return Err(CarveError::Input(format!(
                "normal buffer length {} does not match position buffer length {}",
                self.normals.len(),
                self.positions.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(CarveError::Input(format!(
                "index {bad} out of range (mesh has {vertex_count} vertices)"
            )));
        }
        Ok(())
    }

    /// Append another mesh (typically a hole-fill fragment), re-basing its
    /// indices. Normals survive only if both sides carry them.
    pub fn append(&mut self, fragment: &IndexedMesh) {
        let base = self.vertex_count() as u32;
        let keep_normals = (self.has_normals() || self.is_empty()) && fragment.has_normals();
        if !keep_normals {
            self.normals.clear();
        }
        self.positions.extend_from_slice(&fragment.positions);
        if keep_normals {
            self.normals.extend_from_slice(&fragment.normals);
        }
        self.indices
            .extend(fragment.indices.iter().map(|&i| i + base));
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        (0..self.triangle_count())
            .map(|t| {
                let [a, b, c] = self.triangle_positions(t);
                (b - a).cross(c - a).length() * 0.5
            })
            .sum()
    }
}

/// Remap indices to remove unreferenced vertices and rebuild attribute arrays.
///
/// Scans the index buffer to find referenced vertices, builds a compact remap,
/// then rebuilds positions/normals with only referenced vertices.
pub fn compact_mesh(indices: &[u32], source: &IndexedMesh) -> IndexedMesh {
    if indices.is_empty() {
        return IndexedMesh::default();
    }

    let vertex_count = source.vertex_count();

    // Build remap: old_index -> new_index (u32::MAX if unreferenced)
    let mut remap = vec![u32::MAX; vertex_count];
    let mut next_vertex: u32 = 0;
    for &idx in indices {
        let i = idx as usize;
        if remap[i] == u32::MAX {
            remap[i] = next_vertex;
            next_vertex += 1;
        }
    }
    let new_vertex_count = next_vertex as usize;

    let new_indices: Vec<u32> = indices.iter().map(|&i| remap[i as usize]).collect();

    let mut new_positions = vec![0.0f32; new_vertex_count * 3];
    let mut new_normals = if source.has_normals() {
        vec![0.0f32; new_vertex_count * 3]
    } else {
        vec![]
    };

    for (old_idx, &new_idx) in remap.iter().enumerate() {
        if new_idx == u32::MAX {
            continue;
        }
        let ni = new_idx as usize;
        new_positions[ni * 3..ni * 3 + 3]
            .copy_from_slice(&source.positions[old_idx * 3..old_idx * 3 + 3]);
        if source.has_normals() {
            new_normals[ni * 3..ni * 3 + 3]
                .copy_from_slice(&source.normals[old_idx * 3..old_idx * 3 + 3]);
        }
    }

    IndexedMesh {
        positions: new_positions,
        normals: new_normals,
        indices: new_indices,
    }
}
