pub mod obj;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CarveError, Result};
use crate::holes::{BoundaryLoop, extract_boundary_loops};
use crate::types::{Aabb, IndexedMesh};

pub use obj::{load_obj, write_obj};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "obj" => Ok(MeshFormat::Obj),
            _ => Err(CarveError::Input(format!(
                "Unsupported file format: .{ext}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeshFormat::Obj => "OBJ",
        }
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read a mesh, choosing the loader by extension.
pub fn load_mesh(path: &Path) -> Result<IndexedMesh> {
    if !path.exists() {
        return Err(CarveError::Input(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let format = MeshFormat::from_path(path)?;
    info!(format = %format, path = %path.display(), "Reading mesh");

    let mesh = match format {
        MeshFormat::Obj => load_obj(path)?,
    };
    debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Loaded mesh"
    );
    Ok(mesh)
}

/// Write a mesh, choosing the writer by extension.
pub fn write_mesh(path: &Path, mesh: &IndexedMesh) -> Result<()> {
    match MeshFormat::from_path(path)? {
        MeshFormat::Obj => write_obj(path, mesh)?,
    }
    info!(path = %path.display(), triangles = mesh.triangle_count(), "Wrote mesh");
    Ok(())
}

/// Summary statistics about a mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshStats {
    pub vertices: usize,
    pub triangles: usize,
    pub has_normals: bool,
    pub surface_area: f64,
    pub bounds_min: [f64; 3],
    pub bounds_max: [f64; 3],
    /// Edge count of each boundary loop; empty for a closed mesh.
    pub boundary_loops: Vec<usize>,
}

impl MeshStats {
    pub fn is_closed(&self) -> bool {
        self.boundary_loops.is_empty()
    }
}

/// Compute summary statistics for `mesh`.
pub fn compute_stats(mesh: &IndexedMesh) -> Result<MeshStats> {
    let loops = extract_boundary_loops(mesh)?;
    let bounds = Aabb::from_points((0..mesh.vertex_count()).map(|i| mesh.position(i)));

    Ok(MeshStats {
        vertices: mesh.vertex_count(),
        triangles: mesh.triangle_count(),
        has_normals: mesh.has_normals(),
        surface_area: mesh.surface_area(),
        bounds_min: bounds.min.to_array(),
        bounds_max: bounds.max.to_array(),
        boundary_loops: loops.iter().map(BoundaryLoop::edge_count).collect(),
    })
}
