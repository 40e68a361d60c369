use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{CarveError, Result};
use crate::types::IndexedMesh;

/// Load an OBJ file, merging every object into one mesh.
///
/// Faces are triangulated and attributes re-indexed to a single index
/// buffer. Materials are ignored. Normals are kept only when every object
/// carries them.
pub fn load_obj(path: &Path) -> Result<IndexedMesh> {
    let (models, _materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
        .map_err(|e| CarveError::Input(format!("Failed to load OBJ: {e}")))?;

    debug!(model_count = models.len(), "Loaded OBJ models");

    let mesh = merge_models(models.into_iter().map(|m| m.mesh));
    mesh.validate()?;
    Ok(mesh)
}

/// Convert and concatenate `tobj` meshes.
fn merge_models(meshes: impl IntoIterator<Item = tobj::Mesh>) -> IndexedMesh {
    let mut merged = IndexedMesh::default();
    for mesh in meshes {
        let part = convert_mesh(mesh);
        merged.append(&part);
    }
    merged
}

/// Convert a `tobj::Mesh` into our `IndexedMesh`. Normals that do not match
/// the positions one-to-one are dropped.
fn convert_mesh(mesh: tobj::Mesh) -> IndexedMesh {
    let normals = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals
    } else {
        Vec::new()
    };
    IndexedMesh {
        positions: mesh.positions,
        normals,
        indices: mesh.indices,
    }
}

/// Write `mesh` as a Wavefront OBJ (`v`, optional `vn`, triangular `f`).
pub fn write_obj(path: &Path, mesh: &IndexedMesh) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "# mesh-carve")?;
    for p in mesh.positions.chunks_exact(3) {
        writeln!(out, "v {} {} {}", p[0], p[1], p[2])?;
    }
    for n in mesh.normals.chunks_exact(3) {
        writeln!(out, "vn {} {} {}", n[0], n[1], n[2])?;
    }

    // OBJ indices are 1-based.
    for [a, b, c] in mesh.triangles() {
        let (a, b, c) = (a + 1, b + 1, c + 1);
        if mesh.has_normals() {
            writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
        } else {
            writeln!(out, "f {a} {b} {c}")?;
        }
    }
    out.flush()?;

    debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Wrote OBJ"
    );
    Ok(())
}
