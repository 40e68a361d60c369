use crate::types::IndexedMesh;

/// Flat `n x n` quad grid on the XY plane spanning `[0, 1]^2` (2 triangles per quad).
pub(crate) fn grid(n: usize) -> IndexedMesh {
    let verts_per_side = n + 1;
    let mut positions = Vec::with_capacity(verts_per_side * verts_per_side * 3);
    let mut normals = Vec::with_capacity(verts_per_side * verts_per_side * 3);

    for y in 0..verts_per_side {
        for x in 0..verts_per_side {
            let fx = x as f32 / n as f32;
            let fy = y as f32 / n as f32;
            positions.extend_from_slice(&[fx, fy, 0.0]);
            normals.extend_from_slice(&[0.0, 0.0, 1.0]);
        }
    }

    let mut indices = Vec::with_capacity(n * n * 6);
    for y in 0..n {
        for x in 0..n {
            let bl = (y * verts_per_side + x) as u32;
            let br = bl + 1;
            let tl = bl + verts_per_side as u32;
            let tr = tl + 1;
            indices.extend_from_slice(&[bl, br, tr, bl, tr, tl]);
        }
    }

    IndexedMesh {
        positions,
        normals,
        indices,
    }
}

/// Closed tetrahedron with outward-facing CCW triangles.
pub(crate) fn tetrahedron() -> IndexedMesh {
    IndexedMesh {
        positions: vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ],
        normals: vec![],
        indices: vec![0, 2, 1, 0, 1, 3, 1, 2, 3, 0, 3, 2],
    }
}

/// Closed unit cube made of 12 triangles.
pub(crate) fn cube() -> IndexedMesh {
    IndexedMesh {
        positions: vec![
            0.0, 0.0, 0.0, // 0
            1.0, 0.0, 0.0, // 1
            1.0, 1.0, 0.0, // 2
            0.0, 1.0, 0.0, // 3
            0.0, 0.0, 1.0, // 4
            1.0, 0.0, 1.0, // 5
            1.0, 1.0, 1.0, // 6
            0.0, 1.0, 1.0, // 7
        ],
        normals: vec![],
        indices: vec![
            0, 2, 1, 0, 3, 2, // bottom
            4, 5, 6, 4, 6, 7, // top
            0, 1, 5, 0, 5, 4, // front
            2, 3, 7, 2, 7, 6, // back
            1, 2, 6, 1, 6, 5, // right
            3, 0, 4, 3, 4, 7, // left
        ],
    }
}

/// Regular `n`-gon of radius 1 on the XY plane, as a closed vertex loop.
pub(crate) fn polygon_loop(n: usize) -> Vec<glam::DVec3> {
    (0..n)
        .map(|i| {
            let a = i as f64 / n as f64 * std::f64::consts::TAU;
            glam::DVec3::new(a.cos(), a.sin(), 0.0)
        })
        .collect()
}
