use glam::DVec3;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::config::{SearchConfig, TreeConfig};
use crate::error::{CarveError, Result};
use crate::spatial::bvh::BvhTree;
use crate::spatial::region::SurfaceSphere;
use crate::types::{IndexedMesh, Triangle};

/// Bounding volume tree over every triangle of a mesh.
///
/// The index is a snapshot: any edit to the source buffers invalidates it.
#[derive(Debug, Clone)]
pub struct TriangleIndex {
    tree: BvhTree<Triangle>,
    search: SearchConfig,
}

impl TriangleIndex {
    /// Build the index from mesh buffers.
    ///
    /// Triangles are constructed in parallel, then inserted in a strided
    /// order so that spatially coherent index buffers do not degrade the
    /// tree into a chain.
    pub fn build(mesh: &IndexedMesh, tree: TreeConfig, search: SearchConfig) -> Result<Self> {
        mesh.validate()?;
        if !(search.initial_radius > 0.0) || !(search.growth_factor > 1.0) {
            return Err(CarveError::Input(format!(
                "search needs a positive initial radius and a growth factor above 1, got {} and {}",
                search.initial_radius, search.growth_factor
            )));
        }
        if !search.max_radius.is_finite() {
            return Err(CarveError::Input(format!(
                "maximum search radius must be finite, got {}",
                search.max_radius
            )));
        }

        let triangles: Vec<Triangle> = (0..mesh.triangle_count())
            .into_par_iter()
            .map(|t| {
                let [a, b, c] = mesh.triangle_positions(t);
                Triangle::new(a, b, c, t)
            })
            .collect();

        let count = triangles.len();
        let stride = insertion_stride(count);
        let mut bvh = BvhTree::new(tree);
        let mut skipped = 0usize;
        for k in 0..count {
            let t = triangles[(k * stride) % count];
            if bvh.insert(t).is_none() {
                skipped += 1;
            }
        }

        debug!(
            triangles = count,
            skipped,
            depth = bvh.depth(),
            "Built triangle index"
        );

        Ok(Self { tree: bvh, search })
    }

    /// Build with default tree and search parameters.
    pub fn from_mesh(mesh: &IndexedMesh) -> Result<Self> {
        Self::build(mesh, TreeConfig::default(), SearchConfig::default())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn tree(&self) -> &BvhTree<Triangle> {
        &self.tree
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Nearest triangle to `point` by expanding-radius search.
    ///
    /// Starts at the initial radius and multiplies it by the growth factor
    /// until the query returns candidates; the candidate with the smallest
    /// closest-point distance wins. Returns `None` once the radius exceeds
    /// the configured maximum.
    pub fn find_closest_triangle(&self, point: DVec3) -> Option<&Triangle> {
        if !point.is_finite() || self.tree.is_empty() {
            return None;
        }

        let mut radius = self.search.initial_radius;
        while radius <= self.search.max_radius {
            let candidates = self.tree.query(&SurfaceSphere::new(point, radius));
            if let Some(best) = candidates.into_iter().min_by(|a, b| {
                a.closest_squared_distance(point)
                    .total_cmp(&b.closest_squared_distance(point))
            }) {
                trace!(radius, triangle = best.index, "Nearest triangle found");
                return Some(best);
            }
            radius *= self.search.growth_factor;
        }

        debug!(?point, max_radius = self.search.max_radius, "Nearest triangle search gave up");
        None
    }

    /// Signed distance from `point` to the nearest triangle, positive on the
    /// side its normal faces.
    pub fn signed_distance(&self, point: DVec3) -> Option<f64> {
        self.find_closest_triangle(point)
            .map(|t| t.signed_distance(point))
    }
}

/// Step coprime with `count`, close to the golden ratio of it, so that
/// `(k * stride) % count` visits every triangle once in a scattered order.
fn insertion_stride(count: usize) -> usize {
    if count < 3 {
        return 1;
    }
    let mut stride = ((count as f64) * 0.618_033_988_75) as usize;
    stride = stride.max(1);
    while gcd(stride, count) != 1 {
        stride += 1;
    }
    stride
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
