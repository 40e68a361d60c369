pub mod graph;
pub mod projector;
pub mod split;
pub mod subdivide;

pub use graph::SurfaceGraph;
pub use projector::{PointProjector, ProjectedPoint};
pub use split::{GeodesicSplit, SurfacePath, partition_along_path};
pub use subdivide::{MeshEdit, materialize_projected_points, split_edge, subdivide_triangle};
