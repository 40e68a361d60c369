pub mod bvh;
pub mod region;
pub mod triangle_index;

pub use bvh::{BoundsProvider, BvhTree, ItemId, QueryRegion};
pub use region::{SphereRegion, SurfaceSphere};
pub use triangle_index::TriangleIndex;
