pub mod bounds;
pub mod mesh;
pub mod triangle;

#[cfg(test)]
pub(crate) mod fixtures;

pub use bounds::Aabb;
pub use mesh::{IndexedMesh, compact_mesh};
pub use triangle::Triangle;
