pub mod config;
pub mod error;
pub mod holes;
pub mod io;
pub mod pipeline;
pub mod repair;
pub mod spatial;
pub mod surface;
pub mod types;

pub use config::{CarveConfig, RunConfig};
pub use error::{CarveError, Result};
pub use holes::{BoundaryLoop, FillOutcome, FillStrategy};
pub use pipeline::Pipeline;
pub use spatial::{BvhTree, TriangleIndex};
pub use surface::{GeodesicSplit, PointProjector, ProjectedPoint, SurfaceGraph, SurfacePath};
pub use types::{Aabb, IndexedMesh, Triangle};
