pub mod boundary;
pub mod fill;

pub use boundary::{
    BoundaryLoop, boundary_edge_segments, extract_boundary_loops, find_boundary_edges,
    group_into_loops,
};
pub use fill::{FillOutcome, FillStrategy, close_holes, fill_hole, fill_holes};
