use std::io;

/// All error types for the mesh-carve core.
#[derive(thiserror::Error, Debug)]
pub enum CarveError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No path from vertex {start} to vertex {end}")]
    NoPath { start: u32, end: u32 },
    #[error("Degenerate geometry: {0}")]
    Degenerate(String),
    #[error("Incomplete triangulation: {0}")]
    Incomplete(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CarveError>;
