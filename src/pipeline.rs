use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use glam::DVec3;
use serde::Serialize;
use tracing::info;

use crate::config::{CarveConfig, Command, RunConfig};
use crate::error::Result;
use crate::holes::{close_holes, extract_boundary_loops};
use crate::io::{self, MeshStats};
use crate::repair::{offset_along_normals, weld_appended, weld_vertices};
use crate::surface::GeodesicSplit;
use crate::types::IndexedMesh;

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub report: Report,
    pub duration: Duration,
}

/// Machine-readable result of one command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Report {
    Inspect(MeshStats),
    FillHoles(FillReport),
    Trace(TraceReport),
    Offset(WriteReport),
    Weld(WriteReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    pub output: PathBuf,
    pub holes: Vec<HoleReport>,
    pub triangles: usize,
    /// Boundary loops left after filling and welding.
    pub remaining_loops: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoleReport {
    pub edges: usize,
    pub strategy: String,
    pub triangles: usize,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    /// Polyline points that landed on the surface.
    pub anchors: usize,
    /// Polyline points that did not.
    pub dropped: usize,
    pub vertices: Vec<u32>,
    pub points: Vec<[f64; 3]>,
    pub length: f64,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub output: PathBuf,
    pub vertices: usize,
    pub triangles: usize,
}

/// Command orchestrator -- reads the input, runs one operation, writes the
/// result.
pub struct Pipeline;

impl Pipeline {
    pub fn run(config: &RunConfig) -> Result<RunSummary> {
        let start = Instant::now();
        let carve = &config.carve;

        let report = match &config.command {
            Command::Inspect { input } => Report::Inspect(Self::inspect(input)?),
            Command::FillHoles { input, output, .. } => {
                Report::FillHoles(Self::fill_holes(input, output, carve)?)
            }
            Command::Trace {
                input,
                points,
                output,
            } => Report::Trace(Self::trace(input, points, output.as_deref(), carve)?),
            Command::Offset {
                input,
                output,
                distance,
            } => Report::Offset(Self::offset(input, output, *distance)?),
            Command::Weld { input, output, .. } => Report::Weld(Self::weld(input, output, carve)?),
        };

        let duration = start.elapsed();
        info!(elapsed = ?duration, "Run complete");
        Ok(RunSummary { report, duration })
    }

    fn inspect(input: &Path) -> Result<MeshStats> {
        let mesh = io::load_mesh(input)?;
        io::compute_stats(&mesh)
    }

    fn fill_holes(input: &Path, output: &Path, carve: &CarveConfig) -> Result<FillReport> {
        info!("Stage 1/3: Read");
        let mesh = io::load_mesh(input)?;

        info!("Stage 2/3: Fill");
        let (filled, outcomes) = close_holes(&mesh, &carve.fill)?;
        // Fragments bring their own copies of the loop vertices. Only those
        // are welded; the input keeps its own vertex splits.
        let closed = weld_appended(&filled, mesh.vertex_count(), carve.weld.tolerance)?;
        let remaining_loops = extract_boundary_loops(&closed)?.len();

        info!("Stage 3/3: Write");
        io::write_mesh(output, &closed)?;

        let holes = outcomes
            .iter()
            .map(|o| HoleReport {
                edges: o.edges,
                strategy: o.strategy.to_string(),
                triangles: o.fragment.triangle_count(),
                complete: o.complete,
            })
            .collect();

        Ok(FillReport {
            output: output.to_path_buf(),
            holes,
            triangles: closed.triangle_count(),
            remaining_loops,
        })
    }

    fn trace(
        input: &Path,
        points: &[DVec3],
        output: Option<&Path>,
        carve: &CarveConfig,
    ) -> Result<TraceReport> {
        let mut mesh = io::load_mesh(input)?;

        let split = GeodesicSplit::new(*carve);
        let path = split.trace(&mut mesh, points)?;

        if let Some(output) = output {
            io::write_mesh(output, &mesh)?;
        }

        Ok(TraceReport {
            anchors: path.anchors.len(),
            dropped: points.len().saturating_sub(path.anchors.len()),
            vertices: path.vertices,
            points: path.points.iter().map(|p| p.to_array()).collect(),
            length: path.length,
            output: output.map(Path::to_path_buf),
        })
    }

    fn offset(input: &Path, output: &Path, distance: f64) -> Result<WriteReport> {
        let mesh = io::load_mesh(input)?;
        let moved = offset_along_normals(&mesh, distance)?;
        io::write_mesh(output, &moved)?;
        Ok(write_report(output, &moved))
    }

    fn weld(input: &Path, output: &Path, carve: &CarveConfig) -> Result<WriteReport> {
        let mesh = io::load_mesh(input)?;
        let welded = weld_vertices(&mesh, carve.weld.tolerance)?;
        io::write_mesh(output, &welded)?;
        Ok(write_report(output, &welded))
    }
}

fn write_report(output: &Path, mesh: &IndexedMesh) -> WriteReport {
    WriteReport {
        output: output.to_path_buf(),
        vertices: mesh.vertex_count(),
        triangles: mesh.triangle_count(),
    }
}
