use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glam::DVec3;

/// Bounding volume tree parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeConfig {
    /// Leaves at this depth are no longer split; they grow instead.
    pub max_depth: usize,
    pub max_leaf_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_leaf_size: 20,
        }
    }
}

/// Expanding-radius nearest-triangle search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub initial_radius: f64,
    /// The search gives up once the radius exceeds this value. Must exceed
    /// the mesh diameter for the search to be exact.
    pub max_radius: f64,
    pub growth_factor: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_radius: 0.1,
            max_radius: 1000.0,
            growth_factor: 2.0,
        }
    }
}

/// Point projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionConfig {
    /// Barycentric tolerance for the interior / on-edge classification.
    pub epsilon: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self { epsilon: 1e-6 }
    }
}

/// Hole triangulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillConfig {
    /// Loops with at most this many edges use the centroid fan.
    pub fan_max_edges: usize,
    /// Loops with at most this many edges use planar earcut; larger loops
    /// use advancing-front ear clipping.
    pub earcut_max_edges: usize,
    /// Cross-product length below which a candidate triangle is degenerate.
    pub degenerate_tolerance: f64,
    /// Distance below which two loop vertices are merged before triangulating.
    pub dedup_tolerance: f64,
    /// When set, earcut triangles facing away from this point are dropped.
    pub viewpoint: Option<DVec3>,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            fan_max_edges: 6,
            earcut_max_edges: 50,
            degenerate_tolerance: 1e-8,
            dedup_tolerance: 1e-6,
            viewpoint: None,
        }
    }
}

/// Vertex welding parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeldConfig {
    pub tolerance: f64,
}

impl Default for WeldConfig {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}

/// Every tunable of the core, grouped by component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarveConfig {
    pub tree: TreeConfig,
    pub search: SearchConfig,
    pub projection: ProjectionConfig,
    pub fill: FillConfig,
    pub weld: WeldConfig,
}

/// Fully resolved command-line invocation (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub command: Command,
    pub carve: CarveConfig,
    pub verbose: bool,
    pub threads: Option<usize>,
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "mesh-carve",
    about = "Surface tracing, splitting and hole filling on triangle meshes",
    version
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Initial radius of the nearest-triangle search
    #[arg(long, global = true, default_value_t = 0.1)]
    pub search_radius: f64,

    /// Radius at which the nearest-triangle search gives up
    #[arg(long, global = true, default_value_t = 1000.0)]
    pub max_search_radius: f64,

    /// Max items per bounding volume tree leaf
    #[arg(long, global = true, default_value_t = 20)]
    pub max_leaf_size: usize,

    /// Barycentric tolerance for point projection
    #[arg(long, global = true, default_value_t = 1e-6)]
    pub epsilon: f64,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Report mesh statistics and boundary loops
    Inspect {
        /// Input OBJ file
        #[arg(short = 'i', long)]
        input: PathBuf,
    },
    /// Fill every boundary loop and write the closed mesh
    FillHoles {
        /// Input OBJ file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output OBJ file
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Loops with at most this many edges use the centroid fan
        #[arg(long, default_value_t = 6)]
        fan_max_edges: usize,
        /// Loops with at most this many edges use planar earcut
        #[arg(long, default_value_t = 50)]
        earcut_max_edges: usize,
    },
    /// Project a polyline onto the surface and trace the geodesic through it
    Trace {
        /// Input OBJ file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Polyline point as x,y,z (repeat for each point)
        #[arg(short = 'p', long = "point", value_parser = parse_point, required = true)]
        points: Vec<DVec3>,
        /// Write the mesh with inserted path vertices here
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Move every vertex along its normal
    Offset {
        /// Input OBJ file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output OBJ file
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Signed offset distance
        #[arg(short = 'd', long, allow_hyphen_values = true)]
        distance: f64,
    },
    /// Merge vertices closer than a tolerance
    Weld {
        /// Input OBJ file
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output OBJ file
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Merge tolerance
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
    },
}

/// Parse `x,y,z` into a point.
pub fn parse_point(s: &str) -> Result<DVec3, String> {
    let coords: Vec<f64> = s
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match coords.as_slice() {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z but got '{s}'")),
    }
}

impl From<CliArgs> for RunConfig {
    fn from(args: CliArgs) -> Self {
        let mut carve = CarveConfig {
            tree: TreeConfig {
                max_leaf_size: args.max_leaf_size,
                ..Default::default()
            },
            search: SearchConfig {
                initial_radius: args.search_radius,
                max_radius: args.max_search_radius,
                ..Default::default()
            },
            projection: ProjectionConfig {
                epsilon: args.epsilon,
            },
            ..Default::default()
        };

        match &args.command {
            Command::FillHoles {
                fan_max_edges,
                earcut_max_edges,
                ..
            } => {
                carve.fill.fan_max_edges = *fan_max_edges;
                carve.fill.earcut_max_edges = *earcut_max_edges;
            }
            Command::Weld { tolerance, .. } => carve.weld.tolerance = *tolerance,
            _ => {}
        }

        RunConfig {
            command: args.command,
            carve,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}
