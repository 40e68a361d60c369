use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mesh_carve::config::{CliArgs, RunConfig};
use mesh_carve::pipeline::{Pipeline, Report};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Logs go to stderr so stdout stays clean for reports.
    let filter = if args.verbose {
        EnvFilter::new("mesh_carve=debug")
    } else {
        EnvFilter::new("mesh_carve=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config: RunConfig = args.into();

    // Configure rayon thread pool
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure rayon thread pool")?;
    }

    match Pipeline::run(&config) {
        Ok(summary) => {
            match &summary.report {
                Report::Inspect(_) | Report::Trace(_) => {
                    let json = serde_json::to_string_pretty(&summary.report)
                        .context("Failed to serialize report")?;
                    println!("{json}");
                }
                Report::FillHoles(fill) => println!(
                    "Done: filled {} holes ({} still open), wrote {} triangles to {} in {:.2}s",
                    fill.holes.iter().filter(|h| h.complete).count(),
                    fill.remaining_loops,
                    fill.triangles,
                    fill.output.display(),
                    summary.duration.as_secs_f64()
                ),
                Report::Offset(written) | Report::Weld(written) => println!(
                    "Done: wrote {} vertices / {} triangles to {} in {:.2}s",
                    written.vertices,
                    written.triangles,
                    written.output.display(),
                    summary.duration.as_secs_f64()
                ),
            }
            Ok(())
        }
        Err(e) => {
            error!(%e, "Run failed");
            Err(anyhow::anyhow!(e)).context("mesh-carve failed")
        }
    }
}
