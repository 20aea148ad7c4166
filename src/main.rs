use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mesh2glb::config::{CliArgs, ConvertConfig};
use mesh2glb::pipeline::{ConversionOutcome, Pipeline};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Init tracing
    let filter = if args.verbose {
        EnvFilter::new("mesh2glb=debug")
    } else {
        EnvFilter::new("mesh2glb=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: ConvertConfig = args.into();

    // Configure rayon thread pool
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure rayon thread pool")?;
    }

    match Pipeline::run(&config) {
        Ok(result) => {
            for outcome in &result.outcomes {
                match outcome {
                    ConversionOutcome::Written {
                        input,
                        output,
                        bytes,
                        stats,
                    } => println!(
                        "{} -> {} ({} bytes, {} primitives, {} textures)",
                        input.display(),
                        output.display(),
                        bytes,
                        stats.assembly.primitives,
                        stats.textures
                    ),
                    ConversionOutcome::NothingToConvert { input } => {
                        println!("{}: nothing to convert", input.display())
                    }
                }
            }
            println!(
                "Done: {} of {} inputs written in {:.2}s",
                result.written(),
                result.outcomes.len(),
                result.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            error!(%e, "Conversion failed");
            Err(anyhow::anyhow!(e)).context("mesh2glb conversion failed")
        }
    }
}
