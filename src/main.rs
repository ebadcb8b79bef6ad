//! pyratiff - convert raster images into tiled pyramidal TIFF or SVS files.
//!
//! This binary parses the CLI, configures logging, and dispatches to the
//! conversion pipeline.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyratiff::{convert, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = match cli.to_options() {
        Ok(options) => options,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // A missing source is an expected operational condition: report and
    // return a plain failure code without an error chain.
    if !cli.source.is_file() {
        error!("Source file not found: {}", cli.source.display());
        return ExitCode::FAILURE;
    }

    match convert(&cli.source, cli.output.as_deref(), &options) {
        Ok(path) => {
            info!("wrote {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("conversion failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pyratiff=debug"
    } else {
        "pyratiff=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
