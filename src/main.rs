//! Tagver CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tagver::Pipeline;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compute a project's version from its version-control repository.
#[derive(Debug, Parser)]
#[command(name = "tagver", version)]
struct Cli {
    /// Root of the project to compute the version for.
    #[arg(default_value = ".")]
    project_dir: PathBuf,

    /// Update the file configured in the `write` subtable, if any.
    #[arg(short, long)]
    write: bool,

    /// Print the next version after the current tagged version instead.
    #[arg(short, long)]
    next_version: bool,

    /// Print the full run report as JSON instead of just the version.
    #[arg(long, conflicts_with = "next_version")]
    json: bool,

    /// Show more log messages. Repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize the tracing subscriber for logging.
///
/// Log level defaults to WARN and is raised to INFO by `-v` and DEBUG by
/// `-vv`; `RUST_LOG` overrides when no `-v` is given.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagver=warn")),
        1 => EnvFilter::new("tagver=info"),
        _ => EnvFilter::new("tagver=debug"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_project_dir(&cli.project_dir)?;
    if cli.next_version {
        println!("{}", pipeline.get_next_version()?);
    } else if cli.json {
        let outcome = pipeline.run(cli.write, true)?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", pipeline.get_version(cli.write, true)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!("tagver starting with args: {:?}", cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tagver: {e}");
            ExitCode::from(1)
        }
    }
}
