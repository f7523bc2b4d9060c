//! Wednesday CLI
//!
//! Component-based static site generator.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use wed::cmd::build::Overrides;

/// Command-line interface for Wednesday.
#[derive(Parser)]
#[command(
    name = "wed",
    version,
    about = "A component-based static site generator"
)]
struct Cli {
    /// Path to the settings file (defaults to wed-settings.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the site
    Build {
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory holding components and pages
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Minify emitted styles and scripts
        #[arg(long)]
        minify: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    wed::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            output,
            input,
            minify,
        } => {
            let overrides = Overrides {
                input,
                output,
                minify,
            };
            wed::cmd::build::run(cli.config.as_deref(), &overrides)?;
        }
    }

    Ok(())
}
