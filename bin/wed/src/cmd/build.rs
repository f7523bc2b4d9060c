//! Build command - generates the static site

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr, eyre};
use wed_core::Settings;
use wed_generator::{BuildStats, Builder};

/// Settings file picked up from the working directory when none is given.
pub const DEFAULT_SETTINGS: &str = "wed-settings.json";

/// Command-line values layered over the loaded settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub minify: bool,
}

/// Load settings from `config`, or from [`DEFAULT_SETTINGS`] when present,
/// then apply the overrides.
pub fn load_settings(config: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let path = config.or_else(|| {
        let default = Path::new(DEFAULT_SETTINGS);
        default.exists().then_some(default)
    });

    let mut settings = Settings::load_or_default(path).wrap_err("Failed to load settings")?;

    if let Some(input) = &overrides.input {
        settings.input_dir = input.clone();
    }
    if let Some(output) = &overrides.output {
        settings.output_dir = output.clone();
    }
    if overrides.minify {
        settings.minify = true;
    }

    tracing::debug!(?settings, "Loaded settings");
    Ok(settings)
}

/// Run the build command.
///
/// Every error collected by the build is printed before failing.
pub fn run(config: Option<&Path>, overrides: &Overrides) -> Result<BuildStats> {
    let settings = load_settings(config, overrides)?;
    let output = settings.output_dir.clone();

    let report = Builder::new(settings).build();

    if !report.is_success() {
        eprintln!();
        eprintln!("  Build failed:");
        for err in &report.errors {
            eprintln!("  ✗ {err}");
        }
        eprintln!();
        return Err(eyre!("{} errors during build", report.errors.len()));
    }

    let stats = report.stats;
    println!();
    println!("  Build completed successfully!");
    println!();
    println!("  Components: {}", stats.components);
    println!("  Pages:      {}", stats.pages);
    println!("  Dynamics:   {}", stats.dynamics);
    println!("  Assets:     {}", stats.static_files);
    println!();
    println!("  Duration:   {}ms", stats.duration_ms);
    println!("  Output:     {}", output.display());
    println!();

    Ok(stats)
}
