//! Wednesday CLI Library
//!
//! Command implementations for the `wed` binary, exposed as a library so
//! they can be driven from tests.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (build)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use wed::cmd::build::{self, Overrides};
//!
//! build::run(Some(Path::new("wed-settings.json")), &Overrides::default()).unwrap();
//! ```

pub mod cmd;

pub use wed_core::Settings;
pub use wed_generator::{BuildStats, Builder};

/// Install the `wed` log subscriber.
///
/// `verbose` is the number of `-v` flags. None logs warnings only (invalid
/// sources, failed pages), `-v` adds the phase summaries and build stats,
/// `-vv` adds a line per expanded, composed and written page, `-vvv`
/// everything. Directives in `RUST_LOG` such as
/// `RUST_LOG=wed_generator::page=trace` are added on top. Event targets are
/// hidden.
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
