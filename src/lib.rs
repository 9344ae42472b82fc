//! avifpress - Batch AVIF Converter
//!
//! Discovers images under a directory tree and re-encodes each one as AVIF
//! with a bounded number of conversions in flight. Per-file failures are
//! collected into the batch summary instead of aborting the run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use avifpress::{batch, discover, BatchReporter, Config, Converter, NullReporter};
//!
//! #[tokio::main]
//! async fn main() -> avifpress::Result<()> {
//!     let config = Config::default();
//!     let reporter: Arc<dyn BatchReporter> = Arc::new(NullReporter);
//!
//!     let paths = discover::discover(Path::new("photos"), &config.filter()?, reporter.as_ref())?;
//!     let converter = Arc::new(Converter::new(&config));
//!     let stats = batch::run_batch(converter, paths, config.concurrency(), reporter).await?;
//!
//!     println!("Saved {} bytes ({:.2}%)", stats.saved_bytes(), stats.saved_percentage());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod convert;
pub mod discover;
pub mod error;

// Re-export commonly used types
pub use batch::{run_batch, Aggregator, BatchReporter, BatchStats, NullReporter, ProgressReporter, TaskOutcome};
pub use config::{CollisionPolicy, Config, EncoderSettings, PathFilter};
pub use convert::{Convert, Converter};
pub use error::{AvifpressError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the environment filter
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_level("info");
}

/// Initialize logging with a fallback level for when `RUST_LOG` is unset
///
/// Builds the filter directly instead of mutating the process environment,
/// which is not safe once runtime threads exist.
pub fn init_with_level(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    );
}
