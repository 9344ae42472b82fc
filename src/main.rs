//! avifpress CLI - Batch AVIF Converter
//!
//! Scans a directory tree for images and re-encodes each one as AVIF with a
//! bounded number of conversions in flight, then reports the bytes saved.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::HumanBytes;

use avifpress::{
    batch, discover, init_with_level, BatchReporter, BatchStats, CollisionPolicy, Config,
    Converter, NullReporter, ProgressReporter,
};

/// avifpress - Batch AVIF Converter
#[derive(Parser)]
#[command(
    name = "avifpress",
    version,
    about = "Convert your image folders to AVIF to reclaim storage space",
    long_about = "avifpress walks a directory tree, converts every matching image to AVIF \
                  with a capped number of parallel conversions, and prints how many bytes \
                  the batch saved. Per-file failures are listed at the end instead of \
                  aborting the run."
)]
struct Cli {
    /// Root directory to scan for images
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// Maximum conversions in flight (default: logical CPU count)
    #[arg(short = 'j', long, value_name = "N")]
    concurrency: Option<usize>,

    /// Output quality (1-100)
    #[arg(short, long, value_name = "QUALITY")]
    quality: Option<u8>,

    /// Encoder speed, 1 (slowest, best) to 10 (fastest)
    #[arg(short, long, value_name = "SPEED")]
    speed: Option<u8>,

    /// Lossless output (implies quality 100)
    #[arg(long)]
    lossless: bool,

    /// Keep source files after successful conversion
    #[arg(short = 'k', long)]
    keep_originals: bool,

    /// Behavior when the destination file already exists
    #[arg(long, value_enum, value_name = "POLICY")]
    on_collision: Option<CliCollisionPolicy>,

    /// Extension allow-list override (repeatable, case-sensitive)
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Configuration file (TOML); command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (no progress bar, errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// CLI-compatible collision policy enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliCollisionPolicy {
    Overwrite,
    Error,
}

impl From<CliCollisionPolicy> for CollisionPolicy {
    fn from(policy: CliCollisionPolicy) -> Self {
        match policy {
            CliCollisionPolicy::Overwrite => CollisionPolicy::Overwrite,
            CliCollisionPolicy::Error => CollisionPolicy::Error,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    init_with_level(log_level);

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", style("Error").red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;

    let reporter: Arc<dyn BatchReporter> = if cli.quiet {
        Arc::new(NullReporter)
    } else {
        Arc::new(ProgressReporter::new())
    };

    let filter = config.filter()?;
    let paths = discover::discover(&cli.root, &filter, reporter.as_ref())
        .with_context(|| format!("Failed to scan {:?}", cli.root))?;

    if paths.is_empty() {
        println!("No images found");
        return Ok(());
    }

    let converter = Arc::new(Converter::new(&config));
    let stats = batch::run_batch(converter, paths, config.concurrency(), reporter).await?;

    print_summary(&stats);
    Ok(())
}

/// Merge the optional config file with command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Invalid configuration file {:?}", path))?,
        None => Config::default(),
    };

    if cli.concurrency.is_some() {
        config.concurrency = cli.concurrency;
    }
    if let Some(quality) = cli.quality {
        config.encoder.quality = quality;
    }
    if let Some(speed) = cli.speed {
        config.encoder.speed = speed;
    }
    if cli.lossless {
        config.encoder.lossless = true;
    }
    if cli.keep_originals {
        config.keep_originals = true;
    }
    if let Some(policy) = cli.on_collision {
        config.on_collision = policy.into();
    }
    if !cli.extensions.is_empty() {
        config.extensions = cli.extensions.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Print the final batch summary
fn print_summary(stats: &BatchStats) {
    if stats.succeeded > 0 {
        println!(
            "{}: {}",
            style("Total size before").bold(),
            HumanBytes(stats.total_bytes_before)
        );
        println!(
            "{}: {}",
            style("Total size after").bold(),
            HumanBytes(stats.total_bytes_after)
        );
        println!(
            "{}: {} ({:.2}%)",
            style("Saved").green().bold(),
            HumanBytes(stats.saved_bytes()),
            stats.saved_percentage()
        );
    }

    if !stats.failed_paths.is_empty() {
        println!("{}", style("Following files failed:").red().bold());
        for path in &stats.failed_paths {
            println!("\t{}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_config_defaults() {
        let cli = Cli::parse_from([
            "avifpress",
            "photos",
            "-j",
            "4",
            "--quality",
            "55",
            "--speed",
            "9",
            "--keep-originals",
            "--on-collision",
            "error",
            "-e",
            "jpg",
            "-e",
            "png",
        ]);

        let config = build_config(&cli).unwrap();
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.encoder.quality, 55);
        assert_eq!(config.encoder.speed, 9);
        assert!(config.keep_originals);
        assert_eq!(config.on_collision, CollisionPolicy::Error);
        assert_eq!(config.extensions, vec!["jpg", "png"]);
    }

    #[test]
    fn test_invalid_cli_values_are_rejected() {
        let cli = Cli::parse_from(["avifpress", "photos", "--quality", "101"]);
        assert!(build_config(&cli).is_err());

        let cli = Cli::parse_from(["avifpress", "photos", "-j", "0"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_lossless_flag_forces_full_quality() {
        let cli = Cli::parse_from(["avifpress", "photos", "--lossless", "--quality", "50"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.encoder.effective_quality(), 100);
    }
}
