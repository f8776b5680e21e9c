use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use watchface_normalize::web_sync::DEFAULT_WEBP_QUALITY;
use watchface_normalize::{sync_to_web, WebSyncOptions};

#[derive(Parser)]
#[command(
    name = "watch-websync",
    about = "Back up aligned PNGs and publish them as lossy WebP on white",
    version
)]
struct Cli {
    /// Root of the processed per-brand trees (searched for step2_aligned/*.png)
    #[arg(long, default_value = "processed")]
    processed: PathBuf,

    /// Folder receiving byte-for-byte PNG backups
    #[arg(long, default_value = "final/image/original_png")]
    backup: PathBuf,

    /// Folder receiving the WebP files
    #[arg(long, default_value = "final/image/normalized")]
    webp: PathBuf,

    /// WebP quality (0-100)
    #[arg(long, default_value_t = DEFAULT_WEBP_QUALITY)]
    quality: f32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if !(0.0..=100.0).contains(&cli.quality) {
        tracing::error!("quality must be between 0 and 100");
        process::exit(1);
    }

    let opts = WebSyncOptions {
        processed_root: cli.processed,
        backup_dir: cli.backup,
        webp_dir: cli.webp,
        quality: cli.quality,
    };

    if let Err(e) = sync_to_web(&opts) {
        tracing::error!("{e}");
        process::exit(1);
    }
}

fn default_level(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = default_level(verbose, quiet);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_keeps_only_errors() {
        assert_eq!(default_level(false, true), "error");
        assert_eq!(default_level(true, true), "error");
        assert_eq!(default_level(true, false), "debug");
        assert_eq!(default_level(false, false), "info");
    }
}
