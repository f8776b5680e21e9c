use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use watchface_normalize::{
    AlphaPassthrough, BrandRatios, BrandReport, CommandSegmenter, EngineOptions, FileStatus,
    NormalizeEngine,
};

#[derive(Parser)]
#[command(
    name = "watch-normalize",
    about = "Normalize watch photos per brand: cut out, rescale, re-center, emit safe-area JSON",
    version,
    after_help = "Simple usage: watch-normalize [brand]  (no brand: every folder under input/)\n\n\
                  Outputs go to processed/<brand>/{step1_normalized,step2_aligned,metadata}/."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Brand folder to process (default: all brand folders)
    brand: Option<String>,

    /// Folder containing one sub-folder per brand
    #[arg(long, default_value = "input")]
    input: PathBuf,

    /// Folder receiving the per-brand output trees
    #[arg(long, default_value = "processed")]
    output: PathBuf,

    /// JSON file overriding brand ratios, e.g. {"default": 0.67, "brands": {"rolex": 1.0}}
    #[arg(long)]
    ratios: Option<PathBuf>,

    /// Background removal program, called as <program> <args...> <in.png> <out.png>
    #[arg(long, default_value = "rembg")]
    segmenter: String,

    /// Arguments passed to the segmenter before the file paths
    #[arg(long = "segmenter-arg", default_value = "i", allow_hyphen_values = true)]
    segmenter_args: Vec<String>,

    /// Skip background removal and use the alpha channel already in the source
    #[arg(long)]
    no_segment: bool,

    /// Kill the segmenter after this many seconds (0 = no limit)
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Worker threads for images within a brand (default: all cores)
    #[arg(short, long)]
    jobs: Option<usize>,

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

    if let Some(jobs) = cli.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
        {
            tracing::error!("failed to configure worker pool: {e}");
            process::exit(1);
        }
    }

    let ratios = match &cli.ratios {
        Some(path) => match BrandRatios::from_json_file(path) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("failed to load ratios from {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => BrandRatios::default(),
    };

    let options = EngineOptions {
        input_root: cli.input,
        output_root: cli.output,
    };

    let engine = if cli.no_segment {
        NormalizeEngine::new(AlphaPassthrough, ratios, options)
    } else {
        let mut segmenter = CommandSegmenter::new(cli.segmenter).with_args(cli.segmenter_args);
        if cli.timeout_secs > 0 {
            segmenter = segmenter.with_timeout(Duration::from_secs(cli.timeout_secs));
        }
        NormalizeEngine::new(segmenter, ratios, options)
    };

    let reports = match &cli.brand {
        Some(brand) => engine.process_brand(brand).map(|r| vec![r]),
        None => engine.process_all(),
    };

    match reports {
        Ok(reports) => print_summary(&reports),
        Err(e) => {
            tracing::error!("{e}");
            process::exit(1);
        }
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

fn print_summary(reports: &[BrandReport]) {
    let total: usize = reports.iter().map(|r| r.results.len()).sum();
    let completed: usize = reports.iter().map(BrandReport::completed).sum();
    let empty: usize = reports.iter().map(BrandReport::empty).sum();
    let duplicates: usize = reports.iter().map(BrandReport::duplicates).sum();
    let failed: Vec<_> = reports
        .iter()
        .flat_map(|r| &r.results)
        .filter(|r| matches!(r.status, FileStatus::Failed { .. }))
        .collect();

    tracing::info!(
        "[Summary] completed: {completed}, no content: {empty}, duplicate names: {duplicates}, failed: {} (total: {total})",
        failed.len()
    );
    for result in failed {
        if let FileStatus::Failed { stage, reason } = &result.status {
            tracing::warn!("  [{stage}] {}: {reason}", result.path.display());
        }
    }
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
