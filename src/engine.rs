//! Per-brand batch driver.
//!
//! Stages are chained through the filesystem: Stage 2 reads the PNG Stage 1
//! wrote and Stage 3 reads the PNG Stage 2 wrote, so every intermediate file
//! can be inspected and every stage re-run on its own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageFormat, RgbaImage};

use crate::align::align;
use crate::brand::BrandRatios;
use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::safe_area::{generate_safe_area, SafeAreaRecord};
use crate::segment::Segmenter;

/// File extensions picked up from brand folders (matched case-sensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "PNG", "jpg", "JPG", "jpeg", "JPEG", "webp", "WEBP",
];

/// Progress is logged after this many images.
const PROGRESS_INTERVAL: usize = 10;

const STEP1_DIR: &str = "step1_normalized";
const STEP2_DIR: &str = "step2_aligned";
const METADATA_DIR: &str = "metadata";

/// Where the engine reads brand folders from and writes results to.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Folder holding one sub-folder per brand.
    pub input_root: PathBuf,
    /// Folder receiving one output tree per brand.
    pub output_root: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("input"),
            output_root: PathBuf::from("processed"),
        }
    }
}

/// One of the three per-image stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Segment, crop, scale and center.
    Normalize,
    /// Vertical re-centering.
    Align,
    /// Safe-area metadata.
    SafeArea,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normalize => "STEP1",
            Self::Align => "STEP2",
            Self::SafeArea => "STEP3",
        })
    }
}

/// How far one image got through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// All three outputs were written.
    Completed(SafeAreaRecord),
    /// A stage found no visible content; later stages were not run.
    Empty(Stage),
    /// A stage failed; later stages were not run.
    Failed {
        /// Stage that failed.
        stage: Stage,
        /// Error message.
        reason: String,
    },
    /// Another source with the same stem owns the output names; nothing was
    /// run or written for this file.
    Duplicate {
        /// Source that was processed instead.
        kept: PathBuf,
    },
}

/// Result of running one source image through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Source image path.
    pub path: PathBuf,
    /// Final status.
    pub status: FileStatus,
}

impl ProcessResult {
    /// Whether every stage produced output.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.status, FileStatus::Completed(_))
    }
}

/// Output folders for one brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandLayout {
    /// Stage 1 PNGs.
    pub step1: PathBuf,
    /// Stage 2 PNGs.
    pub step2: PathBuf,
    /// Stage 3 JSON records.
    pub metadata: PathBuf,
}

impl BrandLayout {
    /// Layout under `<output_root>/<brand>/`.
    #[must_use]
    pub fn new(output_root: &Path, brand: &str) -> Self {
        let base = output_root.join(brand);
        Self {
            step1: base.join(STEP1_DIR),
            step2: base.join(STEP2_DIR),
            metadata: base.join(METADATA_DIR),
        }
    }

    /// Create all three folders.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutputDir`] naming the folder that could not be created.
    pub fn create(&self) -> Result<()> {
        for dir in [&self.step1, &self.step2, &self.metadata] {
            std::fs::create_dir_all(dir).map_err(|source| Error::OutputDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Stage 1 output for a source stem; always PNG.
    #[must_use]
    pub fn step1_path(&self, stem: &str) -> PathBuf {
        self.step1.join(format!("{stem}.png"))
    }

    /// Stage 2 output for a source stem; always PNG.
    #[must_use]
    pub fn step2_path(&self, stem: &str) -> PathBuf {
        self.step2.join(format!("{stem}.png"))
    }

    /// Stage 3 output for a source stem.
    #[must_use]
    pub fn metadata_path(&self, stem: &str) -> PathBuf {
        self.metadata.join(format!("{stem}.json"))
    }

    /// Remove outputs left by an earlier run for `stage` and every later stage.
    fn clear_from(&self, stage: Stage, stem: &str) {
        let outputs = [
            (Stage::Normalize, self.step1_path(stem)),
            (Stage::Align, self.step2_path(stem)),
            (Stage::SafeArea, self.metadata_path(stem)),
        ];
        for (_, path) in outputs.iter().filter(|(s, _)| *s >= stage) {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("could not remove stale {}: {e}", path.display());
                }
            }
        }
    }
}

/// Outcome of one brand run.
#[derive(Debug, Clone)]
pub struct BrandReport {
    /// Brand folder name as given.
    pub brand: String,
    /// Height ratio applied.
    pub ratio: f64,
    /// One entry per discovered image, in sorted path order.
    pub results: Vec<ProcessResult>,
}

impl BrandReport {
    /// Images that produced all three outputs.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_completed()).count()
    }

    /// Images stopped because a stage found nothing visible.
    #[must_use]
    pub fn empty(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, FileStatus::Empty(_)))
            .count()
    }

    /// Images stopped by an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, FileStatus::Failed { .. }))
            .count()
    }

    /// Images skipped because another source shares their stem.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, FileStatus::Duplicate { .. }))
            .count()
    }
}

/// Drives brand folders through the three stages.
///
/// Create once and reuse; the brand table and segmenter are shared by every
/// image.
pub struct NormalizeEngine {
    segmenter: Box<dyn Segmenter>,
    ratios: BrandRatios,
    options: EngineOptions,
}

impl NormalizeEngine {
    /// Build an engine around a background remover and a ratio table.
    #[must_use]
    pub fn new(
        segmenter: impl Segmenter + 'static,
        ratios: BrandRatios,
        options: EngineOptions,
    ) -> Self {
        Self {
            segmenter: Box::new(segmenter),
            ratios,
            options,
        }
    }

    /// Names of all brand folders under the input root, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingInputRoot`] when the input root does not exist.
    pub fn brand_names(&self) -> Result<Vec<String>> {
        let root = self.input_root()?;
        let mut brands: Vec<String> = std::fs::read_dir(root)?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_ok_and(|ft| ft.is_dir()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        brands.sort();
        Ok(brands)
    }

    /// Process every brand folder, in sorted order.
    ///
    /// # Errors
    ///
    /// Fails before any processing if the input root is missing, and stops at
    /// the first brand whose output folders cannot be created.
    pub fn process_all(&self) -> Result<Vec<BrandReport>> {
        let brands = self.brand_names()?;
        if brands.is_empty() {
            tracing::warn!(
                "no brand folders under {}",
                self.options.input_root.display()
            );
            return Ok(Vec::new());
        }

        tracing::info!("processing {} brands", brands.len());
        let reports = brands
            .iter()
            .map(|brand| self.process_brand(brand))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(
            "all brands done; results are under {}",
            self.options.output_root.display()
        );
        Ok(reports)
    }

    /// Process the images directly under `<input_root>/<brand>/`.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Per-image failures are recorded in the report, never returned.
    ///
    /// # Errors
    ///
    /// Fails if the input root is missing, the output folders cannot be
    /// created, or the brand folder cannot be listed.
    pub fn process_brand(&self, brand: &str) -> Result<BrandReport> {
        let input_dir = self.input_root()?.join(brand);
        let ratio = self.ratios.ratio_for(brand);
        let layout = BrandLayout::new(&self.options.output_root, brand);
        layout.create()?;

        let mut report = BrandReport {
            brand: brand.to_string(),
            ratio,
            results: Vec::new(),
        };
        let tag = brand.to_uppercase();

        if !input_dir.is_dir() {
            tracing::warn!("[{tag}] brand folder {} not found", input_dir.display());
            return Ok(report);
        }
        let (files, duplicates) = split_by_stem(discover_images(&input_dir)?);
        for (path, kept) in &duplicates {
            tracing::warn!(
                "[{tag}] {} skipped: {} already writes the same output names",
                path.display(),
                kept.display()
            );
        }
        report.results = duplicates
            .into_iter()
            .map(|(path, kept)| ProcessResult {
                path,
                status: FileStatus::Duplicate { kept },
            })
            .collect();
        if files.is_empty() {
            tracing::info!("[{tag}] no images to process");
            return Ok(report);
        }

        let total = files.len();
        tracing::info!("[{tag}] processing {total} images (ratio {ratio})");
        let done = AtomicUsize::new(0);
        let run = |path: &PathBuf| {
            let result = self.process_file(path, &layout, ratio);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if n % PROGRESS_INTERVAL == 0 || n == total {
                tracing::info!("[{tag}]  > {n}/{total} done");
            }
            result
        };

        #[cfg(feature = "cli")]
        let processed: Vec<ProcessResult> = {
            use rayon::prelude::*;
            files.par_iter().map(run).collect()
        };

        #[cfg(not(feature = "cli"))]
        let processed: Vec<ProcessResult> = files.iter().map(run).collect();

        report.results.extend(processed);
        report.results.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!(
            "[{tag}] completed {}, empty {}, failed {}, duplicate {}",
            report.completed(),
            report.empty(),
            report.failed(),
            report.duplicates()
        );
        Ok(report)
    }

    /// Run one source image through all three stages.
    ///
    /// Output names use the source stem with `.png` / `.json`. A stage that
    /// fails or finds nothing stops the chain, and outputs an earlier run left
    /// for that stage and the following ones are removed.
    #[must_use]
    pub fn process_file(&self, input: &Path, layout: &BrandLayout, ratio: f64) -> ProcessResult {
        let filename = input.file_name().map_or_else(
            || input.display().to_string(),
            |f| f.to_string_lossy().into_owned(),
        );
        let status = match input.file_stem() {
            Some(stem) => {
                let stem = stem.to_string_lossy();
                let status = self.run_stages(input, &stem, layout, ratio);
                match &status {
                    FileStatus::Completed(_) | FileStatus::Duplicate { .. } => {}
                    FileStatus::Empty(stage) | FileStatus::Failed { stage, .. } => {
                        layout.clear_from(*stage, &stem);
                    }
                }
                status
            }
            None => FileStatus::Failed {
                stage: Stage::Normalize,
                reason: "path has no file name".to_string(),
            },
        };

        match &status {
            FileStatus::Completed(_) => tracing::debug!("{filename}: done"),
            FileStatus::Empty(stage) => tracing::debug!("[{stage}] {filename}: no visible content"),
            FileStatus::Failed { stage, reason } => tracing::error!("[{stage}] {filename}: {reason}"),
            FileStatus::Duplicate { kept } => {
                tracing::debug!("{filename}: superseded by {}", kept.display());
            }
        }

        ProcessResult {
            path: input.to_path_buf(),
            status,
        }
    }

    fn run_stages(
        &self,
        input: &Path,
        stem: &str,
        layout: &BrandLayout,
        ratio: f64,
    ) -> FileStatus {
        let step1 = layout.step1_path(stem);
        let step2 = layout.step2_path(stem);
        let metadata = layout.metadata_path(stem);

        let chain = || -> std::result::Result<SafeAreaRecord, FileStatus> {
            settle(Stage::Normalize, self.normalize_file(input, &step1, ratio))?;
            settle(Stage::Align, align_file(&step1, &step2))?;
            settle(Stage::SafeArea, safe_area_file(&step2, &metadata))
        };
        match chain() {
            Ok(record) => FileStatus::Completed(record),
            Err(status) => status,
        }
    }

    /// Stage 1 on disk: decode, segment, normalize, write PNG.
    ///
    /// Returns `Ok(None)` (and writes nothing) when segmentation left no
    /// visible pixel.
    ///
    /// # Errors
    ///
    /// Fails on decode, segmentation or write errors.
    pub fn normalize_file(
        &self,
        input: &Path,
        output: &Path,
        max_ratio: f64,
    ) -> Result<Option<RgbaImage>> {
        let source = image::open(input)?.to_rgba8();
        let segmented = self.segmenter.segment(&source)?;
        let Some(normalized) = normalize(&segmented, max_ratio) else {
            return Ok(None);
        };
        normalized.save_with_format(output, ImageFormat::Png)?;
        Ok(Some(normalized))
    }

    fn input_root(&self) -> Result<&Path> {
        let root = self.options.input_root.as_path();
        if root.is_dir() {
            Ok(root)
        } else {
            Err(Error::MissingInputRoot(root.to_path_buf()))
        }
    }
}

/// Stage 2 on disk: read a Stage 1 PNG, align it, write PNG.
///
/// Returns `Ok(None)` (and writes nothing) when the input has no content.
///
/// # Errors
///
/// Fails on decode or write errors.
pub fn align_file(input: &Path, output: &Path) -> Result<Option<RgbaImage>> {
    let image = image::open(input)?.to_rgba8();
    let Some(aligned) = align(&image) else {
        return Ok(None);
    };
    aligned.save_with_format(output, ImageFormat::Png)?;
    Ok(Some(aligned))
}

/// Stage 3 on disk: read a Stage 2 PNG, write its safe-area JSON.
///
/// The record's `ref` is the input file stem.
///
/// # Errors
///
/// Fails on decode or write errors.
pub fn safe_area_file(input: &Path, output: &Path) -> Result<Option<SafeAreaRecord>> {
    let image = image::open(input)?;
    let reference = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(record) = generate_safe_area(&image, &reference) else {
        return Ok(None);
    };
    record.write_to(output)?;
    Ok(Some(record))
}

fn settle<T>(stage: Stage, result: Result<Option<T>>) -> std::result::Result<T, FileStatus> {
    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(FileStatus::Empty(stage)),
        Err(e) => Err(FileStatus::Failed {
            stage,
            reason: e.to_string(),
        }),
    }
}

/// Check if a file has one of the [`SUPPORTED_EXTENSIONS`].
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

/// Supported image files directly inside `dir` (not recursive), deduplicated
/// and sorted.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let files: BTreeSet<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    Ok(files.into_iter().collect())
}

/// Keep the first file (in the given order) for every output stem.
///
/// Returns the kept files and, for each dropped file, the file that owns its
/// output names. Output paths are unique per kept file.
fn split_by_stem(files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>) {
    let mut owners: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut kept = Vec::with_capacity(files.len());
    let mut duplicates = Vec::new();
    for path in files {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match owners.get(&stem) {
            Some(owner) => duplicates.push((path, owner.clone())),
            None => {
                owners.insert(stem, path.clone());
                kept.push(path);
            }
        }
    }
    (kept, duplicates)
}
