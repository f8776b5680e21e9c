//! Publish aligned images as web assets.
//!
//! Every `step2_aligned/*.png` under the processed tree is copied verbatim to a
//! backup folder and re-encoded as lossy WebP on an opaque white background.
//! Transparency is intentionally dropped from the WebP variant.

use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Default WebP quality (0-100).
pub const DEFAULT_WEBP_QUALITY: f32 = 80.0;

const ALIGNED_DIR: &str = "step2_aligned";

/// Folders and encoder settings for [`sync_to_web`].
#[derive(Debug, Clone)]
pub struct WebSyncOptions {
    /// Root of the per-brand processed trees, searched recursively.
    pub processed_root: PathBuf,
    /// Receives a byte-for-byte copy of every aligned PNG.
    pub backup_dir: PathBuf,
    /// Receives `<stem>.webp` files.
    pub webp_dir: PathBuf,
    /// Lossy WebP quality (0-100).
    pub quality: f32,
}

impl Default for WebSyncOptions {
    fn default() -> Self {
        Self {
            processed_root: PathBuf::from("processed"),
            backup_dir: PathBuf::from("final/image/original_png"),
            webp_dir: PathBuf::from("final/image/normalized"),
            quality: DEFAULT_WEBP_QUALITY,
        }
    }
}

/// Outcome of a sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Aligned PNGs found.
    pub found: usize,
    /// Files backed up and converted.
    pub converted: usize,
    /// Files that failed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

/// Aligned PNGs under `processed_root`, sorted.
#[must_use]
pub fn find_aligned_pngs(processed_root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(processed_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| is_aligned_png(p))
        .collect();
    paths.sort();
    paths
}

fn is_aligned_png(path: &Path) -> bool {
    let in_aligned_dir = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == ALIGNED_DIR);
    in_aligned_dir && path.extension().is_some_and(|ext| ext == "png")
}

/// Back up and convert every aligned PNG.
///
/// Per-file errors are logged and collected in the report.
///
/// # Errors
///
/// Returns [`Error::OutputDir`] if the backup or WebP folder cannot be created.
pub fn sync_to_web(opts: &WebSyncOptions) -> Result<SyncReport> {
    for dir in [&opts.backup_dir, &opts.webp_dir] {
        std::fs::create_dir_all(dir).map_err(|source| Error::OutputDir {
            path: dir.clone(),
            source,
        })?;
    }

    let sources = find_aligned_pngs(&opts.processed_root);
    let mut report = SyncReport {
        found: sources.len(),
        ..SyncReport::default()
    };
    if sources.is_empty() {
        tracing::warn!(
            "no PNG files found in {}/**/{ALIGNED_DIR}/; run the normalizer first",
            opts.processed_root.display()
        );
        return Ok(report);
    }
    tracing::info!("found {} processed files to sync", sources.len());

    for src in &sources {
        let filename = src.file_name().map_or_else(
            || src.display().to_string(),
            |f| f.to_string_lossy().into_owned(),
        );
        match sync_one(src, opts) {
            Ok(()) => {
                tracing::info!("  [OK] {filename} -> WebP & backup done");
                report.converted += 1;
            }
            Err(e) => {
                tracing::error!("  [FAIL] {filename}: {e}");
                report.failures.push((src.clone(), e.to_string()));
            }
        }
    }

    tracing::info!(
        "sync complete: {} of {} assets ready for the web",
        report.converted,
        report.found
    );
    Ok(report)
}

fn sync_one(src: &Path, opts: &WebSyncOptions) -> Result<()> {
    let filename = src
        .file_name()
        .ok_or_else(|| Error::Io(std::io::Error::other("path has no file name")))?;
    let stem = src.file_stem().unwrap_or(filename).to_string_lossy();

    std::fs::copy(src, opts.backup_dir.join(filename))?;

    let flat = flatten_on_white(&image::open(src)?.to_rgba8());
    let webp = encode_webp(&flat, opts.quality)?;
    std::fs::write(opts.webp_dir.join(format!("{stem}.webp")), webp)?;
    Ok(())
}

/// Composite over opaque white: `(c * a + 255 * (255 - a)) / 255`, rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        let a = u32::from(src[3]);
        for c in 0..3 {
            let v = u32::from(src[c]) * a + 255 * (255 - a);
            dst[c] = ((v + 127) / 255) as u8;
        }
    }
    out
}

/// Lossy WebP bytes for an RGB image.
///
/// # Errors
///
/// Returns [`Error::WebpEncode`] if libwebp rejects the input.
pub fn encode_webp(image: &RgbImage, quality: f32) -> Result<Vec<u8>> {
    let encoder = webp::Encoder::from_rgb(image.as_raw(), image.width(), image.height());
    let memory = encoder
        .encode_simple(false, quality)
        .map_err(|e| Error::WebpEncode(format!("{e:?}")))?;
    Ok(memory.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn flatten_keeps_opaque_and_whitens_transparent() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 128]));
        let flat = flatten_on_white(&img);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([255, 255, 255]));
        // 255 * 127 / 255 = 127
        assert_eq!(flat.get_pixel(2, 0), &Rgb([127, 127, 127]));
    }

    #[test]
    fn only_pngs_in_aligned_folders_qualify() {
        assert!(is_aligned_png(Path::new("processed/omega/step2_aligned/a.png")));
        assert!(!is_aligned_png(Path::new("processed/omega/step1_normalized/a.png")));
        assert!(!is_aligned_png(Path::new("processed/omega/step2_aligned/a.PNG")));
        assert!(!is_aligned_png(Path::new("processed/omega/metadata/a.json")));
    }

    #[test]
    fn default_paths_match_asset_tree() {
        let opts = WebSyncOptions::default();
        assert_eq!(opts.processed_root, PathBuf::from("processed"));
        assert_eq!(opts.backup_dir, PathBuf::from("final/image/original_png"));
        assert_eq!(opts.webp_dir, PathBuf::from("final/image/normalized"));
        assert!((opts.quality - 80.0).abs() < f32::EPSILON);
    }

    #[test]
    fn encoded_webp_has_riff_header() {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 100, 50]));
        let bytes = encode_webp(&img, DEFAULT_WEBP_QUALITY).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }
}
