//! Batch normalization of watch product photos.
//!
//! Every photo goes through three stages, each writing its own file:
//!
//! 1. **Normalize**: cut the subject out with a [`Segmenter`], crop to its
//!    bounding box, shrink it to the brand's height ratio and center it on a
//!    transparent 1200x1200 canvas.
//! 2. **Align**: shift the canvas content so the subject's vertical midpoint
//!    sits on the canvas midline.
//! 3. **Safe area**: emit JSON describing the content box and a padded area
//!    where UI can be overlaid.
//!
//! A separate [`web_sync`] pass turns the aligned PNGs into WebP assets.
//!
//! # Quick Start
//!
//! ```no_run
//! use watchface_normalize::{align, normalize, generate_safe_area};
//!
//! let cutout = image::open("cutout.png").unwrap().to_rgba8();
//! let stage1 = normalize(&cutout, 0.65).expect("image has content");
//! let stage2 = align(&stage1).expect("image has content");
//! let record = generate_safe_area(&image::DynamicImage::ImageRgba8(stage2), "cutout").unwrap();
//! println!("{}", record.to_json().unwrap());
//! ```
//!
//! # Batch processing
//!
//! ```no_run
//! use watchface_normalize::{BrandRatios, CommandSegmenter, EngineOptions, NormalizeEngine};
//!
//! let engine = NormalizeEngine::new(
//!     CommandSegmenter::rembg(),
//!     BrandRatios::default(),
//!     EngineOptions::default(),
//! );
//! for report in engine.process_all().unwrap() {
//!     println!("{}: {} completed", report.brand, report.completed());
//! }
//! ```

#![deny(missing_docs)]

mod align;
pub mod bbox;
pub mod brand;
pub mod edges;
mod engine;
pub mod error;
mod normalize;
pub mod safe_area;
pub mod segment;
pub mod web_sync;

/// Side length of the square output canvas, for every brand and stage.
pub const CANVAS_SIZE: u32 = 1200;

pub use align::align;
pub use bbox::{find_content_bounds, find_content_bounds_dynamic, BoundingBox};
pub use brand::{BrandRatios, DEFAULT_RATIO};
pub use engine::{
    align_file, discover_images, is_supported_image, safe_area_file, BrandLayout, BrandReport,
    EngineOptions, FileStatus, NormalizeEngine, ProcessResult, Stage, SUPPORTED_EXTENSIONS,
};
pub use error::{Error, Result};
pub use normalize::{normalize, scaled_size};
pub use safe_area::{generate_safe_area, SafeAreaRecord};
pub use segment::{AlphaPassthrough, CommandSegmenter, Segmenter};
pub use web_sync::{sync_to_web, SyncReport, WebSyncOptions};
