//! Stage 3: safe-area metadata for overlay placement.

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::bbox::{find_content_bounds_dynamic, BoundingBox};
use crate::error::Result;
use crate::CANVAS_SIZE;

/// Horizontal margin as a fraction of the content width.
pub const MARGIN_X_RATIO: f64 = 0.07;
/// Vertical margin as a fraction of the content height.
pub const MARGIN_Y_RATIO: f64 = 0.12;

/// Per-image metadata written next to the aligned image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeAreaRecord {
    /// File stem of the source image.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Canvas `[width, height]`.
    pub canvas: [u32; 2],
    /// Content box `[x, y, width, height]`.
    pub bbox: [u32; 4],
    /// Padded overlay area `[x, y, width, height]`, within the canvas.
    pub safe_area: [u32; 4],
}

impl SafeAreaRecord {
    /// Pretty-printed JSON (two-space indent, UTF-8).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the record as JSON to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Fails if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a record previously written by [`SafeAreaRecord::write_to`].
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid record.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Build the safe-area record for an aligned image.
///
/// Returns `None` when the image has no content.
#[must_use]
pub fn generate_safe_area(image: &DynamicImage, reference: &str) -> Option<SafeAreaRecord> {
    let bbox = find_content_bounds_dynamic(image)?;
    Some(SafeAreaRecord {
        reference: reference.to_string(),
        canvas: [CANVAS_SIZE, CANVAS_SIZE],
        bbox: bbox.to_xywh(),
        safe_area: safe_rect(&bbox),
    })
}

/// Pad `bbox` by the margins, clamp to the canvas, round once at the end.
///
/// Rounding is half-to-even. The rounded rectangle is widened where needed so
/// it still covers every content pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn safe_rect(bbox: &BoundingBox) -> [u32; 4] {
    let canvas = f64::from(CANVAS_SIZE);
    let (x, y) = (f64::from(bbox.left), f64::from(bbox.top));
    let (w, h) = (f64::from(bbox.width()), f64::from(bbox.height()));
    let margin_x = w * MARGIN_X_RATIO;
    let margin_y = h * MARGIN_Y_RATIO;

    let start_x = (x - margin_x).max(0.0);
    let start_y = (y - margin_y).max(0.0);
    let end_x = (x + w + margin_x).min(canvas);
    let end_y = (y + h + margin_y).min(canvas);

    let round = |v: f64| v.round_ties_even().max(0.0) as u32;
    let sx = round(start_x).min(bbox.left);
    let sy = round(start_y).min(bbox.top);
    let ex = (round(start_x) + round(end_x - start_x))
        .max(bbox.right)
        .min(CANVAS_SIZE);
    let ey = (round(start_y) + round(end_y - start_y))
        .max(bbox.bottom)
        .min(CANVAS_SIZE);

    [sx, sy, ex - sx, ey - sy]
}
