//! Stage 2: move the subject's vertical midpoint to the canvas midline.

use image::imageops;
use image::RgbaImage;

use crate::bbox::find_content_bounds;
use crate::edges::scrub_transparent;
use crate::CANVAS_SIZE;

/// Re-center a Stage 1 image vertically on a fresh canvas.
///
/// The whole input (not a crop) is pasted so that the content box midpoint
/// lands on `CANVAS_SIZE / 2`; the horizontal position only re-centers the
/// input width. Offsets are not clamped, so content far from the midline can
/// end up partially off-canvas. Color under fully transparent pixels is
/// scrubbed.
///
/// Returns `None` when the image has no pixel with `alpha > 0`.
#[must_use]
pub fn align(image: &RgbaImage) -> Option<RgbaImage> {
    let bbox = find_content_bounds(image)?;
    let (dx, dy) = offsets(image.width(), bbox.center_y());

    let mut canvas = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
    imageops::replace(&mut canvas, image, dx, dy);
    scrub_transparent(&mut canvas);
    Some(canvas)
}

/// `(dx, dy)` paste offsets for an image `width` wide whose content midpoint is
/// at `center_y`. `dy` truncates toward zero.
#[allow(clippy::cast_possible_truncation)]
fn offsets(width: u32, center_y: f64) -> (i64, i64) {
    let dx = (i64::from(CANVAS_SIZE) - i64::from(width)).div_euclid(2);
    let dy = (f64::from(CANVAS_SIZE) / 2.0 - center_y).trunc() as i64;
    (dx, dy)
}
