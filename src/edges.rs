//! Alpha edge cleanup for cutout images.
//!
//! Segmentation leaves ragged, partially transparent rims around the subject
//! that show up as halos once the image is composited. [`suppress_halo`]
//! replaces every non-opaque alpha with a lightly blurred alpha;
//! [`scrub_transparent`] clears the color left under fully transparent pixels.

use image::{imageops, GrayImage, Luma, RgbaImage};

/// Standard deviation of the alpha blur, in pixels.
pub const HALO_SIGMA: f32 = 0.5;

/// Soften alpha on every pixel that is not fully opaque.
///
/// The alpha plane is blurred with a small Gaussian kernel (edges clamped).
/// Pixels whose original alpha is below 255 take the blurred value; opaque
/// pixels are left untouched. Color channels are never modified.
pub fn suppress_halo(image: &mut RgbaImage) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let alpha = GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[3]]));
    let blurred = imageops::blur(&alpha, HALO_SIGMA);

    for (px, soft) in image.pixels_mut().zip(blurred.pixels()) {
        if px[3] < u8::MAX {
            px[3] = soft[0];
        }
    }
}

/// Force color to black under every pixel whose alpha is exactly zero.
pub fn scrub_transparent(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        if px[3] == 0 {
            px.0 = [0, 0, 0, 0];
        }
    }
}
