//! Stage 1: crop the segmented subject, cap its height, center it on the canvas.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::bbox::find_content_bounds;
use crate::edges::suppress_halo;
use crate::CANVAS_SIZE;

/// Normalize an already segmented image onto a transparent canvas.
///
/// The subject is cropped to its bounding box. When its height exceeds
/// `max_ratio` of the canvas height it is shrunk (Lanczos3) so that it fits;
/// smaller subjects are never enlarged. The result is pasted at the center of a
/// `CANVAS_SIZE` square (floor division, so odd margins favour the top-left)
/// and its alpha edges are softened with [`suppress_halo`].
///
/// Returns `None` when the image has no pixel with `alpha > 0`.
#[must_use]
pub fn normalize(segmented: &RgbaImage, max_ratio: f64) -> Option<RgbaImage> {
    let bbox = find_content_bounds(segmented)?;
    let cropped =
        imageops::crop_imm(segmented, bbox.left, bbox.top, bbox.width(), bbox.height()).to_image();

    let subject = match scaled_size(bbox.width(), bbox.height(), max_ratio) {
        Some((w, h)) => imageops::resize(&cropped, w, h, FilterType::Lanczos3),
        None => cropped,
    };

    let mut canvas = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
    let x = centered_offset(subject.width());
    let y = centered_offset(subject.height());
    imageops::replace(&mut canvas, &subject, x, y);

    suppress_halo(&mut canvas);
    Some(canvas)
}

/// Target size when a `width` x `height` subject is too tall for `max_ratio`.
///
/// `None` means the subject already fits and must be kept at its size.
/// Dimensions are truncated, but never below one pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_size(width: u32, height: u32, max_ratio: f64) -> Option<(u32, u32)> {
    let current_ratio = f64::from(height) / f64::from(CANVAS_SIZE);
    if current_ratio <= max_ratio {
        return None;
    }
    let scale = max_ratio / current_ratio;
    let w = (f64::from(width) * scale) as u32;
    let h = (f64::from(height) * scale) as u32;
    Some((w.max(1), h.max(1)))
}

/// Offset that centers `len` pixels on the canvas; negative when it overflows.
fn centered_offset(len: u32) -> i64 {
    (i64::from(CANVAS_SIZE) - i64::from(len)).div_euclid(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn subject(w: u32, h: u32, pad: u32) -> RgbaImage {
        let mut img = RgbaImage::new(w + 2 * pad, h + 2 * pad);
        for y in pad..pad + h {
            for x in pad..pad + w {
                img.put_pixel(x, y, Rgba([180, 160, 140, 255]));
            }
        }
        img
    }

    #[test]
    fn empty_image_is_not_normalized() {
        assert!(normalize(&RgbaImage::new(50, 50), 0.67).is_none());
    }

    #[test]
    fn small_subject_keeps_its_size_and_is_centered() {
        let out = normalize(&subject(101, 60, 17), 0.67).unwrap();
        assert_eq!(out.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));

        let bbox = find_content_bounds(&out).unwrap();
        // halo suppression may add a faint rim; the opaque core is exact
        let core: Vec<(u32, u32)> = out
            .enumerate_pixels()
            .filter(|(_, _, px)| px[3] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        let min_x = core.iter().map(|p| p.0).min().unwrap();
        let max_x = core.iter().map(|p| p.0).max().unwrap();
        let min_y = core.iter().map(|p| p.1).min().unwrap();
        let max_y = core.iter().map(|p| p.1).max().unwrap();
        assert_eq!((max_x - min_x + 1, max_y - min_y + 1), (101, 60));
        assert_eq!((min_x, min_y), ((1200 - 101) / 2, (1200 - 60) / 2));
        assert!(bbox.left <= min_x && bbox.right > max_x);
    }

    #[test]
    fn scale_is_skipped_at_or_under_ratio() {
        assert_eq!(scaled_size(500, 600, 0.5), None);
        assert_eq!(scaled_size(500, 1200, 1.0), None);
        assert_eq!(scaled_size(500, 10, 0.1), None);
    }

    #[test]
    fn tall_subject_is_scaled_to_ratio() {
        // 2400 / 1200 = 2.0, scale = 0.5 / 2.0 = 0.25
        assert_eq!(scaled_size(400, 2400, 0.5), Some((100, 600)));
        // default ratio: 0.67 / 2.0 = 0.335
        assert_eq!(scaled_size(1200, 2400, 0.67), Some((402, 804)));
    }

    #[test]
    fn omega_example_lands_near_780_pixels() {
        let (w, h) = scaled_size(1500, 2800, 0.65).unwrap();
        assert!((779..=780).contains(&h), "height {h}");
        assert!((417..=418).contains(&w), "width {w}");
    }

    #[test]
    fn scaled_dimensions_never_collapse_to_zero() {
        assert_eq!(scaled_size(1, 12000, 0.1), Some((1, 120)));
    }

    #[test]
    fn oversized_subject_is_shrunk_onto_canvas() {
        let out = normalize(&subject(400, 2400, 0), 0.5).unwrap();
        assert_eq!(out.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        let bbox = find_content_bounds(&out).unwrap();
        assert!((600..=602).contains(&bbox.height()), "{bbox:?}");
        assert!((100..=102).contains(&bbox.width()), "{bbox:?}");
        assert!((299..=300).contains(&bbox.top), "{bbox:?}");
    }

    #[test]
    fn subject_wider_than_canvas_is_clipped_not_scaled() {
        let out = normalize(&subject(1300, 10, 0), 0.67).unwrap();
        assert_eq!(out.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        assert_eq!(out.get_pixel(0, 595)[3], 255);
        assert_eq!(out.get_pixel(1199, 595)[3], 255);
    }

    #[test]
    fn centered_offset_uses_floor_division() {
        assert_eq!(centered_offset(101), 549);
        assert_eq!(centered_offset(1200), 0);
        assert_eq!(centered_offset(1301), -51);
    }
}
