//! Content bounding-box extraction.
//!
//! A pixel counts as content when its alpha is strictly greater than zero. The
//! scan walks the interleaved RGBA buffer one row at a time and only records the
//! first and last content column of each row.

use image::{DynamicImage, RgbaImage};

/// Half-open pixel rectangle: `right` and `bottom` are exclusive.
///
/// Boxes produced by this module are never empty; "no content" is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// First content column.
    pub left: u32,
    /// First content row.
    pub top: u32,
    /// One past the last content column.
    pub right: u32,
    /// One past the last content row.
    pub bottom: u32,
}

impl BoundingBox {
    /// Box width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Box height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Vertical midpoint in source coordinates (may fall on a half pixel).
    #[must_use]
    pub fn center_y(&self) -> f64 {
        f64::from(self.top) + f64::from(self.height()) / 2.0
    }

    /// Whether the pixel at `(x, y)` lies inside the box.
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// The box as `[x, y, width, height]`.
    #[must_use]
    pub fn to_xywh(&self) -> [u32; 4] {
        [self.left, self.top, self.width(), self.height()]
    }
}

/// Find the tight box around every pixel with `alpha > 0`.
///
/// Returns `None` when the image is fully transparent (or has zero area).
#[must_use]
#[allow(clippy::cast_possible_truncation)] // indices are bounded by u32 dimensions
pub fn find_content_bounds(image: &RgbaImage) -> Option<BoundingBox> {
    let width = image.width() as usize;
    if width == 0 {
        return None;
    }

    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for (y, row) in image.as_raw().chunks_exact(width * 4).enumerate() {
        let first = row.chunks_exact(4).position(|px| px[3] > 0);
        let Some(first) = first else {
            continue;
        };
        // `first` exists, so `rposition` always finds at least that pixel.
        let last = row.chunks_exact(4).rposition(|px| px[3] > 0).unwrap_or(first);

        bounds = Some(match bounds {
            None => (first, y, last, y),
            Some((l, t, r, _)) => (l.min(first), t, r.max(last), y),
        });
    }

    bounds.map(|(l, t, r, b)| BoundingBox {
        left: l as u32,
        top: t as u32,
        right: r as u32 + 1,
        bottom: b as u32 + 1,
    })
}

/// Like [`find_content_bounds`], but images without an alpha channel are
/// treated as content everywhere and yield the full-image rectangle.
#[must_use]
pub fn find_content_bounds_dynamic(image: &DynamicImage) -> Option<BoundingBox> {
    if image.color().has_alpha() {
        return find_content_bounds(&image.to_rgba8());
    }
    if image.width() == 0 || image.height() == 0 {
        return None;
    }
    Some(BoundingBox {
        left: 0,
        top: 0,
        right: image.width(),
        bottom: image.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    fn assert_tight(img: &RgbaImage, bbox: BoundingBox) {
        for (x, y, px) in img.enumerate_pixels() {
            if px[3] > 0 {
                assert!(bbox.contains(x, y), "content at ({x},{y}) outside {bbox:?}");
            }
        }
        let row_has_content = |y: u32| (0..img.width()).any(|x| img.get_pixel(x, y)[3] > 0);
        let col_has_content = |x: u32| (0..img.height()).any(|y| img.get_pixel(x, y)[3] > 0);
        assert!(row_has_content(bbox.top));
        assert!(row_has_content(bbox.bottom - 1));
        assert!(col_has_content(bbox.left));
        assert!(col_has_content(bbox.right - 1));
    }

    #[test]
    fn fully_transparent_image_has_no_bounds() {
        let img = RgbaImage::new(40, 30);
        assert_eq!(find_content_bounds(&img), None);
    }

    #[test]
    fn zero_area_image_has_no_bounds() {
        assert_eq!(find_content_bounds(&RgbaImage::new(0, 0)), None);
        assert_eq!(find_content_bounds(&RgbaImage::new(0, 5)), None);
    }

    #[test]
    fn single_pixel_box_is_one_by_one() {
        let mut img = RgbaImage::new(10, 10);
        img.put_pixel(7, 2, Rgba([9, 9, 9, 1]));
        let bbox = find_content_bounds(&img).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                left: 7,
                top: 2,
                right: 8,
                bottom: 3
            }
        );
        assert_eq!(bbox.to_xywh(), [7, 2, 1, 1]);
    }

    #[test]
    fn scattered_pixels_produce_minimal_enclosing_box() {
        let mut img = RgbaImage::new(64, 48);
        img.put_pixel(12, 30, Rgba([255, 0, 0, 255]));
        img.put_pixel(50, 5, Rgba([0, 255, 0, 10]));
        img.put_pixel(20, 40, Rgba([0, 0, 255, 128]));
        // alpha 0 with color must not count
        img.put_pixel(63, 47, Rgba([255, 255, 255, 0]));

        let bbox = find_content_bounds(&img).unwrap();
        assert_eq!(bbox.to_xywh(), [12, 5, 39, 36]);
        assert_tight(&img, bbox);
    }

    #[test]
    fn content_touching_edges_uses_exclusive_far_edges() {
        let mut img = RgbaImage::new(16, 9);
        img.put_pixel(0, 0, Rgba([1, 1, 1, 255]));
        img.put_pixel(15, 8, Rgba([1, 1, 1, 255]));
        let bbox = find_content_bounds(&img).unwrap();
        assert_eq!((bbox.right, bbox.bottom), (16, 9));
        assert_tight(&img, bbox);
    }

    #[test]
    fn center_y_can_land_on_half_pixel() {
        let bbox = BoundingBox {
            left: 0,
            top: 10,
            right: 4,
            bottom: 15,
        };
        assert!((bbox.center_y() - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn image_without_alpha_is_all_content() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([0, 0, 0])));
        let bbox = find_content_bounds_dynamic(&img).unwrap();
        assert_eq!(bbox.to_xywh(), [0, 0, 30, 20]);
    }

    #[test]
    fn dynamic_image_with_alpha_is_scanned() {
        let mut rgba = RgbaImage::new(30, 20);
        rgba.put_pixel(3, 4, Rgba([0, 0, 0, 200]));
        let bbox = find_content_bounds_dynamic(&DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(bbox.to_xywh(), [3, 4, 1, 1]);
    }
}
