// ============================================================================
// Mask refinement: the inpaint worker's post-processing of a drawn mask
// ============================================================================
//
// Steps run in a fixed order: uploaded-mask union, then
// erode/dilate, then inversion, then outpaint padding.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use serde::Deserialize;

/// Side of the image to extend when outpainting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutpaintDirection {
    Top,
    Bottom,
    Left,
    Right,
}

impl OutpaintDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Some(OutpaintDirection::Top),
            "bottom" => Some(OutpaintDirection::Bottom),
            "left" => Some(OutpaintDirection::Left),
            "right" => Some(OutpaintDirection::Right),
            _ => None,
        }
    }
}

/// Fraction of the image height added per outpainted side.
const OUTPAINT_FRACTION: f32 = 0.3;

/// Post-processing steps applied to a rasterized mask.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaskRefiner {
    /// `> 0` dilates, `< 0` erodes, by that many 3×3 passes.
    pub erode_or_dilate: i32,
    pub invert: bool,
    pub outpaint: Vec<OutpaintDirection>,
}

impl MaskRefiner {
    /// Run every configured step on `mask`, merging `uploaded` first when
    /// given.
    pub fn apply(&self, mask: GrayImage, uploaded: Option<&DynamicImage>) -> GrayImage {
        let mut mask = mask;
        if let Some(upload) = uploaded {
            mask = merge_uploaded(&mask, upload);
        }
        if self.erode_or_dilate != 0 {
            mask = erode_or_dilate(&mask, self.erode_or_dilate);
        }
        if self.invert {
            invert(&mut mask);
        }
        if !self.outpaint.is_empty() {
            mask = outpaint(&mask, &self.outpaint);
        }
        mask
    }
}

/// Single-channel view of an RGBA mask: its red channel.
pub fn from_rgba(mask: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| Luma([mask.get_pixel(x, y)[0]]))
}

/// Expand a single-channel mask back to opaque-white-on-transparent RGBA.
pub fn to_rgba(mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y)[0];
        image::Rgba([v, v, v, v])
    })
}

/// Union with a user-uploaded mask: resampled to `mask`'s size, channel
/// mean of R/G/B, thresholded at `> 127`, then per-pixel max.
pub fn merge_uploaded(mask: &GrayImage, uploaded: &DynamicImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let rgb = uploaded.to_rgb8();
    let resized = if rgb.dimensions() == (w, h) {
        rgb
    } else {
        imageops::resize(&rgb, w, h, FilterType::Lanczos3)
    };

    GrayImage::from_fn(w, h, |x, y| {
        let p = resized.get_pixel(x, y);
        let mean = (p[0] as f32 + p[1] as f32 + p[2] as f32) / 3.0;
        let up = if mean > 127.0 { 255 } else { 0 };
        Luma([mask.get_pixel(x, y)[0].max(up)])
    })
}

/// `k > 0`: dilate `k` times with a 3×3 square kernel; `k < 0`: erode `-k`
/// times; `0`: unchanged copy. Only in-bounds neighbours count.
pub fn erode_or_dilate(mask: &GrayImage, k: i32) -> GrayImage {
    let dilate = k > 0;
    let mut current = mask.clone();
    for _ in 0..k.unsigned_abs() {
        current = morph_3x3(&current, dilate);
    }
    current
}

fn morph_3x3(src: &GrayImage, dilate: bool) -> GrayImage {
    let (w, h) = src.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = if dilate { 0u8 } else { 255u8 };
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let v = src.get_pixel(nx, ny)[0];
                acc = if dilate { acc.max(v) } else { acc.min(v) };
            }
        }
        Luma([acc])
    })
}

/// `255 - v` for every pixel.
pub fn invert(mask: &mut GrayImage) {
    for p in mask.pixels_mut() {
        p[0] = 255 - p[0];
    }
}

/// Whether any pixel would be regenerated (`> 127`).
pub fn has_content(mask: &GrayImage) -> bool {
    mask.pixels().any(|p| p[0] > 127)
}

/// Grow the mask for outpainting, filling new area with 255.
///
/// Top/bottom add `int(H · 0.3)` rows each, measured on the original
/// height. Left/right then add `int(H' · 0.3)` columns each where `H'` is
/// the height after the vertical padding.
pub fn outpaint(mask: &GrayImage, directions: &[OutpaintDirection]) -> GrayImage {
    let has = |d: OutpaintDirection| directions.contains(&d);
    let (w, h) = mask.dimensions();

    let pad_v = (h as f32 * OUTPAINT_FRACTION) as u32;
    let top = if has(OutpaintDirection::Top) { pad_v } else { 0 };
    let bottom = if has(OutpaintDirection::Bottom) { pad_v } else { 0 };
    let new_h = h + top + bottom;

    let pad_h = (new_h as f32 * OUTPAINT_FRACTION) as u32;
    let left = if has(OutpaintDirection::Left) { pad_h } else { 0 };
    let right = if has(OutpaintDirection::Right) { pad_h } else { 0 };
    let new_w = w + left + right;

    let mut out = GrayImage::from_pixel(new_w, new_h, Luma([255]));
    imageops::replace(&mut out, mask, left as i64, top as i64);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot_mask() -> GrayImage {
        let mut m = GrayImage::new(7, 7);
        m.put_pixel(3, 3, Luma([255]));
        m
    }

    fn count_on(m: &GrayImage) -> usize {
        m.pixels().filter(|p| p[0] > 127).count()
    }

    #[test]
    fn dilate_grows_by_kernel_passes() {
        assert_eq!(count_on(&erode_or_dilate(&dot_mask(), 1)), 9);
        assert_eq!(count_on(&erode_or_dilate(&dot_mask(), 2)), 25);
        assert_eq!(erode_or_dilate(&dot_mask(), 0), dot_mask());
    }

    #[test]
    fn erode_removes_isolated_pixels() {
        assert_eq!(count_on(&erode_or_dilate(&dot_mask(), -1)), 0);
        let block = erode_or_dilate(&dot_mask(), 2);
        assert_eq!(count_on(&erode_or_dilate(&block, -1)), 9);
    }

    #[test]
    fn invert_complements() {
        let mut m = dot_mask();
        invert(&mut m);
        assert_eq!(m.get_pixel(3, 3)[0], 0);
        assert_eq!(m.get_pixel(0, 0)[0], 255);
        assert_eq!(count_on(&m), 48);
    }

    #[test]
    fn outpaint_padding_uses_padded_height_for_columns() {
        let m = GrayImage::new(100, 100);
        let out = outpaint(
            &m,
            &[OutpaintDirection::Top, OutpaintDirection::Left, OutpaintDirection::Right],
        );
        // 100 + 30 rows; columns use 130 * 0.3 = 39 per side
        assert_eq!(out.dimensions(), (100 + 39 + 39, 130));
        assert_eq!(out.get_pixel(50, 10)[0], 255);
        assert_eq!(out.get_pixel(0, 100)[0], 255);
        assert_eq!(out.get_pixel(39 + 50, 30 + 50)[0], 0);
    }

    #[test]
    fn uploaded_mask_is_thresholded_and_unioned() {
        let drawn = dot_mask();
        let mut upload = RgbaImage::new(7, 7);
        upload.put_pixel(0, 0, image::Rgba([200, 200, 200, 255]));
        upload.put_pixel(1, 0, image::Rgba([100, 100, 100, 255]));
        let merged = merge_uploaded(&drawn, &DynamicImage::ImageRgba8(upload));
        assert_eq!(merged.get_pixel(0, 0)[0], 255);
        assert_eq!(merged.get_pixel(1, 0)[0], 0);
        assert_eq!(merged.get_pixel(3, 3)[0], 255);
    }

    #[test]
    fn refiner_runs_steps_in_order() {
        let refiner = MaskRefiner {
            erode_or_dilate: 1,
            invert: true,
            outpaint: vec![],
        };
        let out = refiner.apply(dot_mask(), None);
        // dilated 3×3 block, then inverted
        assert_eq!(count_on(&out), 49 - 9);
        assert!(has_content(&out));
    }

    #[test]
    fn red_channel_becomes_mask() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(1, 0, image::Rgba([255, 255, 255, 255]));
        let gray = from_rgba(&rgba);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(1, 0)[0], 255);
        assert_eq!(to_rgba(&gray).get_pixel(1, 0).0, [255, 255, 255, 255]);
    }
}
