// ============================================================================
// Mask canvas: the RGBA surface shapes are composited onto
// ============================================================================

use std::ops::Range;

use image::RgbaImage;
use rayon::prelude::*;

use crate::design::Point;
use crate::ops::transform::Affine;

/// The only paint a mask ever uses. Authored colours are ignored.
pub const MASK_WHITE: [u8; 4] = [255, 255, 255, 255];

/// Coverage below this is treated as "not touched".
const MIN_COVERAGE: f32 = 0.001;

/// Per-render switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterOptions {
    /// Smooth shape edges over one pixel. Off gives strictly 0/255 alpha.
    pub anti_alias: bool,
    /// Shade rows on the rayon pool. The call still blocks until done.
    pub parallel: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            anti_alias: true,
            parallel: false,
        }
    }
}

/// Fresh transparent-black RGBA surface of a fixed size.
pub struct MaskCanvas {
    image: RgbaImage,
}

impl MaskCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        // ImageBuffer::new zero-fills: rgba(0, 0, 0, 0) everywhere.
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Composite white over every pixel whose centre, mapped back into
    /// local space through `transform`, has non-zero `coverage`.
    ///
    /// `local_min`/`local_max` bound the geometry in local space; only the
    /// pixels inside their transformed bounding box are visited. A singular
    /// transform paints nothing.
    pub fn shade<F>(
        &mut self,
        transform: &Affine,
        local_min: Point,
        local_max: Point,
        options: &RasterOptions,
        coverage: F,
    ) where
        F: Fn(Point) -> f32 + Sync,
    {
        let Some(inverse) = transform.inverse() else {
            return;
        };
        let Some((xs, ys)) = self.pixel_region(transform, local_min, local_max) else {
            return;
        };

        let row_bytes = self.image.width() as usize * 4;
        let buf: &mut [u8] = &mut self.image;
        let rows = &mut buf[ys.start * row_bytes..ys.end * row_bytes];
        let y0 = ys.start;

        let shade_row = |(i, row): (usize, &mut [u8])| {
            let py = (y0 + i) as f32 + 0.5;
            for x in xs.clone() {
                let local = inverse.apply(Point::new(x as f32 + 0.5, py));
                let cov = coverage(local);
                if cov > MIN_COVERAGE {
                    let idx = x * 4;
                    blend_over(&mut row[idx..idx + 4], MASK_WHITE, cov.min(1.0));
                }
            }
        };

        if options.parallel {
            rows.par_chunks_mut(row_bytes).enumerate().for_each(shade_row);
        } else {
            rows.chunks_mut(row_bytes).enumerate().for_each(shade_row);
        }
    }

    /// Pixel columns/rows touched by the transformed local bounds, padded by
    /// one pixel for anti-aliasing and clamped to the canvas.
    fn pixel_region(
        &self,
        transform: &Affine,
        local_min: Point,
        local_max: Point,
    ) -> Option<(Range<usize>, Range<usize>)> {
        let (lo, hi) = transform.map_bounds(local_min, local_max);
        if !(lo.x.is_finite() && lo.y.is_finite() && hi.x.is_finite() && hi.y.is_finite()) {
            return None;
        }
        let w = self.image.width() as f32;
        let h = self.image.height() as f32;
        let x0 = (lo.x.floor() - 1.0).clamp(0.0, w) as usize;
        let y0 = (lo.y.floor() - 1.0).clamp(0.0, h) as usize;
        let x1 = (hi.x.ceil() + 1.0).clamp(0.0, w) as usize;
        let y1 = (hi.y.ceil() + 1.0).clamp(0.0, h) as usize;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0..x1, y0..y1))
    }
}

/// Straight-alpha source-over: `src` scaled by `coverage` drawn on `dst`.
#[inline]
pub fn blend_over(dst: &mut [u8], src: [u8; 4], coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Coverage of a pixel whose centre lies `distance_px` from a shape edge
/// (negative = inside).
#[inline]
pub fn edge_coverage(distance_px: f32, anti_alias: bool) -> f32 {
    if anti_alias {
        smoothstep(0.5, -0.5, distance_px)
    } else if distance_px < 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::{blend_over, edge_coverage, MaskCanvas, RasterOptions, MASK_WHITE};
    use crate::design::Point;
    use crate::ops::transform::Affine;

    #[test]
    fn new_canvas_is_transparent_black() {
        let canvas = MaskCanvas::new(7, 3);
        assert_eq!(canvas.width(), 7);
        assert_eq!(canvas.height(), 3);
        assert!(canvas.image().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn opaque_source_replaces_destination() {
        let mut px = [10u8, 20, 30, 128];
        blend_over(&mut px, MASK_WHITE, 1.0);
        assert_eq!(px, MASK_WHITE);
    }

    #[test]
    fn partial_coverage_over_transparent_stays_white() {
        let mut px = [0u8, 0, 0, 0];
        blend_over(&mut px, MASK_WHITE, 0.5);
        assert_eq!(&px[..3], &[255, 255, 255]);
        assert_eq!(px[3], 128);
    }

    #[test]
    fn aliased_edges_are_binary() {
        assert_eq!(edge_coverage(-0.01, false), 1.0);
        assert_eq!(edge_coverage(0.01, false), 0.0);
        assert_eq!(edge_coverage(-2.0, true), 1.0);
        assert_eq!(edge_coverage(2.0, true), 0.0);
    }

    #[test]
    fn parallel_and_sequential_shading_agree() {
        let square = |p: Point| {
            if (2.0..6.0).contains(&p.x) && (1.0..5.0).contains(&p.y) { 1.0 } else { 0.0 }
        };
        let mut seq = MaskCanvas::new(8, 8);
        let mut par = MaskCanvas::new(8, 8);
        let t = Affine::IDENTITY;
        let (lo, hi) = (Point::new(2.0, 1.0), Point::new(6.0, 5.0));
        seq.shade(&t, lo, hi, &RasterOptions::default(), square);
        par.shade(
            &t,
            lo,
            hi,
            &RasterOptions { parallel: true, ..Default::default() },
            square,
        );
        assert_eq!(seq.image(), par.image());
        assert_eq!(seq.image().get_pixel(3, 2).0, MASK_WHITE);
        assert_eq!(seq.image().get_pixel(7, 7).0, [0, 0, 0, 0]);
    }
}
