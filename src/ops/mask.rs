// ============================================================================
// Mask compositor: design state → white-on-transparent RGBA mask
// ============================================================================

use image::RgbaImage;
use tracing::{debug, info};

use crate::canvas::{MaskCanvas, RasterOptions};
use crate::design::{Annotation, DesignState, Geometry};
use crate::error::{MaskError, Result};
use crate::ops::rescale::Rescaler;
use crate::ops::shapes::{self, Primitive};
use crate::ops::text::{self, FontProvider};

/// Render every annotation of `design` into a fresh `width × height` mask.
///
/// The canvas starts fully transparent; shapes are painted in document
/// order with source-over compositing, so later shapes win where they
/// overlap. All annotations are validated before anything is drawn and the
/// first malformed one fails the whole render. Unknown kinds are skipped.
pub fn rasterize_mask(
    design: &DesignState,
    width: u32,
    height: u32,
    options: &RasterOptions,
    fonts: &dyn FontProvider,
) -> Result<RgbaImage> {
    let rescaler = Rescaler::new(design.shown_image_dimensions, width, height)?;
    let shapes = design.shapes()?;

    let mut canvas = MaskCanvas::new(width, height);
    let mut skipped = 0usize;
    for (index, shape) in shapes.iter().enumerate() {
        if matches!(shape.geometry, Geometry::Unknown) {
            debug!(index, id = %shape.id, kind = shape.kind.label(), "skipping unknown annotation kind");
            skipped += 1;
            continue;
        }
        paint_annotation(&mut canvas, index, shape, &rescaler, options, fonts)?;
    }

    info!(
        width,
        height,
        annotations = shapes.len(),
        skipped,
        rx = rescaler.ratio_x(),
        ry = rescaler.ratio_y(),
        "rasterized mask"
    );
    Ok(canvas.into_image())
}

fn paint_annotation(
    canvas: &mut MaskCanvas,
    index: usize,
    shape: &Annotation,
    rescaler: &Rescaler,
    options: &RasterOptions,
    fonts: &dyn FontProvider,
) -> Result<()> {
    let placed = shapes::plan(shape, rescaler);
    debug!(index, id = %shape.id, kind = shape.kind.label(), primitives = placed.len(), "painting annotation");

    for item in &placed {
        match &item.primitive {
            Primitive::Text { content, font } => {
                if content.is_empty() {
                    continue;
                }
                let face = fonts.load(font).ok_or_else(|| MaskError::FontUnavailable {
                    index,
                    id: shape.id.clone(),
                    family: font.primary_family().to_string(),
                })?;
                text::paint_text(canvas, &face, content, font.size, &item.transform, options);
            }
            _ => shapes::paint(canvas, item, options),
        }
    }
    Ok(())
}
