use crate::canvas::{edge_coverage, MaskCanvas, RasterOptions};
use crate::design::{Annotation, Geometry, Point};
use crate::ops::rescale::Rescaler;
use crate::ops::text::FontSpec;
use crate::ops::transform::{degrees_to_radians, Affine};

/// Annotation kinds the editor produces. Matching on the editor's `name`
/// tag is case-insensitive; anything else is kept as `Unknown` and skipped
/// when painting.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Pen,
    Line,
    Ellipse,
    Rect,
    Text,
    Unknown(String),
}

impl ShapeKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pen" => ShapeKind::Pen,
            "line" => ShapeKind::Line,
            "ellipse" => ShapeKind::Ellipse,
            "rect" => ShapeKind::Rect,
            "text" => ShapeKind::Text,
            _ => ShapeKind::Unknown(name.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ShapeKind::Pen => "Pen",
            ShapeKind::Line => "Line",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Rect => "Rect",
            ShapeKind::Text => "Text",
            ShapeKind::Unknown(name) => name,
        }
    }
}

/// How the ends of a stroked segment are finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineCap {
    /// Flat end exactly at the endpoint.
    Butt,
    /// Half-disc of the stroke width past the endpoint.
    Round,
}

/// A drawing primitive in local (pre-transform) space, already in target
/// units.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Filled disc.
    Disc { center: Point, radius: f32 },
    /// Stroked segment.
    Segment {
        from: Point,
        to: Point,
        width: f32,
        cap: LineCap,
    },
    /// Filled, then stroked, ellipse.
    Ellipse {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        stroke_width: f32,
    },
    /// Filled, then stroked, rectangle spanning `[0, width] × [0, height]`.
    Rect {
        width: f32,
        height: f32,
        stroke_width: f32,
    },
    /// Filled text, vertically centred on `y = font.size / 2`.
    Text { content: String, font: FontSpec },
}

/// A primitive plus the local → canvas transform it is drawn through.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedPrimitive {
    pub transform: Affine,
    pub primitive: Primitive,
}

// ============================================================================
// Planning: annotation (shown space) → primitives (target space)
// ============================================================================

/// Convert one annotation into the primitives that draw it.
///
/// Every shape except multi-point pen strokes is anchored with
/// `translate(origin) · rotate · scale`. Pen polylines only get the
/// translate/rotate part when the rotation is non-zero and their vertices
/// stay in canvas coordinates; this mirrors how the editor itself renders
/// freehand strokes and is kept as-is.
pub fn plan(annotation: &Annotation, rescaler: &Rescaler) -> Vec<PlacedPrimitive> {
    let rotation = degrees_to_radians(annotation.rotation_degrees);
    let (sx, sy) = (annotation.scale_x, annotation.scale_y);
    let line_width = rescaler.stroke(annotation.stroke_width);
    let stroke = stroke_width_or_default(line_width);
    let origin = rescaler.point(annotation.origin);
    let anchored = |at: Point| Affine::IDENTITY.translate(at.x, at.y).rotate(rotation).scale(sx, sy);

    match &annotation.geometry {
        Geometry::Dot { at } => vec![PlacedPrimitive {
            transform: anchored(rescaler.point(*at)),
            primitive: Primitive::Disc {
                center: Point::ORIGIN,
                radius: line_width / 2.0,
            },
        }],
        Geometry::Polyline { points } => {
            let mut transform = Affine::IDENTITY;
            if annotation.rotation_degrees != 0.0 {
                transform = transform.translate(origin.x, origin.y).rotate(rotation);
            }
            let transform = transform.scale(sx, sy);
            points
                .windows(2)
                .map(|pair| PlacedPrimitive {
                    transform,
                    primitive: Primitive::Segment {
                        from: rescaler.point(pair[0]),
                        to: rescaler.point(pair[1]),
                        width: stroke,
                        cap: LineCap::Round,
                    },
                })
                .collect()
        }
        Geometry::Line { offset } => {
            // The far endpoint is summed in shown space, then rescaled.
            let end = rescaler.point(Point::new(
                annotation.origin.x + offset.x,
                annotation.origin.y + offset.y,
            ));
            vec![PlacedPrimitive {
                transform: anchored(origin),
                primitive: Primitive::Segment {
                    from: Point::ORIGIN,
                    to: end.sub(origin),
                    width: stroke,
                    cap: LineCap::Butt,
                },
            }]
        }
        Geometry::Ellipse { radius_x, radius_y } => {
            let rx = rescaler.x(*radius_x);
            let ry = rescaler.y(*radius_y);
            // The editor's origin is the top-left of the ellipse's box.
            vec![PlacedPrimitive {
                transform: anchored(origin),
                primitive: Primitive::Ellipse {
                    center: Point::new(rx, ry),
                    radius_x: rx,
                    radius_y: ry,
                    stroke_width: stroke,
                },
            }]
        }
        Geometry::Rect { width, height } => vec![PlacedPrimitive {
            transform: anchored(origin),
            primitive: Primitive::Rect {
                width: rescaler.x(*width),
                height: rescaler.y(*height),
                stroke_width: stroke,
            },
        }],
        Geometry::Text { content, font } => vec![PlacedPrimitive {
            transform: anchored(origin),
            primitive: Primitive::Text {
                content: content.clone(),
                font: font.with_size(rescaler.font_size(font.size)),
            },
        }],
        Geometry::Unknown => Vec::new(),
    }
}

/// A canvas drops zero, negative and non-finite `lineWidth` assignments and
/// keeps its default of 1, so such strokes are still one unit wide.
fn stroke_width_or_default(width: f32) -> f32 {
    if width.is_finite() && width > 0.0 { width } else { 1.0 }
}

// ============================================================================
// Distance fields, negative inside
// ============================================================================

/// Box of half-extents `(hx, hy)` around the origin. Outside a corner the
/// distance is Euclidean, so iso-lines round off there.
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let qx = px.abs() - hx;
    let qy = py.abs() - hy;
    qx.max(0.0).hypot(qy.max(0.0)) + qx.max(qy).min(0.0)
}

/// Box distance with square corners; its zero band is a miter-joined
/// rectangle outline.
#[inline]
fn sdf_box_miter(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    (px.abs() - hx).max(py.abs() - hy)
}

/// First-order ellipse distance: the implicit radius `|p / r|` minus one,
/// over its gradient length. Exact on the outline, close within a stroke.
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let (ux, uy) = (px / rx, py / ry);
    let k = ux.hypot(uy);
    if k < 1e-8 {
        // centre
        return -rx.min(ry);
    }
    let grad = (ux / rx).hypot(uy / ry) / k;
    (k - 1.0) / grad
}

/// Unsigned distance from `p` to the nearest point of `a..b`. A zero-length
/// segment is a point.
#[inline]
fn dist_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let (ex, ey) = (bx - ax, by - ay);
    let (wx, wy) = (px - ax, py - ay);
    let len_sq = ex * ex + ey * ey;
    let t = if len_sq > f32::EPSILON {
        ((wx * ex + wy * ey) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (wx - t * ex).hypot(wy - t * ey)
}

// ============================================================================
// Painting
// ============================================================================

/// Paint one non-text primitive in white. Text needs a resolved font and is
/// painted through [`crate::ops::text::paint_text`] instead.
///
/// Degenerate geometry (zero radius, zero width, zero-length butt segment)
/// paints nothing.
pub fn paint(canvas: &mut MaskCanvas, placed: &PlacedPrimitive, options: &RasterOptions) {
    let t = &placed.transform;
    match &placed.primitive {
        Primitive::Disc { center, radius } => fill_disc(canvas, t, *center, *radius, options),
        Primitive::Segment {
            from,
            to,
            width,
            cap,
        } => stroke_segment(canvas, t, *from, *to, *width, *cap, options),
        Primitive::Ellipse {
            center,
            radius_x,
            radius_y,
            stroke_width,
        } => {
            fill_ellipse(canvas, t, *center, *radius_x, *radius_y, options);
            stroke_ellipse(canvas, t, *center, *radius_x, *radius_y, *stroke_width, options);
        }
        Primitive::Rect {
            width,
            height,
            stroke_width,
        } => paint_rect(canvas, t, *width, *height, *stroke_width, options),
        Primitive::Text { .. } => {
            // Rendered by the compositor once the font is resolved.
        }
    }
}

fn fill_disc(
    canvas: &mut MaskCanvas,
    t: &Affine,
    center: Point,
    radius: f32,
    options: &RasterOptions,
) {
    if !(radius > 0.0) {
        return;
    }
    let px = t.mean_scale();
    let aa = options.anti_alias;
    canvas.shade(
        t,
        Point::new(center.x - radius, center.y - radius),
        Point::new(center.x + radius, center.y + radius),
        options,
        |p| edge_coverage((p.sub(center).length() - radius) * px, aa),
    );
}

fn stroke_segment(
    canvas: &mut MaskCanvas,
    t: &Affine,
    from: Point,
    to: Point,
    width: f32,
    cap: LineCap,
    options: &RasterOptions,
) {
    let hw = width * 0.5;
    if !(hw > 0.0) {
        return;
    }
    let px = t.mean_scale();
    let aa = options.anti_alias;
    let lo = Point::new(from.x.min(to.x) - hw, from.y.min(to.y) - hw);
    let hi = Point::new(from.x.max(to.x) + hw, from.y.max(to.y) + hw);

    match cap {
        LineCap::Round => canvas.shade(t, lo, hi, options, |p| {
            let d = dist_line_segment(p.x, p.y, from.x, from.y, to.x, to.y) - hw;
            edge_coverage(d * px, aa)
        }),
        LineCap::Butt => {
            let len = to.sub(from).length();
            if len <= f32::EPSILON {
                return;
            }
            let ux = (to.x - from.x) / len;
            let uy = (to.y - from.y) / len;
            let half_len = len * 0.5;
            canvas.shade(t, lo, hi, options, |p| {
                let rel = p.sub(from);
                let along = rel.x * ux + rel.y * uy;
                let across = rel.y * ux - rel.x * uy;
                let d = sdf_box(along - half_len, across, half_len, hw);
                edge_coverage(d * px, aa)
            });
        }
    }
}

fn fill_ellipse(
    canvas: &mut MaskCanvas,
    t: &Affine,
    center: Point,
    rx: f32,
    ry: f32,
    options: &RasterOptions,
) {
    if !(rx > 0.0 && ry > 0.0) {
        return;
    }
    let px = t.mean_scale();
    let aa = options.anti_alias;
    canvas.shade(
        t,
        Point::new(center.x - rx, center.y - ry),
        Point::new(center.x + rx, center.y + ry),
        options,
        |p| {
            let d = sdf_ellipse(p.x - center.x, p.y - center.y, rx, ry);
            edge_coverage(d * px, aa)
        },
    );
}

fn stroke_ellipse(
    canvas: &mut MaskCanvas,
    t: &Affine,
    center: Point,
    rx: f32,
    ry: f32,
    width: f32,
    options: &RasterOptions,
) {
    let hw = width * 0.5;
    if !(hw > 0.0) {
        return;
    }
    if !(rx > 0.0 && ry > 0.0) {
        // A flattened ellipse strokes as the segment it collapsed into.
        let rx = rx.max(0.0);
        let ry = ry.max(0.0);
        let from = Point::new(center.x - rx, center.y - ry);
        let to = Point::new(center.x + rx, center.y + ry);
        stroke_segment(canvas, t, from, to, width, LineCap::Butt, options);
        return;
    }
    let px = t.mean_scale();
    let aa = options.anti_alias;
    canvas.shade(
        t,
        Point::new(center.x - rx - hw, center.y - ry - hw),
        Point::new(center.x + rx + hw, center.y + ry + hw),
        options,
        |p| {
            let d = sdf_ellipse(p.x - center.x, p.y - center.y, rx, ry);
            edge_coverage((d.abs() - hw) * px, aa)
        },
    );
}

fn paint_rect(
    canvas: &mut MaskCanvas,
    t: &Affine,
    width: f32,
    height: f32,
    stroke_width: f32,
    options: &RasterOptions,
) {
    // Negative extents draw towards the origin, like canvas `rect()`.
    let (x0, x1) = (width.min(0.0), width.max(0.0));
    let (y0, y1) = (height.min(0.0), height.max(0.0));
    if !(x1 - x0 > 0.0 && y1 - y0 > 0.0) {
        return;
    }
    let hx = (x1 - x0) * 0.5;
    let hy = (y1 - y0) * 0.5;
    let cx = x0 + hx;
    let cy = y0 + hy;
    let px = t.mean_scale();
    let aa = options.anti_alias;

    canvas.shade(
        t,
        Point::new(x0, y0),
        Point::new(x1, y1),
        options,
        |p| edge_coverage(sdf_box(p.x - cx, p.y - cy, hx, hy) * px, aa),
    );

    let hw = stroke_width * 0.5;
    if hw > 0.0 {
        canvas.shade(
            t,
            Point::new(x0 - hw, y0 - hw),
            Point::new(x1 + hw, y1 + hw),
            options,
            |p| {
                let band = sdf_box_miter(p.x - cx, p.y - cy, hx, hy).abs() - hw;
                edge_coverage(band * px, aa)
            },
        );
    }
}
