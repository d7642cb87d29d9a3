// ============================================================================
// Design documents: the annotation editor's JSON, parsed in draw order
// ============================================================================
//
// The editor hands over a `designState` object:
//
//   {
//     "annotations": { "<id>": { "name": "Rect", "x": .., "y": .., ... }, ... },
//     "shownImageDimensions": { "width": 640, "height": 480 }
//   }
//
// optionally wrapped in `{ "designState": ..., "imageData": { width, height } }`.
// Object key order inside `annotations` is the paint order, so the map is
// decoded by hand into a Vec instead of a hashed or sorted map.

use std::fmt;
use std::io::Read;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MaskError, Result};
use crate::ops::shapes::ShapeKind;
use crate::ops::text::FontSpec;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

/// One annotation exactly as the editor serialized it. Every field is
/// optional here; [`Annotation::from_raw`] decides what each kind needs.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnnotation {
    #[serde(default)]
    pub name: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub points: Option<Vec<f32>>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub radius_x: Option<f32>,
    pub radius_y: Option<f32>,
    pub rotation: Option<f32>,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    pub stroke_width: Option<f32>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_style: Option<String>,
    // Authored paint. Parsed so documents round-trip cleanly, never drawn:
    // the mask is always opaque white.
    pub stroke: Option<String>,
    pub fill: Option<String>,
    pub opacity: Option<f32>,
}

impl RawAnnotation {
    /// Decode one editor record. Only the five drawable kinds have their
    /// fields type-checked; any other kind keeps just its `name`, whatever
    /// else it carries.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
        if let ShapeKind::Unknown(_) = ShapeKind::from_name(name) {
            return Ok(RawAnnotation {
                name: name.to_string(),
                ..Default::default()
            });
        }
        serde_json::from_value(value)
    }
}

/// Annotations keyed by editor id, in document order.
#[derive(Clone, Debug, Default)]
pub struct OrderedAnnotations(pub Vec<(String, RawAnnotation)>);

impl<'de> Deserialize<'de> for OrderedAnnotations {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedAnnotations;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an object mapping annotation ids to annotations")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, value)) = map.next_entry::<String, Value>()? {
                    let annotation = RawAnnotation::from_value(value)
                        .map_err(|e| <A::Error as de::Error>::custom(format!("annotation '{id}': {e}")))?;
                    entries.push((id, annotation));
                }
                Ok(OrderedAnnotations(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// The editor state a mask is rendered from.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignState {
    #[serde(default)]
    pub annotations: OrderedAnnotations,
    pub shown_image_dimensions: Dimensions,
}

impl DesignState {
    pub fn new(shown_width: f32, shown_height: f32) -> Self {
        Self {
            annotations: OrderedAnnotations::default(),
            shown_image_dimensions: Dimensions {
                width: shown_width,
                height: shown_height,
            },
        }
    }

    /// Append an annotation; later entries paint over earlier ones.
    pub fn push(&mut self, id: impl Into<String>, annotation: RawAnnotation) {
        self.annotations.0.push((id.into(), annotation));
    }

    pub fn len(&self) -> usize {
        self.annotations.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawAnnotation)> {
        self.annotations.0.iter().map(|(id, a)| (id.as_str(), a))
    }

    /// Validate every annotation. The first malformed one aborts the whole
    /// conversion; unknown kinds pass through as [`Geometry::Unknown`].
    pub fn shapes(&self) -> Result<Vec<Annotation>> {
        self.iter()
            .enumerate()
            .map(|(index, (id, raw))| Annotation::from_raw(index, id, raw))
            .collect()
    }
}

/// A parsed input file: the design plus the target size when the envelope
/// carried one.
#[derive(Clone, Debug)]
pub struct DesignDocument {
    pub design: DesignState,
    pub target: Option<(u32, u32)>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRepr {
    design_state: Option<DesignState>,
    image_data: Option<Dimensions>,
    annotations: Option<OrderedAnnotations>,
    shown_image_dimensions: Option<Dimensions>,
}

impl DesignDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let repr: DocumentRepr = serde_json::from_str(json)?;
        Self::from_repr(repr)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let repr: DocumentRepr = serde_json::from_reader(reader)?;
        Self::from_repr(repr)
    }

    fn from_repr(repr: DocumentRepr) -> Result<Self> {
        if let Some(design) = repr.design_state {
            let target = match repr.image_data {
                Some(dims) => Some(pixel_dimensions(dims)?),
                None => None,
            };
            return Ok(Self { design, target });
        }

        let shown = repr.shown_image_dimensions.ok_or_else(|| {
            MaskError::InvalidDimensions(
                "document has neither `designState` nor `shownImageDimensions`".into(),
            )
        })?;
        Ok(Self {
            design: DesignState {
                annotations: repr.annotations.unwrap_or_default(),
                shown_image_dimensions: shown,
            },
            target: None,
        })
    }
}

fn pixel_dimensions(dims: Dimensions) -> Result<(u32, u32)> {
    let valid = |v: f32| v.is_finite() && v >= 1.0 && v <= u32::MAX as f32;
    if !valid(dims.width) || !valid(dims.height) {
        return Err(MaskError::InvalidDimensions(format!(
            "image size {}x{} is not a positive pixel size",
            dims.width, dims.height
        )));
    }
    Ok((dims.width.round() as u32, dims.height.round() as u32))
}

// ============================================================================
// Validated annotations (shown space)
// ============================================================================

/// Kind-specific geometry, still in shown-space units.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Pen stroke made of a single click.
    Dot { at: Point },
    /// Pen stroke with two or more vertices.
    Polyline { points: Vec<Point> },
    /// Straight line from the origin to `origin + offset`.
    Line { offset: Point },
    Ellipse { radius_x: f32, radius_y: f32 },
    Rect { width: f32, height: f32 },
    Text { content: String, font: FontSpec },
    /// A kind this renderer does not know; painted as nothing.
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: String,
    pub kind: ShapeKind,
    pub origin: Point,
    pub rotation_degrees: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub stroke_width: f32,
    pub geometry: Geometry,
}

impl Annotation {
    /// Check the fields `raw`'s kind requires and convert them.
    pub fn from_raw(index: usize, id: &str, raw: &RawAnnotation) -> Result<Annotation> {
        let kind = ShapeKind::from_name(&raw.name);
        let fail = |reason: String| MaskError::annotation(index, id, kind.label(), reason);

        let finite = |field: &str, value: f32| -> Result<f32> {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(fail(format!("`{field}` is not a finite number")))
            }
        };
        let required = |field: &str, value: Option<f32>| -> Result<f32> {
            match value {
                Some(v) => finite(field, v),
                None => Err(fail(format!("missing `{field}`"))),
            }
        };
        // `scaleX || 1`: absent and zero both fall back to 1.
        let factor = |field: &str, value: Option<f32>| -> Result<f32> {
            match value {
                Some(v) if v != 0.0 => finite(field, v),
                _ => Ok(1.0),
            }
        };

        let rotation_degrees = match raw.rotation {
            Some(r) => finite("rotation", r)?,
            None => 0.0,
        };
        let scale_x = factor("scaleX", raw.scale_x)?;
        let scale_y = factor("scaleY", raw.scale_y)?;

        let mut annotation = Annotation {
            id: id.to_string(),
            kind: kind.clone(),
            origin: Point::ORIGIN,
            rotation_degrees,
            scale_x,
            scale_y,
            stroke_width: 0.0,
            geometry: Geometry::Unknown,
        };

        let origin = || -> Result<Point> {
            Ok(Point::new(required("x", raw.x)?, required("y", raw.y)?))
        };
        let points = || -> Result<Vec<f32>> {
            let pts = raw.points.as_ref().ok_or_else(|| fail("missing `points`".into()))?;
            for (i, v) in pts.iter().enumerate() {
                finite(format!("points[{i}]").as_str(), *v)?;
            }
            Ok(pts.clone())
        };

        let optional_stroke = || -> Result<f32> {
            match raw.stroke_width {
                Some(w) => finite("strokeWidth", w),
                None => Ok(0.0),
            }
        };

        match &kind {
            ShapeKind::Pen => {
                annotation.stroke_width = optional_stroke()?;
                let flat = points()?;
                if flat.is_empty() || flat.len() % 2 != 0 {
                    return Err(fail(format!(
                        "pen needs an even, non-empty point list (got {} numbers)",
                        flat.len()
                    )));
                }
                let vertices: Vec<Point> = flat
                    .chunks_exact(2)
                    .map(|pair| Point::new(pair[0], pair[1]))
                    .collect();
                if vertices.len() == 1 {
                    annotation.geometry = Geometry::Dot { at: vertices[0] };
                } else {
                    // The origin only matters once a rotation anchors on it.
                    if rotation_degrees != 0.0 {
                        annotation.origin = origin()?;
                    } else if let (Some(x), Some(y)) = (raw.x, raw.y) {
                        annotation.origin = Point::new(x, y);
                    }
                    annotation.geometry = Geometry::Polyline { points: vertices };
                }
            }
            ShapeKind::Line => {
                annotation.stroke_width = optional_stroke()?;
                annotation.origin = origin()?;
                let flat = points()?;
                if flat.len() < 4 {
                    return Err(fail(format!(
                        "line needs 4 point values (got {})",
                        flat.len()
                    )));
                }
                annotation.geometry = Geometry::Line {
                    offset: Point::new(flat[2], flat[3]),
                };
            }
            ShapeKind::Ellipse => {
                annotation.stroke_width = optional_stroke()?;
                annotation.origin = origin()?;
                let radius_x = required("radiusX", raw.radius_x)?;
                let radius_y = required("radiusY", raw.radius_y)?;
                if radius_x < 0.0 || radius_y < 0.0 {
                    return Err(fail(format!(
                        "negative ellipse radius ({radius_x}, {radius_y})"
                    )));
                }
                annotation.geometry = Geometry::Ellipse { radius_x, radius_y };
            }
            ShapeKind::Rect => {
                annotation.stroke_width = optional_stroke()?;
                annotation.origin = origin()?;
                annotation.geometry = Geometry::Rect {
                    width: required("width", raw.width)?,
                    height: required("height", raw.height)?,
                };
            }
            ShapeKind::Text => {
                annotation.origin = origin()?;
                let content = raw
                    .text
                    .clone()
                    .ok_or_else(|| fail("missing `text`".into()))?;
                let size = required("fontSize", raw.font_size)?;
                let family = raw.font_family.as_deref().unwrap_or("sans-serif");
                let style = raw.font_style.as_deref().unwrap_or("normal");
                annotation.geometry = Geometry::Text {
                    content,
                    font: FontSpec::from_css(family, size, style),
                };
            }
            ShapeKind::Unknown(_) => {}
        }

        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::{Annotation, DesignDocument, Geometry, Point, RawAnnotation};
    use crate::error::MaskError;
    use crate::ops::shapes::ShapeKind;

    #[test]
    fn annotations_keep_document_order() {
        let json = r#"{
            "annotations": {
                "zeta":  { "name": "Rect", "x": 0, "y": 0, "width": 5, "height": 5 },
                "alpha": { "name": "Rect", "x": 1, "y": 1, "width": 5, "height": 5 },
                "mid":   { "name": "Ellipse", "x": 2, "y": 2, "radiusX": 1, "radiusY": 1 }
            },
            "shownImageDimensions": { "width": 100, "height": 50 }
        }"#;
        let doc = DesignDocument::from_json_str(json).expect("parse");
        let ids: Vec<&str> = doc.design.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert!(doc.target.is_none());
    }

    #[test]
    fn unknown_kind_with_foreign_fields_still_parses() {
        let json = r#"{
            "annotations": {
                "poly": { "name": "Polygon", "points": [[0, 0], [5, 5]], "width": "auto" },
                "box":  { "name": "Rect", "x": 1, "y": 1, "width": 2, "height": 2 }
            },
            "shownImageDimensions": { "width": 10, "height": 10 }
        }"#;
        let doc = DesignDocument::from_json_str(json).expect("unknown kinds never fail");
        let shapes = doc.design.shapes().expect("validate");
        assert_eq!(shapes[0].kind, ShapeKind::Unknown("Polygon".into()));
        assert!(matches!(shapes[0].geometry, Geometry::Unknown));
        assert_eq!(shapes[1].kind, ShapeKind::Rect);
    }

    #[test]
    fn known_kind_with_mistyped_field_fails_with_its_id() {
        let json = r#"{
            "annotations": { "r1": { "name": "rect", "x": "left", "y": 0, "width": 1, "height": 1 } },
            "shownImageDimensions": { "width": 10, "height": 10 }
        }"#;
        let err = DesignDocument::from_json_str(json).unwrap_err();
        assert!(matches!(err, MaskError::Json(_)));
        assert!(err.to_string().contains("annotation 'r1'"), "{err}");
    }

    #[test]
    fn envelope_supplies_target_size() {
        let json = r#"{
            "designState": {
                "annotations": {},
                "shownImageDimensions": { "width": 320, "height": 240 },
                "finetunes": [], "filter": null
            },
            "imageData": { "width": 1280, "height": 960 }
        }"#;
        let doc = DesignDocument::from_json_str(json).expect("parse");
        assert_eq!(doc.target, Some((1280, 960)));
        assert!(doc.design.is_empty());
    }

    #[test]
    fn document_without_dimensions_is_rejected() {
        let err = DesignDocument::from_json_str(r#"{ "annotations": {} }"#).unwrap_err();
        assert!(matches!(err, MaskError::InvalidDimensions(_)));
    }

    #[test]
    fn single_pen_point_becomes_dot() {
        let raw = RawAnnotation {
            name: "pen".into(),
            points: Some(vec![10.0, 12.0]),
            stroke_width: Some(4.0),
            ..Default::default()
        };
        let shape = Annotation::from_raw(0, "p1", &raw).expect("valid");
        assert_eq!(shape.kind, ShapeKind::Pen);
        assert_eq!(shape.geometry, Geometry::Dot { at: Point::new(10.0, 12.0) });
    }

    #[test]
    fn zero_scale_falls_back_to_one() {
        let raw = RawAnnotation {
            name: "Rect".into(),
            x: Some(0.0),
            y: Some(0.0),
            width: Some(1.0),
            height: Some(1.0),
            scale_x: Some(0.0),
            ..Default::default()
        };
        let shape = Annotation::from_raw(0, "r", &raw).expect("valid");
        assert_eq!(shape.scale_x, 1.0);
        assert_eq!(shape.scale_y, 1.0);
    }

    #[test]
    fn line_without_points_names_index_and_kind() {
        let raw = RawAnnotation {
            name: "Line".into(),
            x: Some(0.0),
            y: Some(0.0),
            stroke_width: Some(2.0),
            ..Default::default()
        };
        match Annotation::from_raw(3, "l9", &raw) {
            Err(MaskError::InvalidAnnotation { index, id, kind, reason }) => {
                assert_eq!(index, 3);
                assert_eq!(id, "l9");
                assert_eq!(kind, "Line");
                assert!(reason.contains("points"));
            }
            other => panic!("expected InvalidAnnotation, got {other:?}"),
        }
    }

    #[test]
    fn odd_pen_point_list_is_rejected() {
        let raw = RawAnnotation {
            name: "Pen".into(),
            points: Some(vec![1.0, 2.0, 3.0]),
            stroke_width: Some(1.0),
            ..Default::default()
        };
        assert!(Annotation::from_raw(0, "p", &raw).is_err());
    }

    #[test]
    fn unknown_kind_needs_no_fields() {
        let raw = RawAnnotation {
            name: "Polygon".into(),
            ..Default::default()
        };
        let shape = Annotation::from_raw(0, "poly", &raw).expect("unknown kinds never fail");
        assert_eq!(shape.geometry, Geometry::Unknown);
        assert_eq!(shape.kind, ShapeKind::Unknown("Polygon".into()));
    }
}
