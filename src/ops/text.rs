use std::path::Path;

use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use tracing::debug;

use crate::canvas::{MaskCanvas, RasterOptions};
use crate::design::Point;
use crate::error::{MaskError, Result};
use crate::ops::transform::Affine;

/// Upper bound on the glyph supersampling factor; keeps coverage buffers
/// bounded for extreme per-shape scales.
const MAX_GLYPH_SCALE: f32 = 8.0;
const MIN_GLYPH_SCALE: f32 = 1e-3;

/// Glyph buffers may always hold at least this many samples, however small
/// the canvas.
const MIN_SAMPLE_BUDGET: usize = 64 * 64;

/// Font request derived from a CSS-like `fontStyle` / `fontFamily` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    /// Family names in preference order (`"Roboto, sans-serif"` → two entries).
    pub families: Vec<String>,
    pub size: f32,
    /// CSS weight, 100–900.
    pub weight: u16,
    pub italic: bool,
}

impl FontSpec {
    /// Build from the editor's `fontFamily`, `fontSize` and `fontStyle`
    /// (`normal`, `bold`, `italic`, `italic bold`, `300`, ...).
    pub fn from_css(family: &str, size: f32, style: &str) -> Self {
        let mut weight = 400;
        let mut italic = false;
        for token in style.split_whitespace() {
            match token.to_ascii_lowercase().as_str() {
                "italic" | "oblique" => italic = true,
                "bold" | "bolder" => weight = 700,
                "lighter" => weight = 300,
                "normal" => {}
                other => {
                    if let Ok(w) = other.parse::<u16>() {
                        weight = w.clamp(100, 900);
                    }
                }
            }
        }

        let mut families: Vec<String> = family
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if families.is_empty() {
            families.push("sans-serif".to_string());
        }

        Self {
            families,
            size,
            weight,
            italic,
        }
    }

    pub fn with_size(&self, size: f32) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    /// The first (preferred) family, for messages.
    pub fn primary_family(&self) -> &str {
        self.families.first().map(String::as_str).unwrap_or("sans-serif")
    }
}

// ============================================================================
// Font resolution
// ============================================================================

/// Where Text annotations get their glyphs from.
pub trait FontProvider {
    fn load(&self, spec: &FontSpec) -> Option<FontArc>;
}

/// Installed fonts, looked up by family/weight/style through font-kit.
#[derive(Clone, Debug)]
pub struct SystemFonts {
    /// Tried after the requested families, in order.
    pub fallback_families: Vec<String>,
}

impl Default for SystemFonts {
    fn default() -> Self {
        Self {
            fallback_families: default_fallback_families(),
        }
    }
}

impl SystemFonts {
    pub fn new(fallback_families: Vec<String>) -> Self {
        Self { fallback_families }
    }
}

impl FontProvider for SystemFonts {
    fn load(&self, spec: &FontSpec) -> Option<FontArc> {
        let candidates = spec.families.iter().chain(self.fallback_families.iter());
        for family in candidates {
            if let Some(font) = load_system_font(family, spec.weight, spec.italic) {
                debug!(family = %family, weight = spec.weight, italic = spec.italic, "resolved font");
                return Some(font);
            }
        }
        None
    }
}

/// One explicit font file used for every Text annotation.
#[derive(Clone)]
pub struct FileFont {
    font: FontArc,
}

impl FileFont {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes).map_err(|_| {
            MaskError::Config(format!("'{}' is not a usable font file", path.display()))
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, ab_glyph::InvalidFont> {
        Ok(Self {
            font: FontArc::try_from_vec(bytes)?,
        })
    }
}

impl FontProvider for FileFont {
    fn load(&self, _spec: &FontSpec) -> Option<FontArc> {
        Some(self.font.clone())
    }
}

fn default_fallback_families() -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        vec!["DejaVu Sans".to_string(), "Liberation Sans".to_string(), "sans-serif".to_string()]
    }
    #[cfg(not(target_os = "linux"))]
    {
        vec!["Arial".to_string(), "Helvetica".to_string(), "sans-serif".to_string()]
    }
}

/// Ask the platform font database for the closest face to a CSS family,
/// numeric weight (400 regular, 700 bold) and slant. `None` when nothing
/// matches or the face bytes can't be parsed.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(f32::from(weight));
    if italic {
        props.style = Style::Italic;
    }

    let handle = SystemSource::new()
        .select_best_match(&[family_name(family)], &props)
        .ok()?;
    // font-kit hands back shared bytes; ab_glyph wants to own them
    let bytes = handle.load().ok()?.copy_font_data()?;
    FontArc::try_from_vec((*bytes).clone()).ok()
}

/// CSS generic keywords resolve through the platform defaults, anything
/// else is looked up by title.
fn family_name(family: &str) -> font_kit::family_name::FamilyName {
    use font_kit::family_name::FamilyName;

    match family.to_ascii_lowercase().as_str() {
        "serif" => FamilyName::Serif,
        "sans-serif" => FamilyName::SansSerif,
        "monospace" => FamilyName::Monospace,
        "cursive" => FamilyName::Cursive,
        "fantasy" => FamilyName::Fantasy,
        _ => FamilyName::Title(family.to_string()),
    }
}

// ============================================================================
// Layout + rasterization
// ============================================================================

/// Lay out a single line of text at `font_size`, left-aligned at x=0 with
/// the baseline at y=0. Newlines are laid out as spaces.
/// Returns `(glyphs, total_width)`.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let ch = if ch == '\n' || ch == '\r' { ' ' } else { ch };
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Baseline y for `textBaseline = "middle"` with the middle placed at
/// `font_size / 2`: the text box then spans roughly `0..font_size`.
pub fn middle_baseline(font: &FontArc, font_size: f32) -> f32 {
    let scaled = font.as_scaled(font_size);
    font_size * 0.5 + (scaled.ascent() + scaled.descent()) * 0.5
}

/// Glyph coverage rendered in local text space at `px_per_unit` samples
/// per local unit.
#[derive(Clone, Debug)]
pub struct GlyphCoverage {
    /// Local-space position of the buffer's top-left sample, in samples.
    origin_x: i32,
    origin_y: i32,
    width: u32,
    height: u32,
    px_per_unit: f32,
    data: Vec<f32>,
}

impl GlyphCoverage {
    /// Rasterize `text` with its baseline at local `baseline_y`.
    ///
    /// Only samples inside the local-space `clip` rectangle are stored.
    /// When that still exceeds `max_samples`, the sample density drops
    /// until it fits.
    pub fn render(
        font: &FontArc,
        text: &str,
        font_size: f32,
        baseline_y: f32,
        px_per_unit: f32,
        clip: (Point, Point),
        max_samples: usize,
    ) -> Option<GlyphCoverage> {
        let (glyphs, _) = layout_line(font, text, font_size);
        let mut px_per_unit = px_per_unit;

        loop {
            if !(px_per_unit >= MIN_GLYPH_SCALE) {
                return None;
            }
            let sample_size = font_size * px_per_unit;
            let outlined: Vec<_> = glyphs
                .iter()
                .filter_map(|&(id, x)| {
                    let glyph = id.with_scale_and_position(
                        sample_size,
                        point(x * px_per_unit, baseline_y * px_per_unit),
                    );
                    font.outline_glyph(glyph)
                })
                .collect();
            if outlined.is_empty() {
                return None;
            }

            let mut min_x = f32::MAX;
            let mut min_y = f32::MAX;
            let mut max_x = f32::MIN;
            let mut max_y = f32::MIN;
            for g in &outlined {
                let b = g.px_bounds();
                min_x = min_x.min(b.min.x);
                min_y = min_y.min(b.min.y);
                max_x = max_x.max(b.max.x);
                max_y = max_y.max(b.max.y);
            }
            // Text outside the canvas never needs samples.
            let k = px_per_unit;
            min_x = min_x.max((clip.0.x * k).floor() - 1.0);
            min_y = min_y.max((clip.0.y * k).floor() - 1.0);
            max_x = max_x.min((clip.1.x * k).ceil() + 1.0);
            max_y = max_y.min((clip.1.y * k).ceil() + 1.0);
            if !(min_x < max_x && min_y < max_y) {
                return None;
            }

            let origin_x = min_x.floor() as i32;
            let origin_y = min_y.floor() as i32;
            let width = (max_x.ceil() as i32 - origin_x).max(0) as u32;
            let height = (max_y.ceil() as i32 - origin_y).max(0) as u32;
            if width == 0 || height == 0 {
                return None;
            }
            let samples = width as usize * height as usize;
            if samples > max_samples {
                let shrink = (max_samples as f32 / samples as f32).sqrt() * 0.9;
                debug!(samples, max_samples, shrink, "lowering glyph sample density");
                px_per_unit *= shrink;
                continue;
            }

            let mut data = vec![0.0f32; samples];
            for g in &outlined {
                let b = g.px_bounds();
                if b.max.x < min_x || b.min.x > max_x || b.max.y < min_y || b.min.y > max_y {
                    continue;
                }
                let gx0 = b.min.x as i32 - origin_x;
                let gy0 = b.min.y as i32 - origin_y;
                g.draw(|px, py, cov| {
                    let x = gx0 + px as i32;
                    let y = gy0 + py as i32;
                    if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                        let idx = y as usize * width as usize + x as usize;
                        // Overlapping glyphs keep the stronger sample.
                        data[idx] = data[idx].max(cov.min(1.0));
                    }
                });
            }

            return Some(GlyphCoverage {
                origin_x,
                origin_y,
                width,
                height,
                px_per_unit,
                data,
            });
        }
    }

    /// Number of stored samples.
    pub fn sample_count(&self) -> usize {
        self.data.len()
    }

    /// Local-space bounds `(min, max)` of the rendered samples.
    pub fn local_bounds(&self) -> (Point, Point) {
        let k = self.px_per_unit;
        (
            Point::new(self.origin_x as f32 / k, self.origin_y as f32 / k),
            Point::new(
                (self.origin_x + self.width as i32) as f32 / k,
                (self.origin_y + self.height as i32) as f32 / k,
            ),
        )
    }

    /// Nearest-sample coverage at a local-space point.
    pub fn sample(&self, p: Point) -> f32 {
        let sx = (p.x * self.px_per_unit).floor() as i32 - self.origin_x;
        let sy = (p.y * self.px_per_unit).floor() as i32 - self.origin_y;
        if sx < 0 || sy < 0 || sx as u32 >= self.width || sy as u32 >= self.height {
            return 0.0;
        }
        self.data[sy as usize * self.width as usize + sx as usize]
    }
}

/// Fill `text` in white through `transform`, vertically centred on local
/// `y = font_size / 2`.
pub fn paint_text(
    canvas: &mut MaskCanvas,
    font: &FontArc,
    text: &str,
    font_size: f32,
    transform: &Affine,
    options: &RasterOptions,
) {
    if text.is_empty() || !(font_size > 0.0) {
        return;
    }
    let Some(inverse) = transform.inverse() else {
        return;
    };
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let clip = inverse.map_bounds(Point::ORIGIN, Point::new(w, h));
    let max_samples = (canvas.width() as usize * canvas.height() as usize).max(MIN_SAMPLE_BUDGET);

    let px_per_unit = transform.max_scale().clamp(MIN_GLYPH_SCALE, MAX_GLYPH_SCALE);
    let baseline = middle_baseline(font, font_size);
    let Some(coverage) = GlyphCoverage::render(
        font,
        text,
        font_size,
        baseline,
        px_per_unit,
        clip,
        max_samples,
    ) else {
        return;
    };

    let (lo, hi) = coverage.local_bounds();
    let anti_alias = options.anti_alias;
    canvas.shade(transform, lo, hi, options, |p| {
        let c = coverage.sample(p);
        if anti_alias {
            c
        } else if c >= 0.5 {
            1.0
        } else {
            0.0
        }
    });
}

#[cfg(test)]
mod tests {
    use super::{family_name, middle_baseline, paint_text, FontSpec, GlyphCoverage};
    use font_kit::family_name::FamilyName;
    use crate::canvas::{MaskCanvas, RasterOptions};
    use crate::design::Point;
    use crate::ops::transform::Affine;
    use ab_glyph::FontArc;

    #[test]
    fn generic_families_use_platform_defaults() {
        assert!(matches!(family_name("Sans-Serif"), FamilyName::SansSerif));
        assert!(matches!(family_name("monospace"), FamilyName::Monospace));
        assert!(matches!(family_name("DejaVu Sans"), FamilyName::Title(t) if t == "DejaVu Sans"));
    }

    #[test]
    fn css_style_parsing() {
        let spec = FontSpec::from_css("Roboto, 'Open Sans', sans-serif", 18.0, "italic bold");
        assert_eq!(spec.families, vec!["Roboto", "Open Sans", "sans-serif"]);
        assert_eq!(spec.weight, 700);
        assert!(spec.italic);

        let light = FontSpec::from_css("Arial", 12.0, "300");
        assert_eq!(light.weight, 300);
        assert!(!light.italic);

        let plain = FontSpec::from_css("", 12.0, "normal");
        assert_eq!(plain.primary_family(), "sans-serif");
        assert_eq!(plain.weight, 400);
    }

    #[test]
    fn with_size_keeps_face() {
        let spec = FontSpec::from_css("Arial", 12.0, "bold");
        let big = spec.with_size(48.0);
        assert_eq!(big.size, 48.0);
        assert_eq!(big.weight, 700);
        assert_eq!(big.families, spec.families);
    }

    fn fixture_font() -> FontArc {
        FontArc::try_from_slice(include_bytes!("../../tests/fixtures/DejaVuSans.ttf"))
            .expect("fixture font")
    }

    fn unclipped() -> (Point, Point) {
        (Point::new(-1e6, -1e6), Point::new(1e6, 1e6))
    }

    #[test]
    fn glyphs_land_in_text_box() {
        let font = fixture_font();
        let baseline = middle_baseline(&font, 20.0);
        let cov = GlyphCoverage::render(&font, "HH", 20.0, baseline, 1.0, unclipped(), usize::MAX)
            .expect("glyph outlines");
        let (lo, hi) = cov.local_bounds();
        assert!(lo.x >= -2.0 && hi.x > lo.x);
        assert!(lo.y >= -2.0 && hi.y <= 22.0);
        // Cap height sits around the middle line.
        assert!(cov.sample(Point::new(2.0, 10.0)) > 0.5);
    }

    #[test]
    fn coverage_is_clipped_to_the_visible_region() {
        let font = fixture_font();
        let size = 960.0;
        let baseline = middle_baseline(&font, size);
        let clip = (Point::new(0.0, 200.0), Point::new(100.0, 300.0));
        let cov = GlyphCoverage::render(&font, "INPAINT HERE", size, baseline, 4.0, clip, usize::MAX)
            .expect("glyph outlines");
        // 100 local units at 4 samples each, plus a sample of padding per side
        assert!(cov.sample_count() <= 404 * 404, "{} samples", cov.sample_count());
    }

    #[test]
    fn oversized_coverage_lowers_sample_density() {
        let font = fixture_font();
        let baseline = middle_baseline(&font, 200.0);
        let budget = 64 * 64;
        let cov = GlyphCoverage::render(&font, "WIDE TEXT", 200.0, baseline, 8.0, unclipped(), budget)
            .expect("glyph outlines");
        assert!(cov.sample_count() <= budget);
        let (lo, hi) = cov.local_bounds();
        assert!(hi.x - lo.x > 500.0, "still spans the full string");
    }

    #[test]
    fn huge_text_paints_the_visible_part() {
        let font = fixture_font();
        let mut canvas = MaskCanvas::new(64, 64);
        // Canvas shows local x 90..106, y 400..416: the left edge of the
        // first "I" stem, which starts near x = 94.
        let t = Affine::IDENTITY.scale(4.0, 4.0).translate(-90.0, -400.0);
        paint_text(&mut canvas, &font, "INPAINT HERE", 960.0, &t, &RasterOptions::default());
        assert_eq!(canvas.image().get_pixel(40, 32)[3], 255);
        assert_eq!(canvas.image().get_pixel(4, 32)[3], 0);
    }
}
