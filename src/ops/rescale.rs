use crate::design::{Dimensions, Point};
use crate::error::{MaskError, Result};

/// Shown-space → target-space mapping with independent x/y ratios.
///
/// Values are converted as `value / shown * target`, the same operation
/// order the editor uses, so identical inputs give identical floats.
/// Rotation angles and per-shape scale factors are unit-less and never go
/// through here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rescaler {
    shown_width: f32,
    shown_height: f32,
    target_width: f32,
    target_height: f32,
}

impl Rescaler {
    pub fn new(shown: Dimensions, target_width: u32, target_height: u32) -> Result<Self> {
        let shown_ok = |v: f32| v.is_finite() && v > 0.0;
        if !shown_ok(shown.width) || !shown_ok(shown.height) {
            return Err(MaskError::InvalidDimensions(format!(
                "shown size {}x{} must be positive",
                shown.width, shown.height
            )));
        }
        if target_width == 0 || target_height == 0 {
            return Err(MaskError::InvalidDimensions(format!(
                "target size {target_width}x{target_height} must be positive"
            )));
        }
        Ok(Self {
            shown_width: shown.width,
            shown_height: shown.height,
            target_width: target_width as f32,
            target_height: target_height as f32,
        })
    }

    pub fn ratio_x(&self) -> f32 {
        self.target_width / self.shown_width
    }

    pub fn ratio_y(&self) -> f32 {
        self.target_height / self.shown_height
    }

    #[inline]
    pub fn x(&self, value: f32) -> f32 {
        rescale(value, self.shown_width, self.target_width)
    }

    #[inline]
    pub fn y(&self, value: f32) -> f32 {
        rescale(value, self.shown_height, self.target_height)
    }

    pub fn point(&self, p: Point) -> Point {
        Point::new(self.x(p.x), self.y(p.y))
    }

    /// Stroke widths follow the horizontal ratio.
    pub fn stroke(&self, width: f32) -> f32 {
        self.x(width)
    }

    /// Font sizes follow the vertical ratio.
    pub fn font_size(&self, size: f32) -> f32 {
        self.y(size)
    }
}

/// One axis: `value * target / shown`. Exact when the sizes match.
#[inline]
pub fn rescale(value: f32, shown: f32, target: f32) -> f32 {
    if shown == target {
        return value;
    }
    value / shown * target
}

#[cfg(test)]
mod tests {
    use super::Rescaler;
    use crate::design::{Dimensions, Point};

    fn dims(width: f32, height: f32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn axes_scale_independently() {
        let r = Rescaler::new(dims(100.0, 50.0), 400, 100).expect("valid");
        assert_eq!(r.point(Point::new(10.0, 10.0)), Point::new(40.0, 20.0));
        assert_eq!(r.stroke(3.0), 12.0);
        assert_eq!(r.font_size(12.0), 24.0);
    }

    #[test]
    fn equal_sizes_are_identity() {
        let r = Rescaler::new(dims(640.0, 480.0), 640, 480).expect("valid");
        for v in [0.0, 1.5, 333.25, -12.0] {
            assert_eq!(r.x(v), v);
            assert_eq!(r.y(v), v);
        }
    }

    #[test]
    fn zero_shown_size_is_rejected() {
        assert!(Rescaler::new(dims(0.0, 10.0), 10, 10).is_err());
        assert!(Rescaler::new(dims(10.0, 10.0), 0, 10).is_err());
    }
}
