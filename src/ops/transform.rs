// ============================================================================
// 2D affine transforms: explicit replacement for a canvas transform stack
// ============================================================================

use crate::design::Point;

/// Row-major 2×3 affine matrix using the canvas convention:
///
/// ```text
/// x' = a·x + c·y + e
/// y' = b·x + d·y + f
/// ```
///
/// The builder methods (`translate`, `rotate`, `scale`) post-multiply, so
/// `Affine::IDENTITY.translate(..).rotate(..).scale(..)` reads in the same
/// order as the equivalent `ctx.translate(); ctx.rotate(); ctx.scale();`
/// sequence and maps local geometry into canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(tx: f32, ty: f32) -> Self {
        Affine {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// Clockwise rotation in screen space (y down), angle in radians.
    pub fn rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Affine {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// `self · rhs`: `rhs` is applied first.
    pub fn multiply(&self, rhs: &Affine) -> Affine {
        Affine {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    pub fn translate(self, tx: f32, ty: f32) -> Affine {
        self.multiply(&Affine::translation(tx, ty))
    }

    pub fn rotate(self, radians: f32) -> Affine {
        self.multiply(&Affine::rotation(radians))
    }

    pub fn scale(self, sx: f32, sy: f32) -> Affine {
        self.multiply(&Affine::scaling(sx, sy))
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// `None` for singular matrices (a zero scale factor collapses the plane).
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    /// Largest stretch applied to a local unit vector (column norm bound).
    pub fn max_scale(&self) -> f32 {
        let sx = (self.a * self.a + self.b * self.b).sqrt();
        let sy = (self.c * self.c + self.d * self.d).sqrt();
        sx.max(sy)
    }

    /// Average linear scale; converts local distances to approximate pixels.
    pub fn mean_scale(&self) -> f32 {
        self.determinant().abs().sqrt()
    }

    /// Axis-aligned bounds of a local rectangle after transformation.
    /// Returns `(min, max)` in output space.
    pub fn map_bounds(&self, min: Point, max: Point) -> (Point, Point) {
        let corners = [
            Point::new(min.x, min.y),
            Point::new(max.x, min.y),
            Point::new(max.x, max.y),
            Point::new(min.x, max.y),
        ];
        let mut lo = Point::new(f32::MAX, f32::MAX);
        let mut hi = Point::new(f32::MIN, f32::MIN);
        for corner in corners {
            let p = self.apply(corner);
            lo.x = lo.x.min(p.x);
            lo.y = lo.y.min(p.y);
            hi.x = hi.x.max(p.x);
            hi.y = hi.y.max(p.y);
        }
        (lo, hi)
    }
}

pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * (std::f32::consts::PI / 180.0)
}

#[cfg(test)]
mod tests {
    use super::{degrees_to_radians, Affine};
    use crate::design::Point;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn builder_order_matches_canvas_stack() {
        // translate → rotate 90° → scale(2, 1): local (1, 0) goes to (10, 22)
        let m = Affine::IDENTITY
            .translate(10.0, 20.0)
            .rotate(degrees_to_radians(90.0))
            .scale(2.0, 1.0);
        assert!(close(m.apply(Point::new(1.0, 0.0)), Point::new(10.0, 22.0)));
    }

    #[test]
    fn inverse_round_trips_points() {
        let m = Affine::IDENTITY
            .translate(3.0, -7.0)
            .rotate(0.7)
            .scale(1.5, 0.5);
        let inv = m.inverse().expect("invertible");
        let p = Point::new(4.25, -1.5);
        assert!(close(inv.apply(m.apply(p)), p));
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        assert!(Affine::scaling(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn map_bounds_covers_rotated_square() {
        let m = Affine::rotation(degrees_to_radians(45.0));
        let (lo, hi) = m.map_bounds(Point::new(-1.0, -1.0), Point::new(1.0, 1.0));
        let r = 2.0f32.sqrt();
        assert!(close(lo, Point::new(-r, -r)));
        assert!(close(hi, Point::new(r, r)));
    }
}
