use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point (or vector) in either screen or graph space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).length()
    }

    /// Distance from this point to the segment `a..b`.
    pub fn distance_to_segment(&self, a: Point, b: Point) -> f64 {
        let ab = b - a;
        let len_sq = ab.x * ab.x + ab.y * ab.y;
        if len_sq <= f64::EPSILON {
            return self.distance(a);
        }
        let ap = *self - a;
        let t = ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0);
        self.distance(a + ab * t)
    }

    pub fn close_to(&self, other: Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A rectangle defined by min and max corners
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const NOTHING: Self = Self {
        min: Point::ORIGIN,
        max: Point::ORIGIN,
    };

    pub fn from_min_max(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Point, size: Size) -> Self {
        let half = Point::new(size.width * 0.5, size.height * 0.5);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.min.x + self.width() * 0.5,
            self.min.y + self.height() * 0.5,
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Return a new rectangle expanded by `amount` on all sides
    pub fn expand(&self, amount: f64) -> Rect {
        Rect {
            min: Point::new(self.min.x - amount, self.min.y - amount),
            max: Point::new(self.max.x + amount, self.max.y + amount),
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// Affine map of the plane, stored as the top two rows of a 3x3 matrix:
///
/// ```text
/// | m00 m01 m02 |
/// | m10 m11 m12 |
/// ```
///
/// The viewer only ever builds scale + translate transforms, but inversion and
/// composition handle the general case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneTransform {
    pub elements: [[f64; 3]; 2],
}

impl Default for PlaneTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl PlaneTransform {
    const SINGULAR_EPSILON: f64 = 1e-12;

    pub fn identity() -> Self {
        Self {
            elements: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    pub fn scale_translate(scale: f64, translation: Point) -> Self {
        Self {
            elements: [[scale, 0.0, translation.x], [0.0, scale, translation.y]],
        }
    }

    pub fn translation(&self) -> Point {
        Point::new(self.elements[0][2], self.elements[1][2])
    }

    pub fn determinant(&self) -> f64 {
        let [[a, b, _], [c, d, _]] = self.elements;
        a * d - b * c
    }

    /// Uniform scale factor; for scale + translate maps this is the scale itself.
    pub fn scale(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    pub fn multiply_point(&self, p: Point) -> Point {
        let [[a, b, tx], [c, d, ty]] = self.elements;
        Point::new(a * p.x + b * p.y + tx, c * p.x + d * p.y + ty)
    }

    /// Composition `self ∘ other`: applies `other` first.
    pub fn compose(&self, other: &PlaneTransform) -> PlaneTransform {
        let [[a, b, tx], [c, d, ty]] = self.elements;
        let [[e, f, ux], [g, h, uy]] = other.elements;
        PlaneTransform {
            elements: [
                [a * e + b * g, a * f + b * h, a * ux + b * uy + tx],
                [c * e + d * g, c * f + d * h, c * ux + d * uy + ty],
            ],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.elements.iter().flatten().all(|v| v.is_finite())
    }

    /// Exact algebraic inverse, or `None` for a degenerate or non-finite map.
    pub fn inverse(&self) -> Option<PlaneTransform> {
        if !self.is_finite() {
            return None;
        }
        let det = self.determinant();
        if !det.is_finite() || det.abs() < Self::SINGULAR_EPSILON {
            return None;
        }
        let [[a, b, tx], [c, d, ty]] = self.elements;
        let inverse = PlaneTransform {
            elements: [
                [d / det, -b / det, (b * ty - d * tx) / det],
                [-c / det, a / det, (c * tx - a * ty) / det],
            ],
        };
        inverse.is_finite().then_some(inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_and_center() {
        let rect = Rect::from_center_size(Point::new(10.0, 10.0), Size::new(4.0, 2.0));
        assert_eq!(rect.min, Point::new(8.0, 9.0));
        assert!(rect.contains(Point::new(11.0, 10.5)));
        assert!(!rect.contains(Point::new(13.0, 10.0)));
        assert_eq!(rect.center(), Point::new(10.0, 10.0));
    }

    #[test]
    fn test_distance_to_segment() {
        let p = Point::new(5.0, 3.0);
        assert_eq!(p.distance_to_segment(Point::ORIGIN, Point::new(10.0, 0.0)), 3.0);
        // Beyond the end, the nearest point is the endpoint.
        let q = Point::new(13.0, 4.0);
        assert_eq!(q.distance_to_segment(Point::ORIGIN, Point::new(10.0, 0.0)), 5.0);
    }

    #[test]
    fn test_scale_translate_inverse() {
        let m = PlaneTransform::scale_translate(2.0, Point::new(10.0, -4.0));
        let inv = m.inverse().unwrap();
        let p = Point::new(3.0, 7.0);
        let screen = m.multiply_point(p);
        assert_eq!(screen, Point::new(16.0, 10.0));
        assert!(inv.multiply_point(screen).close_to(p, 1e-12));
        assert_eq!(m.scale(), 2.0);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let m = PlaneTransform::scale_translate(0.0, Point::ORIGIN);
        assert!(m.inverse().is_none());
    }

    #[test]
    fn test_non_finite_has_no_inverse() {
        let nan_scale = PlaneTransform::scale_translate(f64::NAN, Point::ORIGIN);
        assert!(!nan_scale.is_finite());
        assert!(nan_scale.inverse().is_none());
        let far = PlaneTransform::scale_translate(1.0, Point::new(f64::INFINITY, 0.0));
        assert!(far.inverse().is_none());
        // det underflows to zero well below the singular threshold
        let tiny = PlaneTransform::scale_translate(1e-300, Point::ORIGIN);
        assert!(tiny.inverse().is_none());
    }

    #[test]
    fn test_compose_applies_right_first() {
        let scale = PlaneTransform::scale_translate(3.0, Point::ORIGIN);
        let shift = PlaneTransform::scale_translate(1.0, Point::new(1.0, 1.0));
        let m = scale.compose(&shift);
        assert_eq!(m.multiply_point(Point::ORIGIN), Point::new(3.0, 3.0));
    }
}
