use graphview_core::{PlaneTransform, Point};

/// Snapshot of the renderer's graph-to-screen map together with its inverse.
///
/// One snapshot is taken per event-handling pass so that every mapping in the
/// pass agrees, even if the renderer's transform moves underneath.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    forward: PlaneTransform,
    inverse: PlaneTransform,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            forward: PlaneTransform::identity(),
            inverse: PlaneTransform::identity(),
        }
    }
}

impl CoordinateTransform {
    /// `None` when `forward` is singular and cannot be inverted.
    pub fn new(forward: PlaneTransform) -> Option<Self> {
        let inverse = forward.inverse()?;
        Some(Self { forward, inverse })
    }

    pub fn forward(&self) -> PlaneTransform {
        self.forward
    }

    pub fn scale(&self) -> f64 {
        self.forward.scale()
    }

    pub fn graph_to_screen(&self, p: Point) -> Point {
        self.forward.multiply_point(p)
    }

    pub fn screen_to_graph(&self, p: Point) -> Point {
        self.inverse.multiply_point(p)
    }

    /// Converts an on-screen distance given in inches into graph units.
    pub fn graph_units_per_screen_unit(&self, dpi: f64, tolerance_inches: f64) -> f64 {
        dpi * tolerance_inches / self.scale()
    }

    /// Forward map after shifting the picture by `(dx, dy)` screen pixels.
    /// `None` for a non-finite shift.
    pub fn panned(&self, dx: f64, dy: f64) -> Option<PlaneTransform> {
        if !dx.is_finite() || !dy.is_finite() {
            return None;
        }
        Some(PlaneTransform::scale_translate(1.0, Point::new(dx, dy)).compose(&self.forward))
    }

    /// Forward map after zooming by `factor` around the screen point `center`,
    /// clamped to `[min_zoom, max_zoom]`. `None` when the clamped scale does
    /// not change or the inputs do not describe a usable zoom.
    pub fn zoomed(
        &self,
        factor: f64,
        center: Point,
        min_zoom: f64,
        max_zoom: f64,
    ) -> Option<PlaneTransform> {
        if !factor.is_finite() || factor <= 0.0 || !center.x.is_finite() || !center.y.is_finite() {
            return None;
        }
        let prev_zoom = self.scale();
        let new_zoom = (prev_zoom * factor).clamp(min_zoom, max_zoom);
        if !new_zoom.is_finite() || new_zoom <= 0.0 {
            return None;
        }
        if (new_zoom - prev_zoom).abs() <= f64::EPSILON {
            return None;
        }
        let ratio = new_zoom / prev_zoom;
        // center stays put: T(center) * S(ratio) * T(-center)
        let about_center = PlaneTransform::scale_translate(
            ratio,
            Point::new(center.x * (1.0 - ratio), center.y * (1.0 - ratio)),
        );
        Some(about_center.compose(&self.forward))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_transform_rejected() {
        let flat = PlaneTransform::scale_translate(0.0, Point::ORIGIN);
        assert!(CoordinateTransform::new(flat).is_none());
    }

    #[test]
    fn test_hit_tolerance_in_graph_units() {
        let t = CoordinateTransform::new(PlaneTransform::scale_translate(2.0, Point::ORIGIN))
            .unwrap();
        // 96 dpi * 0.05 in = 4.8 px, at 2x zoom that is 2.4 graph units.
        assert!((t.graph_units_per_screen_unit(96.0, 0.05) - 2.4).abs() < 1e-12);
    }

    #[test]
    fn test_pan_moves_screen_image() {
        let t = CoordinateTransform::default();
        let panned = CoordinateTransform::new(t.panned(10.0, -5.0).unwrap()).unwrap();
        assert_eq!(panned.graph_to_screen(Point::ORIGIN), Point::new(10.0, -5.0));
        assert_eq!(panned.screen_to_graph(Point::new(10.0, -5.0)), Point::ORIGIN);
        assert!(t.panned(f64::NAN, 0.0).is_none());
        assert!(t.panned(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_zoom_keeps_center_fixed_and_clamps() {
        let t = CoordinateTransform::new(PlaneTransform::scale_translate(1.0, Point::new(3.0, 4.0)))
            .unwrap();
        let center = Point::new(50.0, 60.0);
        let under_cursor = t.screen_to_graph(center);

        let zoomed = CoordinateTransform::new(t.zoomed(2.0, center, 0.1, 4.0).unwrap()).unwrap();
        assert!((zoomed.scale() - 2.0).abs() < 1e-12);
        assert!(zoomed.graph_to_screen(under_cursor).close_to(center, 1e-9));

        let capped = CoordinateTransform::new(zoomed.zoomed(100.0, center, 0.1, 4.0).unwrap())
            .unwrap();
        assert!((capped.scale() - 4.0).abs() < 1e-12);
        assert!(capped.zoomed(2.0, center, 0.1, 4.0).is_none());
        assert!(capped.zoomed(-1.0, center, 0.1, 4.0).is_none());
    }

    #[test]
    fn test_zoom_rejects_non_finite_and_collapsing_scale() {
        let t = CoordinateTransform::default();
        let center = Point::new(10.0, 10.0);
        assert!(t.zoomed(f64::NAN, center, 0.1, 4.0).is_none());
        assert!(t.zoomed(f64::INFINITY, center, 0.1, f64::INFINITY).is_none());
        assert!(t.zoomed(2.0, Point::new(f64::NAN, 0.0), 0.1, 4.0).is_none());
        assert!(t.zoomed(0.0, center, 0.0, 4.0).is_none());
        // a min_zoom of zero admits a scale too small to invert
        let collapsed = t.zoomed(1e-300, center, 0.0, 4.0).unwrap();
        assert!(CoordinateTransform::new(collapsed).is_none());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum ViewOp {
        Pan(f64, f64),
        Zoom(f64, f64, f64),
    }

    fn view_op() -> impl Strategy<Value = ViewOp> {
        prop_oneof![
            (-500.0f64..500.0, -500.0f64..500.0).prop_map(|(dx, dy)| ViewOp::Pan(dx, dy)),
            (0.25f64..4.0, -500.0f64..500.0, -500.0f64..500.0)
                .prop_map(|(f, x, y)| ViewOp::Zoom(f, x, y)),
        ]
    }

    proptest! {
        /// Every transform reachable by pan and zoom maps points back exactly.
        #[test]
        fn prop_screen_graph_round_trip(
            ops in proptest::collection::vec(view_op(), 0..12),
            px in -2000.0f64..2000.0,
            py in -2000.0f64..2000.0,
        ) {
            let mut current = CoordinateTransform::default();
            for op in ops {
                let next = match op {
                    ViewOp::Pan(dx, dy) => current.panned(dx, dy),
                    ViewOp::Zoom(f, x, y) => current.zoomed(f, Point::new(x, y), 0.1, 4.0),
                };
                if let Some(forward) = next.and_then(CoordinateTransform::new) {
                    current = forward;
                }
            }
            let p = Point::new(px, py);
            let back = current.screen_to_graph(current.graph_to_screen(p));
            prop_assert!(back.close_to(p, 1e-6), "{:?} came back as {:?}", p, back);
        }
    }
}
