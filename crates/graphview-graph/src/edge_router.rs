use graphview_core::{Point, Rect};

/// Straight-line router: edges leave and enter node boxes on their borders,
/// aimed at the other node's center (or at an explicit port).
#[derive(Debug, Clone, Copy)]
pub struct EdgeRouter {
    /// How far a self-loop bulges out of its node.
    pub loop_extent: f64,
}

impl Default for EdgeRouter {
    fn default() -> Self {
        Self { loop_extent: 20.0 }
    }
}

impl EdgeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route between two boxes. Ports, when given, are used verbatim as the
    /// endpoints instead of border anchors.
    pub fn route(
        &self,
        source_rect: Rect,
        target_rect: Rect,
        source_port: Option<Point>,
        target_port: Option<Point>,
    ) -> Vec<Point> {
        if source_rect == target_rect && source_port.is_none() && target_port.is_none() {
            return self.self_loop(source_rect);
        }
        let source_aim = target_port.unwrap_or(target_rect.center());
        let target_aim = source_port.unwrap_or(source_rect.center());
        let start =
            source_port.unwrap_or_else(|| self.calculate_anchor(source_rect, source_aim));
        let end = target_port.unwrap_or_else(|| self.calculate_anchor(target_rect, target_aim));
        vec![start, end]
    }

    /// Calculate the anchor point on the border of `rect` facing `toward`.
    pub fn calculate_anchor(&self, rect: Rect, toward: Point) -> Point {
        let center = rect.center();
        let vec = toward - center;

        if vec.length() < 1e-6 {
            return center;
        }

        // Ray from the center toward the target; keep the nearest side crossing.
        let mut t_min = f64::INFINITY;
        let check_t = |t: f64, start: f64, dir: f64, min: f64, max: f64| -> Option<f64> {
            if t > 0.0 {
                let pos = start + t * dir;
                if pos >= min - 1e-9 && pos <= max + 1e-9 {
                    return Some(t);
                }
            }
            None
        };

        if vec.x.abs() > 1e-9 {
            for side in [rect.min.x, rect.max.x] {
                let t = (side - center.x) / vec.x;
                if let Some(t) = check_t(t, center.y, vec.y, rect.min.y, rect.max.y) {
                    t_min = t_min.min(t);
                }
            }
        }

        if vec.y.abs() > 1e-9 {
            for side in [rect.min.y, rect.max.y] {
                let t = (side - center.y) / vec.y;
                if let Some(t) = check_t(t, center.x, vec.x, rect.min.x, rect.max.x) {
                    t_min = t_min.min(t);
                }
            }
        }

        if t_min.is_infinite() {
            return center;
        }

        center + vec * t_min
    }

    fn self_loop(&self, rect: Rect) -> Vec<Point> {
        let top = rect.min.y;
        let right = rect.max.x;
        let quarter = rect.width() * 0.25;
        vec![
            Point::new(right - quarter, top),
            Point::new(right - quarter, top - self.loop_extent),
            Point::new(right + self.loop_extent, top - self.loop_extent),
            Point::new(right + self.loop_extent, top + rect.height() * 0.25),
            Point::new(right, top + rect.height() * 0.25),
        ]
    }
}
