use graphview_core::{EntityRef, PlaneTransform, Point, Rect, ViewerError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::drawing::LabelOwner;
use crate::graph::Graph;
use crate::hit_tester::{HitResult, HitTester};
use crate::scene::{PrimitiveId, SceneEntity, SceneEntityKind, SceneRenderer};

const CANVAS: PrimitiveId = PrimitiveId(0);

/// Headless scene renderer that keeps a primitive tree (root canvas, then
/// nodes and edges, then their labels) and serializes it as SVG.
#[derive(Debug, Clone)]
pub struct SvgScene {
    transform: PlaneTransform,
    snapshot: Option<Graph>,
    primitives: BTreeMap<PrimitiveId, SceneEntity>,
    by_entity: BTreeMap<EntityRef, PrimitiveId>,
    by_label: BTreeMap<LabelOwner, PrimitiveId>,
    hit_tester: HitTester,
    dirty: BTreeSet<EntityRef>,
    rubber_line: Option<(Point, Point)>,
    rubber_edge: Option<Vec<Point>>,
    /// Edge pick tolerance in screen pixels.
    pub edge_tolerance: f64,
    pub arrowhead_length: f64,
}

impl Default for SvgScene {
    fn default() -> Self {
        Self {
            transform: PlaneTransform::identity(),
            snapshot: None,
            primitives: BTreeMap::new(),
            by_entity: BTreeMap::new(),
            by_label: BTreeMap::new(),
            hit_tester: HitTester::new(),
            dirty: BTreeSet::new(),
            rubber_line: None,
            rubber_edge: None,
            edge_tolerance: 4.0,
            arrowhead_length: 5.0,
        }
    }
}

impl SvgScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arrowhead_length(mut self, length: f64) -> Self {
        self.arrowhead_length = length;
        self
    }

    /// Entities invalidated since the last call, in id order.
    pub fn take_dirty(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn primitive_for(&self, entity: EntityRef) -> Option<PrimitiveId> {
        self.by_entity.get(&entity).copied()
    }

    pub fn rubber_line(&self) -> Option<(Point, Point)> {
        self.rubber_line
    }

    pub fn rubber_edge(&self) -> Option<&[Point]> {
        self.rubber_edge.as_deref()
    }

    fn rebuild_tree(&mut self, graph: &Graph) {
        self.primitives.clear();
        self.by_entity.clear();
        self.by_label.clear();

        self.primitives.insert(
            CANVAS,
            SceneEntity {
                kind: SceneEntityKind::Canvas,
                parent: None,
            },
        );
        let mut next = 1u64;
        let mut push = |primitives: &mut BTreeMap<PrimitiveId, SceneEntity>,
                        kind: SceneEntityKind,
                        parent: PrimitiveId| {
            let id = PrimitiveId(next);
            next += 1;
            primitives.insert(
                id,
                SceneEntity {
                    kind,
                    parent: Some(parent),
                },
            );
            id
        };

        for edge in graph.edges() {
            let id = push(&mut self.primitives, SceneEntityKind::Edge(edge.id), CANVAS);
            self.by_entity.insert(EntityRef::Edge(edge.id), id);
        }
        for node in graph.nodes() {
            let id = push(&mut self.primitives, SceneEntityKind::Node(node.id), CANVAS);
            self.by_entity.insert(EntityRef::Node(node.id), id);
        }

        let Some(drawing) = graph.drawing() else {
            return;
        };
        for (owner, _) in drawing.labels() {
            let parent = match owner {
                LabelOwner::Node(id) => self.by_entity.get(&EntityRef::Node(*id)),
                LabelOwner::Edge(id) => self.by_entity.get(&EntityRef::Edge(*id)),
            };
            if let Some(&parent) = parent {
                let id = push(&mut self.primitives, SceneEntityKind::Label(*owner), parent);
                self.by_label.insert(*owner, id);
            }
        }
    }

    fn write_svg(&self, out: &mut String) -> std::fmt::Result {
        let Some(graph) = &self.snapshot else {
            return write!(out, r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#);
        };
        let bounds = graph
            .bounding_box()
            .map(|rect| self.screen_bounds(rect))
            .unwrap_or(Rect::NOTHING)
            .expand(self.arrowhead_length);
        let [[a, c, e], [b, d, f]] = self.transform.elements;

        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
            fmt_num(bounds.min.x),
            fmt_num(bounds.min.y),
            fmt_num(bounds.width()),
            fmt_num(bounds.height())
        )?;
        let len = fmt_num(self.arrowhead_length);
        writeln!(
            out,
            r#"<defs><marker id="arrow" markerWidth="{len}" markerHeight="{len}" refX="{len}" refY="{half}" orient="auto" markerUnits="userSpaceOnUse"><path d="M0,0 L{len},{half} L0,{len} z"/></marker></defs>"#,
            half = fmt_num(self.arrowhead_length * 0.5),
        )?;
        writeln!(
            out,
            r#"<g transform="matrix({} {} {} {} {} {})">"#,
            fmt_num(a),
            fmt_num(b),
            fmt_num(c),
            fmt_num(d),
            fmt_num(e),
            fmt_num(f)
        )?;

        for edge in graph.edges().filter(|edge| edge.is_routed()) {
            writeln!(
                out,
                r#"<polyline class="edge" data-id="{}" points="{}" fill="none" stroke="black" marker-end="url(#arrow)"/>"#,
                edge.id,
                fmt_points(&edge.curve)
            )?;
            if let Some(label) = &edge.label
                && let Some(anchor) = edge.label_anchor()
            {
                write_text(out, anchor, label)?;
            }
        }
        for node in graph.nodes() {
            let Some(rect) = node.bounding_box() else {
                continue;
            };
            writeln!(
                out,
                r#"<rect class="node" data-id="{}" x="{}" y="{}" width="{}" height="{}" fill="white" stroke="black"/>"#,
                node.id,
                fmt_num(rect.min.x),
                fmt_num(rect.min.y),
                fmt_num(rect.width()),
                fmt_num(rect.height())
            )?;
            write_text(out, rect.center(), &node.label_text())?;
        }
        writeln!(out, "</g>")?;

        if let Some((from, to)) = self.rubber_line {
            writeln!(
                out,
                r#"<line class="rubber-line" x1="{}" y1="{}" x2="{}" y2="{}" stroke="gray" stroke-dasharray="4 2"/>"#,
                fmt_num(from.x),
                fmt_num(from.y),
                fmt_num(to.x),
                fmt_num(to.y)
            )?;
        }
        if let Some(points) = &self.rubber_edge {
            writeln!(
                out,
                r#"<polyline class="rubber-edge" points="{}" fill="none" stroke="gray" stroke-dasharray="4 2"/>"#,
                fmt_points(points)
            )?;
        }
        write!(out, "</svg>")
    }

    fn screen_bounds(&self, rect: Rect) -> Rect {
        let a = self.transform.multiply_point(rect.min);
        let b = self.transform.multiply_point(rect.max);
        Rect::from_min_max(
            Point::new(a.x.min(b.x), a.y.min(b.y)),
            Point::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }
}

impl SceneRenderer for SvgScene {
    fn set_graph(&mut self, graph: &Graph) {
        self.rebuild_tree(graph);
        self.hit_tester.update(graph);
        self.snapshot = Some(graph.clone());
        self.dirty.clear();
        tracing::debug!(
            "Scene rebuilt with {} primitives for {} nodes and {} edges",
            self.primitives.len(),
            graph.node_count(),
            graph.edge_count()
        );
    }

    fn transform(&self) -> PlaneTransform {
        self.transform
    }

    fn set_transform(&mut self, transform: PlaneTransform) {
        self.transform = transform;
    }

    fn primitive_at(&self, screen: Point) -> Option<PrimitiveId> {
        self.snapshot.as_ref()?;
        let graph_point = self.transform.inverse()?.multiply_point(screen);
        let tolerance = self.edge_tolerance / self.transform.scale();
        let primitive = match self.hit_tester.hit_test(graph_point, tolerance) {
            HitResult::Label(owner) => self.by_label.get(&owner).copied(),
            HitResult::Node(id) => self.by_entity.get(&EntityRef::Node(id)).copied(),
            HitResult::Edge(id) => self.by_entity.get(&EntityRef::Edge(id)).copied(),
            HitResult::None => None,
        };
        Some(primitive.unwrap_or(CANVAS))
    }

    fn find_entity(&self, primitive: PrimitiveId) -> Option<SceneEntity> {
        self.primitives.get(&primitive).copied()
    }

    fn invalidate(&mut self, entity: EntityRef) {
        if self.by_entity.contains_key(&entity) {
            self.dirty.insert(entity);
        }
    }

    fn svg_string(&self) -> String {
        let mut out = String::new();
        match self.write_svg(&mut out) {
            Ok(()) => out,
            Err(_) => String::new(),
        }
    }

    fn draw_rubber_line(&mut self, from: Point, to: Point) -> Result<(), ViewerError> {
        self.rubber_line = Some((from, to));
        Ok(())
    }

    fn clear_rubber_line(&mut self) -> Result<(), ViewerError> {
        self.rubber_line = None;
        Ok(())
    }

    fn draw_rubber_edge(&mut self, points: &[Point]) -> Result<(), ViewerError> {
        self.rubber_edge = Some(points.to_vec());
        Ok(())
    }

    fn clear_rubber_edge(&mut self) -> Result<(), ViewerError> {
        self.rubber_edge = None;
        Ok(())
    }
}

fn write_text(out: &mut String, at: Point, text: &str) -> std::fmt::Result {
    writeln!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" dominant-baseline="central">{}</text>"#,
        fmt_num(at.x),
        fmt_num(at.y),
        escape_xml(text)
    )
}

fn fmt_points(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", fmt_num(p.x), fmt_num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two decimals, trailing zeros trimmed.
fn fmt_num(value: f64) -> String {
    let text = format!("{value:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
