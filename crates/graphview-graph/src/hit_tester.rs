use graphview_core::{EdgeId, NodeId, Point, Rect};
use std::collections::HashMap;

use crate::drawing::LabelOwner;
use crate::graph::Graph;

/// Result of a hit test at a given position.
///
/// Priority order: Label > Node > Edge > None
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitResult {
    /// Nothing was hit at the tested position.
    None,
    /// A label box was hit; its owner is the node or edge carrying it.
    Label(LabelOwner),
    Node(NodeId),
    /// A single edge was hit (within tolerance of its polyline).
    Edge(EdgeId),
}

/// Spatial index of the drawn graph, in graph coordinates.
#[derive(Debug, Clone, Default)]
pub struct HitTester {
    node_rects: HashMap<NodeId, Rect>,
    label_rects: HashMap<LabelOwner, Rect>,
    edge_curves: HashMap<EdgeId, Vec<Point>>,
}

impl HitTester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh hit regions from the graph's geometry and measured labels.
    ///
    /// Call this after any layout change.
    pub fn update(&mut self, graph: &Graph) {
        self.node_rects.clear();
        self.label_rects.clear();
        self.edge_curves.clear();

        for node in graph.nodes() {
            let Some(rect) = node.bounding_box() else {
                continue;
            };
            self.node_rects.insert(node.id, rect);
        }

        for edge in graph.edges() {
            if edge.is_routed() {
                self.edge_curves.insert(edge.id, edge.curve.clone());
            }
        }

        let Some(drawing) = graph.drawing() else {
            return;
        };
        for (owner, label) in drawing.labels() {
            let anchor = match owner {
                LabelOwner::Node(id) => graph.node(*id).and_then(|n| n.center),
                LabelOwner::Edge(id) => graph.edge(*id).and_then(|e| e.label_anchor()),
            };
            if let Some(center) = anchor {
                self.label_rects
                    .insert(*owner, Rect::from_center_size(center, label.size));
            }
        }
    }

    /// Perform a hit test at `pos` (graph coordinates). `tolerance` is the
    /// maximum distance, in graph units, from an edge polyline that still
    /// counts as a hit.
    pub fn hit_test(&self, pos: Point, tolerance: f64) -> HitResult {
        if let Some(owner) = self.hit_test_label(pos) {
            return HitResult::Label(owner);
        }
        if let Some(node_id) = self.hit_test_node(pos) {
            return HitResult::Node(node_id);
        }
        if let Some(edge_id) = self.hit_test_edge(pos, tolerance) {
            return HitResult::Edge(edge_id);
        }
        HitResult::None
    }

    /// If several nodes overlap, the smallest (innermost) one wins.
    pub fn hit_test_node(&self, pos: Point) -> Option<NodeId> {
        self.node_rects
            .iter()
            .filter(|(_, rect)| rect.contains(pos))
            .min_by(|a, b| {
                a.1.area()
                    .partial_cmp(&b.1.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(b.0))
            })
            .map(|(id, _)| *id)
    }

    pub fn hit_test_label(&self, pos: Point) -> Option<LabelOwner> {
        self.label_rects
            .iter()
            .filter(|(_, rect)| rect.contains(pos))
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(owner, _)| *owner)
    }

    /// Closest edge within `tolerance`, if any.
    pub fn hit_test_edge(&self, pos: Point, tolerance: f64) -> Option<EdgeId> {
        let mut best_id = None;
        let mut best_dist = tolerance;

        for (&edge_id, curve) in &self.edge_curves {
            let dist = curve
                .windows(2)
                .map(|segment| pos.distance_to_segment(segment[0], segment[1]))
                .fold(f64::INFINITY, f64::min);
            if dist < best_dist || (dist == best_dist && best_id.is_some_and(|b| edge_id < b)) {
                best_dist = dist;
                best_id = Some(edge_id);
            }
        }

        best_id
    }

    pub fn node_rects(&self) -> &HashMap<NodeId, Rect> {
        &self.node_rects
    }

    pub fn edge_curves(&self) -> &HashMap<EdgeId, Vec<Point>> {
        &self.edge_curves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::DrawingGraph;
    use crate::graph::{GraphEdge, GraphNode};
    use crate::measure::MonospaceMeasurer;
    use graphview_core::Size;

    fn placed_node(id: i64, center: Point, size: Size) -> GraphNode {
        GraphNode {
            center: Some(center),
            size,
            ..GraphNode::new(NodeId(id))
        }
    }

    #[test]
    fn test_hit_test_node() {
        let mut graph = Graph::new();
        graph.add_node(placed_node(1, Point::new(200.0, 175.0), Size::new(200.0, 150.0)));

        let mut tester = HitTester::new();
        tester.update(&graph);

        assert_eq!(
            tester.hit_test(Point::new(150.0, 150.0), 4.0),
            HitResult::Node(NodeId(1))
        );
        assert_eq!(tester.hit_test(Point::new(50.0, 50.0), 4.0), HitResult::None);
    }

    #[test]
    fn test_smallest_node_wins_on_overlap() {
        let mut graph = Graph::new();
        graph.add_node(placed_node(1, Point::new(150.0, 150.0), Size::new(300.0, 300.0)));
        graph.add_node(placed_node(2, Point::new(125.0, 125.0), Size::new(50.0, 50.0)));

        let mut tester = HitTester::new();
        tester.update(&graph);

        assert_eq!(tester.hit_test_node(Point::new(120.0, 120.0)), Some(NodeId(2)));
        assert_eq!(tester.hit_test_node(Point::new(10.0, 10.0)), Some(NodeId(1)));
    }

    #[test]
    fn test_hit_test_edge_with_tolerance() {
        let mut graph = Graph::new();
        graph.add_node(GraphNode::new(NodeId(1)));
        graph.add_node(GraphNode::new(NodeId(2)));
        let mut edge = GraphEdge::new(EdgeId(1), NodeId(1), NodeId(2));
        edge.curve = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        graph.add_edge(edge);

        let mut tester = HitTester::new();
        tester.update(&graph);

        assert_eq!(tester.hit_test_edge(Point::new(50.0, 5.0), 2.0), None);
        assert_eq!(
            tester.hit_test_edge(Point::new(50.0, 5.0), 8.0),
            Some(EdgeId(1))
        );
    }

    #[test]
    fn test_label_has_priority_over_node() {
        let mut graph = Graph::new();
        graph.add_node(GraphNode {
            label: Some("abc".to_string()),
            ..placed_node(1, Point::new(0.0, 0.0), Size::new(100.0, 60.0))
        });
        DrawingGraph::measure_label_sizes(&mut graph, &MonospaceMeasurer::new()).unwrap();

        let mut tester = HitTester::new();
        tester.update(&graph);

        assert_eq!(
            tester.hit_test(Point::new(0.0, 0.0), 1.0),
            HitResult::Label(LabelOwner::Node(NodeId(1)))
        );
        // Inside the node box but outside the label box.
        assert_eq!(
            tester.hit_test(Point::new(45.0, 25.0), 1.0),
            HitResult::Node(NodeId(1))
        );
    }

    #[test]
    fn test_update_clears_previous_data() {
        let mut graph = Graph::new();
        graph.add_node(placed_node(1, Point::new(0.0, 0.0), Size::new(10.0, 10.0)));
        let mut tester = HitTester::new();
        tester.update(&graph);
        assert!(tester.node_rects().contains_key(&NodeId(1)));

        tester.update(&Graph::new());
        assert!(tester.node_rects().is_empty());
    }
}
