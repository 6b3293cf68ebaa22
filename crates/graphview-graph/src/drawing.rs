use graphview_core::{EdgeId, NodeId, Size, ViewerError};
use std::collections::BTreeMap;

use crate::graph::Graph;
use crate::measure::TextMeasurer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelOwner {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelGeometry {
    pub text: String,
    pub size: Size,
}

/// Per-graph cache of measured label geometry, kept apart from topology.
#[derive(Debug, Clone, Default)]
pub struct DrawingGraph {
    labels: BTreeMap<LabelOwner, LabelGeometry>,
    geometry_created: bool,
}

impl DrawingGraph {
    pub fn label(&self, owner: LabelOwner) -> Option<&LabelGeometry> {
        self.labels.get(&owner)
    }

    pub fn labels(&self) -> impl Iterator<Item = (&LabelOwner, &LabelGeometry)> {
        self.labels.iter()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn geometry_created(&self) -> bool {
        self.geometry_created
    }

    pub fn forget(&mut self, owner: LabelOwner) {
        self.labels.remove(&owner);
    }

    pub fn set_label(&mut self, owner: LabelOwner, geometry: LabelGeometry) {
        self.labels.insert(owner, geometry);
    }

    /// Measures every label and sizes each node around its label plus
    /// `padding`. Nothing in `graph` changes unless all measurements succeed.
    pub fn create_geometry(
        graph: &mut Graph,
        measurer: &dyn TextMeasurer,
        padding: f64,
    ) -> Result<usize, ViewerError> {
        let labels = Self::measure_all(graph, measurer)?;
        for (owner, geometry) in &labels {
            if let LabelOwner::Node(id) = owner
                && let Some(node) = graph.node_mut(*id)
            {
                node.size = Size::new(
                    geometry.size.width + 2.0 * padding,
                    geometry.size.height + 2.0 * padding,
                );
            }
        }
        let count = labels.len();
        let drawing = graph.attach_drawing();
        drawing.labels = labels;
        drawing.geometry_created = true;
        Ok(count)
    }

    /// Refreshes label sizes only; node boxes are left as they are.
    pub fn measure_label_sizes(
        graph: &mut Graph,
        measurer: &dyn TextMeasurer,
    ) -> Result<usize, ViewerError> {
        let labels = Self::measure_all(graph, measurer)?;
        let count = labels.len();
        graph.attach_drawing().labels = labels;
        Ok(count)
    }

    /// Measures a single node label, e.g. for a node added by an edit.
    pub fn measure_node(
        graph: &mut Graph,
        id: NodeId,
        measurer: &dyn TextMeasurer,
        padding: f64,
    ) -> Result<(), ViewerError> {
        let Some(node) = graph.node(id) else {
            return Ok(());
        };
        let text = node.label_text();
        let size = measurer.measure(&text)?;
        if let Some(node) = graph.node_mut(id)
            && node.size.is_empty()
        {
            node.size = Size::new(size.width + 2.0 * padding, size.height + 2.0 * padding);
        }
        graph
            .attach_drawing()
            .labels
            .insert(LabelOwner::Node(id), LabelGeometry { text, size });
        Ok(())
    }

    fn measure_all(
        graph: &Graph,
        measurer: &dyn TextMeasurer,
    ) -> Result<BTreeMap<LabelOwner, LabelGeometry>, ViewerError> {
        let mut labels = BTreeMap::new();
        for node in graph.nodes() {
            let text = node.label_text();
            let size = measurer.measure(&text)?;
            labels.insert(LabelOwner::Node(node.id), LabelGeometry { text, size });
        }
        for edge in graph.edges() {
            if let Some(text) = &edge.label {
                let size = measurer.measure(text)?;
                labels.insert(
                    LabelOwner::Edge(edge.id),
                    LabelGeometry {
                        text: text.clone(),
                        size,
                    },
                );
            }
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode};
    use crate::measure::MonospaceMeasurer;
    use crate::options::LabelOptions;
    use std::cell::Cell;

    struct FailingMeasurer {
        remaining: Cell<usize>,
    }

    impl TextMeasurer for FailingMeasurer {
        fn set_options(&mut self, _options: &LabelOptions) {}

        fn measure(&self, _text: &str) -> Result<Size, ViewerError> {
            if self.remaining.get() == 0 {
                return Err(ViewerError::collaborator(
                    graphview_core::Collaborator::Measurer,
                    "font missing",
                ));
            }
            self.remaining.set(self.remaining.get() - 1);
            Ok(Size::new(10.0, 10.0))
        }
    }

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(GraphNode::with_label(NodeId(1), "alpha"));
        graph.add_node(GraphNode::new(NodeId(2)));
        let mut edge = GraphEdge::new(EdgeId(1), NodeId(1), NodeId(2));
        edge.label = Some("calls".to_string());
        graph.add_edge(edge);
        graph
    }

    #[test]
    fn test_create_geometry_sizes_nodes() {
        let mut graph = sample_graph();
        let count = DrawingGraph::create_geometry(&mut graph, &MonospaceMeasurer::new(), 5.0)
            .unwrap();

        assert_eq!(count, 3);
        let drawing = graph.drawing().unwrap();
        assert!(drawing.geometry_created());
        let label = drawing.label(LabelOwner::Node(NodeId(1))).unwrap();
        assert_eq!(label.text, "alpha");
        let node = graph.node(NodeId(1)).unwrap();
        assert!((node.size.width - (label.size.width + 10.0)).abs() < 1e-9);
        // Unlabelled nodes fall back to their id.
        assert_eq!(
            graph
                .drawing()
                .unwrap()
                .label(LabelOwner::Node(NodeId(2)))
                .unwrap()
                .text,
            "2"
        );
    }

    #[test]
    fn test_measure_label_sizes_keeps_node_boxes() {
        let mut graph = sample_graph();
        graph.node_mut(NodeId(1)).unwrap().size = Size::new(1.0, 1.0);
        DrawingGraph::measure_label_sizes(&mut graph, &MonospaceMeasurer::new()).unwrap();

        assert_eq!(graph.node(NodeId(1)).unwrap().size, Size::new(1.0, 1.0));
        assert!(!graph.drawing().unwrap().geometry_created());
        assert_eq!(graph.drawing().unwrap().label_count(), 3);
    }

    #[test]
    fn test_failed_measurement_leaves_graph_untouched() {
        let mut graph = sample_graph();
        let measurer = FailingMeasurer {
            remaining: Cell::new(2),
        };
        let result = DrawingGraph::create_geometry(&mut graph, &measurer, 5.0);

        assert!(result.is_err());
        assert!(graph.drawing().is_none());
        assert_eq!(graph.node(NodeId(1)).unwrap().size, Size::ZERO);
    }
}
