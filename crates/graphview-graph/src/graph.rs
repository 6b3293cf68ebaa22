use anyhow::Context;
use graphview_core::{EdgeId, NodeId, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::drawing::DrawingGraph;

/// Graph handle shared between the host and the viewer. Identity (not
/// content) decides whether `set_graph` rebinds.
pub type SharedGraph = Rc<RefCell<Graph>>;

pub fn shared(graph: Graph) -> SharedGraph {
    Rc::new(RefCell::new(graph))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(default)]
    pub label: Option<String>,
    /// `None` until a layout pass (or the host) places the node.
    #[serde(default)]
    pub center: Option<Point>,
    #[serde(default)]
    pub size: Size,
}

impl GraphNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            label: None,
            center: None,
            size: Size::ZERO,
        }
    }

    pub fn with_label(id: NodeId, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(id)
        }
    }

    /// Text shown for the node: its label, or its id when it has none.
    pub fn label_text(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.id.to_string())
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        self.center
            .map(|center| Rect::from_center_size(center, self.size))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub label: Option<String>,
    /// Polyline from source to target; empty until routed.
    #[serde(default)]
    pub curve: Vec<Point>,
    #[serde(default)]
    pub source_port: Option<Point>,
    #[serde(default)]
    pub target_port: Option<Point>,
}

impl GraphEdge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            label: None,
            curve: Vec::new(),
            source_port: None,
            target_port: None,
        }
    }

    pub fn is_routed(&self) -> bool {
        self.curve.len() >= 2
    }

    pub fn label_anchor(&self) -> Option<Point> {
        match self.curve.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, .., last] => Some(Point::new(
                (first.x + last.x) * 0.5,
                (first.y + last.y) * 0.5,
            )),
        }
    }
}

/// Serialized form of a [`Graph`]: flat node and edge lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeMap<EdgeId, GraphEdge>,
    drawing: Option<DrawingGraph>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Failed to parse graph document")
    }

    /// Returns false (and leaves the graph untouched) when the id is taken.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id, node);
        true
    }

    /// Returns false when the id is taken or an endpoint is missing.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if self.edges.contains_key(&edge.id) {
            return false;
        }
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            tracing::warn!(
                "Dropping edge {} because an endpoint ({} -> {}) is missing from the graph",
                edge.id,
                edge.source,
                edge.target
            );
            return false;
        }
        self.edges.insert(edge.id, edge);
        true
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<(GraphNode, Vec<GraphEdge>)> {
        let node = self.nodes.remove(&id)?;
        let incident: Vec<EdgeId> = self.incident_edges(id).collect();
        let edges = incident
            .into_iter()
            .filter_map(|edge_id| self.edges.remove(&edge_id))
            .collect();
        Some((node, edges))
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<GraphEdge> {
        self.edges.remove(&id)
    }

    pub fn incident_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .values()
            .filter(move |edge| edge.source == id || edge.target == id)
            .map(|edge| edge.id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut GraphEdge> {
        self.edges.get_mut(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.values_mut()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut GraphEdge> {
        self.edges.values_mut()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// One past the largest node id, or `None` once ids run out.
    pub fn next_node_id(&self) -> Option<NodeId> {
        match self.nodes.keys().last() {
            Some(id) => id.0.checked_add(1).map(NodeId),
            None => Some(NodeId(1)),
        }
    }

    /// One past the largest edge id, or `None` once ids run out.
    pub fn next_edge_id(&self) -> Option<EdgeId> {
        match self.edges.keys().last() {
            Some(id) => id.0.checked_add(1).map(EdgeId),
            None => Some(EdgeId(1)),
        }
    }

    /// Union of all placed node boxes and routed edge points.
    pub fn bounding_box(&self) -> Option<Rect> {
        let node_boxes = self.nodes.values().filter_map(GraphNode::bounding_box);
        let edge_points = self
            .edges
            .values()
            .flat_map(|edge| edge.curve.iter())
            .map(|p| Rect::from_min_max(*p, *p));
        node_boxes
            .chain(edge_points)
            .reduce(|acc, rect| acc.union(&rect))
    }

    /// Drawing metadata, present once the graph has been bound to a viewer.
    pub fn drawing(&self) -> Option<&DrawingGraph> {
        self.drawing.as_ref()
    }

    pub fn drawing_mut(&mut self) -> Option<&mut DrawingGraph> {
        self.drawing.as_mut()
    }

    pub fn attach_drawing(&mut self) -> &mut DrawingGraph {
        self.drawing.get_or_insert_with(DrawingGraph::default)
    }

    pub fn set_drawing(&mut self, drawing: DrawingGraph) {
        self.drawing = Some(drawing);
    }
}

impl TryFrom<GraphDocument> for Graph {
    type Error = String;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();
        for node in document.nodes {
            let id = node.id;
            if !graph.add_node(node) {
                return Err(format!("duplicate node id {id}"));
            }
        }
        for edge in document.edges {
            let id = edge.id;
            if !graph.add_edge(edge) {
                return Err(format!("edge {id} is duplicated or has a missing endpoint"));
            }
        }
        Ok(graph)
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        Self {
            nodes: graph.nodes.into_values().collect(),
            edges: graph.edges.into_values().collect(),
        }
    }
}
