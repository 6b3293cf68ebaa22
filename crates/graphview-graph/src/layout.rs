use graphview_core::{EdgeId, NodeId, Point, Size, ViewerError};
use std::collections::{BTreeMap, HashMap};

use crate::edge_router::EdgeRouter;
use crate::graph::Graph;
use crate::options::{LayoutDirection, LayoutOptions, LayoutType};

/// Layout collaborator: computes node and edge geometry in place.
///
/// On error the engine must leave `graph` as it found it, or the caller must
/// discard it; the viewer does the latter by laying out a scratch copy.
pub trait LayoutEngine {
    fn layout_graph(
        &mut self,
        graph: &mut Graph,
        options: &LayoutOptions,
        force_relayout: bool,
    ) -> Result<(), ViewerError>;
}

/// Layered (Sugiyama-style) layout: longest-path ranking, barycenter ordering
/// inside each layer, straight edges between node borders.
///
/// A non-forced run keeps every placed node where it is, appends unplaced
/// nodes below the drawing and reroutes all edges.
#[derive(Debug, Clone, Default)]
pub struct LayeredLayout {
    router: EdgeRouter,
}

#[derive(Default)]
struct Relations {
    edges: Vec<(NodeId, NodeId)>,
    incoming: HashMap<NodeId, Vec<NodeId>>,
    outgoing: HashMap<NodeId, Vec<NodeId>>,
}

impl LayeredLayout {
    const DEFAULT_NODE_WIDTH: f64 = 100.0;
    const DEFAULT_NODE_HEIGHT: f64 = 30.0;
    /// Maximum iterations for ranking convergence
    const MAX_RANKING_ITERATIONS: usize = 1000;
    const BARYCENTER_SWEEPS: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_router(router: EdgeRouter) -> Self {
        Self { router }
    }

    fn default_node_size() -> Size {
        Size::new(Self::DEFAULT_NODE_WIDTH, Self::DEFAULT_NODE_HEIGHT)
    }

    fn build_relations(graph: &Graph) -> Relations {
        let mut relations = Relations::default();
        for edge in graph.edges() {
            if edge.source == edge.target {
                continue;
            }
            relations.edges.push((edge.source, edge.target));
            relations
                .incoming
                .entry(edge.target)
                .or_default()
                .push(edge.source);
            relations
                .outgoing
                .entry(edge.source)
                .or_default()
                .push(edge.target);
        }
        relations
    }

    fn assign_ranks(nodes: &[NodeId], relations: &Relations) -> HashMap<NodeId, i32> {
        let mut ranks: HashMap<NodeId, i32> = nodes.iter().map(|&id| (id, 0)).collect();

        let max_iterations = (nodes.len() + 2).min(Self::MAX_RANKING_ITERATIONS);
        let mut converged = false;
        for _ in 0..max_iterations {
            let mut changed = false;
            for &(source, target) in &relations.edges {
                if let (Some(&source_rank), Some(&target_rank)) =
                    (ranks.get(&source), ranks.get(&target))
                    && target_rank <= source_rank
                {
                    ranks.insert(target, source_rank + 1);
                    changed = true;
                }
            }

            if !changed {
                converged = true;
                break;
            }
        }

        if !converged {
            // Cycles keep pushing ranks up; whatever we have is still a valid layering.
            tracing::warn!(
                "Node ranking did not converge after {} iterations",
                max_iterations
            );
        }

        Self::compress_ranks(&mut ranks);
        ranks
    }

    fn compress_ranks(ranks: &mut HashMap<NodeId, i32>) {
        let mut unique: Vec<i32> = ranks.values().copied().collect();
        unique.sort_unstable();
        unique.dedup();
        let remap: HashMap<i32, i32> = unique
            .iter()
            .enumerate()
            .map(|(i, rank)| (*rank, i as i32))
            .collect();
        for rank in ranks.values_mut() {
            if let Some(new_rank) = remap.get(rank) {
                *rank = *new_rank;
            }
        }
    }

    fn build_layers(graph: &Graph, ranks: &HashMap<NodeId, i32>) -> BTreeMap<i32, Vec<NodeId>> {
        let mut layers: BTreeMap<i32, Vec<NodeId>> = BTreeMap::new();
        for (&node, &rank) in ranks {
            layers.entry(rank).or_default().push(node);
        }
        for nodes in layers.values_mut() {
            nodes.sort_by_key(|id| {
                (
                    graph.node(*id).map(|n| n.label_text()).unwrap_or_default(),
                    *id,
                )
            });
        }
        layers
    }

    fn order_layer_by_barycenter(
        layer: &mut [NodeId],
        coords: &HashMap<NodeId, f64>,
        neighbors: &HashMap<NodeId, Vec<NodeId>>,
    ) {
        let barycenter = |id: &NodeId| -> f64 {
            let known: Vec<f64> = neighbors
                .get(id)
                .map(|list| list.iter().filter_map(|n| coords.get(n).copied()).collect())
                .unwrap_or_default();
            if known.is_empty() {
                coords.get(id).copied().unwrap_or(0.0)
            } else {
                known.iter().sum::<f64>() / known.len() as f64
            }
        };
        let mut keyed: Vec<(f64, NodeId)> = layer.iter().map(|id| (barycenter(id), *id)).collect();
        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        for (slot, (_, id)) in layer.iter_mut().zip(keyed) {
            *slot = id;
        }
    }

    fn reindex(layer: &[NodeId], coords: &mut HashMap<NodeId, f64>) {
        for (j, id) in layer.iter().enumerate() {
            coords.insert(*id, j as f64);
        }
    }

    fn run_barycenter_passes(layers: &mut BTreeMap<i32, Vec<NodeId>>, relations: &Relations) {
        let mut coords: HashMap<NodeId, f64> = HashMap::new();
        for layer in layers.values() {
            Self::reindex(layer, &mut coords);
        }

        let ranks: Vec<i32> = layers.keys().copied().collect();
        for _ in 0..Self::BARYCENTER_SWEEPS {
            for rank in ranks.iter().skip(1) {
                if let Some(layer) = layers.get_mut(rank) {
                    Self::order_layer_by_barycenter(layer, &coords, &relations.incoming);
                    Self::reindex(layer, &mut coords);
                }
            }
            for rank in ranks.iter().rev().skip(1) {
                if let Some(layer) = layers.get_mut(rank) {
                    Self::order_layer_by_barycenter(layer, &coords, &relations.outgoing);
                    Self::reindex(layer, &mut coords);
                }
            }
        }
    }

    fn layered_positions(graph: &Graph, options: &LayoutOptions) -> HashMap<NodeId, Point> {
        let nodes: Vec<NodeId> = graph.nodes().map(|n| n.id).collect();
        let relations = Self::build_relations(graph);
        let ranks = Self::assign_ranks(&nodes, &relations);
        let mut layers = Self::build_layers(graph, &ranks);
        Self::run_barycenter_passes(&mut layers, &relations);

        let size_of = |id: &NodeId| graph.node(*id).map(|n| n.size).unwrap_or_default();
        let mut positions = HashMap::with_capacity(nodes.len());
        let mut rank_offset = 0.0;
        for layer in layers.values() {
            // (along the layer, across layers)
            let extents: Vec<(f64, f64)> = layer
                .iter()
                .map(|id| {
                    let size = size_of(id);
                    match options.direction {
                        LayoutDirection::TopToBottom => (size.width, size.height),
                        LayoutDirection::LeftToRight => (size.height, size.width),
                    }
                })
                .collect();
            let thickness = extents.iter().map(|e| e.1).fold(0.0, f64::max);
            let span: f64 = extents.iter().map(|e| e.0).sum::<f64>()
                + options.node_separation * extents.len().saturating_sub(1) as f64;

            let mut cursor = -span / 2.0;
            for (id, (along, _)) in layer.iter().zip(&extents) {
                let cross = cursor + along / 2.0;
                let rank_pos = rank_offset + thickness / 2.0;
                let center = match options.direction {
                    LayoutDirection::TopToBottom => Point::new(cross, rank_pos),
                    LayoutDirection::LeftToRight => Point::new(rank_pos, cross),
                };
                positions.insert(*id, center);
                cursor += along + options.node_separation;
            }
            rank_offset += thickness + options.layer_separation;
        }
        positions
    }

    fn grid_positions(graph: &Graph, options: &LayoutOptions) -> HashMap<NodeId, Point> {
        let count = graph.node_count();
        if count == 0 {
            return HashMap::new();
        }
        let columns = (count as f64).sqrt().ceil() as usize;
        let cell_width = graph.nodes().map(|n| n.size.width).fold(0.0, f64::max)
            + options.node_separation;
        let cell_height = graph.nodes().map(|n| n.size.height).fold(0.0, f64::max)
            + options.layer_separation;

        graph
            .nodes()
            .enumerate()
            .map(|(i, node)| {
                let (row, column) = (i / columns, i % columns);
                let center = match options.direction {
                    LayoutDirection::TopToBottom => {
                        Point::new(column as f64 * cell_width, row as f64 * cell_height)
                    }
                    LayoutDirection::LeftToRight => {
                        Point::new(row as f64 * cell_width, column as f64 * cell_height)
                    }
                };
                (node.id, center)
            })
            .collect()
    }

    fn place_unplaced(graph: &mut Graph, options: &LayoutOptions) {
        let Some(bbox) = graph.bounding_box() else {
            return;
        };
        let mut cursor = bbox.min.x;
        let row_top = bbox.max.y + options.layer_separation;
        for node in graph.nodes_mut().filter(|n| n.center.is_none()) {
            node.center = Some(Point::new(
                cursor + node.size.width / 2.0,
                row_top + node.size.height / 2.0,
            ));
            cursor += node.size.width + options.node_separation;
        }
    }

    fn route_edges(&self, graph: &mut Graph) {
        let routes: Vec<(EdgeId, Vec<Point>)> = graph
            .edges()
            .filter_map(|edge| {
                let source = graph.node(edge.source)?.bounding_box()?;
                let target = graph.node(edge.target)?.bounding_box()?;
                let curve = self
                    .router
                    .route(source, target, edge.source_port, edge.target_port);
                Some((edge.id, curve))
            })
            .collect();
        for (id, curve) in routes {
            if let Some(edge) = graph.edge_mut(id) {
                edge.curve = curve;
            }
        }
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout_graph(
        &mut self,
        graph: &mut Graph,
        options: &LayoutOptions,
        force_relayout: bool,
    ) -> Result<(), ViewerError> {
        for node in graph.nodes_mut().filter(|n| n.size.is_empty()) {
            node.size = Self::default_node_size();
        }

        let nothing_placed = graph.nodes().all(|n| n.center.is_none());
        if force_relayout || nothing_placed {
            let positions = match options.layout_type {
                LayoutType::Layered => Self::layered_positions(graph, options),
                LayoutType::Grid => Self::grid_positions(graph, options),
            };
            for node in graph.nodes_mut() {
                node.center = positions.get(&node.id).copied();
            }
            tracing::debug!(
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "full layout pass"
            );
        } else {
            Self::place_unplaced(graph, options);
        }

        self.route_edges(graph);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode};

    fn add_node(graph: &mut Graph, id: i64, name: &str) {
        graph.add_node(GraphNode::with_label(NodeId(id), name));
    }

    fn add_edge(graph: &mut Graph, id: i64, source: i64, target: i64) {
        graph.add_edge(GraphEdge::new(EdgeId(id), NodeId(source), NodeId(target)));
    }

    fn center(graph: &Graph, id: i64) -> Point {
        graph.node(NodeId(id)).unwrap().center.unwrap()
    }

    #[test]
    fn test_layered_layout_places_target_below_source() {
        let mut graph = Graph::new();
        add_node(&mut graph, 1, "A");
        add_node(&mut graph, 2, "B");
        add_edge(&mut graph, 1, 1, 2);

        LayeredLayout::new()
            .layout_graph(&mut graph, &LayoutOptions::default(), true)
            .unwrap();

        assert!(center(&graph, 2).y > center(&graph, 1).y);
        assert!(graph.edge(EdgeId(1)).unwrap().is_routed());
    }

    #[test]
    fn test_direction_changes_primary_axis() {
        let mut graph = Graph::new();
        add_node(&mut graph, 1, "A");
        add_node(&mut graph, 2, "B");
        add_edge(&mut graph, 1, 1, 2);

        let options = LayoutOptions {
            direction: LayoutDirection::LeftToRight,
            ..LayoutOptions::default()
        };
        LayeredLayout::new()
            .layout_graph(&mut graph, &options, true)
            .unwrap();

        assert!(center(&graph, 2).x > center(&graph, 1).x);
        assert!((center(&graph, 2).y - center(&graph, 1).y).abs() < 1e-9);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = Graph::new();
        add_node(&mut graph, 1, "A");
        add_node(&mut graph, 2, "B");
        add_node(&mut graph, 3, "C");
        add_edge(&mut graph, 1, 1, 2);
        add_edge(&mut graph, 2, 2, 3);
        add_edge(&mut graph, 3, 3, 1);

        LayeredLayout::new()
            .layout_graph(&mut graph, &LayoutOptions::default(), true)
            .unwrap();

        assert!(graph.nodes().all(|n| n.center.is_some()));
    }

    #[test]
    fn test_non_forced_run_keeps_placed_nodes() {
        let mut graph = Graph::new();
        add_node(&mut graph, 1, "A");
        add_node(&mut graph, 2, "B");
        add_edge(&mut graph, 1, 1, 2);
        let mut layout = LayeredLayout::new();
        layout
            .layout_graph(&mut graph, &LayoutOptions::default(), true)
            .unwrap();

        let pinned = Point::new(500.0, 500.0);
        graph.node_mut(NodeId(1)).unwrap().center = Some(pinned);
        add_node(&mut graph, 3, "C");
        layout
            .layout_graph(&mut graph, &LayoutOptions::default(), false)
            .unwrap();

        assert_eq!(center(&graph, 1), pinned);
        assert!(graph.node(NodeId(3)).unwrap().center.is_some());
        // The edge follows the moved node.
        let curve = &graph.edge(EdgeId(1)).unwrap().curve;
        assert!(curve[0].distance(pinned) < 100.0);
    }

    #[test]
    fn test_grid_layout_uses_rows() {
        let mut graph = Graph::new();
        for id in 1..=4 {
            add_node(&mut graph, id, "N");
        }
        let options = LayoutOptions {
            layout_type: LayoutType::Grid,
            ..LayoutOptions::default()
        };
        LayeredLayout::new()
            .layout_graph(&mut graph, &options, true)
            .unwrap();

        assert_eq!(center(&graph, 1).y, center(&graph, 2).y);
        assert!(center(&graph, 3).y > center(&graph, 1).y);
    }

    #[test]
    fn test_unsized_nodes_get_default_size() {
        let mut graph = Graph::new();
        graph.add_node(GraphNode::new(NodeId(1)));
        LayeredLayout::new()
            .layout_graph(&mut graph, &LayoutOptions::default(), false)
            .unwrap();
        assert_eq!(
            graph.node(NodeId(1)).unwrap().size,
            Size::new(100.0, 30.0)
        );
    }
}
