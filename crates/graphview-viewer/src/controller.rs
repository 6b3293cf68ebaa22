use graphview_core::{EdgeId, EntityRef, NodeId, PlaneTransform, Point, ViewerError};
use graphview_events::{
    CursorObjectChange, EventChannel, GraphChange, ModifierKeys, MouseEventArgs, ViewChange,
};
use graphview_graph::{
    DrawingGraph, EdgeRouter, Graph, GraphEdge, GraphNode, LabelGeometry, LabelOwner,
    LayoutEngine, LayoutOptions, SceneRenderer, SharedGraph, TextMeasurer,
};
use std::cell::RefMut;
use std::rc::Rc;

use crate::editing::{EditingState, LayoutEditor, StopOutcome};
use crate::input::{InputTranslator, PointerPhase, RawInput};
use crate::platform::PlatformSurface;
use crate::registry::{ViewerEdge, ViewerEntityRegistry, ViewerNode};
use crate::settings::ViewerSettings;
use crate::transform::CoordinateTransform;
use crate::undo::{UndoAction, UndoSink};

const VIEWER_TARGET: &str = "graphview::viewer";

/// Returned by the exports when no graph is bound.
pub const NO_GRAPH: &str = "no graph";

/// Radius, in inches, of the handle circles drawn on an edited polyline.
const UNDERLYING_POLYLINE_RADIUS_INCHES: f64 = 0.05;

/// Guards the ancestor walk against a renderer reporting a parent cycle.
const MAX_SCENE_DEPTH: usize = 64;

/// The named channels a host can subscribe to.
#[derive(Debug)]
pub struct ViewerEvents {
    pub mouse_down: EventChannel<MouseEventArgs>,
    pub mouse_up: EventChannel<MouseEventArgs>,
    pub mouse_move: EventChannel<MouseEventArgs>,
    pub graph_changed: EventChannel<GraphChange>,
    pub view_change: EventChannel<ViewChange>,
    pub object_under_mouse_cursor_changed: EventChannel<CursorObjectChange>,
}

impl Default for ViewerEvents {
    fn default() -> Self {
        Self {
            mouse_down: EventChannel::new("MouseDown"),
            mouse_up: EventChannel::new("MouseUp"),
            mouse_move: EventChannel::new("MouseMove"),
            graph_changed: EventChannel::new("GraphChanged"),
            view_change: EventChannel::new("ViewChangeEvent"),
            object_under_mouse_cursor_changed: EventChannel::new("ObjectUnderMouseCursorChanged"),
        }
    }
}

/// Viewer controller. Owns the collaborators, keeps the renderer in step
/// with the bound graph and runs the editing operations.
///
/// Single-threaded: every call is expected on the thread that owns the
/// viewer, serialized by the host.
pub struct Viewer<M, L, R> {
    measurer: M,
    layout: L,
    renderer: R,
    settings: ViewerSettings,
    graph: Option<SharedGraph>,
    options: LayoutOptions,
    need_create_geometry: bool,
    need_calculate_layout: bool,
    transform: CoordinateTransform,
    input: InputTranslator,
    registry: ViewerEntityRegistry,
    editor: LayoutEditor,
    undo: Option<Box<dyn UndoSink>>,
    device_pixel_ratio: f64,
    mouse_position: Option<Point>,
    object_under_cursor: Option<EntityRef>,
    events: ViewerEvents,
}

impl<M: TextMeasurer, L: LayoutEngine, R: SceneRenderer> Viewer<M, L, R> {
    pub fn new(measurer: M, layout: L, renderer: R, settings: ViewerSettings) -> Self {
        let transform = CoordinateTransform::new(renderer.transform()).unwrap_or_default();
        let device_pixel_ratio = settings.device_pixel_ratio.unwrap_or(1.0);
        Self {
            measurer,
            layout,
            renderer,
            settings,
            graph: None,
            options: LayoutOptions::default(),
            need_create_geometry: true,
            need_calculate_layout: true,
            transform,
            input: InputTranslator::new(),
            registry: ViewerEntityRegistry::new(),
            editor: LayoutEditor::new(),
            undo: None,
            device_pixel_ratio,
            mouse_position: None,
            object_under_cursor: None,
            events: ViewerEvents::default(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn events(&mut self) -> &mut ViewerEvents {
        &mut self.events
    }

    pub fn graph(&self) -> Option<&SharedGraph> {
        self.graph.as_ref()
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn measurer(&self) -> &M {
        &self.measurer
    }

    pub fn layout_engine(&self) -> &L {
        &self.layout
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn registry(&self) -> &ViewerEntityRegistry {
        &self.registry
    }

    pub fn editing_state(&self) -> &EditingState {
        self.editor.state()
    }

    pub fn inserting_edge(&self) -> bool {
        self.editor.inserting_edge()
    }

    pub fn modifier_keys(&self) -> ModifierKeys {
        self.input.modifiers()
    }

    pub fn set_undo_sink(&mut self, sink: Box<dyn UndoSink>) {
        self.undo = Some(sink);
    }

    pub fn layout_editing_enabled(&self) -> bool {
        self.settings.layout_editing_enabled
    }

    pub fn set_layout_editing_enabled(&mut self, enabled: bool) {
        self.settings.layout_editing_enabled = enabled;
    }

    pub fn incremental_dragging_mode_always(&self) -> bool {
        self.settings.incremental_dragging_mode_always
    }

    pub fn line_thickness_for_editing(&self) -> f64 {
        self.settings.line_thickness_for_editing
    }

    pub fn arrowhead_length(&self) -> f64 {
        self.settings.arrowhead_length
    }

    /// Skip full geometry creation on the next `set_graph`; labels are still
    /// measured. Reset to `true` after every `set_graph`.
    pub fn set_need_create_geometry(&mut self, need: bool) {
        self.need_create_geometry = need;
    }

    /// Skip the layout pass on the next `set_graph`. Reset to `true` after
    /// every `set_graph`.
    pub fn set_need_calculate_layout(&mut self, need: bool) {
        self.need_calculate_layout = need;
    }

    pub fn need_create_geometry(&self) -> bool {
        self.need_create_geometry
    }

    pub fn need_calculate_layout(&self) -> bool {
        self.need_calculate_layout
    }

    // ------------------------------------------------------------------
    // Graph binding
    // ------------------------------------------------------------------

    /// Binds `graph` and draws it.
    ///
    /// Rebinding the graph already held only applies `options` (and does
    /// nothing at all when they are unchanged). A fresh graph is measured
    /// and laid out on a copy; the shared graph, the bindings and the
    /// renderer change only when both collaborators succeed.
    pub fn set_graph(
        &mut self,
        graph: SharedGraph,
        options: LayoutOptions,
    ) -> Result<(), ViewerError> {
        let same_graph = self
            .graph
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &graph));
        let result = if !same_graph {
            self.bind_graph(graph, options)
        } else if options == self.options {
            tracing::debug!(target: VIEWER_TARGET, "Same graph and options, nothing to redo");
            Ok(())
        } else {
            self.set_options(options)
        };
        self.need_create_geometry = true;
        self.need_calculate_layout = true;
        result
    }

    fn bind_graph(&mut self, graph: SharedGraph, options: LayoutOptions) -> Result<(), ViewerError> {
        let mut scratch = Self::snapshot(&graph, "set_graph")?;
        self.measurer.set_options(&options.label_or_default());

        let result = self
            .prepare(&mut scratch, &options)
            .and_then(|()| Self::commit(&graph, scratch, "set_graph"));
        if let Err(err) = result {
            self.measurer.set_options(&self.options.label_or_default());
            tracing::warn!(target: VIEWER_TARGET, "Binding graph failed: {}", err);
            return Err(err);
        }

        if let Ok(bound) = graph.try_borrow() {
            tracing::info!(
                target: VIEWER_TARGET,
                nodes = bound.node_count(),
                edges = bound.edge_count(),
                "Bound new graph"
            );
        }
        self.graph = Some(graph);
        self.options = options;
        self.registry.clear();
        self.editor.reset();
        self.object_under_cursor = None;
        self.push_to_renderer();
        Ok(())
    }

    fn prepare(&mut self, scratch: &mut Graph, options: &LayoutOptions) -> Result<(), ViewerError> {
        let labels = if self.need_create_geometry {
            DrawingGraph::create_geometry(scratch, &self.measurer, options.node_padding)?
        } else {
            DrawingGraph::measure_label_sizes(scratch, &self.measurer)?
        };
        tracing::debug!(
            target: VIEWER_TARGET,
            labels,
            full_geometry = self.need_create_geometry,
            "Measured labels"
        );
        if self.need_calculate_layout {
            self.layout.layout_graph(scratch, options, true)?;
            tracing::debug!(target: VIEWER_TARGET, "Forced relayout done");
        }
        Ok(())
    }

    /// Applies new layout options to the bound graph.
    ///
    /// A changed label sub-config remeasures every label and forces a full
    /// relayout; otherwise the layout engine only re-flows. Without a bound
    /// graph the options are just stored.
    pub fn set_options(&mut self, options: LayoutOptions) -> Result<(), ViewerError> {
        let label_changed = self.options.label_changed(&options);
        let Some(graph) = self.graph.clone() else {
            self.options = options;
            return Ok(());
        };

        let mut scratch = Self::snapshot(&graph, "set_options")?;
        if label_changed {
            self.measurer.set_options(&options.label_or_default());
        }
        let result = self
            .reflow(&mut scratch, &options, label_changed)
            .and_then(|()| Self::commit(&graph, scratch, "set_options"));
        if let Err(err) = result {
            if label_changed {
                self.measurer.set_options(&self.options.label_or_default());
            }
            tracing::warn!(target: VIEWER_TARGET, "Applying options failed: {}", err);
            return Err(err);
        }

        self.options = options;
        self.push_to_renderer();
        Ok(())
    }

    fn reflow(
        &mut self,
        scratch: &mut Graph,
        options: &LayoutOptions,
        label_changed: bool,
    ) -> Result<(), ViewerError> {
        if label_changed {
            let labels =
                DrawingGraph::create_geometry(scratch, &self.measurer, options.node_padding)?;
            tracing::debug!(target: VIEWER_TARGET, labels, "Label options changed, remeasured");
        }
        self.layout.layout_graph(scratch, options, label_changed)
    }

    fn snapshot(graph: &SharedGraph, operation: &'static str) -> Result<Graph, ViewerError> {
        graph
            .try_borrow()
            .map(|g| g.clone())
            .map_err(|_| ViewerError::invalid_state(operation, "graph is borrowed mutably elsewhere"))
    }

    fn commit(graph: &SharedGraph, scratch: Graph, operation: &'static str) -> Result<(), ViewerError> {
        let mut slot = Self::graph_mut(graph, operation)?;
        *slot = scratch;
        Ok(())
    }

    fn graph_mut<'a>(
        graph: &'a SharedGraph,
        operation: &'static str,
    ) -> Result<RefMut<'a, Graph>, ViewerError> {
        graph
            .try_borrow_mut()
            .map_err(|_| ViewerError::invalid_state(operation, "graph is borrowed elsewhere"))
    }

    fn push_to_renderer(&mut self) {
        if let Some(graph) = &self.graph {
            match graph.try_borrow() {
                Ok(current) => self.renderer.set_graph(&current),
                Err(_) => tracing::warn!(
                    target: VIEWER_TARGET,
                    "Graph is borrowed mutably, skipping redraw"
                ),
            }
        }
        self.refresh_transform();
    }

    // ------------------------------------------------------------------
    // Coordinates
    // ------------------------------------------------------------------

    fn refresh_transform(&mut self) {
        match CoordinateTransform::new(self.renderer.transform()) {
            Some(transform) => self.transform = transform,
            None => tracing::warn!(
                target: VIEWER_TARGET,
                "Renderer transform is singular, keeping the previous one"
            ),
        }
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn current_scale(&self) -> f64 {
        self.transform.scale()
    }

    pub fn screen_to_graph(&self, x: f64, y: f64) -> Point {
        self.transform.screen_to_graph(Point::new(x, y))
    }

    pub fn screen_to_graph_event(&self, args: &MouseEventArgs) -> Point {
        self.screen_to_graph(args.x, args.y)
    }

    pub fn graph_to_screen(&self, p: Point) -> Point {
        self.transform.graph_to_screen(p)
    }

    /// Shifts the picture by `(dx, dy)` screen pixels. Returns false and
    /// leaves the view alone for a non-finite shift.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        match self.transform.panned(dx, dy) {
            Some(next) => self.apply_transform(next),
            None => false,
        }
    }

    /// Zooms around a screen point. Returns false when clamping leaves the
    /// scale unchanged or the resulting view could not be inverted.
    pub fn zoom_by(&mut self, factor: f64, center: Point) -> bool {
        let zoomed = self.transform.zoomed(
            factor,
            center,
            self.settings.min_zoom,
            self.settings.max_zoom,
        );
        match zoomed {
            Some(next) => self.apply_transform(next),
            None => false,
        }
    }

    /// Installs `next` on the renderer only when it has a usable inverse, so
    /// the renderer and the controller snapshot never disagree.
    fn apply_transform(&mut self, next: PlaneTransform) -> bool {
        let Some(snapshot) = CoordinateTransform::new(next) else {
            tracing::warn!(
                target: VIEWER_TARGET,
                "Rejected a view change with no usable inverse"
            );
            return false;
        };
        self.renderer.set_transform(next);
        self.transform = snapshot;
        let change = ViewChange {
            transform: self.transform.forward(),
            scale: self.transform.scale(),
        };
        tracing::trace!(target: VIEWER_TARGET, scale = change.scale, "View changed");
        self.events.view_change.raise(&change);
        true
    }

    pub fn dpi(&self) -> f64 {
        self.settings.base_dpi * self.device_pixel_ratio
    }

    pub fn dpi_x(&self) -> f64 {
        self.dpi()
    }

    pub fn dpi_y(&self) -> f64 {
        self.dpi()
    }

    /// Pointer pick distance converted to graph units at the current zoom.
    pub fn hit_slack(&self) -> f64 {
        self.transform
            .graph_units_per_screen_unit(self.dpi(), self.settings.mouse_hit_distance_inches)
    }

    pub fn interpolation_slack(&self) -> f64 {
        self.settings.mouse_hit_distance_inches
    }

    pub fn underlying_polyline_radius_with_no_scale(&self) -> f64 {
        self.dpi() * UNDERLYING_POLYLINE_RADIUS_INCHES
    }

    pub fn underlying_polyline_circle_radius(&self) -> f64 {
        self.underlying_polyline_radius_with_no_scale() / self.current_scale()
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Drains the surface in arrival order. Returns how many inputs ran.
    pub fn pump(&mut self, surface: &mut dyn PlatformSurface) -> usize {
        if self.settings.device_pixel_ratio.is_none() {
            self.device_pixel_ratio = surface.device_pixel_ratio();
        }
        let mut handled = 0;
        while let Some(input) = surface.poll_input() {
            self.handle_input(input);
            handled += 1;
        }
        handled
    }

    pub fn handle_input(&mut self, input: RawInput) {
        match input {
            RawInput::Key(key) => self.input.handle_key(&key),
            RawInput::Pointer(raw) => {
                let args = self.input.translate_pointer(&raw);
                match raw.phase {
                    PointerPhase::Down => self.events.mouse_down.raise(&args),
                    PointerPhase::Up => self.events.mouse_up.raise(&args),
                    PointerPhase::Move => {
                        self.mouse_position = Some(Point::new(args.x, args.y));
                        self.events.mouse_move.raise(&args);
                        self.update_object_under_cursor();
                    }
                }
            }
        }
    }

    fn update_object_under_cursor(&mut self) {
        let current = self.object_under_mouse_cursor();
        if current == self.object_under_cursor {
            return;
        }
        let change = CursorObjectChange {
            old: self.object_under_cursor,
            new: current,
        };
        self.object_under_cursor = current;
        self.events.object_under_mouse_cursor_changed.raise(&change);
    }

    // ------------------------------------------------------------------
    // Hit testing and entities
    // ------------------------------------------------------------------

    /// Viewer entity drawn at a screen point. The root canvas (a primitive
    /// without a parent) resolves to `None`, as does empty space.
    pub fn entity_under_point(&mut self, screen: Point) -> Option<EntityRef> {
        self.graph.as_ref()?;
        let primitive = self.renderer.primitive_at(screen)?;
        let mut entity = self.renderer.find_entity(primitive)?;
        entity.parent?;

        for _ in 0..MAX_SCENE_DEPTH {
            if let Some(resolved) = entity.entity_ref() {
                let radius = self.underlying_polyline_circle_radius();
                self.registry.ensure(resolved, radius);
                return Some(resolved);
            }
            entity = self.renderer.find_entity(entity.parent?)?;
        }
        tracing::warn!(target: VIEWER_TARGET, "Scene ancestry too deep at {:?}", screen);
        None
    }

    /// Entity under the last pointer-move position.
    pub fn object_under_mouse_cursor(&mut self) -> Option<EntityRef> {
        let position = self.mouse_position?;
        self.entity_under_point(position)
    }

    pub fn create_viewer_node(&mut self, id: NodeId) -> Result<&mut ViewerNode, ViewerError> {
        if !self.graph_contains(EntityRef::Node(id)) {
            return Err(ViewerError::invalid_state(
                "create_viewer_node",
                format!("node {id} is not in the bound graph"),
            ));
        }
        Ok(self.registry.node_or_insert(id))
    }

    pub fn viewer_node(&self, id: NodeId) -> Option<&ViewerNode> {
        self.registry.node(id)
    }

    pub fn viewer_node_mut(&mut self, id: NodeId) -> Option<&mut ViewerNode> {
        self.registry.node_mut(id)
    }

    pub fn viewer_edge(&self, id: EdgeId) -> Option<&ViewerEdge> {
        self.registry.edge(id)
    }

    pub fn entities(&self) -> Vec<EntityRef> {
        self.registry.entities().collect()
    }

    fn graph_contains(&self, entity: EntityRef) -> bool {
        let Some(graph) = &self.graph else {
            return false;
        };
        let Ok(graph) = graph.try_borrow() else {
            return false;
        };
        match entity {
            EntityRef::Node(id) => graph.contains_node(id),
            EntityRef::Edge(id) => graph.contains_edge(id),
        }
    }

    /// Marks one entity for redraw without measuring or laying out.
    pub fn invalidate(&mut self, entity: EntityRef) {
        if !self.graph_contains(entity) {
            tracing::debug!(target: VIEWER_TARGET, "Ignoring invalidate of unknown {}", entity);
            return;
        }
        let radius = self.underlying_polyline_circle_radius();
        self.registry.ensure(entity, radius);
        self.registry.mark_dirty(entity);
        self.renderer.invalidate(entity);
    }

    /// Marks every entity of the bound graph for redraw, creating wrappers
    /// that do not exist yet. Does not measure or lay out.
    pub fn invalidate_all(&mut self) {
        let Some(graph) = self.graph.clone() else {
            return;
        };
        let all: Vec<EntityRef> = match graph.try_borrow() {
            Ok(g) => g
                .nodes()
                .map(|node| EntityRef::Node(node.id))
                .chain(g.edges().map(|edge| EntityRef::Edge(edge.id)))
                .collect(),
            Err(_) => {
                tracing::warn!(target: VIEWER_TARGET, "Graph is borrowed, skipping invalidate_all");
                return;
            }
        };
        let radius = self.underlying_polyline_circle_radius();
        for entity in all {
            self.registry.ensure(entity, radius);
            self.registry.mark_dirty(entity);
            self.renderer.invalidate(entity);
        }
    }

    // ------------------------------------------------------------------
    // Editing operations
    // ------------------------------------------------------------------

    fn require_graph(&self, operation: &'static str) -> Result<SharedGraph, ViewerError> {
        self.graph
            .clone()
            .ok_or_else(|| ViewerError::no_graph(operation))
    }

    fn require_undo(&self, operation: &'static str, register: bool) -> Result<(), ViewerError> {
        if register && self.undo.is_none() {
            return Err(ViewerError::invalid_state(operation, "no undo sink is attached"));
        }
        Ok(())
    }

    fn require_editing_enabled(&self, operation: &'static str) -> Result<(), ViewerError> {
        if !self.settings.layout_editing_enabled {
            return Err(ViewerError::invalid_state(operation, "layout editing is disabled"));
        }
        Ok(())
    }

    fn record_undo(&mut self, register: bool, action: UndoAction) {
        if register && let Some(sink) = self.undo.as_mut() {
            sink.push(action);
        }
    }

    /// Inserts a node and measures its label. The node is drawn once it has
    /// a center.
    pub fn add_node(
        &mut self,
        node: GraphNode,
        register_for_undo: bool,
    ) -> Result<NodeId, ViewerError> {
        const OP: &str = "add_node";
        let graph = self.require_graph(OP)?;
        self.require_undo(OP, register_for_undo)?;
        let id = node.id;
        {
            let mut g = Self::graph_mut(&graph, OP)?;
            if !g.add_node(node) {
                return Err(ViewerError::invalid_state(OP, format!("node {id} already exists")));
            }
            let padding = self.options.node_padding;
            if let Err(err) = DrawingGraph::measure_node(&mut g, id, &self.measurer, padding) {
                g.remove_node(id);
                return Err(err);
            }
        }

        self.registry.node_or_insert(id);
        self.registry.mark_dirty(EntityRef::Node(id));
        self.push_to_renderer();
        tracing::info!(target: VIEWER_TARGET, "Added node {}", id);
        self.events.graph_changed.raise(&GraphChange::NodeAdded(id));
        self.record_undo(register_for_undo, UndoAction::RemoveNode(id));
        Ok(id)
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId, register_for_undo: bool) -> Result<(), ViewerError> {
        const OP: &str = "remove_node";
        let graph = self.require_graph(OP)?;
        self.require_undo(OP, register_for_undo)?;
        let (node, edges) = {
            let mut g = Self::graph_mut(&graph, OP)?;
            let removed = g
                .remove_node(id)
                .ok_or_else(|| ViewerError::invalid_state(OP, format!("node {id} is not in the graph")))?;
            if let Some(drawing) = g.drawing_mut() {
                drawing.forget(LabelOwner::Node(id));
                for edge in &removed.1 {
                    drawing.forget(LabelOwner::Edge(edge.id));
                }
            }
            removed
        };

        self.registry.remove_node(id);
        for edge in &edges {
            self.registry.remove_edge(edge.id);
        }
        self.forget_cursor_object(|entity| match entity {
            EntityRef::Node(n) => n == id,
            EntityRef::Edge(e) => edges.iter().any(|edge| edge.id == e),
        });
        self.push_to_renderer();
        tracing::info!(
            target: VIEWER_TARGET,
            "Removed node {} with {} incident edges",
            id,
            edges.len()
        );
        for edge in &edges {
            self.events
                .graph_changed
                .raise(&GraphChange::EdgeRemoved(edge.id));
        }
        self.events.graph_changed.raise(&GraphChange::NodeRemoved(id));
        self.record_undo(register_for_undo, UndoAction::RestoreNode { node, edges });
        Ok(())
    }

    /// Inserts an edge as given, routed or not.
    pub fn add_edge(&mut self, edge: GraphEdge, register_for_undo: bool) -> Result<EdgeId, ViewerError> {
        self.insert_edge("add_edge", edge, register_for_undo)
    }

    /// Routes `edge` between its endpoints' boxes (through its ports when
    /// set) and inserts it.
    pub fn route_edge(
        &mut self,
        mut edge: GraphEdge,
        register_for_undo: bool,
    ) -> Result<EdgeId, ViewerError> {
        const OP: &str = "route_edge";
        let graph = self.require_graph(OP)?;
        let boxes = {
            let g = graph
                .try_borrow()
                .map_err(|_| ViewerError::invalid_state(OP, "graph is borrowed mutably elsewhere"))?;
            let source = g.node(edge.source).and_then(GraphNode::bounding_box);
            let target = g.node(edge.target).and_then(GraphNode::bounding_box);
            source.zip(target)
        };
        let Some((source, target)) = boxes else {
            return Err(ViewerError::invalid_state(
                OP,
                format!(
                    "edge {} needs placed endpoints ({} -> {})",
                    edge.id, edge.source, edge.target
                ),
            ));
        };
        edge.curve = EdgeRouter::new().route(source, target, edge.source_port, edge.target_port);
        self.insert_edge(OP, edge, register_for_undo)
    }

    /// Inserts an edge whose curve the caller already computed.
    pub fn create_edge_with_given_geometry(
        &mut self,
        edge: GraphEdge,
        register_for_undo: bool,
    ) -> Result<EdgeId, ViewerError> {
        const OP: &str = "create_edge_with_given_geometry";
        if !edge.is_routed() {
            return Err(ViewerError::invalid_state(
                OP,
                format!("edge {} has no curve", edge.id),
            ));
        }
        self.insert_edge(OP, edge, register_for_undo)
    }

    fn insert_edge(
        &mut self,
        operation: &'static str,
        edge: GraphEdge,
        register_for_undo: bool,
    ) -> Result<EdgeId, ViewerError> {
        let graph = self.require_graph(operation)?;
        self.require_undo(operation, register_for_undo)?;
        let id = edge.id;
        {
            let g = graph.try_borrow().map_err(|_| {
                ViewerError::invalid_state(operation, "graph is borrowed mutably elsewhere")
            })?;
            if g.contains_edge(id) {
                return Err(ViewerError::invalid_state(operation, format!("edge {id} already exists")));
            }
            if !g.contains_node(edge.source) || !g.contains_node(edge.target) {
                return Err(ViewerError::invalid_state(
                    operation,
                    format!("edge {id} has a missing endpoint ({} -> {})", edge.source, edge.target),
                ));
            }
        }
        let label = match &edge.label {
            Some(text) => Some(LabelGeometry {
                text: text.clone(),
                size: self.measurer.measure(text)?,
            }),
            None => None,
        };

        {
            let mut g = Self::graph_mut(&graph, operation)?;
            g.add_edge(edge);
            if let Some(label) = label {
                g.attach_drawing().set_label(LabelOwner::Edge(id), label);
            }
        }

        let radius = self.underlying_polyline_circle_radius();
        self.registry.edge_or_insert(id, radius);
        self.registry.mark_dirty(EntityRef::Edge(id));
        self.push_to_renderer();
        tracing::info!(target: VIEWER_TARGET, "{}: added edge {}", operation, id);
        self.events.graph_changed.raise(&GraphChange::EdgeAdded(id));
        self.record_undo(register_for_undo, UndoAction::RemoveEdge(id));
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId, register_for_undo: bool) -> Result<(), ViewerError> {
        const OP: &str = "remove_edge";
        let graph = self.require_graph(OP)?;
        self.require_undo(OP, register_for_undo)?;
        let edge = {
            let mut g = Self::graph_mut(&graph, OP)?;
            let edge = g
                .remove_edge(id)
                .ok_or_else(|| ViewerError::invalid_state(OP, format!("edge {id} is not in the graph")))?;
            if let Some(drawing) = g.drawing_mut() {
                drawing.forget(LabelOwner::Edge(id));
            }
            edge
        };

        self.registry.remove_edge(id);
        self.forget_cursor_object(|entity| entity == EntityRef::Edge(id));
        self.push_to_renderer();
        tracing::info!(target: VIEWER_TARGET, "Removed edge {}", id);
        self.events.graph_changed.raise(&GraphChange::EdgeRemoved(id));
        self.record_undo(register_for_undo, UndoAction::RestoreEdge(edge));
        Ok(())
    }

    fn forget_cursor_object(&mut self, removed: impl Fn(EntityRef) -> bool) {
        if self.object_under_cursor.is_some_and(removed) {
            self.object_under_cursor = None;
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    pub fn start_drawing_rubber_line(&mut self, start: Point) -> Result<(), ViewerError> {
        self.require_editing_enabled("start_drawing_rubber_line")?;
        self.editor.start_rubber_line(start)?;
        if let Err(err) = self.renderer.draw_rubber_line(start, start) {
            self.editor.reset();
            return Err(err);
        }
        Ok(())
    }

    pub fn draw_rubber_line(&mut self, to: Point) -> Result<(), ViewerError> {
        let previous = self.editor.clone();
        let start = self.editor.update_rubber_line(to)?;
        if let Err(err) = self.renderer.draw_rubber_line(start, to) {
            self.editor = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn stop_drawing_rubber_line(&mut self) -> Result<StopOutcome, ViewerError> {
        let previous = self.editor.clone();
        let outcome = self.editor.stop_rubber_line()?;
        if outcome == StopOutcome::Stopped
            && let Err(err) = self.renderer.clear_rubber_line()
        {
            self.editor = previous;
            return Err(err);
        }
        Ok(outcome)
    }

    /// Shows a tentative edge while an insertion gesture runs.
    pub fn draw_rubber_edge(&mut self, points: &[Point]) -> Result<(), ViewerError> {
        let previous = self.editor.clone();
        self.editor.show_rubber_edge()?;
        if let Err(err) = self.renderer.draw_rubber_edge(points) {
            self.editor = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn stop_drawing_rubber_edge(&mut self) -> Result<StopOutcome, ViewerError> {
        let previous = self.editor.clone();
        let outcome = self.editor.hide_rubber_edge();
        if outcome == StopOutcome::Stopped
            && let Err(err) = self.renderer.clear_rubber_edge()
        {
            self.editor = previous;
            return Err(err);
        }
        Ok(outcome)
    }

    pub fn begin_edge_insertion(&mut self) -> Result<(), ViewerError> {
        self.require_editing_enabled("begin_edge_insertion")?;
        self.editor.begin_edge_insertion()
    }

    pub fn set_source_port_for_edge_routing(&mut self, port: Point) -> Result<(), ViewerError> {
        self.editor.set_source_port(port)
    }

    pub fn set_target_port_for_edge_routing(&mut self, port: Point) -> Result<(), ViewerError> {
        self.editor.set_target_port(port)
    }

    pub fn remove_source_port_edge_routing(&mut self) -> Result<(), ViewerError> {
        self.editor.remove_source_port()
    }

    pub fn remove_target_port_edge_routing(&mut self) -> Result<(), ViewerError> {
        self.editor.remove_target_port()
    }

    /// Routes and inserts the edge the gesture was building, then returns
    /// to Idle. On failure the gesture stays open so it can be retried or
    /// cancelled.
    pub fn finish_edge_insertion(
        &mut self,
        source: NodeId,
        target: NodeId,
        register_for_undo: bool,
    ) -> Result<EdgeId, ViewerError> {
        const OP: &str = "finish_edge_insertion";
        let Some((source_port, target_port)) = self.editor.ports() else {
            return Err(ViewerError::invalid_state(OP, "no edge insertion in progress"));
        };
        let graph = self.require_graph(OP)?;
        let id = graph
            .try_borrow()
            .map(|g| g.next_edge_id())
            .map_err(|_| ViewerError::invalid_state(OP, "graph is borrowed mutably elsewhere"))?
            .ok_or_else(|| ViewerError::invalid_state(OP, "edge ids are exhausted"))?;

        let mut edge = GraphEdge::new(id, source, target);
        edge.source_port = source_port;
        edge.target_port = target_port;
        let id = self.route_edge(edge, register_for_undo)?;

        self.clear_rubber_edge_quietly();
        self.editor.finish_edge_insertion()?;
        Ok(id)
    }

    pub fn cancel_edge_insertion(&mut self) -> Result<StopOutcome, ViewerError> {
        if self.editor.inserting_edge() {
            self.clear_rubber_edge_quietly();
        }
        self.editor.cancel_edge_insertion()
    }

    fn clear_rubber_edge_quietly(&mut self) {
        if self.editor.hide_rubber_edge() == StopOutcome::Stopped
            && let Err(err) = self.renderer.clear_rubber_edge()
        {
            tracing::warn!(target: VIEWER_TARGET, "Could not clear rubber edge: {}", err);
        }
    }

    pub fn start_drag(&mut self, entities: Vec<EntityRef>) -> Result<(), ViewerError> {
        const OP: &str = "start_drag";
        self.require_editing_enabled(OP)?;
        self.require_graph(OP)?;
        if let Some(missing) = entities.iter().find(|e| !self.graph_contains(**e)) {
            return Err(ViewerError::invalid_state(OP, format!("{missing} is not in the graph")));
        }
        self.editor.start_drag(entities)
    }

    /// Ends a drag. Redraws the changed entities and raises
    /// `GraphChanged(DragEnded)`. Benign when no drag is running.
    pub fn on_drag_end(&mut self, changed: Vec<EntityRef>) -> Result<StopOutcome, ViewerError> {
        const OP: &str = "on_drag_end";
        if self.editor.is_idle() {
            return Ok(StopOutcome::AlreadyIdle);
        }
        if let Some(missing) = changed.iter().find(|e| !self.graph_contains(**e)) {
            return Err(ViewerError::invalid_state(OP, format!("{missing} is not in the graph")));
        }
        let (outcome, _) = self.editor.end_drag()?;

        self.push_to_renderer();
        let radius = self.underlying_polyline_circle_radius();
        for entity in &changed {
            self.registry.ensure(*entity, radius);
            self.registry.mark_dirty(*entity);
            self.renderer.invalidate(*entity);
        }
        tracing::debug!(target: VIEWER_TARGET, moved = changed.len(), "Drag ended");
        self.events
            .graph_changed
            .raise(&GraphChange::DragEnded(changed));
        Ok(outcome)
    }

    pub fn popup_menus(&mut self, items: &[String]) -> Result<(), ViewerError> {
        self.renderer.popup_menu(items)
    }

    // ------------------------------------------------------------------
    // Exports
    // ------------------------------------------------------------------

    pub fn svg_string(&self) -> String {
        if self.graph.is_none() {
            return NO_GRAPH.to_string();
        }
        self.renderer.svg_string()
    }

    pub fn json_string(&self) -> String {
        let Some(graph) = &self.graph else {
            return NO_GRAPH.to_string();
        };
        let Ok(graph) = graph.try_borrow() else {
            tracing::warn!(target: VIEWER_TARGET, "Graph is borrowed mutably, cannot export");
            return NO_GRAPH.to_string();
        };
        serde_json::to_string_pretty(&*graph).unwrap_or_else(|e| {
            tracing::warn!(target: VIEWER_TARGET, "Graph serialization failed: {}", e);
            NO_GRAPH.to_string()
        })
    }
}
