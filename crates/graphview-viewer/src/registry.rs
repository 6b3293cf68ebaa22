use graphview_core::{EdgeId, EntityRef, NodeId};
use graphview_events::{EventChannel, SubscriptionId};
use std::collections::{BTreeMap, BTreeSet};

/// Editing-side wrapper of one graph node.
#[derive(Debug)]
pub struct ViewerNode {
    node: NodeId,
    pub selected_for_editing: bool,
    is_collapsed: bool,
    is_collapsed_changed: EventChannel<bool>,
}

impl ViewerNode {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            selected_for_editing: false,
            is_collapsed: false,
            is_collapsed_changed: EventChannel::new("IsCollapsedChanged"),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_collapsed(&self) -> bool {
        self.is_collapsed
    }

    /// Notifies this node's collapse listeners, and only them, when the
    /// value actually changes.
    pub fn set_collapsed(&mut self, collapsed: bool) {
        if self.is_collapsed == collapsed {
            return;
        }
        self.is_collapsed = collapsed;
        self.is_collapsed_changed.raise(&collapsed);
    }

    pub fn on_collapsed_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&bool) + 'static,
    {
        self.is_collapsed_changed.subscribe(handler)
    }

    pub fn remove_collapsed_listener(&mut self, id: SubscriptionId) -> bool {
        self.is_collapsed_changed.unsubscribe(id)
    }
}

/// Editing-side wrapper of one graph edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerEdge {
    edge: EdgeId,
    pub selected_for_editing: bool,
    /// Radius of the handles drawn at polyline corners while editing.
    pub radius_of_polyline_corner: f64,
}

impl ViewerEdge {
    pub fn edge(&self) -> EdgeId {
        self.edge
    }
}

/// One wrapper per underlying entity, created on demand. Also tracks which
/// entities need a redraw.
#[derive(Debug, Default)]
pub struct ViewerEntityRegistry {
    nodes: BTreeMap<NodeId, ViewerNode>,
    edges: BTreeMap<EdgeId, ViewerEdge>,
    dirty: BTreeSet<EntityRef>,
}

impl ViewerEntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing wrapper for `id`, or a fresh one.
    pub fn node_or_insert(&mut self, id: NodeId) -> &mut ViewerNode {
        self.nodes.entry(id).or_insert_with(|| {
            tracing::trace!("Creating viewer node for {}", id);
            ViewerNode::new(id)
        })
    }

    pub fn edge_or_insert(&mut self, id: EdgeId, corner_radius: f64) -> &mut ViewerEdge {
        self.edges.entry(id).or_insert_with(|| ViewerEdge {
            edge: id,
            selected_for_editing: false,
            radius_of_polyline_corner: corner_radius,
        })
    }

    pub fn ensure(&mut self, entity: EntityRef, corner_radius: f64) {
        match entity {
            EntityRef::Node(id) => {
                self.node_or_insert(id);
            }
            EntityRef::Edge(id) => {
                self.edge_or_insert(id, corner_radius);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&ViewerNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ViewerNode> {
        self.nodes.get_mut(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&ViewerEdge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut ViewerEdge> {
        self.edges.get_mut(&id)
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Node(id) => self.nodes.contains_key(&id),
            EntityRef::Edge(id) => self.edges.contains_key(&id),
        }
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<ViewerNode> {
        self.dirty.remove(&EntityRef::Node(id));
        self.nodes.remove(&id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<ViewerEdge> {
        self.dirty.remove(&EntityRef::Edge(id));
        self.edges.remove(&id)
    }

    /// Every registered entity, nodes first.
    pub fn entities(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.nodes
            .keys()
            .map(|id| EntityRef::Node(*id))
            .chain(self.edges.keys().map(|id| EntityRef::Edge(*id)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_dirty(&mut self, entity: EntityRef) {
        self.dirty.insert(entity);
    }

    pub fn is_dirty(&self, entity: EntityRef) -> bool {
        self.dirty.contains(&entity)
    }

    pub fn take_dirty(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_no_duplicate_wrappers() {
        let mut registry = ViewerEntityRegistry::new();
        registry.node_or_insert(NodeId(1)).selected_for_editing = true;
        // Second lookup returns the same wrapper, not a new one.
        assert!(registry.node_or_insert(NodeId(1)).selected_for_editing);
        registry.ensure(EntityRef::Node(NodeId(1)), 1.0);
        registry.ensure(EntityRef::Edge(EdgeId(1)), 1.0);
        registry.ensure(EntityRef::Edge(EdgeId(1)), 9.0);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.edge(EdgeId(1)).unwrap().radius_of_polyline_corner, 1.0);
    }

    #[test]
    fn test_collapse_notifies_only_that_node() {
        let mut registry = ViewerEntityRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        registry
            .node_or_insert(NodeId(1))
            .on_collapsed_changed(move |c| log.borrow_mut().push((1, *c)));
        let log = seen.clone();
        registry
            .node_or_insert(NodeId(2))
            .on_collapsed_changed(move |c| log.borrow_mut().push((2, *c)));

        let node = registry.node_mut(NodeId(1)).unwrap();
        node.set_collapsed(true);
        node.set_collapsed(true);
        node.set_collapsed(false);

        assert_eq!(*seen.borrow(), vec![(1, true), (1, false)]);
    }

    #[test]
    fn test_remove_listener() {
        let mut registry = ViewerEntityRegistry::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let node = registry.node_or_insert(NodeId(1));
        let id = node.on_collapsed_changed(move |_| *c.borrow_mut() += 1);
        assert!(node.remove_collapsed_listener(id));
        node.set_collapsed(true);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_dirty_set_follows_removal() {
        let mut registry = ViewerEntityRegistry::new();
        registry.node_or_insert(NodeId(1));
        registry.node_or_insert(NodeId(2));
        registry.mark_dirty(EntityRef::Node(NodeId(1)));
        registry.mark_dirty(EntityRef::Node(NodeId(2)));
        registry.remove_node(NodeId(1));

        assert!(!registry.contains(EntityRef::Node(NodeId(1))));
        assert_eq!(registry.take_dirty(), vec![EntityRef::Node(NodeId(2))]);
        assert!(!registry.is_dirty(EntityRef::Node(NodeId(2))));
    }
}
