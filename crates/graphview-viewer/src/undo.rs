use graphview_core::{EdgeId, NodeId};
use graphview_graph::{GraphEdge, GraphNode};
use std::cell::RefCell;
use std::rc::Rc;

/// Inverse of an editing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// Undoes an added node.
    RemoveNode(NodeId),
    /// Undoes a removed node, bringing back the edges removed with it.
    RestoreNode {
        node: GraphNode,
        edges: Vec<GraphEdge>,
    },
    RemoveEdge(EdgeId),
    RestoreEdge(GraphEdge),
}

/// Receives inverse operations from editing calls made with undo enabled.
pub trait UndoSink {
    fn push(&mut self, action: UndoAction);
}

impl<T: UndoSink> UndoSink for Rc<RefCell<T>> {
    fn push(&mut self, action: UndoAction) {
        self.borrow_mut().push(action);
    }
}

#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    actions: Vec<UndoAction>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&mut self) -> Option<UndoAction> {
        self.actions.pop()
    }

    pub fn peek(&self) -> Option<&UndoAction> {
        self.actions.last()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UndoAction> {
        self.actions.iter()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}

impl UndoSink for UndoStack {
    fn push(&mut self, action: UndoAction) {
        tracing::trace!("Undo entry pushed: {:?}", action);
        self.actions.push(action);
    }
}
