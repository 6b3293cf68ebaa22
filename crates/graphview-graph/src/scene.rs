use graphview_core::{EdgeId, EntityRef, NodeId, PlaneTransform, Point, ViewerError};
use serde::{Deserialize, Serialize};

use crate::drawing::LabelOwner;
use crate::graph::Graph;

/// Handle of a drawn primitive inside a renderer's scene tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimitiveId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEntityKind {
    /// The root drawing surface of the whole graph.
    Canvas,
    Node(NodeId),
    Edge(EdgeId),
    Label(LabelOwner),
}

/// What a primitive draws, plus its parent in the scene tree. Only the root
/// canvas has no parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneEntity {
    pub kind: SceneEntityKind,
    pub parent: Option<PrimitiveId>,
}

impl SceneEntity {
    /// The viewer entity this primitive stands for directly, if any.
    pub fn entity_ref(&self) -> Option<EntityRef> {
        match self.kind {
            SceneEntityKind::Node(id) => Some(EntityRef::Node(id)),
            SceneEntityKind::Edge(id) => Some(EntityRef::Edge(id)),
            SceneEntityKind::Canvas | SceneEntityKind::Label(_) => None,
        }
    }
}

/// Scene rendering collaborator.
///
/// The forward transform maps graph coordinates to screen coordinates. The
/// overlay and menu methods are optional per backend and report
/// [`ViewerError::Unsupported`] unless overridden.
pub trait SceneRenderer {
    /// Full redraw from the graph's current geometry.
    fn set_graph(&mut self, graph: &Graph);

    fn transform(&self) -> PlaneTransform;

    fn set_transform(&mut self, transform: PlaneTransform);

    fn scale(&self) -> f64 {
        self.transform().scale()
    }

    /// Topmost primitive drawn at a screen position.
    fn primitive_at(&self, screen: Point) -> Option<PrimitiveId>;

    fn find_entity(&self, primitive: PrimitiveId) -> Option<SceneEntity>;

    fn invalidate(&mut self, entity: EntityRef);

    fn svg_string(&self) -> String;

    fn draw_rubber_line(&mut self, _from: Point, _to: Point) -> Result<(), ViewerError> {
        Err(ViewerError::unsupported("draw_rubber_line"))
    }

    fn clear_rubber_line(&mut self) -> Result<(), ViewerError> {
        Err(ViewerError::unsupported("stop_drawing_rubber_line"))
    }

    fn draw_rubber_edge(&mut self, _points: &[Point]) -> Result<(), ViewerError> {
        Err(ViewerError::unsupported("draw_rubber_edge"))
    }

    fn clear_rubber_edge(&mut self) -> Result<(), ViewerError> {
        Err(ViewerError::unsupported("stop_drawing_rubber_edge"))
    }

    fn popup_menu(&mut self, _items: &[String]) -> Result<(), ViewerError> {
        Err(ViewerError::unsupported("popup_menus"))
    }
}
