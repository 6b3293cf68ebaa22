use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod geometry;

pub use error::{Collaborator, ViewerError};
pub use geometry::{PlaneTransform, Point, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub i64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a viewer-facing entity: the graph node or edge it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Node(NodeId),
    Edge(EdgeId),
}

impl EntityRef {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Self::Edge(id) => Some(*id),
            Self::Node(_) => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Edge(id) => write!(f, "edge {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_accessors() {
        let node = EntityRef::Node(NodeId(3));
        let edge = EntityRef::Edge(EdgeId(7));

        assert_eq!(node.as_node(), Some(NodeId(3)));
        assert_eq!(node.as_edge(), None);
        assert_eq!(edge.as_edge(), Some(EdgeId(7)));
        assert_eq!(edge.to_string(), "edge 7");
    }

    #[test]
    fn test_entity_ref_serde() {
        let json = serde_json::to_string(&EntityRef::Node(NodeId(5))).unwrap();
        let back: EntityRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityRef::Node(NodeId(5)));
    }
}
