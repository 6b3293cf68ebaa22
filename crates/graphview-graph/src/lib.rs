pub mod drawing;
pub mod edge_router;
pub mod graph;
pub mod hit_tester;
pub mod layout;
pub mod measure;
pub mod options;
pub mod scene;
pub mod svg;

pub use drawing::{DrawingGraph, LabelGeometry, LabelOwner};
pub use edge_router::EdgeRouter;
pub use graph::{Graph, GraphDocument, GraphEdge, GraphNode, SharedGraph, shared};
pub use hit_tester::{HitResult, HitTester};
pub use layout::{LayeredLayout, LayoutEngine};
pub use measure::{MonospaceMeasurer, TextMeasurer};
pub use options::{LabelOptions, LayoutDirection, LayoutOptions, LayoutType};
pub use scene::{PrimitiveId, SceneEntity, SceneEntityKind, SceneRenderer};
pub use svg::SvgScene;
