//! Interactive viewer controller: binds a graph to a scene renderer, maps
//! pointer input into graph space and runs the layout editing gestures.

pub mod controller;
pub mod editing;
pub mod input;
pub mod platform;
pub mod registry;
pub mod settings;
pub mod transform;
pub mod undo;

pub use controller::{NO_GRAPH, Viewer, ViewerEvents};
pub use editing::{EditingState, LayoutEditor, StopOutcome};
pub use input::{
    InputTranslator, KeyPhase, MouseButton, PointerPhase, RawInput, RawKeyEvent, RawPointerEvent,
};
pub use platform::{PlatformSurface, SyntheticSurface};
pub use registry::{ViewerEdge, ViewerEntityRegistry, ViewerNode};
pub use settings::ViewerSettings;
pub use transform::CoordinateTransform;
pub use undo::{UndoAction, UndoSink, UndoStack};
