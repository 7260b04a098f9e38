#![warn(clippy::all, rust_2018_idioms)]

//! Non-destructive image-compositing engine: a render-node graph that
//! transforms an input raster into a displayed output, a snapshot-based
//! undo/redo manager, and resolution-independent crop gesture handlers.

pub mod crop;
pub mod error;
pub mod geometry;
pub mod history;
pub mod node;
pub mod pipeline;
pub mod snapshot;

pub use crop::{CanvasMapping, CircleCropHandler, RectCropHandler};
pub use error::SnapshotError;
pub use geometry::{EdgeInsets, Transform};
pub use history::{EditHistory, EditStep, HistoryObserver};
pub use node::{
    FilterNode, FilterParams, ImageNodeChain, NodeChange, NodeEvent, NodeId, NodeObserver,
    ObjectKind, ObjectNode, ObjectNodeStack, RenderNode,
};
pub use pipeline::RenderPipeline;
pub use snapshot::{NodeRecord, Snapshot, SnapshotValue, Snapshotable};
