use egui::Vec2;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::geometry::{EdgeInsets, Transform};
use crate::snapshot::Snapshotable;

pub mod chain;
pub mod filter;
pub mod layered;
pub mod object;

pub use chain::ImageNodeChain;
pub use filter::{FilterNode, FilterParams};
pub use layered::ObjectNodeStack;
pub use object::{ObjectKind, ObjectNode};

/// Stable identity of a render node.
///
/// Used as a snapshot key and for equality and lookup, never for ownership;
/// a node is exclusively owned by the group that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the string form produced by `Display`. Returns `None` for
    /// malformed input; snapshot restore treats that as a missing entry.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Common contract for every unit in the render graph.
pub trait RenderNode: Snapshotable {
    fn id(&self) -> NodeId;

    /// Node type as a string; recorded in membership snapshots so restore
    /// can reconstruct missing nodes.
    fn node_type(&self) -> &'static str;
}

/// A node with an input image and a derived output image.
///
/// The output is a pure function of the input plus the node's own
/// parameters; setting the input always recomputes the output.
pub trait IONode: RenderNode {
    fn set_input(&mut self, input: RgbaImage);
    fn input(&self) -> Option<&RgbaImage>;
    fn output(&self) -> Option<&RgbaImage>;
}

/// A node that owns a rendered visual surface.
pub trait ViewableNode: RenderNode {
    fn surface(&self) -> &RgbaImage;
}

/// A node that can mirror a change that originated in a sibling, e.g. a
/// base-image crop repositioning text and sticker items.
pub trait ChangeApplyingNode: RenderNode {
    fn apply_change(&mut self, change: &NodeChange);
}

/// Opaque descriptor of a committed change, carried by finished-changing
/// events so siblings can apply an equivalent change to themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    /// A geometric transform was applied to the base image.
    Transform(Transform),
    /// The image group's output dimensions changed.
    CanvasResized { old: Vec2, new: Vec2 },
    /// The base image was cropped by these pixel insets.
    Crop(EdgeInsets),
}

/// Change-propagation events, dispatched synchronously in call order.
///
/// `Changed` fires on every mutation (every slider tick of a drag) and must
/// never create undo history. `FinishedChanging` fires once per discrete
/// interaction and is the only event that should produce an undo step.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Changed(NodeId),
    FinishedChanging(NodeId, Option<NodeChange>),
}

/// Observer contract a node (or the pipeline) uses to notify its owner.
pub trait NodeObserver {
    fn node_changed(&mut self, node: NodeId);
    fn node_finished_changing(&mut self, node: NodeId, change: Option<NodeChange>);
}
