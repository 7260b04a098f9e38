use egui::{Pos2, Vec2};
use image::RgbaImage;
use log::trace;

use crate::node::layered::overlay_with_opacity;
use crate::node::{
    ChangeApplyingNode, FilterNode, FilterParams, IONode, ImageNodeChain, NodeChange, NodeEvent,
    NodeId, NodeObserver, ObjectNode, ObjectNodeStack, RenderNode,
};
use crate::snapshot::{Snapshot, Snapshotable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupRole {
    Image,
    Object,
    Overlay,
}

/// Root of the render graph. Owns exactly three groups in fixed order:
///
/// - the image group: pixel-level transforms and filters, chained;
/// - the object group: freely placed items, layered;
/// - the overlay group: always-on-top decorations, layered.
///
/// The composited output is the image-group output with the object group's
/// surface rendered on top and the overlay group's surface on top of that.
///
/// All mutation goes through the pipeline's own methods, which dispatch the
/// groups' change events in call order: on "changed" the pipeline keeps the
/// other groups' surfaces sized to the image-group output, on
/// "finished-changing" it lets sibling groups mirror the change descriptor,
/// then forwards both to the host observer.
pub struct RenderPipeline {
    image_group: ImageNodeChain,
    object_group: ObjectNodeStack,
    overlay_group: ObjectNodeStack,
    observer: Option<Box<dyn NodeObserver>>,
}

impl RenderPipeline {
    pub fn new(base_image: RgbaImage) -> Self {
        let canvas = Vec2::new(base_image.width() as f32, base_image.height() as f32);
        let mut image_group = ImageNodeChain::new();
        image_group.set_input(base_image);
        image_group.take_events();
        Self {
            image_group,
            object_group: ObjectNodeStack::new(canvas),
            overlay_group: ObjectNodeStack::new(canvas),
            observer: None,
        }
    }

    /// Registers the host editor as the pipeline-level observer.
    pub fn set_observer(&mut self, observer: Box<dyn NodeObserver>) {
        self.observer = Some(observer);
    }

    pub fn image_group(&self) -> &ImageNodeChain {
        &self.image_group
    }

    pub fn object_group(&self) -> &ObjectNodeStack {
        &self.object_group
    }

    pub fn overlay_group(&self) -> &ObjectNodeStack {
        &self.overlay_group
    }

    /// Replaces the externally supplied base image.
    pub fn set_base_image(&mut self, base_image: RgbaImage) {
        self.image_group.set_input(base_image);
        self.pump();
    }

    pub fn add_filter(&mut self, node: FilterNode) -> NodeId {
        let id = self.image_group.add_node(node);
        self.pump();
        id
    }

    pub fn remove_filter(&mut self, id: NodeId) -> Option<FilterNode> {
        let node = self.image_group.remove_node(id);
        self.pump();
        node
    }

    pub fn set_filter_params(&mut self, id: NodeId, params: FilterParams) {
        self.image_group.set_params(id, params);
        self.pump();
    }

    pub fn add_object(&mut self, node: ObjectNode) -> NodeId {
        let id = self.object_group.add_node(node);
        self.pump();
        id
    }

    pub fn remove_object(&mut self, id: NodeId) -> Option<ObjectNode> {
        let node = self.object_group.remove_node(id);
        self.pump();
        node
    }

    pub fn update_object(&mut self, id: NodeId, apply: impl FnOnce(&mut ObjectNode)) {
        self.object_group.update_node(id, apply);
        self.pump();
    }

    pub fn move_object_forward(&mut self, id: NodeId) -> bool {
        let moved = self.object_group.move_forward(id);
        self.pump();
        moved
    }

    pub fn move_object_back(&mut self, id: NodeId) -> bool {
        let moved = self.object_group.move_back(id);
        self.pump();
        moved
    }

    pub fn object_at(&self, point: Pos2) -> Option<NodeId> {
        self.object_group.node_at(point)
    }

    pub fn add_overlay(&mut self, node: ObjectNode) -> NodeId {
        let id = self.overlay_group.add_node(node);
        self.pump();
        id
    }

    pub fn remove_overlay(&mut self, id: NodeId) -> Option<ObjectNode> {
        let node = self.overlay_group.remove_node(id);
        self.pump();
        node
    }

    pub fn update_overlay(&mut self, id: NodeId, apply: impl FnOnce(&mut ObjectNode)) {
        self.overlay_group.update_node(id, apply);
        self.pump();
    }

    /// Commits a discrete interaction on a node in the image chain,
    /// optionally carrying a descriptor the layered groups mirror.
    pub fn finish_filter_change(&mut self, id: NodeId, change: Option<NodeChange>) {
        self.image_group.finish_change(id, change);
        self.pump();
    }

    /// Commits a discrete interaction on a node in the object group.
    pub fn finish_object_change(&mut self, id: NodeId, change: Option<NodeChange>) {
        self.object_group.finish_change(id, change);
        self.pump();
    }

    /// Current displayed bitmap: image-group output, object surface on top,
    /// overlay surface on top of that. Reflects the latest committed state
    /// of all groups; no caching guarantee beyond that.
    pub fn composited_output(&mut self) -> RgbaImage {
        self.sync_surfaces();
        let mut output = match self.image_group.output() {
            Some(output) => output.clone(),
            None => RgbaImage::new(1, 1),
        };
        let objects = self.object_group.rendered_surface().clone();
        overlay_with_opacity(&mut output, &objects, 0, 0, 1.0);
        let overlays = self.overlay_group.rendered_surface().clone();
        overlay_with_opacity(&mut output, &overlays, 0, 0, 1.0);
        output
    }

    fn output_size(&self) -> Vec2 {
        match self.image_group.output() {
            Some(output) => Vec2::new(output.width() as f32, output.height() as f32),
            None => Vec2::splat(1.0),
        }
    }

    /// Keeps every layered surface the same pixel size as the image group's
    /// output.
    fn sync_surfaces(&mut self) {
        let size = self.output_size();
        self.object_group.set_canvas_size(size);
        self.overlay_group.set_canvas_size(size);
    }

    /// Drains the groups' queued events and performs root-level change
    /// propagation, in call order.
    fn pump(&mut self) {
        let mut events: Vec<(GroupRole, NodeEvent)> = Vec::new();
        events.extend(
            self.image_group
                .take_events()
                .into_iter()
                .map(|e| (GroupRole::Image, e)),
        );
        events.extend(
            self.object_group
                .take_events()
                .into_iter()
                .map(|e| (GroupRole::Object, e)),
        );
        events.extend(
            self.overlay_group
                .take_events()
                .into_iter()
                .map(|e| (GroupRole::Overlay, e)),
        );

        for (role, event) in events {
            match event {
                NodeEvent::Changed(node) => {
                    trace!("pipeline: changed {node}");
                    self.sync_surfaces();
                    if let Some(observer) = self.observer.as_mut() {
                        observer.node_changed(node);
                    }
                }
                NodeEvent::FinishedChanging(node, change) => {
                    trace!("pipeline: finished changing {node}");
                    if let Some(change) = &change {
                        self.broadcast_change(role, change);
                    }
                    self.sync_surfaces();
                    if let Some(observer) = self.observer.as_mut() {
                        observer.node_finished_changing(node, change);
                    }
                }
            }
        }
    }

    /// Asks every top-level group other than the originator that supports
    /// change application to mirror the descriptor.
    fn broadcast_change(&mut self, origin: GroupRole, change: &NodeChange) {
        if origin != GroupRole::Object {
            self.object_group.apply_change(change);
        }
        if origin != GroupRole::Overlay {
            self.overlay_group.apply_change(change);
        }
        // The image chain does not apply foreign changes; pixel-level state
        // only ever changes through its own nodes.
        self.object_group.take_events();
        self.overlay_group.take_events();
    }
}

impl Snapshotable for RenderPipeline {
    /// Recursively snapshots each group, keyed by the group's identifier.
    fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.set(
            &self.image_group.id().to_string(),
            self.image_group.snapshot(),
        );
        snapshot.set(
            &self.object_group.id().to_string(),
            self.object_group.snapshot(),
        );
        snapshot.set(
            &self.overlay_group.id().to_string(),
            self.overlay_group.snapshot(),
        );
        snapshot
    }

    /// Dispatches each saved sub-snapshot to the matching group. Keys with
    /// no matching group are ignored.
    fn restore(&mut self, snapshot: &Snapshot) {
        if let Some(saved) = snapshot.map(&self.image_group.id().to_string()) {
            self.image_group.restore(saved);
        }
        if let Some(saved) = snapshot.map(&self.object_group.id().to_string()) {
            self.object_group.restore(saved);
        }
        if let Some(saved) = snapshot.map(&self.overlay_group.id().to_string()) {
            self.overlay_group.restore(saved);
        }
        self.image_group.take_events();
        self.sync_surfaces();
    }
}
