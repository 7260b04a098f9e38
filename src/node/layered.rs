use std::collections::HashMap;

use egui::{Pos2, Vec2};
use image::RgbaImage;
use log::debug;

use crate::node::{
    ChangeApplyingNode, NodeChange, NodeEvent, NodeId, ObjectKind, ObjectNode, RenderNode,
    ViewableNode,
};
use crate::snapshot::{NodeRecord, Snapshot, Snapshotable};

/// Layered render group: independent, z-ordered, freely placed object
/// nodes. There is no input/output chaining; children are composited by
/// stacking, index 0 at the bottom.
pub struct ObjectNodeStack {
    id: NodeId,
    nodes: Vec<ObjectNode>,
    canvas: Vec2,
    surface: RgbaImage,
    surface_dirty: bool,
    pending: Vec<NodeEvent>,
}

impl ObjectNodeStack {
    pub fn new(canvas: Vec2) -> Self {
        Self::with_id(NodeId::new(), canvas)
    }

    pub fn with_id(id: NodeId, canvas: Vec2) -> Self {
        let canvas = canvas.max(Vec2::splat(1.0));
        Self {
            id,
            nodes: Vec::new(),
            canvas,
            surface: RgbaImage::new(canvas.x.round() as u32, canvas.y.round() as u32),
            surface_dirty: false,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child ids bottom-to-top.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id()).collect()
    }

    pub fn node(&self, id: NodeId) -> Option<&ObjectNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn canvas_size(&self) -> Vec2 {
        self.canvas
    }

    /// Resizes the composited surface, e.g. to track the image group's
    /// output dimensions.
    pub fn set_canvas_size(&mut self, canvas: Vec2) {
        let canvas = canvas.max(Vec2::splat(1.0));
        if canvas == self.canvas {
            return;
        }
        self.canvas = canvas;
        self.surface_dirty = true;
    }

    /// Appends a node on top of the stack.
    pub fn add_node(&mut self, node: ObjectNode) -> NodeId {
        let id = node.id();
        debug_assert!(
            self.node(id).is_none(),
            "duplicate node id in layered group"
        );
        debug!("stack {}: add node {} ({})", self.id, id, node.node_type());
        self.nodes.push(node);
        self.surface_dirty = true;
        self.pending.push(NodeEvent::Changed(id));
        id
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<ObjectNode> {
        let position = self.nodes.iter().position(|n| n.id() == id)?;
        debug!("stack {}: remove node {}", self.id, id);
        let node = self.nodes.remove(position);
        self.surface_dirty = true;
        self.pending.push(NodeEvent::Changed(self.id));
        Some(node)
    }

    /// Mutates one node in place and queues a changed event. Unknown ids
    /// are a no-op.
    pub fn update_node(&mut self, id: NodeId, apply: impl FnOnce(&mut ObjectNode)) {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id() == id) else {
            return;
        };
        apply(node);
        self.surface_dirty = true;
        self.pending.push(NodeEvent::Changed(id));
    }

    /// Marks the end of a discrete interaction on `id`.
    pub fn finish_change(&mut self, id: NodeId, change: Option<NodeChange>) {
        self.pending.push(NodeEvent::FinishedChanging(id, change));
    }

    pub fn take_events(&mut self) -> Vec<NodeEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn can_move_forward(&self, id: NodeId) -> bool {
        match self.nodes.iter().position(|n| n.id() == id) {
            Some(position) => position + 1 < self.nodes.len(),
            None => false,
        }
    }

    pub fn can_move_back(&self, id: NodeId) -> bool {
        match self.nodes.iter().position(|n| n.id() == id) {
            Some(position) => position > 0,
            None => false,
        }
    }

    /// Swaps the node one step toward the top. Returns false at the top of
    /// the stack (callers use this to disable the matching control).
    pub fn move_forward(&mut self, id: NodeId) -> bool {
        let Some(position) = self.nodes.iter().position(|n| n.id() == id) else {
            return false;
        };
        if position + 1 >= self.nodes.len() {
            return false;
        }
        self.nodes.swap(position, position + 1);
        self.surface_dirty = true;
        self.pending.push(NodeEvent::Changed(id));
        true
    }

    /// Swaps the node one step toward the bottom. Returns false at the
    /// bottom of the stack.
    pub fn move_back(&mut self, id: NodeId) -> bool {
        let Some(position) = self.nodes.iter().position(|n| n.id() == id) else {
            return false;
        };
        if position == 0 {
            return false;
        }
        self.nodes.swap(position, position - 1);
        self.surface_dirty = true;
        self.pending.push(NodeEvent::Changed(id));
        true
    }

    /// Hit-tests the stack top-down and maps the hit surface back to its
    /// owning node.
    pub fn node_at(&self, point: Pos2) -> Option<NodeId> {
        self.nodes
            .iter()
            .rev()
            .find(|n| n.hit_test(point))
            .map(|n| n.id())
    }

    /// Composites all child surfaces into the canvas-sized group surface,
    /// bottom-to-top, honoring per-node opacity.
    fn render_surface(&mut self) {
        let width = self.canvas.x.round().max(1.0) as u32;
        let height = self.canvas.y.round().max(1.0) as u32;
        let mut surface = RgbaImage::new(width, height);
        for node in &self.nodes {
            let child = node.surface();
            let rect = node.rect();
            let origin_x = rect.min.x.round() as i64;
            let origin_y = rect.min.y.round() as i64;
            overlay_with_opacity(&mut surface, child, origin_x, origin_y, node.opacity());
        }
        self.surface = surface;
        self.surface_dirty = false;
    }

    /// The composited group surface, re-rendered if stale.
    pub fn rendered_surface(&mut self) -> &RgbaImage {
        if self.surface_dirty {
            self.render_surface();
        }
        &self.surface
    }
}

/// Source-over blend of `src` onto `dst` at an offset, with a constant
/// opacity applied on top of the source alpha. Straight (non-premultiplied)
/// alpha, matching `image`'s storage.
pub(crate) fn overlay_with_opacity(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    x: i64,
    y: i64,
    opacity: f32,
) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let dx = x + sx as i64;
        let dy = y + sy as i64;
        if dx < 0 || dy < 0 || dx >= dst.width() as i64 || dy >= dst.height() as i64 {
            continue;
        }
        let src_a = pixel.0[3] as f32 / 255.0 * opacity;
        if src_a <= 0.0 {
            continue;
        }
        let under = dst.get_pixel_mut(dx as u32, dy as u32);
        let dst_a = under.0[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            continue;
        }
        for channel in 0..3 {
            let s = pixel.0[channel] as f32;
            let d = under.0[channel] as f32;
            let blended = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
            under.0[channel] = blended.round().clamp(0.0, 255.0) as u8;
        }
        under.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

impl RenderNode for ObjectNodeStack {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> &'static str {
        "object_group"
    }
}

impl ChangeApplyingNode for ObjectNodeStack {
    /// Broadcasts a sibling-originated change to every child, so e.g. a
    /// base-image crop repositions text and sticker items consistently.
    fn apply_change(&mut self, change: &NodeChange) {
        if let NodeChange::CanvasResized { new, .. } = change {
            self.set_canvas_size(*new);
        }
        for node in &mut self.nodes {
            node.apply_change(change);
        }
        self.surface_dirty = true;
    }
}

impl Snapshotable for ObjectNodeStack {
    fn snapshot(&self) -> Snapshot {
        let records = self
            .nodes
            .iter()
            .map(|n| NodeRecord::new(n.id(), n.node_type(), n.snapshot()))
            .collect();
        let mut snapshot = Snapshot::new();
        snapshot.set("canvas", self.canvas);
        snapshot.set_records("children", records);
        snapshot
    }

    /// Walks the ordered records: reuses an existing child with a matching
    /// id, reconstructs missing children from their recorded type, then
    /// drops any child whose id did not appear. This is how undo resurrects
    /// and deletes object nodes as part of history.
    fn restore(&mut self, snapshot: &Snapshot) {
        if let Some(canvas) = snapshot.size("canvas") {
            self.set_canvas_size(canvas);
        }
        let records = match snapshot.records("children") {
            Some(records) => records,
            None => return,
        };

        let mut existing: HashMap<NodeId, ObjectNode> = self
            .nodes
            .drain(..)
            .map(|node| (node.id(), node))
            .collect();

        for record in records {
            let mut node = match existing.remove(&record.id) {
                Some(node) => node,
                None => match ObjectKind::neutral_for(&record.node_type) {
                    Some(kind) => {
                        ObjectNode::with_id(record.id, kind, Pos2::ZERO, Vec2::splat(1.0))
                    }
                    None => continue,
                },
            };
            node.restore(&record.state);
            self.nodes.push(node);
        }
        // Children absent from the snapshot stay removed.
        self.surface_dirty = true;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sticker(center: Pos2) -> ObjectNode {
        ObjectNode::new(
            ObjectKind::Sticker {
                asset: "star".into(),
            },
            center,
            Vec2::new(10.0, 10.0),
        )
    }

    fn stack_with_three() -> (ObjectNodeStack, NodeId, NodeId, NodeId) {
        let mut stack = ObjectNodeStack::new(Vec2::new(100.0, 100.0));
        let a = stack.add_node(sticker(Pos2::new(20.0, 20.0)));
        let b = stack.add_node(sticker(Pos2::new(50.0, 50.0)));
        let c = stack.add_node(sticker(Pos2::new(80.0, 80.0)));
        (stack, a, b, c)
    }

    #[test]
    fn move_forward_swaps_adjacent() {
        let (mut stack, a, b, c) = stack_with_three();
        assert!(stack.move_forward(a));
        assert_eq!(stack.ids(), vec![b, a, c]);
        assert!(stack.can_move_back(a));
        assert!(!stack.can_move_forward(c));
    }

    #[test]
    fn boundary_moves_are_noops() {
        let (mut stack, a, _, c) = stack_with_three();
        let before = stack.ids();
        assert!(!stack.move_back(a));
        assert!(!stack.move_forward(c));
        assert_eq!(stack.ids(), before);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut stack = ObjectNodeStack::new(Vec2::new(100.0, 100.0));
        let below = stack.add_node(sticker(Pos2::new(50.0, 50.0)));
        let above = stack.add_node(sticker(Pos2::new(52.0, 52.0)));

        assert_eq!(stack.node_at(Pos2::new(51.0, 51.0)), Some(above));
        assert_eq!(stack.node_at(Pos2::new(46.0, 46.0)), Some(below));
        assert_eq!(stack.node_at(Pos2::new(5.0, 5.0)), None);
    }

    #[test]
    fn restore_resurrects_and_deletes_members() {
        let (mut stack, a, b, c) = stack_with_three();
        let saved = stack.snapshot();

        stack.remove_node(b);
        let d = stack.add_node(sticker(Pos2::new(10.0, 10.0)));
        assert_eq!(stack.ids(), vec![a, c, d]);

        stack.restore(&saved);
        assert_eq!(stack.ids(), vec![a, b, c]);
        assert_eq!(stack.snapshot(), saved);
    }

    #[test]
    fn composite_honors_opacity() {
        let mut stack = ObjectNodeStack::new(Vec2::new(20.0, 20.0));
        let id = stack.add_node(sticker(Pos2::new(10.0, 10.0)));
        stack.update_node(id, |n| n.set_opacity(0.0));

        let surface = stack.rendered_surface();
        assert!(surface.pixels().all(|p| p.0[3] == 0));
    }
}
