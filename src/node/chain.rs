use std::collections::HashMap;

use image::RgbaImage;
use log::debug;

use crate::node::{FilterNode, FilterParams, IONode, NodeChange, NodeEvent, NodeId, RenderNode};
use crate::snapshot::{NodeRecord, Snapshot, Snapshotable};

struct ChainEntry {
    node: FilterNode,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Chained render group: a linear sequence of filter nodes sharing one
/// input/output image. Each child's input is the previous child's output,
/// or the group's own input for the head.
///
/// Children live in an arena with inline prev/next indices plus an
/// id-to-slot map; the arena owns everything, so there are no back
/// references to keep alive.
pub struct ImageNodeChain {
    id: NodeId,
    slots: Vec<Option<ChainEntry>>,
    index: HashMap<NodeId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    input: Option<RgbaImage>,
    pending: Vec<NodeEvent>,
}

impl ImageNodeChain {
    pub fn new() -> Self {
        Self::with_id(NodeId::new())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            slots: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            input: None,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Child ids in chain order, head first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let entry = self.entry(slot);
            ids.push(entry.node.id());
            cursor = entry.next;
            debug_assert!(ids.len() <= self.len(), "cycle in image node chain");
        }
        ids
    }

    pub fn node(&self, id: NodeId) -> Option<&FilterNode> {
        let slot = *self.index.get(&id)?;
        Some(&self.entry(slot).node)
    }

    /// Appends a node to the end of the chain and feeds it the current
    /// tail output (or the group input if the chain was empty).
    pub fn add_node(&mut self, node: FilterNode) -> NodeId {
        let id = node.id();
        debug_assert!(
            !self.index.contains_key(&id),
            "duplicate node id in image node chain"
        );
        debug!("chain {}: add node {} ({})", self.id, id, node.node_type());

        let upstream = self.tail_output().cloned();
        let slot = self.alloc(ChainEntry {
            node,
            prev: self.tail,
            next: None,
        });
        if let Some(tail) = self.tail {
            self.entry_mut(tail).next = Some(slot);
        } else {
            self.head = Some(slot);
        }
        self.tail = Some(slot);
        self.index.insert(id, slot);

        if let Some(upstream) = upstream {
            self.entry_mut(slot).node.set_input(upstream);
        }
        self.pending.push(NodeEvent::Changed(id));
        id
    }

    /// Removes a node, reconnecting its former successor's input to its
    /// former predecessor's output (or the group input if it was the head).
    pub fn remove_node(&mut self, id: NodeId) -> Option<FilterNode> {
        let slot = self.index.remove(&id)?;
        let entry = self.slots[slot].take()?;
        debug!("chain {}: remove node {}", self.id, id);

        match entry.prev {
            Some(prev) => self.entry_mut(prev).next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => self.entry_mut(next).prev = entry.prev,
            None => self.tail = entry.prev,
        }

        if let Some(next) = entry.next {
            let upstream = match entry.prev {
                Some(prev) => self.entry(prev).node.output().cloned(),
                None => self.input.clone(),
            };
            if let Some(upstream) = upstream {
                self.entry_mut(next).node.set_input(upstream);
                self.propagate_from(next);
            }
        }
        self.pending.push(NodeEvent::Changed(self.id));
        Some(entry.node)
    }

    /// Updates one node's parameters and pushes the recomputed output down
    /// the rest of the chain. Unknown ids are a no-op.
    pub fn set_params(&mut self, id: NodeId, params: FilterParams) {
        let slot = match self.index.get(&id) {
            Some(slot) => *slot,
            None => return,
        };
        self.entry_mut(slot).node.set_params(params);
        self.propagate_from(slot);
        self.pending.push(NodeEvent::Changed(id));
    }

    /// Marks the end of a discrete interaction on `id`, optionally carrying
    /// a descriptor siblings can mirror.
    pub fn finish_change(&mut self, id: NodeId, change: Option<NodeChange>) {
        self.pending.push(NodeEvent::FinishedChanging(id, change));
    }

    /// Drains the queued change events in dispatch order.
    pub fn take_events(&mut self) -> Vec<NodeEvent> {
        std::mem::take(&mut self.pending)
    }

    fn tail_output(&self) -> Option<&RgbaImage> {
        match self.tail {
            Some(tail) => self.entry(tail).node.output(),
            None => self.input.as_ref(),
        }
    }

    fn alloc(&mut self, entry: ChainEntry) -> usize {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn entry(&self, slot: usize) -> &ChainEntry {
        self.slots[slot].as_ref().expect("stale chain slot")
    }

    fn entry_mut(&mut self, slot: usize) -> &mut ChainEntry {
        self.slots[slot].as_mut().expect("stale chain slot")
    }

    /// Pushes `slot`'s output into each successor in turn.
    fn propagate_from(&mut self, slot: usize) {
        let mut visited = 0usize;
        let mut cursor = slot;
        while let Some(next) = self.entry(cursor).next {
            let output = match self.entry(cursor).node.output() {
                Some(output) => output.clone(),
                None => break,
            };
            self.entry_mut(next).node.set_input(output);
            cursor = next;
            visited += 1;
            debug_assert!(visited <= self.len(), "cycle in image node chain");
        }
    }
}

impl Default for ImageNodeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderNode for ImageNodeChain {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> &'static str {
        "image_group"
    }
}

impl IONode for ImageNodeChain {
    fn set_input(&mut self, input: RgbaImage) {
        self.input = Some(input.clone());
        if let Some(head) = self.head {
            self.entry_mut(head).node.set_input(input);
            self.propagate_from(head);
        }
        self.pending.push(NodeEvent::Changed(self.id));
    }

    fn input(&self) -> Option<&RgbaImage> {
        self.input.as_ref()
    }

    /// The tail node's output, or the unprocessed group input for an empty
    /// chain.
    fn output(&self) -> Option<&RgbaImage> {
        self.tail_output()
    }
}

impl Snapshotable for ImageNodeChain {
    fn snapshot(&self) -> Snapshot {
        let mut records = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let entry = self.entry(slot);
            records.push(NodeRecord::new(
                entry.node.id(),
                entry.node.node_type(),
                entry.node.snapshot(),
            ));
            cursor = entry.next;
        }
        let mut snapshot = Snapshot::new();
        snapshot.set_records("children", records);
        snapshot
    }

    /// Rebuilds membership and order to match the snapshot: children with a
    /// matching id are reused and rehydrated, recorded-but-missing children
    /// are reconstructed from their type, and children absent from the
    /// snapshot are dropped.
    fn restore(&mut self, snapshot: &Snapshot) {
        let records = match snapshot.records("children") {
            Some(records) => records,
            None => return,
        };

        let mut existing: HashMap<NodeId, FilterNode> = HashMap::new();
        for slot in self.slots.drain(..).flatten() {
            existing.insert(slot.node.id(), slot.node);
        }
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.pending.clear();

        for record in records {
            let mut node = match existing.remove(&record.id) {
                Some(node) => node,
                None => match FilterParams::neutral_for(&record.node_type) {
                    Some(params) => FilterNode::with_id(record.id, params),
                    None => continue,
                },
            };
            node.restore(&record.state);
            self.add_node(node);
        }
        self.pending.clear();

        if let Some(input) = self.input.clone() {
            self.set_input(input);
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EdgeInsets;

    fn base(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]))
    }

    fn chain_with_input() -> ImageNodeChain {
        let mut chain = ImageNodeChain::new();
        chain.set_input(base(8, 6));
        chain
    }

    #[test]
    fn empty_chain_passes_input_through() {
        let chain = chain_with_input();
        let output = chain.output().unwrap();
        assert_eq!((output.width(), output.height()), (8, 6));
    }

    #[test]
    fn add_then_remove_restores_wiring() {
        let mut chain = chain_with_input();
        chain.add_node(FilterNode::new(FilterParams::Crop(EdgeInsets::new(
            1.0, 1.0, 1.0, 1.0,
        ))));
        let before = chain.output().unwrap().clone();
        let before_ids = chain.ids();

        let extra = chain.add_node(FilterNode::new(FilterParams::Orientation {
            quarter_turns: 1,
            mirrored: false,
        }));
        chain.remove_node(extra);

        assert_eq!(chain.ids(), before_ids);
        assert_eq!(chain.output().unwrap(), &before);
    }

    #[test]
    fn removing_head_rewires_successor_to_group_input() {
        let mut chain = chain_with_input();
        let head = chain.add_node(FilterNode::new(FilterParams::Orientation {
            quarter_turns: 1,
            mirrored: false,
        }));
        chain.add_node(FilterNode::new(FilterParams::Crop(EdgeInsets::new(
            0.0, 2.0, 0.0, 2.0,
        ))));

        chain.remove_node(head);
        // 8x6 input minus 2px on each horizontal side.
        let output = chain.output().unwrap();
        assert_eq!((output.width(), output.height()), (4, 6));
    }

    #[test]
    fn unknown_id_lookup_is_noop() {
        let mut chain = chain_with_input();
        assert!(chain.node(NodeId::new()).is_none());
        assert!(chain.remove_node(NodeId::new()).is_none());
        chain.set_params(NodeId::new(), FilterParams::Blur { radius: 2.0 });
    }

    #[test]
    fn membership_restore_reconstructs_missing_nodes() {
        let mut chain = chain_with_input();
        let crop = chain.add_node(FilterNode::new(FilterParams::Crop(EdgeInsets::new(
            1.0, 1.0, 1.0, 1.0,
        ))));
        let saved = chain.snapshot();

        chain.remove_node(crop);
        assert!(chain.is_empty());

        chain.restore(&saved);
        assert_eq!(chain.ids(), vec![crop]);
        assert_eq!(chain.snapshot(), saved);
        let output = chain.output().unwrap();
        assert_eq!((output.width(), output.height()), (6, 4));
    }
}
