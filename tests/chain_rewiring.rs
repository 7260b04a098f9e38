use image::RgbaImage;
use photoflow::geometry::EdgeInsets;
use photoflow::node::{FilterNode, FilterParams, IONode, ImageNodeChain, NodeId};
use photoflow::snapshot::Snapshotable;

fn base_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
    })
}

fn crop_node(inset: f32) -> FilterNode {
    FilterNode::new(FilterParams::Crop(EdgeInsets::new(inset, inset, inset, inset)))
}

#[test]
fn add_then_remove_leaves_wiring_unchanged() {
    let mut chain = ImageNodeChain::new();
    chain.set_input(base_image(32, 32));
    chain.add_node(crop_node(2.0));
    chain.add_node(FilterNode::new(FilterParams::Adjustments {
        brightness: 0.1,
        contrast: 1.0,
        saturation: 1.0,
    }));

    let ids_before = chain.ids();
    let output_before = chain.output().unwrap().clone();

    let extra = chain.add_node(FilterNode::new(FilterParams::Orientation {
        quarter_turns: 1,
        mirrored: true,
    }));
    chain.remove_node(extra);

    assert_eq!(chain.ids(), ids_before);
    assert_eq!(chain.output().unwrap(), &output_before);
}

#[test]
fn removing_middle_node_reconnects_neighbors() {
    let mut chain = ImageNodeChain::new();
    chain.set_input(base_image(40, 40));
    let first = chain.add_node(crop_node(5.0));
    let middle = chain.add_node(FilterNode::new(FilterParams::Orientation {
        quarter_turns: 2,
        mirrored: false,
    }));
    let last = chain.add_node(crop_node(5.0));

    chain.remove_node(middle);
    assert_eq!(chain.ids(), vec![first, last]);

    // 40 - 2*5 - 2*5 = 20 on each axis.
    let output = chain.output().unwrap();
    assert_eq!((output.width(), output.height()), (20, 20));
}

#[test]
fn removing_head_feeds_group_input_to_next() {
    let mut chain = ImageNodeChain::new();
    chain.set_input(base_image(30, 30));
    let head = chain.add_node(crop_node(10.0));
    let tail = chain.add_node(crop_node(3.0));

    chain.remove_node(head);
    assert_eq!(chain.ids(), vec![tail]);
    let output = chain.output().unwrap();
    assert_eq!((output.width(), output.height()), (24, 24));
}

#[test]
fn unknown_ids_resolve_to_noops() {
    let mut chain = ImageNodeChain::new();
    chain.set_input(base_image(10, 10));
    let stranger = NodeId::new();

    assert!(chain.node(stranger).is_none());
    assert!(chain.remove_node(stranger).is_none());
    chain.set_params(stranger, FilterParams::Blur { radius: 1.0 });
    assert!(chain.is_empty());
}

#[test]
fn group_snapshot_preserves_chain_order() {
    let mut chain = ImageNodeChain::new();
    chain.set_input(base_image(16, 16));
    let a = chain.add_node(crop_node(1.0));
    let b = chain.add_node(FilterNode::new(FilterParams::Blur { radius: 0.5 }));

    let saved = chain.snapshot();
    let records = saved.records("children").unwrap();
    assert_eq!(
        records.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![a, b]
    );
    assert_eq!(records[0].node_type, "crop");
    assert_eq!(records[1].node_type, "blur");
}
