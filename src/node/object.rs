use egui::{Pos2, Rect, Vec2};
use image::{imageops, Rgba, RgbaImage};

use crate::geometry::Transform;
use crate::node::{ChangeApplyingNode, NodeChange, NodeId, RenderNode, ViewableNode};
use crate::snapshot::{Snapshot, Snapshotable};

/// Content variant of a freely manipulable item.
///
/// Each variant only carries the plain data it needs; the visual widgets
/// that edit these live outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Text {
        content: String,
        font_size: f32,
        color: [u8; 4],
    },
    Sticker {
        asset: String,
    },
    OverlayImage {
        /// Raster content, captured pixel-for-pixel in snapshots so undo
        /// can resurrect the node intact.
        image: Option<RgbaImage>,
    },
    Border {
        width: f32,
        color: [u8; 4],
    },
}

impl ObjectKind {
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectKind::Text { .. } => "text",
            ObjectKind::Sticker { .. } => "sticker",
            ObjectKind::OverlayImage { .. } => "overlay_image",
            ObjectKind::Border { .. } => "border",
        }
    }

    /// Neutral content for a recorded node type, used when snapshot restore
    /// has to resurrect a deleted node.
    pub fn neutral_for(kind: &str) -> Option<Self> {
        match kind {
            "text" => Some(ObjectKind::Text {
                content: String::new(),
                font_size: 16.0,
                color: [255, 255, 255, 255],
            }),
            "sticker" => Some(ObjectKind::Sticker {
                asset: String::new(),
            }),
            "overlay_image" => Some(ObjectKind::OverlayImage { image: None }),
            "border" => Some(ObjectKind::Border {
                width: 4.0,
                color: [255, 255, 255, 255],
            }),
            _ => None,
        }
    }
}

/// A freely placed item in a layered group: center, bounds, affine transform
/// and an opacity scalar, plus its own rendered surface.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    id: NodeId,
    kind: ObjectKind,
    center: Pos2,
    bounds: Vec2,
    transform: Transform,
    opacity: f32,
    surface: RgbaImage,
}

impl ObjectNode {
    pub fn new(kind: ObjectKind, center: Pos2, bounds: Vec2) -> Self {
        Self::with_id(NodeId::new(), kind, center, bounds)
    }

    pub fn with_id(id: NodeId, kind: ObjectKind, center: Pos2, bounds: Vec2) -> Self {
        let mut node = Self {
            id,
            kind,
            center,
            bounds: bounds.max(Vec2::splat(1.0)),
            transform: Transform::identity(),
            opacity: 1.0,
            surface: RgbaImage::new(1, 1),
        };
        node.render_surface();
        node
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: ObjectKind) {
        self.kind = kind;
        self.render_surface();
    }

    pub fn center(&self) -> Pos2 {
        self.center
    }

    pub fn set_center(&mut self, center: Pos2) {
        self.center = center;
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Vec2) {
        self.bounds = bounds.max(Vec2::splat(1.0));
        self.render_surface();
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.render_surface();
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Axis-aligned footprint of the item in canvas space.
    pub fn rect(&self) -> Rect {
        Rect::from_center_size(self.center, self.scaled_bounds())
    }

    pub fn hit_test(&self, point: Pos2) -> bool {
        self.rect().contains(point)
    }

    fn scaled_bounds(&self) -> Vec2 {
        Vec2::new(
            (self.bounds.x * self.transform.scale.x.abs()).max(1.0),
            (self.bounds.y * self.transform.scale.y.abs()).max(1.0),
        )
    }

    fn render_surface(&mut self) {
        let size = self.scaled_bounds();
        let width = size.x.round().max(1.0) as u32;
        let height = size.y.round().max(1.0) as u32;
        self.surface = match &self.kind {
            ObjectKind::Text { color, .. } => {
                RgbaImage::from_pixel(width, height, Rgba(*color))
            }
            ObjectKind::Sticker { .. } => {
                RgbaImage::from_pixel(width, height, Rgba([200, 200, 200, 255]))
            }
            ObjectKind::OverlayImage { image } => match image {
                Some(image) => {
                    imageops::resize(image, width, height, imageops::FilterType::Triangle)
                }
                None => RgbaImage::new(width, height),
            },
            ObjectKind::Border { width: stroke, color } => {
                let stroke = stroke.round().max(1.0) as u32;
                RgbaImage::from_fn(width, height, |x, y| {
                    let on_edge = x < stroke
                        || y < stroke
                        || x + stroke >= width
                        || y + stroke >= height;
                    if on_edge {
                        Rgba(*color)
                    } else {
                        Rgba([0, 0, 0, 0])
                    }
                })
            }
        };
    }
}

impl RenderNode for ObjectNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> &'static str {
        self.kind.kind()
    }
}

impl ViewableNode for ObjectNode {
    fn surface(&self) -> &RgbaImage {
        &self.surface
    }
}

impl ChangeApplyingNode for ObjectNode {
    fn apply_change(&mut self, change: &NodeChange) {
        match change {
            NodeChange::Transform(transform) => {
                self.center = transform.apply(self.center);
                self.transform = self.transform.then(transform);
                self.render_surface();
            }
            NodeChange::CanvasResized { old, new } => {
                if old.x <= 0.0 || old.y <= 0.0 {
                    return;
                }
                let ratio = Vec2::new(new.x / old.x, new.y / old.y);
                self.center = Pos2::new(self.center.x * ratio.x, self.center.y * ratio.y);
                self.set_bounds(self.bounds * ratio.x.min(ratio.y));
            }
            NodeChange::Crop(insets) => {
                self.center -= Vec2::new(insets.left, insets.top);
            }
        }
    }
}

impl Snapshotable for ObjectNode {
    fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.set("kind", self.kind.kind());
        snapshot.set("center", self.center);
        snapshot.set("bounds", self.bounds);
        snapshot.set("transform", self.transform);
        snapshot.set("opacity", self.opacity);
        match &self.kind {
            ObjectKind::Text {
                content,
                font_size,
                color,
            } => {
                snapshot.set("content", content.as_str());
                snapshot.set("font_size", *font_size);
                snapshot.set("color", crate::snapshot::SnapshotValue::Color(*color));
            }
            ObjectKind::Sticker { asset } => snapshot.set("asset", asset.as_str()),
            ObjectKind::OverlayImage { image } => {
                if let Some(image) = image {
                    snapshot.set("image", image.clone());
                }
            }
            ObjectKind::Border { width, color } => {
                snapshot.set("width", *width);
                snapshot.set("color", crate::snapshot::SnapshotValue::Color(*color));
            }
        }
        snapshot
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        if let Some(center) = snapshot.point("center") {
            self.center = center;
        }
        if let Some(bounds) = snapshot.size("bounds") {
            self.bounds = bounds.max(Vec2::splat(1.0));
        }
        if let Some(transform) = snapshot.transform("transform") {
            self.transform = transform;
        }
        if let Some(opacity) = snapshot.number_f32("opacity") {
            self.opacity = opacity.clamp(0.0, 1.0);
        }

        let kind = snapshot.text("kind").unwrap_or_else(|| self.kind.kind());
        let base = if kind == self.kind.kind() {
            self.kind.clone()
        } else {
            match ObjectKind::neutral_for(kind) {
                Some(kind) => kind,
                None => {
                    self.render_surface();
                    return;
                }
            }
        };
        self.kind = match base {
            ObjectKind::Text {
                content,
                font_size,
                color,
            } => ObjectKind::Text {
                content: snapshot
                    .text("content")
                    .map(str::to_string)
                    .unwrap_or(content),
                font_size: snapshot.number_f32("font_size").unwrap_or(font_size),
                color: snapshot.color("color").unwrap_or(color),
            },
            ObjectKind::Sticker { asset } => ObjectKind::Sticker {
                asset: snapshot.text("asset").map(str::to_string).unwrap_or(asset),
            },
            ObjectKind::OverlayImage { image } => ObjectKind::OverlayImage {
                image: snapshot.image("image").or(image),
            },
            ObjectKind::Border { width, color } => ObjectKind::Border {
                width: snapshot.number_f32("width").unwrap_or(width),
                color: snapshot.color("color").unwrap_or(color),
            },
        };
        self.render_surface();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EdgeInsets;

    fn text_node() -> ObjectNode {
        ObjectNode::new(
            ObjectKind::Text {
                content: "hello".into(),
                font_size: 20.0,
                color: [255, 0, 0, 255],
            },
            Pos2::new(50.0, 50.0),
            Vec2::new(40.0, 20.0),
        )
    }

    #[test]
    fn surface_matches_scaled_bounds() {
        let mut node = text_node();
        assert_eq!(node.surface().width(), 40);
        assert_eq!(node.surface().height(), 20);

        node.set_transform(Transform {
            scale: Vec2::new(2.0, 2.0),
            ..Transform::identity()
        });
        assert_eq!(node.surface().width(), 80);
        assert_eq!(node.surface().height(), 40);
    }

    #[test]
    fn canvas_resize_repositions_center() {
        let mut node = text_node();
        node.apply_change(&NodeChange::CanvasResized {
            old: Vec2::new(100.0, 100.0),
            new: Vec2::new(200.0, 200.0),
        });
        assert_eq!(node.center(), Pos2::new(100.0, 100.0));
    }

    #[test]
    fn crop_change_shifts_center() {
        let mut node = text_node();
        node.apply_change(&NodeChange::Crop(EdgeInsets::new(10.0, 5.0, 0.0, 0.0)));
        assert_eq!(node.center(), Pos2::new(45.0, 40.0));
    }

    #[test]
    fn snapshot_round_trip_is_stable() {
        let node = text_node();
        let first = node.snapshot();

        let mut fresh = ObjectNode::with_id(
            node.id(),
            ObjectKind::neutral_for("text").unwrap(),
            Pos2::ZERO,
            Vec2::splat(1.0),
        );
        fresh.restore(&first);
        assert_eq!(fresh.snapshot(), first);
    }
}
