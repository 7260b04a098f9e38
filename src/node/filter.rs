use image::{imageops, RgbaImage};

use crate::geometry::EdgeInsets;
use crate::node::{IONode, NodeId, RenderNode};
use crate::snapshot::{Snapshot, Snapshotable};

/// Parameter set for one pixel-level processing step.
///
/// These are plain data containers; the actual pixel math lives in
/// [`FilterNode::recompute`] and is deliberately simple. The engine only
/// requires that recomputation is pure given the current parameters and
/// input image.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterParams {
    Adjustments {
        /// Added to every channel, -1..=1 in normalized units
        brightness: f32,
        /// Multiplier around mid-gray, 0..=2
        contrast: f32,
        /// 0 = grayscale, 1 = unchanged, up to 2
        saturation: f32,
    },
    /// Pixel insets cut from the input image
    Crop(EdgeInsets),
    Orientation {
        /// Clockwise quarter turns, 0..=3
        quarter_turns: u8,
        /// Horizontal mirror, applied after rotation
        mirrored: bool,
    },
    Blur {
        /// Gaussian sigma in pixels; 0 disables
        radius: f32,
    },
}

impl FilterParams {
    pub fn kind(&self) -> &'static str {
        match self {
            FilterParams::Adjustments { .. } => "adjustments",
            FilterParams::Crop(_) => "crop",
            FilterParams::Orientation { .. } => "orientation",
            FilterParams::Blur { .. } => "blur",
        }
    }

    /// Neutral parameters for a recorded node type, used when a snapshot
    /// restore has to reconstruct a node that no longer exists.
    pub fn neutral_for(kind: &str) -> Option<Self> {
        match kind {
            "adjustments" => Some(FilterParams::Adjustments {
                brightness: 0.0,
                contrast: 1.0,
                saturation: 1.0,
            }),
            "crop" => Some(FilterParams::Crop(EdgeInsets::ZERO)),
            "orientation" => Some(FilterParams::Orientation {
                quarter_turns: 0,
                mirrored: false,
            }),
            "blur" => Some(FilterParams::Blur { radius: 0.0 }),
            _ => None,
        }
    }

    /// Saturating clamp of every parameter into its valid range.
    fn normalized(self) -> Self {
        match self {
            FilterParams::Adjustments {
                brightness,
                contrast,
                saturation,
            } => FilterParams::Adjustments {
                brightness: brightness.clamp(-1.0, 1.0),
                contrast: contrast.clamp(0.0, 2.0),
                saturation: saturation.clamp(0.0, 2.0),
            },
            FilterParams::Crop(insets) => FilterParams::Crop(EdgeInsets {
                top: insets.top.max(0.0),
                left: insets.left.max(0.0),
                bottom: insets.bottom.max(0.0),
                right: insets.right.max(0.0),
            }),
            FilterParams::Orientation {
                quarter_turns,
                mirrored,
            } => FilterParams::Orientation {
                quarter_turns: quarter_turns % 4,
                mirrored,
            },
            FilterParams::Blur { radius } => FilterParams::Blur {
                radius: radius.max(0.0),
            },
        }
    }
}

/// Leaf node of the image-processing chain: one input image, one derived
/// output image, recomputed whenever either the input or the parameters
/// change.
#[derive(Debug, Clone)]
pub struct FilterNode {
    id: NodeId,
    params: FilterParams,
    input: Option<RgbaImage>,
    output: Option<RgbaImage>,
}

impl FilterNode {
    pub fn new(params: FilterParams) -> Self {
        Self::with_id(NodeId::new(), params)
    }

    pub fn with_id(id: NodeId, params: FilterParams) -> Self {
        Self {
            id,
            params: params.normalized(),
            input: None,
            output: None,
        }
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FilterParams) {
        self.params = params.normalized();
        self.recompute();
    }

    fn recompute(&mut self) {
        let input = match &self.input {
            Some(input) => input,
            None => {
                self.output = None;
                return;
            }
        };
        self.output = Some(apply_params(&self.params, input));
    }
}

fn apply_params(params: &FilterParams, input: &RgbaImage) -> RgbaImage {
    match params {
        FilterParams::Adjustments {
            brightness,
            contrast,
            saturation,
        } => {
            let mut out = input.clone();
            for pixel in out.pixels_mut() {
                let [r, g, b, a] = pixel.0;
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                let adjust = |c: u8| -> u8 {
                    let mut v = c as f32;
                    v = luma + (v - luma) * saturation;
                    v = 127.5 + (v - 127.5) * contrast;
                    v += brightness * 255.0;
                    v.round().clamp(0.0, 255.0) as u8
                };
                pixel.0 = [adjust(r), adjust(g), adjust(b), a];
            }
            out
        }
        FilterParams::Crop(insets) => {
            let size = egui::Vec2::new(input.width() as f32, input.height() as f32);
            let insets = insets.clamped_to_size(size);
            let x = insets.left.round() as u32;
            let y = insets.top.round() as u32;
            let width = (input.width() - x).saturating_sub(insets.right.round() as u32);
            let height = (input.height() - y).saturating_sub(insets.bottom.round() as u32);
            if width == 0 || height == 0 {
                return RgbaImage::new(1, 1);
            }
            imageops::crop_imm(input, x, y, width, height).to_image()
        }
        FilterParams::Orientation {
            quarter_turns,
            mirrored,
        } => {
            let rotated = match quarter_turns % 4 {
                1 => imageops::rotate90(input),
                2 => imageops::rotate180(input),
                3 => imageops::rotate270(input),
                _ => input.clone(),
            };
            if *mirrored {
                imageops::flip_horizontal(&rotated)
            } else {
                rotated
            }
        }
        FilterParams::Blur { radius } => {
            if *radius > 0.0 {
                imageops::blur(input, *radius)
            } else {
                input.clone()
            }
        }
    }
}

impl RenderNode for FilterNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> &'static str {
        self.params.kind()
    }
}

impl IONode for FilterNode {
    fn set_input(&mut self, input: RgbaImage) {
        self.input = Some(input);
        self.recompute();
    }

    fn input(&self) -> Option<&RgbaImage> {
        self.input.as_ref()
    }

    fn output(&self) -> Option<&RgbaImage> {
        self.output.as_ref()
    }
}

impl Snapshotable for FilterNode {
    fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.set("kind", self.params.kind());
        match &self.params {
            FilterParams::Adjustments {
                brightness,
                contrast,
                saturation,
            } => {
                snapshot.set("brightness", *brightness);
                snapshot.set("contrast", *contrast);
                snapshot.set("saturation", *saturation);
            }
            FilterParams::Crop(insets) => snapshot.set("insets", *insets),
            FilterParams::Orientation {
                quarter_turns,
                mirrored,
            } => {
                snapshot.set("quarter_turns", *quarter_turns as f64);
                snapshot.set("mirrored", *mirrored);
            }
            FilterParams::Blur { radius } => snapshot.set("radius", *radius),
        }
        snapshot
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        let kind = snapshot.text("kind").unwrap_or_else(|| self.params.kind());
        let base = if kind == self.params.kind() {
            self.params.clone()
        } else {
            match FilterParams::neutral_for(kind) {
                Some(params) => params,
                None => return,
            }
        };
        let params = match base {
            FilterParams::Adjustments {
                brightness,
                contrast,
                saturation,
            } => FilterParams::Adjustments {
                brightness: snapshot.number_f32("brightness").unwrap_or(brightness),
                contrast: snapshot.number_f32("contrast").unwrap_or(contrast),
                saturation: snapshot.number_f32("saturation").unwrap_or(saturation),
            },
            FilterParams::Crop(insets) => {
                FilterParams::Crop(snapshot.insets("insets").unwrap_or(insets))
            }
            FilterParams::Orientation {
                quarter_turns,
                mirrored,
            } => FilterParams::Orientation {
                quarter_turns: snapshot
                    .number("quarter_turns")
                    .map(|n| n as u8)
                    .unwrap_or(quarter_turns),
                mirrored: snapshot.bool("mirrored").unwrap_or(mirrored),
            },
            FilterParams::Blur { radius } => FilterParams::Blur {
                radius: snapshot.number_f32("radius").unwrap_or(radius),
            },
        };
        self.set_params(params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn setting_input_recomputes_output() {
        let mut node = FilterNode::new(FilterParams::Orientation {
            quarter_turns: 1,
            mirrored: false,
        });
        assert!(node.output().is_none());

        node.set_input(checker(4, 2));
        let output = node.output().unwrap();
        assert_eq!((output.width(), output.height()), (2, 4));
    }

    #[test]
    fn crop_respects_insets() {
        let mut node = FilterNode::new(FilterParams::Crop(EdgeInsets::new(1.0, 2.0, 1.0, 2.0)));
        node.set_input(checker(10, 8));
        let output = node.output().unwrap();
        assert_eq!((output.width(), output.height()), (6, 6));
    }

    #[test]
    fn params_are_clamped() {
        let node = FilterNode::new(FilterParams::Adjustments {
            brightness: 9.0,
            contrast: -3.0,
            saturation: 7.0,
        });
        match node.params() {
            FilterParams::Adjustments {
                brightness,
                contrast,
                saturation,
            } => {
                assert_eq!(*brightness, 1.0);
                assert_eq!(*contrast, 0.0);
                assert_eq!(*saturation, 2.0);
            }
            other => panic!("unexpected params {other:?}"),
        }
    }

    #[test]
    fn snapshot_round_trip_is_stable() {
        let mut node = FilterNode::new(FilterParams::Adjustments {
            brightness: 0.25,
            contrast: 1.1,
            saturation: 0.8,
        });
        let first = node.snapshot();

        let mut fresh = FilterNode::with_id(node.id(), FilterParams::neutral_for("adjustments").unwrap());
        fresh.restore(&first);
        assert_eq!(fresh.snapshot(), first);

        node.restore(&first);
        assert_eq!(node.snapshot(), first);
    }
}
