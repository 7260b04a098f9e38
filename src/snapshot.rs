use std::collections::BTreeMap;

use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::geometry::{EdgeInsets, Transform};
use crate::node::NodeId;

/// A single value stored in a [`Snapshot`].
///
/// A closed sum type rather than a dynamic any-map, so restore code can
/// match exhaustively instead of downcasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Point([f32; 2]),
    Size([f32; 2]),
    Rect([f32; 4]),
    Insets(EdgeInsets),
    Transform(Transform),
    Color([u8; 4]),
    Image {
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Map(Snapshot),
    List(Vec<SnapshotValue>),
}

impl SnapshotValue {
    pub fn variant_name(&self) -> &'static str {
        match self {
            SnapshotValue::Number(_) => "number",
            SnapshotValue::Bool(_) => "bool",
            SnapshotValue::Text(_) => "text",
            SnapshotValue::Point(_) => "point",
            SnapshotValue::Size(_) => "size",
            SnapshotValue::Rect(_) => "rect",
            SnapshotValue::Insets(_) => "insets",
            SnapshotValue::Transform(_) => "transform",
            SnapshotValue::Color(_) => "color",
            SnapshotValue::Image { .. } => "image",
            SnapshotValue::Map(_) => "map",
            SnapshotValue::List(_) => "list",
        }
    }
}

impl From<f64> for SnapshotValue {
    fn from(v: f64) -> Self {
        SnapshotValue::Number(v)
    }
}

impl From<f32> for SnapshotValue {
    fn from(v: f32) -> Self {
        SnapshotValue::Number(v as f64)
    }
}

impl From<bool> for SnapshotValue {
    fn from(v: bool) -> Self {
        SnapshotValue::Bool(v)
    }
}

impl From<&str> for SnapshotValue {
    fn from(v: &str) -> Self {
        SnapshotValue::Text(v.to_string())
    }
}

impl From<String> for SnapshotValue {
    fn from(v: String) -> Self {
        SnapshotValue::Text(v)
    }
}

impl From<Pos2> for SnapshotValue {
    fn from(v: Pos2) -> Self {
        SnapshotValue::Point([v.x, v.y])
    }
}

impl From<Vec2> for SnapshotValue {
    fn from(v: Vec2) -> Self {
        SnapshotValue::Size([v.x, v.y])
    }
}

impl From<Rect> for SnapshotValue {
    fn from(v: Rect) -> Self {
        SnapshotValue::Rect([v.min.x, v.min.y, v.max.x, v.max.y])
    }
}

impl From<EdgeInsets> for SnapshotValue {
    fn from(v: EdgeInsets) -> Self {
        SnapshotValue::Insets(v)
    }
}

impl From<Transform> for SnapshotValue {
    fn from(v: Transform) -> Self {
        SnapshotValue::Transform(v)
    }
}

impl From<RgbaImage> for SnapshotValue {
    fn from(v: RgbaImage) -> Self {
        SnapshotValue::Image {
            width: v.width(),
            height: v.height(),
            rgba: v.into_raw(),
        }
    }
}

impl From<Snapshot> for SnapshotValue {
    fn from(v: Snapshot) -> Self {
        SnapshotValue::Map(v)
    }
}

/// A string-keyed capture of one node's observable state.
///
/// Values may nest (maps, lists), so a group snapshot aggregates all
/// descendant snapshots under the descendants' own keys. Every getter
/// returns `Option`: restore tolerates missing keys by leaving the
/// corresponding property unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    entries: BTreeMap<String, SnapshotValue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn set(&mut self, key: &str, value: impl Into<SnapshotValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.entries.get(key)? {
            SnapshotValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn number_f32(&self, key: &str) -> Option<f32> {
        self.number(key).map(|n| n as f32)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            SnapshotValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            SnapshotValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn point(&self, key: &str) -> Option<Pos2> {
        match self.entries.get(key)? {
            SnapshotValue::Point([x, y]) => Some(Pos2::new(*x, *y)),
            _ => None,
        }
    }

    pub fn size(&self, key: &str) -> Option<Vec2> {
        match self.entries.get(key)? {
            SnapshotValue::Size([x, y]) => Some(Vec2::new(*x, *y)),
            _ => None,
        }
    }

    pub fn rect(&self, key: &str) -> Option<Rect> {
        match self.entries.get(key)? {
            SnapshotValue::Rect([x0, y0, x1, y1]) => {
                Some(Rect::from_min_max(Pos2::new(*x0, *y0), Pos2::new(*x1, *y1)))
            }
            _ => None,
        }
    }

    pub fn insets(&self, key: &str) -> Option<EdgeInsets> {
        match self.entries.get(key)? {
            SnapshotValue::Insets(i) => Some(*i),
            _ => None,
        }
    }

    pub fn transform(&self, key: &str) -> Option<Transform> {
        match self.entries.get(key)? {
            SnapshotValue::Transform(t) => Some(*t),
            _ => None,
        }
    }

    pub fn color(&self, key: &str) -> Option<[u8; 4]> {
        match self.entries.get(key)? {
            SnapshotValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Reconstructs a stored raster. Returns `None` when the recorded
    /// dimensions do not match the byte count.
    pub fn image(&self, key: &str) -> Option<RgbaImage> {
        match self.entries.get(key)? {
            SnapshotValue::Image {
                width,
                height,
                rgba,
            } => RgbaImage::from_raw(*width, *height, rgba.clone()),
            _ => None,
        }
    }

    pub fn map(&self, key: &str) -> Option<&Snapshot> {
        match self.entries.get(key)? {
            SnapshotValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[SnapshotValue]> {
        match self.entries.get(key)? {
            SnapshotValue::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    /// Strict variant of [`Snapshot::map`] for hosts that want a hard error
    /// on malformed persisted state instead of the tolerant no-op.
    pub fn try_map(&self, key: &str) -> Result<&Snapshot, SnapshotError> {
        match self.entries.get(key) {
            Some(SnapshotValue::Map(m)) => Ok(m),
            Some(other) => Err(SnapshotError::TypeMismatch {
                key: key.to_string(),
                expected: "map",
                found: other.variant_name(),
            }),
            None => Err(SnapshotError::TypeMismatch {
                key: key.to_string(),
                expected: "map",
                found: "nothing",
            }),
        }
    }

    /// Stores an ordered list of child-node records under `key`.
    pub fn set_records(&mut self, key: &str, records: Vec<NodeRecord>) {
        let list = records.into_iter().map(|r| r.into_value()).collect();
        self.entries.insert(key.to_string(), SnapshotValue::List(list));
    }

    /// Reads back an ordered list of child-node records. Entries that do not
    /// parse as records are skipped.
    pub fn records(&self, key: &str) -> Option<Vec<NodeRecord>> {
        let list = self.list(key)?;
        Some(list.iter().filter_map(NodeRecord::from_value).collect())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One entry of an ordered, membership-sensitive group snapshot: identity,
/// node type and per-node state all round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub node_type: String,
    pub state: Snapshot,
}

impl NodeRecord {
    pub fn new(id: NodeId, node_type: &str, state: Snapshot) -> Self {
        Self {
            id,
            node_type: node_type.to_string(),
            state,
        }
    }

    fn into_value(self) -> SnapshotValue {
        let mut map = Snapshot::new();
        map.set("id", self.id.to_string());
        map.set("type", self.node_type);
        map.set("state", self.state);
        SnapshotValue::Map(map)
    }

    fn from_value(value: &SnapshotValue) -> Option<Self> {
        let map = match value {
            SnapshotValue::Map(m) => m,
            _ => return None,
        };
        let id = NodeId::parse(map.text("id")?)?;
        let node_type = map.text("type")?.to_string();
        let state = map.map("state").cloned().unwrap_or_default();
        Some(Self {
            id,
            node_type,
            state,
        })
    }
}

/// Recursive state capture and rehydration.
///
/// `restore` applies the captured values without tearing the receiver down;
/// missing keys leave the matching property at its current value, which is
/// what makes partial snapshots forward and backward compatible.
pub trait Snapshotable {
    fn snapshot(&self) -> Snapshot;
    fn restore(&mut self, snapshot: &Snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_return_none() {
        let snapshot = Snapshot::new();
        assert!(snapshot.number("nope").is_none());
        assert!(snapshot.rect("nope").is_none());
    }

    #[test]
    fn wrong_variant_returns_none() {
        let mut snapshot = Snapshot::new();
        snapshot.set("x", 1.0f64);
        assert!(snapshot.text("x").is_none());
        assert!(snapshot.number("x").is_some());
    }

    #[test]
    fn records_round_trip_in_order() {
        let a = NodeRecord::new(NodeId::new(), "text", Snapshot::new());
        let b = NodeRecord::new(NodeId::new(), "sticker", Snapshot::new());
        let mut snapshot = Snapshot::new();
        snapshot.set_records("children", vec![a.clone(), b.clone()]);

        let back = snapshot.records("children").unwrap();
        assert_eq!(back, vec![a, b]);
    }

    #[test]
    fn json_round_trip() {
        let mut snapshot = Snapshot::new();
        snapshot.set("opacity", 0.5f64);
        snapshot.set("name", "title");
        snapshot.set("frame", egui::Rect::from_min_max(Pos2::ZERO, Pos2::new(4.0, 4.0)));

        let json = snapshot.to_json().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
