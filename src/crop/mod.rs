use egui::{Pos2, Rect};

pub mod circle;
pub mod rect;

pub use circle::{CircleCropHandler, CircleSector};
pub use rect::{RectCropHandler, RectSector};

/// Coordinate-mapping collaborator supplied to the crop handlers.
///
/// Handlers keep their regions normalized against the virtual frame, so
/// they never touch a display surface directly; this indirection is what
/// keeps a region correct across arbitrary zoom and pan.
pub trait CanvasMapping {
    /// The visible virtual frame in the handler's working coordinate space.
    fn virtual_frame(&self) -> Rect;

    /// Current zoom scale (working units per image pixel).
    fn zoom_scale(&self) -> f32;

    /// Maps a working-space point into absolute image pixel space.
    fn to_image_point(&self, point: Pos2) -> Pos2;

    /// Maps a working-space rect into absolute image pixel space.
    fn to_image_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.to_image_point(rect.min), self.to_image_point(rect.max))
    }
}
