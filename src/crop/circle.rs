use egui::{Pos2, Rect, Vec2};
use log::trace;

use crate::crop::CanvasMapping;

/// Radius bounds as fractions of the shorter frame edge.
pub const MIN_RADIUS_FRACTION: f32 = 0.1;
pub const MAX_RADIUS_FRACTION: f32 = 0.5;
/// Default radius after `reset`.
pub const DEFAULT_RADIUS_FRACTION: f32 = 0.4;

/// Inside band, in working-space units from the circle's edge, within which
/// a pointer-down means "scale". Deeper inside means "move"; outside the
/// circle no sector qualifies.
const BOUNDARY_BAND: f32 = 40.0;

/// How a drag on the circle region is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleSector {
    /// Translate the circle, clamped to the frame.
    Move,
    /// Resize around the fixed center.
    Scale,
}

#[derive(Debug, Clone, Copy)]
struct CircleDrag {
    sector: CircleSector,
    begin_center: Pos2,
    begin_radius: f32,
    origin: Pos2,
}

/// Interactive circle-crop region.
///
/// Center is stored as fractions of the virtual frame, radius as a fraction
/// of the shorter frame edge, so the region survives zoom and pan;
/// `actual_center`/`actual_radius` convert through the supplied
/// [`CanvasMapping`] on demand.
#[derive(Debug)]
pub struct CircleCropHandler {
    center: Pos2,
    radius: f32,
    drag: Option<CircleDrag>,
}

impl Default for CircleCropHandler {
    fn default() -> Self {
        Self {
            center: Pos2::new(0.5, 0.5),
            radius: DEFAULT_RADIUS_FRACTION,
            drag: None,
        }
    }
}

impl CircleCropHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized center, each coordinate a fraction of the frame.
    pub fn center(&self) -> Pos2 {
        self.center
    }

    /// Normalized radius, a fraction of the shorter frame edge.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn working_center(&self, frame: Rect) -> Pos2 {
        Pos2::new(
            frame.min.x + self.center.x * frame.width(),
            frame.min.y + self.center.y * frame.height(),
        )
    }

    fn working_radius(&self, frame: Rect) -> f32 {
        self.radius * shorter_edge(frame)
    }

    /// Pointer-down: picks move/scale from the down location. Outside the
    /// circle no sector qualifies and the gesture is ignored.
    pub fn begin(&mut self, pos: Pos2, mapping: &dyn CanvasMapping) -> bool {
        let frame = mapping.virtual_frame();
        let center = self.working_center(frame);
        let radius = self.working_radius(frame);
        let distance = pos.distance(center);
        if distance > radius {
            return false;
        }
        let sector = if radius - distance <= BOUNDARY_BAND {
            CircleSector::Scale
        } else {
            CircleSector::Move
        };
        trace!("circle crop: begin drag in {sector:?}");
        self.drag = Some(CircleDrag {
            sector,
            begin_center: self.center,
            begin_radius: self.radius,
            origin: pos,
        });
        true
    }

    pub fn update(&mut self, pos: Pos2, mapping: &dyn CanvasMapping) {
        let Some(drag) = self.drag else { return };
        let frame = mapping.virtual_frame();
        if frame.width() <= 0.0 || frame.height() <= 0.0 {
            return;
        }
        match drag.sector {
            CircleSector::Move => {
                let delta = pos - drag.origin;
                let begin_working = Pos2::new(
                    frame.min.x + drag.begin_center.x * frame.width(),
                    frame.min.y + drag.begin_center.y * frame.height(),
                );
                let moved = begin_working + delta;
                let clamped = clamp_center(moved, self.working_radius(frame), frame);
                self.center = Pos2::new(
                    (clamped.x - frame.min.x) / frame.width(),
                    (clamped.y - frame.min.y) / frame.height(),
                );
            }
            CircleSector::Scale => {
                let center = Pos2::new(
                    frame.min.x + drag.begin_center.x * frame.width(),
                    frame.min.y + drag.begin_center.y * frame.height(),
                );
                // Scale factor is distance-from-center over the original
                // radius; applied to the working radius that is just the
                // pointer's distance from the center.
                let shorter = shorter_edge(frame);
                let begin_working_radius = drag.begin_radius * shorter;
                if begin_working_radius <= 0.0 {
                    return;
                }
                let factor = pos.distance(center) / begin_working_radius;
                let radius = (begin_working_radius * factor)
                    .clamp(MIN_RADIUS_FRACTION * shorter, MAX_RADIUS_FRACTION * shorter);
                self.radius = radius / shorter;
                // Re-center so the grown circle still respects the frame.
                let clamped = clamp_center(center, radius, frame);
                self.center = Pos2::new(
                    (clamped.x - frame.min.x) / frame.width(),
                    (clamped.y - frame.min.y) / frame.height(),
                );
            }
        }
    }

    /// Pointer-up: commit.
    pub fn end(&mut self) {
        self.drag = None;
    }

    /// Pointer-cancel: restores the region captured at pointer-down.
    pub fn cancel(&mut self) {
        if let Some(drag) = self.drag.take() {
            trace!("circle crop: cancel drag, restoring begin region");
            self.center = drag.begin_center;
            self.radius = drag.begin_radius;
        }
    }

    /// Recomputes the default centered region.
    pub fn reset(&mut self) {
        self.drag = None;
        self.center = Pos2::new(0.5, 0.5);
        self.radius = DEFAULT_RADIUS_FRACTION;
    }

    /// Circle center in absolute image pixel space.
    pub fn actual_center(&self, mapping: &dyn CanvasMapping) -> Pos2 {
        let frame = mapping.virtual_frame();
        mapping.to_image_point(self.working_center(frame))
    }

    /// Circle radius in absolute image pixels.
    pub fn actual_radius(&self, mapping: &dyn CanvasMapping) -> f32 {
        let frame = mapping.virtual_frame();
        let center = self.working_center(frame);
        let edge = center + Vec2::new(self.working_radius(frame), 0.0);
        mapping
            .to_image_point(center)
            .distance(mapping.to_image_point(edge))
    }
}

fn shorter_edge(frame: Rect) -> f32 {
    frame.width().min(frame.height())
}

/// Clamps a working-space center so the circle never crosses the frame
/// boundary; axes where the circle does not fit collapse to the middle.
fn clamp_center(center: Pos2, radius: f32, frame: Rect) -> Pos2 {
    let x = if 2.0 * radius >= frame.width() {
        frame.center().x
    } else {
        center.x.clamp(frame.min.x + radius, frame.max.x - radius)
    };
    let y = if 2.0 * radius >= frame.height() {
        frame.center().y
    } else {
        center.y.clamp(frame.min.y + radius, frame.max.y - radius)
    };
    Pos2::new(x, y)
}
