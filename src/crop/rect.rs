use egui::{Pos2, Rect, Vec2};
use log::trace;

use crate::crop::CanvasMapping;
use crate::geometry::{fit_rect, segment_distance, EdgeInsets};

/// Pointer-down tolerance: beyond this working-space distance from every
/// candidate, no sector qualifies and the gesture is ignored.
pub const SECTOR_TOLERANCE: f32 = 100.0;

/// The part of the crop rect a drag gesture is interpreted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectSector {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

impl RectSector {
    fn is_corner(self) -> bool {
        matches!(
            self,
            RectSector::TopLeft
                | RectSector::TopRight
                | RectSector::BottomLeft
                | RectSector::BottomRight
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct RectDrag {
    sector: RectSector,
    begin: EdgeInsets,
    origin: Pos2,
}

/// Interactive rect-crop region.
///
/// The region is stored as normalized, frame-relative insets (fractions of
/// the virtual frame), so it survives zoom, pan and rotation changes;
/// `actual_edge_insets` converts to image space through the supplied
/// [`CanvasMapping`] on demand.
#[derive(Debug, Default)]
pub struct RectCropHandler {
    insets: EdgeInsets,
    aspect_ratio: Option<f32>,
    drag: Option<RectDrag>,
}

impl RectCropHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized frame-relative insets, each in `0..=1`.
    pub fn insets(&self) -> EdgeInsets {
        self.insets
    }

    pub fn set_insets(&mut self, insets: EdgeInsets) {
        self.insets = insets.clamped_to_size(Vec2::splat(1.0));
    }

    /// Width-over-height lock, if any.
    pub fn aspect_ratio(&self) -> Option<f32> {
        self.aspect_ratio
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: Option<f32>) {
        self.aspect_ratio = aspect_ratio.filter(|a| *a > 0.0);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The crop rect in working space for a given frame.
    pub fn crop_rect(&self, frame: Rect) -> Rect {
        self.working_insets(frame).shrink(frame)
    }

    fn working_insets(&self, frame: Rect) -> EdgeInsets {
        EdgeInsets {
            top: self.insets.top * frame.height(),
            left: self.insets.left * frame.width(),
            bottom: self.insets.bottom * frame.height(),
            right: self.insets.right * frame.width(),
        }
    }

    /// Pointer-down: captures the current region and picks the sector
    /// nearest to `pos`. Returns false (and ignores the gesture) when no
    /// sector is within tolerance.
    pub fn begin(&mut self, pos: Pos2, mapping: &dyn CanvasMapping) -> bool {
        let frame = mapping.virtual_frame();
        let Some(sector) = sector_at(pos, self.crop_rect(frame)) else {
            return false;
        };
        trace!("rect crop: begin drag in {sector:?}");
        self.drag = Some(RectDrag {
            sector,
            begin: self.insets,
            origin: pos,
        });
        true
    }

    /// Pointer-move: translates the captured sector into an inset delta,
    /// recomputed from the gesture's start-of-drag region on every event.
    pub fn update(&mut self, pos: Pos2, mapping: &dyn CanvasMapping) {
        let Some(drag) = self.drag else { return };
        let frame = mapping.virtual_frame();
        if frame.width() <= 0.0 || frame.height() <= 0.0 {
            return;
        }
        let delta = pos - drag.origin;
        let dx = delta.x / frame.width();
        let dy = delta.y / frame.height();
        let begin = drag.begin;

        // Each adjusted inset is clamped against the opposite side's
        // remaining room; the pinned sides keep their pre-drag values.
        let clamp_pair = |value: f32, opposite: f32| value.clamp(0.0, (1.0 - opposite).max(0.0));

        let mut next = begin;
        match drag.sector {
            RectSector::TopLeft => {
                next.top = clamp_pair(begin.top + dy, begin.bottom);
                next.left = clamp_pair(begin.left + dx, begin.right);
            }
            RectSector::TopRight => {
                next.top = clamp_pair(begin.top + dy, begin.bottom);
                next.right = clamp_pair(begin.right - dx, begin.left);
            }
            RectSector::BottomLeft => {
                next.bottom = clamp_pair(begin.bottom - dy, begin.top);
                next.left = clamp_pair(begin.left + dx, begin.right);
            }
            RectSector::BottomRight => {
                next.bottom = clamp_pair(begin.bottom - dy, begin.top);
                next.right = clamp_pair(begin.right - dx, begin.left);
            }
            RectSector::Top => next.top = clamp_pair(begin.top + dy, begin.bottom),
            RectSector::Bottom => next.bottom = clamp_pair(begin.bottom - dy, begin.top),
            RectSector::Left => next.left = clamp_pair(begin.left + dx, begin.right),
            RectSector::Right => next.right = clamp_pair(begin.right - dx, begin.left),
            RectSector::Center => {
                // Pan without resizing: one shared delta, clamped so the
                // rect never leaves the frame.
                let dx = dx.clamp(-begin.left, begin.right);
                let dy = dy.clamp(-begin.top, begin.bottom);
                next.left = begin.left + dx;
                next.right = begin.right - dx;
                next.top = begin.top + dy;
                next.bottom = begin.bottom - dy;
            }
        }

        if drag.sector.is_corner() {
            if let Some(aspect) = self.aspect_ratio {
                next = aspect_corrected(next, begin, drag.sector, aspect, frame);
            }
        }
        self.insets = next.clamped_to_size(Vec2::splat(1.0));
    }

    /// Pointer-up: commit. The region stays as dragged.
    pub fn end(&mut self) {
        self.drag = None;
    }

    /// Pointer-cancel: restores the region captured at pointer-down.
    pub fn cancel(&mut self) {
        if let Some(drag) = self.drag.take() {
            trace!("rect crop: cancel drag, restoring begin region");
            self.insets = drag.begin;
        }
    }

    /// Recomputes the default region: zero insets, or a centered aspect-fit
    /// when the aspect lock is on.
    pub fn reset(&mut self, mapping: &dyn CanvasMapping) {
        self.drag = None;
        self.insets = match self.aspect_ratio {
            None => EdgeInsets::ZERO,
            Some(aspect) => {
                let frame = mapping.virtual_frame();
                let fitted = fit_rect(Vec2::new(aspect, 1.0), frame);
                normalized_between(frame, fitted)
            }
        };
    }

    /// The crop insets in absolute image pixel space.
    pub fn actual_edge_insets(&self, mapping: &dyn CanvasMapping) -> EdgeInsets {
        let frame = mapping.virtual_frame();
        let image_frame = mapping.to_image_rect(frame);
        let image_crop = mapping.to_image_rect(self.crop_rect(frame));
        EdgeInsets::between(image_frame, image_crop)
    }
}

fn normalized_between(frame: Rect, inner: Rect) -> EdgeInsets {
    let insets = EdgeInsets::between(frame, inner);
    EdgeInsets {
        top: insets.top / frame.height(),
        left: insets.left / frame.width(),
        bottom: insets.bottom / frame.height(),
        right: insets.right / frame.width(),
    }
    .clamped_to_size(Vec2::splat(1.0))
}

/// Picks the sector whose handle is nearest to `pos`, corners winning ties
/// with edges, within [`SECTOR_TOLERANCE`].
fn sector_at(pos: Pos2, rect: Rect) -> Option<RectSector> {
    let mut candidates: Vec<(RectSector, f32)> = vec![
        (RectSector::TopLeft, pos.distance(rect.left_top())),
        (RectSector::TopRight, pos.distance(rect.right_top())),
        (RectSector::BottomLeft, pos.distance(rect.left_bottom())),
        (RectSector::BottomRight, pos.distance(rect.right_bottom())),
        (
            RectSector::Top,
            segment_distance(pos, rect.left_top(), rect.right_top()),
        ),
        (
            RectSector::Bottom,
            segment_distance(pos, rect.left_bottom(), rect.right_bottom()),
        ),
        (
            RectSector::Left,
            segment_distance(pos, rect.left_top(), rect.left_bottom()),
        ),
        (
            RectSector::Right,
            segment_distance(pos, rect.right_top(), rect.right_bottom()),
        ),
    ];
    if rect.contains(pos) {
        candidates.push((RectSector::Center, pos.distance(rect.center())));
    }

    let mut best: Option<(RectSector, f32)> = None;
    for (sector, distance) in candidates {
        match best {
            Some((_, nearest)) if distance >= nearest => {}
            _ => best = Some((sector, distance)),
        }
    }
    best.filter(|(_, distance)| *distance <= SECTOR_TOLERANCE)
        .map(|(sector, _)| sector)
}

/// Post-hoc aspect correction for corner drags: aspect-fit against the
/// dragged rect, then pin the two non-adjusted sides to their pre-drag
/// insets.
fn aspect_corrected(
    next: EdgeInsets,
    begin: EdgeInsets,
    sector: RectSector,
    aspect: f32,
    frame: Rect,
) -> EdgeInsets {
    let dragged = EdgeInsets {
        top: next.top * frame.height(),
        left: next.left * frame.width(),
        bottom: next.bottom * frame.height(),
        right: next.right * frame.width(),
    }
    .shrink(frame);
    if dragged.width() <= 0.0 || dragged.height() <= 0.0 {
        return next;
    }

    let fitted = fit_rect(Vec2::new(aspect, 1.0), dragged);
    let size = fitted.size();

    // Anchor the corrected rect at the pinned corner.
    let corrected = match sector {
        RectSector::TopLeft => Rect::from_min_max(dragged.max - size, dragged.max),
        RectSector::TopRight => Rect::from_min_max(
            Pos2::new(dragged.min.x, dragged.max.y - size.y),
            Pos2::new(dragged.min.x + size.x, dragged.max.y),
        ),
        RectSector::BottomLeft => Rect::from_min_max(
            Pos2::new(dragged.max.x - size.x, dragged.min.y),
            Pos2::new(dragged.max.x, dragged.min.y + size.y),
        ),
        RectSector::BottomRight => Rect::from_min_max(dragged.min, dragged.min + size),
        _ => return next,
    };

    let mut corrected = normalized_between(frame, corrected);
    match sector {
        RectSector::TopLeft => {
            corrected.bottom = begin.bottom;
            corrected.right = begin.right;
        }
        RectSector::TopRight => {
            corrected.bottom = begin.bottom;
            corrected.left = begin.left;
        }
        RectSector::BottomLeft => {
            corrected.top = begin.top;
            corrected.right = begin.right;
        }
        RectSector::BottomRight => {
            corrected.top = begin.top;
            corrected.left = begin.left;
        }
        _ => {}
    }
    corrected
}
