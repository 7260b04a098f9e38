use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Distances from the four edges of a rectangle.
///
/// Used both for normalized crop regions (fractions of a frame) and for
/// absolute pixel insets; the unit is whatever the caller puts in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl EdgeInsets {
    pub const ZERO: EdgeInsets = EdgeInsets {
        top: 0.0,
        left: 0.0,
        bottom: 0.0,
        right: 0.0,
    };

    pub fn new(top: f32, left: f32, bottom: f32, right: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.left == 0.0 && self.bottom == 0.0 && self.right == 0.0
    }

    /// Shrinks `rect` by these insets. The result never inverts; if the
    /// insets exceed the rect's size the result collapses to a point.
    pub fn shrink(&self, rect: Rect) -> Rect {
        let min = Pos2::new(rect.min.x + self.left, rect.min.y + self.top);
        let max = Pos2::new(
            (rect.max.x - self.right).max(min.x),
            (rect.max.y - self.bottom).max(min.y),
        );
        Rect::from_min_max(min, max)
    }

    /// Multiplies every inset by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            top: self.top * factor,
            left: self.left * factor,
            bottom: self.bottom * factor,
            right: self.right * factor,
        }
    }

    /// Clamps the insets so that `left + right <= size.x` and
    /// `top + bottom <= size.y`, with no inset going negative.
    pub fn clamped_to_size(&self, size: Vec2) -> Self {
        let left = self.left.clamp(0.0, size.x);
        let right = self.right.clamp(0.0, size.x - left);
        let top = self.top.clamp(0.0, size.y);
        let bottom = self.bottom.clamp(0.0, size.y - top);
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Derives the insets of `inner` relative to `outer`.
    pub fn between(outer: Rect, inner: Rect) -> Self {
        Self {
            top: inner.min.y - outer.min.y,
            left: inner.min.x - outer.min.x,
            bottom: outer.max.y - inner.max.y,
            right: outer.max.x - inner.max.x,
        }
    }
}

/// An affine transform applied to freely placed items: translation, per-axis
/// scale and rotation around a pivot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    /// Position offset from the original position
    pub translation: Vec2,
    /// Scale factor (1.0 = original size)
    pub scale: Vec2,
    /// Rotation in radians
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            translation: Vec2::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
        }
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_translation(translation: Vec2) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Computes the transformation matrix with rotation around `pivot`.
    ///
    /// Screen space has y pointing down, so the sign of the sin components
    /// is flipped relative to the textbook rotation matrix to keep rotation
    /// direction consistent.
    pub fn to_matrix_with_pivot(&self, pivot: Vec2) -> [[f32; 3]; 3] {
        let cos = self.rotation.cos();
        let sin = self.rotation.sin();

        // Translate to pivot, scale, rotate, translate back plus offset.
        let mut result = [
            [1.0, 0.0, -pivot.x],
            [0.0, 1.0, -pivot.y],
            [0.0, 0.0, 1.0],
        ];
        result = multiply_matrices(
            &[
                [self.scale.x, 0.0, 0.0],
                [0.0, self.scale.y, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &result,
        );
        result = multiply_matrices(
            &[[cos, sin, 0.0], [-sin, cos, 0.0], [0.0, 0.0, 1.0]],
            &result,
        );
        multiply_matrices(
            &[
                [1.0, 0.0, pivot.x + self.translation.x],
                [0.0, 1.0, pivot.y + self.translation.y],
                [0.0, 0.0, 1.0],
            ],
            &result,
        )
    }

    pub fn to_matrix(&self) -> [[f32; 3]; 3] {
        self.to_matrix_with_pivot(Vec2::ZERO)
    }

    /// Applies the transform to a point (pivot at the origin).
    pub fn apply(&self, point: Pos2) -> Pos2 {
        let m = self.to_matrix();
        Pos2::new(
            m[0][0] * point.x + m[0][1] * point.y + m[0][2],
            m[1][0] * point.x + m[1][1] * point.y + m[1][2],
        )
    }

    /// Composes `other` on top of this transform.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            translation: self.translation + other.translation,
            scale: Vec2::new(self.scale.x * other.scale.x, self.scale.y * other.scale.y),
            rotation: self.rotation + other.rotation,
        }
    }
}

fn multiply_matrices(a: &[[f32; 3]; 3], b: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut result = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    result
}

/// Largest rect of aspect ratio `size.x / size.y` that fits inside `bounds`,
/// centered.
pub fn fit_rect(size: Vec2, bounds: Rect) -> Rect {
    if size.x <= 0.0 || size.y <= 0.0 || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Rect::from_center_size(bounds.center(), Vec2::ZERO);
    }
    let scale = (bounds.width() / size.x).min(bounds.height() / size.y);
    Rect::from_center_size(bounds.center(), size * scale)
}

/// Distance from `point` to the segment `a`-`b`.
pub fn segment_distance(point: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_never_inverts() {
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(10.0, 10.0));
        let insets = EdgeInsets::new(8.0, 8.0, 8.0, 8.0);
        let shrunk = insets.shrink(rect);
        assert!(shrunk.width() >= 0.0);
        assert!(shrunk.height() >= 0.0);
    }

    #[test]
    fn clamped_to_size_respects_pair_sums() {
        let insets = EdgeInsets::new(80.0, 70.0, 60.0, 50.0);
        let clamped = insets.clamped_to_size(Vec2::new(100.0, 100.0));
        assert!(clamped.left + clamped.right <= 100.0);
        assert!(clamped.top + clamped.bottom <= 100.0);
    }

    #[test]
    fn fit_rect_preserves_aspect() {
        let bounds = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 50.0));
        let fitted = fit_rect(Vec2::new(1.0, 1.0), bounds);
        assert!((fitted.width() - fitted.height()).abs() < 1e-4);
        assert!((fitted.width() - 50.0).abs() < 1e-4);
        assert_eq!(fitted.center(), bounds.center());
    }

    #[test]
    fn transform_translation_applies() {
        let t = Transform::from_translation(Vec2::new(3.0, 4.0));
        let p = t.apply(Pos2::new(1.0, 1.0));
        assert!((p.x - 4.0).abs() < 1e-5);
        assert!((p.y - 5.0).abs() < 1e-5);
    }
}
