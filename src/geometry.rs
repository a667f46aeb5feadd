// yolo-detect 🚀 AGPL-3.0 License

//! Axis-aligned rectangle primitives shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in `(left, top, right, bottom)` form.
///
/// Serializes as a plain `[left, top, right, bottom]` array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "[f32; 4]", from = "[f32; 4]")]
pub struct Rect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl Rect {
    /// Create a rectangle from its four edges.
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle from a center point and a size.
    #[must_use]
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let (half_w, half_h) = (w / 2.0, h / 2.0);
        Self::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    /// Width, never negative.
    #[must_use]
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    /// Height, never negative.
    #[must_use]
    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    /// Area using `max(0, right-left) * max(0, bottom-top)`.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Center point `(x, y)`.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Whether the rectangle has strictly positive extent on both axes.
    ///
    /// NaN edges make a rectangle invalid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }

    /// Clamp every edge: x edges to `[x_min, x_max]`, y edges to `[y_min, y_max]`.
    #[must_use]
    pub fn clamp(&self, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        Self::new(
            self.left.clamp(x_min, x_max),
            self.top.clamp(y_min, y_max),
            self.right.clamp(x_min, x_max),
            self.bottom.clamp(y_min, y_max),
        )
    }

    /// Area of the overlap with `other`.
    #[must_use]
    pub fn intersection_area(&self, other: &Self) -> f32 {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);

        (right - left).max(0.0) * (bottom - top).max(0.0)
    }

    /// Intersection over Union with `other`, in `[0, 1]`.
    ///
    /// Returns `0.0` when the union is empty.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Edges as `[left, top, right, bottom]`.
    #[must_use]
    pub const fn to_array(&self) -> [f32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}

impl From<[f32; 4]> for Rect {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [f32; 4] {
    fn from(r: Rect) -> Self {
        r.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_partial_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 15.0);
        assert!((a.iou(&b) - 0.142_857).abs() < 0.001); // 25 / (100 + 100 - 25)
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = Rect::new(10.0, 10.0, 50.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let far = Rect::new(100.0, 100.0, 110.0, 110.0);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn test_iou_empty_union() {
        let a = Rect::new(5.0, 5.0, 5.0, 5.0);
        let b = Rect::new(1.0, 1.0, 1.0, 3.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_inverted_rect_has_zero_area() {
        let r = Rect::new(10.0, 10.0, 0.0, 20.0);
        assert_eq!(r.area(), 0.0);
        assert!(!r.is_valid());
    }

    #[test]
    fn test_nan_rect_is_invalid() {
        let r = Rect::new(f32::NAN, 0.0, 10.0, 10.0);
        assert!(!r.is_valid());
    }

    #[test]
    fn test_from_center() {
        let r = Rect::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(r, Rect::new(40.0, 35.0, 60.0, 45.0));
        assert_eq!(r.center(), (50.0, 40.0));
    }

    #[test]
    fn test_clamp() {
        let r = Rect::new(-10.0, -20.0, 700.0, 500.0).clamp(0.0, 640.0, 0.0, 480.0);
        assert_eq!(r, Rect::new(0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn test_serializes_as_array() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(serde_json::to_string(&r).unwrap(), "[1.0,2.0,3.0,4.0]");
        let back: Rect = serde_json::from_str("[1.0,2.0,3.0,4.0]").unwrap();
        assert_eq!(back, r);
    }
}
