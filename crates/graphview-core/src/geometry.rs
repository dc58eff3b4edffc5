//! Geometric primitives for graph scenes and viewports.
//!
//! # Overview
//!
//! - [`Point`] - A 2D coordinate, either in model space or screen space
//! - [`Size`] - Width and height dimensions
//! - [`Bounds`] - An axis-aligned bounding box defined by minimum and maximum coordinates
//! - [`Insets`] - Padding values for four sides
//!
//! # Coordinate System
//!
//! Model coordinates follow the screen convention used by graph-drawing
//! engines:
//!
//! ```text
//!   (0,0) ────────► +X
//!     │
//!     │
//!     ▼
//!    +Y
//! ```
//!
//! Node positions are node *centers*. A rendered (screen-space) position is
//! `model * zoom + pan`.

use serde::{Deserialize, Serialize};

/// A 2D point.
///
/// # Examples
///
/// ```
/// # use graphview_core::geometry::Point;
/// let from = Point::new(10.0, 10.0);
/// let to = Point::new(10.5, 13.0);
///
/// // Largest per-axis movement
/// assert_eq!(from.max_axis_delta(to), 3.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(self) -> f32 {
        self.x
    }

    pub fn y(self) -> f32 {
        self.y
    }

    /// Checks if both x and y coordinates are zero.
    ///
    /// Snapshots use the origin as the "not yet positioned" sentinel.
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Component-wise sum.
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Component-wise difference.
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Returns `max(|dx|, |dy|)` between this point and `other`.
    pub fn max_axis_delta(self, other: Point) -> f32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Box of `size` centered on this point.
    pub fn to_bounds(self, size: Size) -> Bounds {
        let (half_width, half_height) = (size.width / 2.0, size.height / 2.0);
        Bounds::new(
            self.x - half_width,
            self.y - half_height,
            self.x + half_width,
            self.y + half_height,
        )
    }
}

/// Width and height of a node shape, label box or canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }
}

/// Axis-aligned box, used for fit targets and label extents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn min_x(self) -> f32 {
        self.min_x
    }

    pub fn min_y(self) -> f32 {
        self.min_y
    }

    pub fn max_x(self) -> f32 {
        self.max_x
    }

    pub fn max_y(self) -> f32 {
        self.max_y
    }

    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn to_size(self) -> Size {
        Size {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Merges two bounds into the smallest bounds containing both.
    ///
    /// # Examples
    ///
    /// ```
    /// # use graphview_core::geometry::{Bounds, Point, Size};
    /// let a = Point::new(0.0, 0.0).to_bounds(Size::new(10.0, 10.0));
    /// let b = Point::new(100.0, 50.0).to_bounds(Size::new(10.0, 10.0));
    ///
    /// let both = a.merge(&b);
    /// assert_eq!(both.width(), 110.0);
    /// assert_eq!(both.height(), 60.0);
    /// ```
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Merges an iterator of bounds, returning `None` when it is empty.
    pub fn merge_all(bounds: impl IntoIterator<Item = Bounds>) -> Option<Self> {
        bounds.into_iter().reduce(|acc, next| acc.merge(&next))
    }
}

/// Per-side padding, e.g. the space host panels cover on each canvas edge.
///
/// Missing sides deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Insets {
    #[serde(default)]
    top: f32,
    #[serde(default)]
    right: f32,
    #[serde(default)]
    bottom: f32,
    #[serde(default)]
    left: f32,
}

impl Insets {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn top(self) -> f32 {
        self.top
    }

    pub fn right(self) -> f32 {
        self.right
    }

    pub fn bottom(self) -> f32 {
        self.bottom
    }

    pub fn left(self) -> f32 {
        self.left
    }

    /// Adds `amount` to every side.
    pub fn grow(self, amount: f32) -> Self {
        Self {
            top: self.top + amount,
            right: self.right + amount,
            bottom: self.bottom + amount,
            left: self.left + amount,
        }
    }

    pub fn horizontal_sum(self) -> f32 {
        self.left + self.right
    }

    pub fn vertical_sum(self) -> f32 {
        self.top + self.bottom
    }
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn bounds_strategy() -> impl Strategy<Value = Bounds> {
        (
            -1000.0f32..1000.0,
            -1000.0f32..1000.0,
            1.0f32..500.0,
            1.0f32..500.0,
        )
            .prop_map(|(x, y, w, h)| Point::new(x, y).to_bounds(Size::new(w, h)))
    }

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    /// The axis delta is symmetric and never exceeds the Euclidean distance.
    fn check_max_axis_delta(p1: Point, p2: Point) -> Result<(), TestCaseError> {
        let delta = p1.max_axis_delta(p2);
        prop_assert!(approx_eq!(f32, delta, p2.max_axis_delta(p1)));

        let euclid = p1.sub_point(p2);
        let distance = euclid.x().hypot(euclid.y());
        prop_assert!(delta <= distance + 0.001);
        Ok(())
    }

    /// A merge covers both inputs.
    fn check_bounds_merge_contains_both(b1: Bounds, b2: Bounds) -> Result<(), TestCaseError> {
        let merged = b1.merge(&b2);

        for b in [b1, b2] {
            prop_assert!(merged.min_x() <= b.min_x() + 0.001);
            prop_assert!(merged.min_y() <= b.min_y() + 0.001);
            prop_assert!(merged.max_x() >= b.max_x() - 0.001);
            prop_assert!(merged.max_y() >= b.max_y() - 0.001);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn max_axis_delta_is_symmetric(p1 in point_strategy(), p2 in point_strategy()) {
            check_max_axis_delta(p1, p2)?;
        }

        #[test]
        fn bounds_merge_contains_both(b1 in bounds_strategy(), b2 in bounds_strategy()) {
            check_bounds_merge_contains_both(b1, b2)?;
        }
    }
}
