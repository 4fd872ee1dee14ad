//! Basic geometric types for PDF
//!
//! Coordinates follow PDF user space: the origin is the lower-left corner of
//! the page and `y` grows upwards. A [`Rectangle`] is anchored at its
//! lower-left corner, so "moving down" decreases `y`.

/// Tolerance used when comparing layout lengths
pub const EPS: f64 = 1e-4;

/// A point in 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Origin point (0, 0)
    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Rotate counter-clockwise by `angle` radians around `center`.
    pub fn rotate_around(&self, center: Point, angle: f64) -> Point {
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
    }
}

/// A mutable axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning two corners given in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn get_left(&self) -> f64 {
        self.x
    }

    pub fn get_bottom(&self) -> f64 {
        self.y
    }

    pub fn get_right(&self) -> f64 {
        self.x + self.width
    }

    pub fn get_top(&self) -> f64 {
        self.y + self.height
    }

    pub fn move_down(&mut self, delta: f64) -> &mut Self {
        self.y -= delta;
        self
    }

    pub fn move_up(&mut self, delta: f64) -> &mut Self {
        self.y += delta;
        self
    }

    pub fn move_right(&mut self, delta: f64) -> &mut Self {
        self.x += delta;
        self
    }

    pub fn move_left(&mut self, delta: f64) -> &mut Self {
        self.x -= delta;
        self
    }

    pub fn set_x(&mut self, x: f64) -> &mut Self {
        self.x = x;
        self
    }

    pub fn set_y(&mut self, y: f64) -> &mut Self {
        self.y = y;
        self
    }

    pub fn set_width(&mut self, width: f64) -> &mut Self {
        self.width = width;
        self
    }

    pub fn set_height(&mut self, height: f64) -> &mut Self {
        self.height = height;
        self
    }

    /// Grow at the bottom edge; the top stays put.
    pub fn increase_height(&mut self, delta: f64) -> &mut Self {
        self.y -= delta;
        self.height += delta;
        self
    }

    /// Shrink from the bottom edge; the top stays put.
    pub fn decrease_height(&mut self, delta: f64) -> &mut Self {
        self.y += delta;
        self.height -= delta;
        self
    }

    /// Shrink from the top edge; the bottom stays put.
    pub fn cut_top(&mut self, delta: f64) -> &mut Self {
        self.height -= delta;
        self
    }

    /// Shrink (or with `reverse`, grow) by the four edge widths.
    pub fn apply_margins(&mut self, top: f64, right: f64, bottom: f64, left: f64, reverse: bool) -> &mut Self {
        let sign = if reverse { -1.0 } else { 1.0 };
        self.x += sign * left;
        self.y += sign * bottom;
        self.width -= sign * (left + right);
        self.height -= sign * (top + bottom);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.width <= EPS || self.height <= EPS
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.get_right().max(other.get_right());
        let top = self.get_top().max(other.get_top());
        Rectangle::new(x, y, right - x, top - y)
    }

    /// Overlap of both rectangles, if any
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.get_right().min(other.get_right());
        let top = self.get_top().min(other.get_top());
        if right - x > EPS && top - y > EPS {
            Some(Rectangle::new(x, y, right - x, top - y))
        } else {
            None
        }
    }

    /// True if the vertical extents overlap
    pub fn overlaps_vertically(&self, other: &Rectangle) -> bool {
        self.y < other.get_top() - EPS && other.y < self.get_top() - EPS
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.get_right(), self.y),
            Point::new(self.get_right(), self.get_top()),
            Point::new(self.x, self.get_top()),
        ]
    }

    /// Axis-aligned envelope of this rectangle rotated around `center`
    pub fn rotated_envelope(&self, center: Point, angle: f64) -> Rectangle {
        let corners = self.corners().map(|c| c.rotate_around(center, angle));
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        Rectangle::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Get the center point
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Compare with a layout tolerance
    pub fn approx_eq(&self, other: &Rectangle) -> bool {
        (self.x - other.x).abs() < EPS
            && (self.y - other.y).abs() < EPS
            && (self.width - other.width).abs() < EPS
            && (self.height - other.height).abs() < EPS
    }
}
