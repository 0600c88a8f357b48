//! Core value types shared across the ink pipeline
//!
//! Canvas-space points and rectangles, RGB ink colors, the two ink layers,
//! and the raw/smoothed stroke sample type.

/// 2D point in canvas space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation from `self` toward `other`
    pub fn lerp(&self, other: Point, t: f32) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

/// Axis-aligned bounding box in canvas space
///
/// Stored as min/max corners so unions and radius expansion stay cheap.
/// `Rect::EMPTY` is the identity for `union` and intersects nothing, which is
/// what tombstone geometry reports.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// The empty rectangle: union identity, never intersects or contains
    pub const EMPTY: Rect = Rect {
        min: Point {
            x: f32::INFINITY,
            y: f32::INFINITY,
        },
        max: Point {
            x: f32::NEG_INFINITY,
            y: f32::NEG_INFINITY,
        },
    };

    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Point::new(x, y),
            max: Point::new(x + width, y + height),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Smallest rectangle covering both `self` and `other`
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow the rectangle by `margin` on every side
    pub fn expand(&self, margin: f32) -> Rect {
        if self.is_empty() {
            return *self;
        }
        Rect {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        if self.is_empty() {
            return *self;
        }
        Rect {
            min: Point::new(self.min.x + dx, self.min.y + dy),
            max: Point::new(self.max.x + dx, self.max.y + dy),
        }
    }

    /// Whether `other` lies entirely inside `self`
    pub fn contains_rect(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }
}

impl Default for Rect {
    fn default() -> Self {
        Rect::EMPTY
    }
}

/// RGB ink color, components in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Interleaved RGBA array for vertex data
    pub const fn rgba(&self, alpha: f32) -> [f32; 4] {
        [self.r, self.g, self.b, alpha]
    }

    pub const fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub const fn from_array(rgb: [f32; 3]) -> Self {
        Self {
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
        }
    }
}

/// One of the two independently composited ink planes
///
/// The wire `zIndex` field: highlighter is 0 and composites below the pen
/// plane, pen is 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Highlighter,
    Pen,
}

impl Layer {
    /// Highlighter ink renders translucent, pen ink opaque
    pub const fn alpha(&self) -> f32 {
        match self {
            Layer::Highlighter => 0.45,
            Layer::Pen => 1.0,
        }
    }

    pub const fn z_index(&self) -> u8 {
        match self {
            Layer::Highlighter => 0,
            Layer::Pen => 1,
        }
    }

    pub const fn from_z_index(z: u8) -> Option<Layer> {
        match z {
            0 => Some(Layer::Highlighter),
            1 => Some(Layer::Pen),
            _ => None,
        }
    }
}

/// One stroke sample: canvas position, pen pressure, and capture time
///
/// Raw pointer samples and smoothed resampled points share this shape.
/// Immutable once committed to a stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    /// Pen pressure in [0, 1]
    pub pressure: f32,
    /// Capture time, integer milliseconds
    pub timestamp: u64,
}

impl StrokePoint {
    pub const fn new(x: f32, y: f32, pressure: f32, timestamp: u64) -> Self {
        Self {
            x,
            y,
            pressure,
            timestamp,
        }
    }

    pub const fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rect_is_union_identity() {
        let r = Rect::from_xywh(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Rect::EMPTY.union(&r), r);
        assert_eq!(r.union(&Rect::EMPTY), r);
    }

    #[test]
    fn test_empty_rect_never_intersects() {
        let r = Rect::from_xywh(-10.0, -10.0, 20.0, 20.0);
        assert!(!Rect::EMPTY.intersects(&r));
        assert!(!r.intersects(&Rect::EMPTY));
        assert!(!Rect::EMPTY.contains(Point::ZERO));
    }

    #[test]
    fn test_rect_expand_and_contains() {
        let r = Rect::from_xywh(0.0, 0.0, 10.0, 10.0).expand(2.0);
        assert!(r.contains(Point::new(-1.5, -1.5)));
        assert!(!r.contains(Point::new(-3.0, 0.0)));
    }

    #[test]
    fn test_layer_z_index_round_trip() {
        assert_eq!(Layer::from_z_index(Layer::Pen.z_index()), Some(Layer::Pen));
        assert_eq!(
            Layer::from_z_index(Layer::Highlighter.z_index()),
            Some(Layer::Highlighter)
        );
        assert_eq!(Layer::from_z_index(7), None);
    }
}
