//! Persisted graphics: strokes and tombstones

use scrawl_geom::{Color, Geometry, Layer, PathSample, Point, PolyLine, Rect, StrokePoint};
use scrawl_ink::{point_radius, StrokeVectorizer};

/// Derived ribbon vertex data for a committed stroke
///
/// Flat interleaved `[x, y, r, g, b, a]` floats in strip topology, exactly
/// what the render cache uploads. Recomputed from the point list whenever a
/// stroke is built; never edited in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ribbon {
    data: Vec<f32>,
}

impl Ribbon {
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A persisted freehand ink mark
///
/// `geometry` and `ribbon` are derived from `points` at construction and
/// after every transform; they are never hand-edited.
#[derive(Clone, Debug)]
pub struct Stroke {
    id: String,
    color: Color,
    width: f32,
    layer: Layer,
    points: Vec<StrokePoint>,
    /// Last-modified time, milliseconds
    timestamp: u64,
    geometry: Geometry,
    ribbon: Ribbon,
}

impl Stroke {
    /// Build a stroke, deriving hit-test geometry and ribbon data
    pub fn new(
        id: impl Into<String>,
        color: Color,
        width: f32,
        layer: Layer,
        points: Vec<StrokePoint>,
        timestamp: u64,
    ) -> Self {
        let (geometry, ribbon) = derive(&points, color, width, layer);
        Self {
            id: id.into(),
            color,
            width,
            layer,
            points,
            timestamp,
            geometry,
            ribbon,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn ribbon(&self) -> &Ribbon {
        &self.ribbon
    }

    pub fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }

    /// New stroke shifted by `(dx, dy)`, same id, fresh derived fields
    pub fn translated(&self, dx: f32, dy: f32, timestamp: u64) -> Stroke {
        self.mapped(timestamp, |p| Point::new(p.x + dx, p.y + dy))
    }

    /// New stroke rotated by `angle` radians around `center`
    pub fn rotated(&self, angle: f32, center: Point, timestamp: u64) -> Stroke {
        let (sin, cos) = angle.sin_cos();
        self.mapped(timestamp, |p| {
            let dx = p.x - center.x;
            let dy = p.y - center.y;
            Point::new(
                center.x + dx * cos - dy * sin,
                center.y + dx * sin + dy * cos,
            )
        })
    }

    /// New stroke scaled by `factor` around `center`; width scales with it
    pub fn scaled(&self, factor: f32, center: Point, timestamp: u64) -> Stroke {
        let mut stroke = self.mapped(timestamp, |p| {
            Point::new(
                center.x + (p.x - center.x) * factor,
                center.y + (p.y - center.y) * factor,
            )
        });
        stroke.width *= factor;
        let (geometry, ribbon) = derive(&stroke.points, stroke.color, stroke.width, stroke.layer);
        stroke.geometry = geometry;
        stroke.ribbon = ribbon;
        stroke
    }

    fn mapped(&self, timestamp: u64, f: impl Fn(Point) -> Point) -> Stroke {
        let points = self
            .points
            .iter()
            .map(|p| {
                let m = f(p.position());
                StrokePoint::new(m.x, m.y, p.pressure, p.timestamp)
            })
            .collect();
        Stroke::new(
            self.id.clone(),
            self.color,
            self.width,
            self.layer,
            points,
            timestamp,
        )
    }
}

fn derive(
    points: &[StrokePoint],
    color: Color,
    width: f32,
    layer: Layer,
) -> (Geometry, Ribbon) {
    if points.is_empty() {
        return (Geometry::Void, Ribbon::default());
    }
    let samples = points
        .iter()
        .map(|p| PathSample::new(p.position(), point_radius(width, p.pressure)))
        .collect();
    let geometry = Geometry::Poly(PolyLine::new(samples));

    let mut vectorizer = StrokeVectorizer::new(color.rgba(layer.alpha()), width);
    for &p in points {
        vectorizer.push(p);
    }
    let ribbon = Ribbon {
        data: vectorizer.vertex_data(&[]).to_vec(),
    };
    (geometry, ribbon)
}

/// Marker recording the deletion of a stroke id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tombstone {
    pub id: String,
    pub timestamp: u64,
}

impl Tombstone {
    pub fn new(id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }
}

/// The closed set of persisted canvas objects
///
/// For each id exactly one live variant exists; the one with the greatest
/// timestamp is authoritative.
#[derive(Clone, Debug)]
pub enum Graphic {
    Stroke(Stroke),
    Tombstone(Tombstone),
}

impl Graphic {
    pub fn id(&self) -> &str {
        match self {
            Graphic::Stroke(s) => s.id(),
            Graphic::Tombstone(t) => &t.id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Graphic::Stroke(s) => s.timestamp(),
            Graphic::Tombstone(t) => t.timestamp,
        }
    }

    /// Hit-test shape; tombstones answer with the void geometry
    pub fn geometry(&self) -> Geometry {
        match self {
            Graphic::Stroke(s) => s.geometry().clone(),
            Graphic::Tombstone(_) => Geometry::Void,
        }
    }

    pub fn as_stroke(&self) -> Option<&Stroke> {
        match self {
            Graphic::Stroke(s) => Some(s),
            Graphic::Tombstone(_) => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Graphic::Tombstone(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(points: &[(f32, f32)]) -> Stroke {
        let pts = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| StrokePoint::new(x, y, 0.5, i as u64 * 8))
            .collect();
        Stroke::new("s1", Color::BLACK, 2.0, Layer::Pen, pts, 100)
    }

    #[test]
    fn test_derived_fields_match_points() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0)]);
        assert!(!s.ribbon().is_empty());
        let bounds = s.bounds();
        // radius = 1 at pressure 0.5, width 2
        assert!((bounds.min.x - -1.0).abs() < 1e-5);
        assert!((bounds.max.x - 11.0).abs() < 1e-5);
    }

    #[test]
    fn test_translate_is_pure_and_rederives() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0)]);
        let moved = s.translated(5.0, -2.0, 200);

        // Original untouched
        assert_eq!(s.points()[0].x, 0.0);
        assert_eq!(s.timestamp(), 100);

        assert_eq!(moved.id(), s.id());
        assert_eq!(moved.timestamp(), 200);
        assert_eq!(moved.points()[0].x, 5.0);
        assert_eq!(moved.points()[0].y, -2.0);
        // Derived geometry follows the points
        assert!((moved.bounds().min.x - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotate_preserves_distances() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0)]);
        let center = Point::new(5.0, 0.0);
        let r = s.rotated(std::f32::consts::FRAC_PI_2, center, 200);
        let a = r.points()[0].position();
        let b = r.points()[1].position();
        assert!((a.distance_to(b) - 10.0).abs() < 1e-4);
        // Endpoints swing onto the vertical axis through the center
        assert!((a.x - 5.0).abs() < 1e-4 && (a.y + 5.0).abs() < 1e-4);
        assert!((b.x - 5.0).abs() < 1e-4 && (b.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_scales_width() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0)]);
        let scaled = s.scaled(2.0, Point::ZERO, 200);
        assert_eq!(scaled.width(), 4.0);
        assert_eq!(scaled.points()[1].x, 20.0);
        assert_eq!(s.width(), 2.0);
    }

    #[test]
    fn test_empty_stroke_has_void_geometry() {
        let s = Stroke::new("e", Color::BLACK, 2.0, Layer::Pen, Vec::new(), 1);
        assert!(matches!(s.geometry(), Geometry::Void));
        assert!(s.ribbon().is_empty());
    }

    #[test]
    fn test_graphic_accessors() {
        let s = Graphic::Stroke(stroke(&[(0.0, 0.0), (1.0, 1.0)]));
        let t = Graphic::Tombstone(Tombstone::new("s1", 300));
        assert_eq!(s.id(), "s1");
        assert_eq!(t.id(), "s1");
        assert_eq!(t.timestamp(), 300);
        assert!(t.geometry().bounds().is_empty());
        assert!(t.is_tombstone());
        assert!(s.as_stroke().is_some());
    }
}
