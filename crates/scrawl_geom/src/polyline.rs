//! Polyline hit-testing
//!
//! A stroke's hit-test shape is its centerline polyline with a per-sample
//! radius (the same radius the vectorizer uses for the ribbon). Tests prune
//! with the radius-inclusive bounding box first, then run exact geometry.

use crate::{Point, Rect};

/// One centerline sample: position plus ribbon radius at that point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathSample {
    pub pos: Point,
    pub radius: f32,
}

impl PathSample {
    pub const fn new(pos: Point, radius: f32) -> Self {
        Self { pos, radius }
    }
}

/// Ordered centerline samples of a committed stroke
#[derive(Clone, Debug, Default)]
pub struct PolyLine {
    samples: Vec<PathSample>,
    bounds: Rect,
}

impl PolyLine {
    pub fn new(samples: Vec<PathSample>) -> Self {
        let bounds = samples.iter().fold(Rect::EMPTY, |acc, s| {
            acc.union(&Rect::new(s.pos, s.pos).expand(s.radius))
        });
        Self { samples, bounds }
    }

    pub fn samples(&self) -> &[PathSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Radius-inclusive bounding box, cached at construction
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        for s in &mut self.samples {
            s.pos.x += dx;
            s.pos.y += dy;
        }
        self.bounds = self.bounds.translate(dx, dy);
    }

    /// Whether the segment `a`-`b` touches the thickened path
    ///
    /// Used by the eraser: each eraser segment is tested against every
    /// committed stroke whose bounds it crosses.
    pub fn intersects_line(&self, a: Point, b: Point) -> bool {
        let seg_bounds = Rect::new(
            Point::new(a.x.min(b.x), a.y.min(b.y)),
            Point::new(a.x.max(b.x), a.y.max(b.y)),
        );
        if !self.bounds.intersects(&seg_bounds) {
            return false;
        }
        if self.samples.len() == 1 {
            let s = self.samples[0];
            return dist_point_segment(s.pos, a, b) <= s.radius;
        }
        for pair in self.samples.windows(2) {
            let radius = pair[0].radius.max(pair[1].radius);
            if dist_segment_segment(pair[0].pos, pair[1].pos, a, b) <= radius {
                return true;
            }
        }
        false
    }

    /// Whether two closed polylines overlap
    ///
    /// Treats both sample sequences as closed polygons: they overlap when a
    /// vertex of one lies inside the other (ray casting) or any pair of edges
    /// intersects. Symmetric by construction; used for eraser strokes and
    /// lasso selection alike.
    pub fn overlaps_poly(&self, other: &PolyLine) -> bool {
        if !self.bounds.intersects(&other.bounds) {
            return false;
        }
        if self.samples.len() < 3 || other.samples.len() < 3 {
            // Degenerate polygons have no interior; fall back to edge tests.
            return self.edges_cross(other);
        }
        if other
            .samples
            .iter()
            .any(|s| point_in_polygon(&self.samples, s.pos))
        {
            return true;
        }
        if self
            .samples
            .iter()
            .any(|s| point_in_polygon(&other.samples, s.pos))
        {
            return true;
        }
        self.edges_cross(other)
    }

    fn edges_cross(&self, other: &PolyLine) -> bool {
        for a in closed_edges(&self.samples) {
            for b in closed_edges(&other.samples) {
                if segments_intersect(a.0, a.1, b.0, b.1) {
                    return true;
                }
            }
        }
        false
    }
}

/// Hit-test shape of a persisted graphic
///
/// `Void` is the tombstone's shape: empty bounds, intersects nothing. Keeping
/// it in the same sum type lets every graphic answer hit-tests uniformly.
#[derive(Clone, Debug, Default)]
pub enum Geometry {
    Poly(PolyLine),
    #[default]
    Void,
}

impl Geometry {
    pub fn bounds(&self) -> Rect {
        match self {
            Geometry::Poly(p) => p.bounds(),
            Geometry::Void => Rect::EMPTY,
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            Geometry::Poly(p) => p.translate(dx, dy),
            Geometry::Void => {}
        }
    }

    pub fn intersects_line(&self, a: Point, b: Point) -> bool {
        match self {
            Geometry::Poly(p) => p.intersects_line(a, b),
            Geometry::Void => false,
        }
    }

    pub fn overlaps(&self, other: &Geometry) -> bool {
        match (self, other) {
            (Geometry::Poly(a), Geometry::Poly(b)) => a.overlaps_poly(b),
            _ => false,
        }
    }
}

fn closed_edges(samples: &[PathSample]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = samples.len();
    (0..n).filter_map(move |i| {
        if n < 2 {
            return None;
        }
        Some((samples[i].pos, samples[(i + 1) % n].pos))
    })
}

/// Ray-casting point-in-polygon over the closed sample outline
fn point_in_polygon(samples: &[PathSample], p: Point) -> bool {
    let n = samples.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = samples[i].pos;
        let b = samples[j].pos;
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Exact segment-segment intersection via orientation tests
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    // Collinear endpoint touches
    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

/// Distance from point `p` to segment `a`-`b`
pub fn dist_point_segment(p: Point, a: Point, b: Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance_to(Point::new(a.x + abx * t, a.y + aby * t))
}

/// Distance between segments `a1`-`a2` and `b1`-`b2` (zero when they cross)
pub fn dist_segment_segment(a1: Point, a2: Point, b1: Point, b2: Point) -> f32 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    dist_point_segment(a1, b1, b2)
        .min(dist_point_segment(a2, b1, b2))
        .min(dist_point_segment(b1, a1, a2))
        .min(dist_point_segment(b2, a1, a2))
}
