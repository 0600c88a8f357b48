//! Incremental stroke vectorizer
//!
//! Converts a smoothed point stream into a flat triangle-strip ribbon. Each
//! committed point appends vertices in amortized O(1); the trailing cap is
//! the only region rewritten on append, so `pop` and the provisional preview
//! tail regenerate strictly local geometry.
//!
//! # Buffer layout
//!
//! Interleaved `[x, y, r, g, b, a]` floats, strip topology. Per committed
//! point the buffer holds a "body" (join arc or start cap, then the two
//! offset station pairs of the segment) followed by a trailing cap that is
//! truncated and re-emitted whenever the stroke grows or shrinks.

use scrawl_geom::{Point, StrokePoint};
use smallvec::SmallVec;

/// Floats per vertex: position + RGBA
pub const FLOATS_PER_VERTEX: usize = 6;

/// Consecutive points closer than this are dropped (degenerate normal)
const MIN_DISPLACEMENT: f32 = 1e-5;

/// Arc subdivision: step angle = JOIN_SUBDIV / sqrt(radius), clamped.
/// Inversely proportional to the square root of the radius, so fat slow
/// strokes stay visually round while thin fast ones stay cheap.
const JOIN_SUBDIV: f32 = 0.75;
const MIN_ARC_STEP: f32 = 0.15;
const MAX_ARC_STEP: f32 = 1.2;

/// One ribbon vertex as uploaded to the rasterization backend
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InkVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Ribbon radius at a point: `width * (pressure + 1) / 3`
pub fn point_radius(width: f32, pressure: f32) -> f32 {
    width * (pressure + 1.0) / 3.0
}

/// Saved lengths for rolling back a provisional preview tail
#[derive(Clone, Copy, Debug)]
struct PreviewMark {
    points_len: usize,
    marks_len: usize,
    data_len: usize,
    last_dir: Option<(f32, f32)>,
}

/// Incremental generator of a variable-width ribbon vertex buffer
#[derive(Debug)]
pub struct StrokeVectorizer {
    color: [f32; 4],
    width: f32,
    points: Vec<StrokePoint>,
    data: Vec<f32>,
    /// Per committed point: buffer length after its body (trailing cap excluded)
    marks: Vec<usize>,
    /// Buffer length including the trailing cap
    committed_len: usize,
    /// Direction of the last committed segment
    last_dir: Option<(f32, f32)>,
    preview: Option<PreviewMark>,
}

impl StrokeVectorizer {
    pub fn new(color: [f32; 4], width: f32) -> Self {
        Self {
            color,
            width,
            points: Vec::new(),
            data: Vec::new(),
            marks: Vec::new(),
            committed_len: 0,
            last_dir: None,
            preview: None,
        }
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Committed points (zero-displacement duplicates already dropped)
    pub fn points(&self) -> &[StrokePoint] {
        &self.points[..self.preview.map_or(self.points.len(), |m| m.points_len)]
    }

    /// Append one point, extending the buffer in amortized O(1)
    pub fn push(&mut self, point: StrokePoint) {
        self.rollback_preview();
        self.commit_point(point);
    }

    /// Remove the last `n` points, regenerating only the trailing geometry
    pub fn pop(&mut self, n: usize) {
        self.rollback_preview();
        if n == 0 || self.points.is_empty() {
            return;
        }
        if n >= self.points.len() {
            self.points.clear();
            self.marks.clear();
            self.data.clear();
            self.committed_len = 0;
            self.last_dir = None;
            return;
        }
        let keep = self.points.len() - n;
        self.points.truncate(keep);
        self.marks.truncate(keep);
        self.data.truncate(self.marks[keep - 1]);

        self.last_dir = if keep >= 2 {
            direction(self.points[keep - 2], self.points[keep - 1])
        } else {
            None
        };

        let last = self.points[keep - 1];
        let r = point_radius(self.width, last.pressure);
        match self.last_dir {
            Some(dir) => self.emit_end_cap(last.position(), dir, r),
            None => self.emit_disc(last.position(), r),
        }
        self.committed_len = self.data.len();
    }

    /// Current flat buffer, optionally extended by a provisional preview
    ///
    /// The preview tail is rolled back before the next committed push (and on
    /// the next call), so committed geometry is never disturbed.
    pub fn vertex_data(&mut self, extra: &[StrokePoint]) -> &[f32] {
        self.rollback_preview();
        if !extra.is_empty() {
            let mark = PreviewMark {
                points_len: self.points.len(),
                marks_len: self.marks.len(),
                data_len: self.committed_len,
                last_dir: self.last_dir,
            };
            for &p in extra {
                self.commit_point(p);
            }
            self.preview = Some(mark);
        }
        &self.data
    }

    /// Committed buffer without any preview tail
    pub fn committed_data(&self) -> &[f32] {
        &self.data[..self.committed_len.min(self.data.len())]
    }

    /// Committed buffer viewed as typed vertices
    ///
    /// The flat floats and [`InkVertex`] share one interleaved layout; the
    /// cast is size- and alignment-checked by bytemuck.
    pub fn vertices(&self) -> &[InkVertex] {
        bytemuck::cast_slice(self.committed_data())
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / FLOATS_PER_VERTEX
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn rollback_preview(&mut self) {
        if let Some(mark) = self.preview.take() {
            self.points.truncate(mark.points_len);
            self.marks.truncate(mark.marks_len);
            self.data.truncate(mark.data_len);
            self.committed_len = mark.data_len;
            self.last_dir = mark.last_dir;
        }
    }

    fn body_len(&self) -> usize {
        self.marks.last().copied().unwrap_or(0)
    }

    fn commit_point(&mut self, point: StrokePoint) {
        let r = point_radius(self.width, point.pressure.clamp(0.0, 1.0));
        let Some(&last) = self.points.last() else {
            self.points.push(point);
            self.marks.push(self.data.len());
            self.emit_disc(point.position(), r);
            self.committed_len = self.data.len();
            return;
        };

        let Some(dir) = direction(last, point) else {
            // Zero displacement: degenerate normal, drop the point.
            return;
        };

        // Rewrite from the end of the last body: trailing cap goes away,
        // replaced by join + segment + fresh cap.
        let cap_start = self.body_len();
        self.data.truncate(cap_start);

        let prev_r = point_radius(self.width, last.pressure.clamp(0.0, 1.0));
        match self.last_dir {
            None => self.emit_start_cap(last.position(), dir, prev_r),
            Some(prev_dir) => self.emit_join(last.position(), prev_dir, dir, prev_r),
        }

        let normal = (-dir.1, dir.0);
        self.emit_station(last.position(), normal, prev_r);
        self.emit_station(point.position(), normal, r);

        self.last_dir = Some(dir);
        self.points.push(point);
        self.marks.push(self.data.len());

        self.emit_end_cap(point.position(), dir, r);
        self.committed_len = self.data.len();
    }

    fn push_vertex(&mut self, x: f32, y: f32) {
        self.data.push(x);
        self.data.push(y);
        self.data.extend_from_slice(&self.color);
    }

    /// Offset pair along the local normal: left then right
    fn emit_station(&mut self, c: Point, normal: (f32, f32), r: f32) {
        self.push_vertex(c.x + normal.0 * r, c.y + normal.1 * r);
        self.push_vertex(c.x - normal.0 * r, c.y - normal.1 * r);
    }

    /// Rim/center fan pair; strips of these render as a triangle fan
    fn emit_fan_pair(&mut self, c: Point, angle: f32, r: f32) {
        self.push_vertex(c.x + angle.cos() * r, c.y + angle.sin() * r);
        self.push_vertex(c.x, c.y);
    }

    fn arc_angles(r: f32, from: f32, to: f32) -> SmallVec<[f32; 16]> {
        let step = (JOIN_SUBDIV / r.max(1e-3).sqrt()).clamp(MIN_ARC_STEP, MAX_ARC_STEP);
        let sweep = to - from;
        let steps = (sweep.abs() / step).ceil().max(1.0) as usize;
        (0..=steps)
            .map(|k| from + sweep * (k as f32 / steps as f32))
            .collect()
    }

    /// Circular arc join on the turn at `c`, rotating the rim from the
    /// previous segment's normal to the next one's
    fn emit_join(&mut self, c: Point, prev_dir: (f32, f32), dir: (f32, f32), r: f32) {
        let delta = signed_angle(prev_dir, dir);
        if delta.abs() < f32::EPSILON {
            return;
        }
        let a0 = prev_dir.1.atan2(prev_dir.0) + std::f32::consts::FRAC_PI_2;
        // Endpoints coincide with the adjacent station normals; only the
        // interior arc stations are inserted here.
        let angles = Self::arc_angles(r, a0, a0 + delta);
        for &a in &angles[1..angles.len().saturating_sub(1)] {
            self.emit_fan_pair(c, a, r);
        }
    }

    /// Half-disc behind the first point
    fn emit_start_cap(&mut self, c: Point, dir: (f32, f32), r: f32) {
        let a = dir.1.atan2(dir.0);
        // Sweep the back semicircle, ending on the segment's left normal.
        for angle in Self::arc_angles(r, a - std::f32::consts::FRAC_PI_2, a - 3.0 * std::f32::consts::FRAC_PI_2) {
            self.emit_fan_pair(c, angle, r);
        }
    }

    /// Half-disc past the last point
    fn emit_end_cap(&mut self, c: Point, dir: (f32, f32), r: f32) {
        let a = dir.1.atan2(dir.0);
        // Sweep the front semicircle, starting from the segment's left normal.
        for angle in Self::arc_angles(r, a + std::f32::consts::FRAC_PI_2, a - std::f32::consts::FRAC_PI_2) {
            self.emit_fan_pair(c, angle, r);
        }
    }

    /// A lone point renders as a full disc
    fn emit_disc(&mut self, c: Point, r: f32) {
        for angle in Self::arc_angles(r, 0.0, std::f32::consts::TAU) {
            self.emit_fan_pair(c, angle, r);
        }
    }
}

fn direction(from: StrokePoint, to: StrokePoint) -> Option<(f32, f32)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < MIN_DISPLACEMENT {
        return None;
    }
    Some((dx / len, dy / len))
}

/// Signed angle from `a` to `b`, in (-pi, pi]
fn signed_angle(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 * b.1 - a.1 * b.0).atan2(a.0 * b.0 + a.1 * b.1)
}
