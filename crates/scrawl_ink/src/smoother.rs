//! Stroke smoothing engine
//!
//! A virtual mass chases the raw pointer trajectory on a fixed sub-step
//! clock. The spring is critically damped, so the smoothed path settles onto
//! the input without oscillating, and the emitted point stream is temporally
//! uniform regardless of input-device sampling jitter. Pressure is smoothed
//! by an independent, weaker spring so it lags position and never pops.

use scrawl_geom::{Color, Layer, Point, StrokePoint};

/// Fixed virtual sub-step, milliseconds
pub const SUB_STEP_MS: u64 = 4;

/// Position spring stiffness (N/m equivalent, mass 1)
const POSITION_STIFFNESS: f32 = 220.0;

/// Pressure spring stiffness; weaker than position so pressure lags
const PRESSURE_STIFFNESS: f32 = 55.0;

/// Critically damped: no overshoot, fastest settle
const fn spring_mass() -> f32 {
    1.0
}

fn critical_damping(stiffness: f32) -> f32 {
    2.0 * (stiffness * spring_mass()).sqrt()
}

/// Resamples raw pointer input onto a fixed virtual clock
///
/// `begin` resets all state for a new stroke, `push` ingests one raw sample,
/// and `extend_to_last_point` (called once per render tick) advances the
/// virtual mass up to the newest raw sample and returns the points emitted
/// on the way, so motion stays fluid at display rate even when the input
/// device reports more slowly.
#[derive(Debug)]
pub struct StrokeSmoother {
    color: Color,
    width: f32,
    layer: Layer,
    start_timestamp: u64,

    prev_raw: Option<StrokePoint>,
    last_raw: Option<StrokePoint>,

    /// Virtual clock, milliseconds; trails `last_raw.timestamp`
    virtual_time: u64,
    pos: Point,
    vel: (f32, f32),
    pressure: f32,
    pressure_vel: f32,

    /// The first raw sample is emitted verbatim as an anchor, exactly once
    anchor_pending: bool,
}

impl StrokeSmoother {
    pub fn new() -> Self {
        Self {
            color: Color::BLACK,
            width: 1.0,
            layer: Layer::Pen,
            start_timestamp: 0,
            prev_raw: None,
            last_raw: None,
            virtual_time: 0,
            pos: Point::ZERO,
            vel: (0.0, 0.0),
            pressure: 0.0,
            pressure_vel: 0.0,
            anchor_pending: false,
        }
    }

    /// Reset all state for a new stroke
    pub fn begin(&mut self, timestamp: u64, layer: Layer, color: Color, width: f32) {
        tracing::trace!(timestamp, ?layer, width, "smoother: new stroke");
        *self = Self::new();
        self.color = color;
        self.width = width;
        self.layer = layer;
        self.start_timestamp = timestamp;
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

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    /// Ingest one raw pointer sample
    pub fn push(&mut self, x: f32, y: f32, pressure: f32, timestamp: u64) {
        let sample = StrokePoint::new(x, y, pressure.clamp(0.0, 1.0), timestamp);
        match self.last_raw {
            None => {
                // First point anchors the virtual mass; no smoothing.
                self.pos = sample.position();
                self.pressure = sample.pressure;
                self.virtual_time = timestamp;
                self.last_raw = Some(sample);
                self.anchor_pending = true;
            }
            Some(last) => {
                // Monotonic guard: devices occasionally repeat a timestamp.
                if timestamp <= last.timestamp {
                    return;
                }
                self.prev_raw = Some(last);
                self.last_raw = Some(sample);
            }
        }
    }

    /// Advance the virtual mass to the newest raw sample
    ///
    /// Emits one point per elapsed sub-step. Returns an empty vec when the
    /// virtual clock has already caught up (or no input has arrived).
    pub fn extend_to_last_point(&mut self) -> Vec<StrokePoint> {
        let mut out = Vec::new();
        if self.anchor_pending {
            self.anchor_pending = false;
            if let Some(anchor) = self.last_raw {
                out.push(anchor);
            }
        }
        let (prev, last) = match (self.prev_raw, self.last_raw) {
            (Some(p), Some(l)) => (p, l),
            // Anchor only: nothing to chase yet.
            _ => return out,
        };

        let dt = SUB_STEP_MS as f32 / 1000.0;
        let pos_damping = critical_damping(POSITION_STIFFNESS);
        let pressure_damping = critical_damping(PRESSURE_STIFFNESS);
        let span = (last.timestamp - prev.timestamp) as f32;

        while self.virtual_time + SUB_STEP_MS <= last.timestamp {
            self.virtual_time += SUB_STEP_MS;

            // Target: linear interpolation between the last two raw samples
            // at the virtual clock time (clamped past the newest sample).
            let t = if span > 0.0 {
                ((self.virtual_time.saturating_sub(prev.timestamp) as f32) / span).min(1.0)
            } else {
                1.0
            };
            let target = prev.position().lerp(last.position(), t);
            let target_pressure = prev.pressure + (last.pressure - prev.pressure) * t;

            // Semi-implicit Euler; the sub-step is fixed and small enough
            // that the critically damped system stays stable.
            let ax = (-POSITION_STIFFNESS * (self.pos.x - target.x) - pos_damping * self.vel.0)
                / spring_mass();
            let ay = (-POSITION_STIFFNESS * (self.pos.y - target.y) - pos_damping * self.vel.1)
                / spring_mass();
            self.vel.0 += ax * dt;
            self.vel.1 += ay * dt;
            self.pos.x += self.vel.0 * dt;
            self.pos.y += self.vel.1 * dt;

            let ap = (-PRESSURE_STIFFNESS * (self.pressure - target_pressure)
                - pressure_damping * self.pressure_vel)
                / spring_mass();
            self.pressure_vel += ap * dt;
            self.pressure = (self.pressure + self.pressure_vel * dt).clamp(0.0, 1.0);

            out.push(StrokePoint::new(
                self.pos.x,
                self.pos.y,
                self.pressure,
                self.virtual_time,
            ));
        }
        out
    }
}

impl Default for StrokeSmoother {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoother() -> StrokeSmoother {
        let mut s = StrokeSmoother::new();
        s.begin(0, Layer::Pen, Color::BLACK, 2.0);
        s
    }

    #[test]
    fn test_first_point_is_anchor_only() {
        let mut s = smoother();
        s.push(5.0, 7.0, 0.5, 0);
        let pts = s.extend_to_last_point();
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0], StrokePoint::new(5.0, 7.0, 0.5, 0));
        // No further input: nothing more to emit.
        assert!(s.extend_to_last_point().is_empty());
    }

    #[test]
    fn test_fixed_substep_emission() {
        let mut s = smoother();
        s.push(0.0, 0.0, 0.5, 0);
        s.push(10.0, 0.0, 0.5, 16);
        let pts = s.extend_to_last_point();
        // Anchor plus one point per elapsed sub-step.
        assert_eq!(pts.len(), 1 + (16 / SUB_STEP_MS) as usize);
        // Uniform virtual timestamps.
        for (i, p) in pts.iter().skip(1).enumerate() {
            assert_eq!(p.timestamp, (i as u64 + 1) * SUB_STEP_MS);
        }
    }

    #[test]
    fn test_smoothed_path_chases_target_without_overshoot() {
        let mut s = smoother();
        s.push(0.0, 0.0, 0.5, 0);
        let mut last_x = 0.0;
        for i in 1..=50u64 {
            s.push(i as f32 * 2.0, 0.0, 0.5, i * 16);
            for p in s.extend_to_last_point() {
                // Monotone chase along +x: critically damped, no overshoot
                // past the newest raw sample.
                assert!(p.x >= last_x - 1e-4);
                assert!(p.x <= i as f32 * 2.0 + 1e-3);
                assert_eq!(p.y, 0.0);
                last_x = p.x;
            }
        }
        // After a long steady drag the mass has nearly caught up.
        assert!(last_x > 80.0);
    }

    #[test]
    fn test_pressure_lags_position() {
        let mut s = smoother();
        s.push(0.0, 0.0, 0.0, 0);
        s.push(100.0, 0.0, 1.0, 100);
        let pts = s.extend_to_last_point();
        let last = pts.last().unwrap();
        // Position has covered most of the way; pressure trails it.
        let pos_progress = last.x / 100.0;
        let pressure_progress = last.pressure;
        assert!(pos_progress > pressure_progress);
    }

    #[test]
    fn test_begin_resets_state() {
        let mut s = smoother();
        s.push(0.0, 0.0, 0.5, 0);
        s.push(10.0, 10.0, 0.5, 16);
        s.extend_to_last_point();

        s.begin(1000, Layer::Highlighter, Color::new(1.0, 0.0, 0.0), 6.0);
        assert_eq!(s.layer(), Layer::Highlighter);
        assert_eq!(s.width(), 6.0);
        assert!(s.extend_to_last_point().is_empty());
    }

    #[test]
    fn test_duplicate_timestamp_dropped() {
        let mut s = smoother();
        s.push(0.0, 0.0, 0.5, 10);
        s.push(5.0, 5.0, 0.5, 10);
        // Second sample shares the timestamp: dropped, still anchor-only.
        let pts = s.extend_to_last_point();
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0].x, 0.0);
    }
}
