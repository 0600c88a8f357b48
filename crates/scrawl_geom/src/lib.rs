//! Scrawl geometry - canvas primitives and hit-testing
//!
//! Leaf crate of the ink pipeline. Provides the value types shared by every
//! other crate (points, rectangles, colors, ink layers, raw stroke samples)
//! and the polyline hit-testing used by the eraser and lasso tools.
//!
//! # Hit-testing model
//!
//! A committed stroke is hit-tested against its [`PolyLine`]: the ordered
//! centerline samples plus a per-sample radius. Tests are two-phase, a cheap
//! radius-inclusive bounding-box rejection followed by exact thickened-path
//! distance or polygon-overlap checks.

mod polyline;
mod primitives;

pub use polyline::{Geometry, PathSample, PolyLine};
pub use primitives::{Color, Layer, Point, Rect, StrokePoint};
