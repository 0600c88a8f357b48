//! Scrawl ink pipeline - smoothing and vectorization
//!
//! Turns raw pointer samples into renderable ribbon geometry in two stages:
//!
//! 1. [`StrokeSmoother`] resamples irregular input onto a fixed virtual clock
//!    with a critically-damped spring, so ribbon curvature is stable no
//!    matter how jittery the input device's sample rate is.
//! 2. [`StrokeVectorizer`] incrementally tessellates the smoothed point
//!    stream into a flat, variable-width triangle-strip vertex buffer with
//!    rounded joins and caps, supporting amortized O(1) append, local
//!    rollback, and a provisional preview tail.

mod smoother;
mod vectorizer;

pub use smoother::{StrokeSmoother, SUB_STEP_MS};
pub use vectorizer::{point_radius, InkVertex, StrokeVectorizer, FLOATS_PER_VERTEX};
