//! Scrawl persistent graphic model
//!
//! The closed set of persisted canvas objects: a freehand ink [`Stroke`] or
//! the [`Tombstone`] recording its deletion. Every variant carries a
//! last-modified timestamp; for each id, whichever variant holds the greatest
//! timestamp is authoritative (last-writer-wins).
//!
//! Strokes are immutable by convention: edits replace the whole object.
//! Affine transforms return a new stroke with freshly derived hit-test
//! geometry and ribbon data, so concurrent readers of the prior value stay
//! valid. Wire records ([`wire`]) are total-but-fallible to decode: malformed
//! input yields `None`, never a panic or error that aborts a batch.

mod graphic;
pub mod wire;

pub use graphic::{Graphic, Ribbon, Stroke, Tombstone};
pub use scrawl_geom::{Color, Geometry, Layer, Point, Rect, StrokePoint};
