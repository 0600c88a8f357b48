//! Scrawl render cache
//!
//! Re-vectorizing thousands of stroke vertices every frame is too costly on
//! low-power devices, so committed ink is cached twice over:
//!
//! - [`StrokeBatch`] groups stroke ribbons into capacity-bounded vertex
//!   buffers uploaded once and spliced on edit.
//! - [`LayerCache`] rasterizes all of a layer's batches into an off-screen
//!   surface sized 1.5x the viewport, so panning within the margin reuses
//!   the cached raster with a sub-pixel transform correction instead of
//!   redrawing.
//!
//! The rasterizer itself is an external collaborator behind the
//! [`RenderBackend`] trait; this crate only decides *when* to upload, draw,
//! and re-rasterize.

mod backend;
mod batch;
mod layer_cache;
mod viewport;

pub use backend::{CanvasTransform, RenderBackend, RenderError};
pub use batch::{Span, StrokeBatch, BATCH_CAPACITY};
pub use layer_cache::{CacheState, FrameAction, LayerCache, LayeredRenderer, OVERSCAN};
pub use viewport::{Viewport, ViewportState};
