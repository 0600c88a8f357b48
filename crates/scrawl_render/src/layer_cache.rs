//! Viewport-aligned raster caching, one cache per ink layer
//!
//! Every committed stroke's ribbon lives in a [`StrokeBatch`]; all of a
//! layer's batches rasterize once into an off-screen target sized
//! [`OVERSCAN`] times the viewport, so pure pan/zoom frames composite the
//! cached raster with a transform correction instead of redrawing ink.
//!
//! The cache runs a three-state machine. Any viewport change puts it in
//! `Updating` (an approximate in-motion raster is acceptable). When movement
//! settles it passes through `JustStabilized`, which forces exactly one
//! crisp full-resolution redraw, and then rests at `Stable`, where only
//! content edits trigger re-rasterization.

use scrawl_geom::{Layer, Rect};
use scrawl_model::Stroke;

use crate::backend::{CanvasTransform, RenderBackend, RenderError};
use crate::batch::StrokeBatch;
use crate::viewport::ViewportState;

/// Cached raster region size as a multiple of the viewport
pub const OVERSCAN: f32 = 1.5;

/// Raster cache state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Viewport in motion; approximate rasters are acceptable
    Updating,
    /// Movement settled; the next frame must redraw crisp
    JustStabilized,
    /// At rest; only content edits redraw
    Stable,
}

/// What a frame did with the cached raster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameAction {
    Rasterized,
    Reused,
}

struct BatchSlot<B: RenderBackend> {
    batch: StrokeBatch,
    buffer: Option<B::Buffer>,
}

struct Raster<B: RenderBackend> {
    target: B::Target,
    /// Canvas-space region the target covers
    region: Rect,
    /// Zoom the raster was drawn at
    zoom: f32,
    width_px: u32,
    height_px: u32,
}

/// Render cache for one ink layer
pub struct LayerCache<B: RenderBackend> {
    layer: Layer,
    slots: Vec<BatchSlot<B>>,
    raster: Option<Raster<B>>,
    state: CacheState,
    content_dirty: bool,
}

impl<B: RenderBackend> LayerCache<B> {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            slots: Vec::new(),
            raster: None,
            state: CacheState::Stable,
            content_dirty: false,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Append a stroke's ribbon to the open batch (or a new one on overflow)
    pub fn insert(&mut self, id: &str, ribbon: &[f32]) {
        if ribbon.is_empty() {
            return;
        }
        let slot = match self.slots.iter_mut().find(|s| s.batch.has_room(ribbon.len())) {
            Some(slot) => slot,
            None => {
                self.slots.push(BatchSlot {
                    batch: StrokeBatch::new(),
                    buffer: None,
                });
                self.slots.last_mut().expect("just pushed")
            }
        };
        slot.batch.insert(id, ribbon);
        self.content_dirty = true;
    }

    /// Splice a stroke out of whichever batch holds it
    pub fn remove(&mut self, id: &str) -> bool {
        for slot in &mut self.slots {
            if slot.batch.remove(id) {
                self.content_dirty = true;
                return true;
            }
        }
        false
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.iter().any(|s| s.batch.contains(id))
    }

    /// Any viewport change invalidates stability
    pub fn on_viewport_change(&mut self) {
        self.state = CacheState::Updating;
    }

    /// Drive one frame: upload dirty batches, keep the raster fresh,
    /// composite it
    ///
    /// `moving` reports whether the viewport changed since the previous
    /// frame; the state machine uses it to detect settling.
    pub fn frame(
        &mut self,
        backend: &mut B,
        viewport: ViewportState,
        moving: bool,
    ) -> Result<FrameAction, RenderError> {
        self.upload(backend)?;

        let escaped = match &self.raster {
            Some(r) => !r.region.contains_rect(&viewport.canvas_rect()),
            None => true,
        };

        let action = match self.state {
            CacheState::Updating => {
                if moving {
                    if escaped || self.content_dirty {
                        self.rasterize(backend, viewport)?;
                        FrameAction::Rasterized
                    } else {
                        FrameAction::Reused
                    }
                } else {
                    // Movement settled; crisp redraw happens next frame.
                    self.state = CacheState::JustStabilized;
                    if escaped {
                        self.rasterize(backend, viewport)?;
                        FrameAction::Rasterized
                    } else {
                        FrameAction::Reused
                    }
                }
            }
            CacheState::JustStabilized => {
                // The one forced full-resolution pass, replacing whatever
                // approximate raster motion left behind.
                self.rasterize(backend, viewport)?;
                self.state = CacheState::Stable;
                FrameAction::Rasterized
            }
            CacheState::Stable => {
                if self.content_dirty || escaped {
                    self.rasterize(backend, viewport)?;
                    FrameAction::Rasterized
                } else {
                    FrameAction::Reused
                }
            }
        };

        if let Some(r) = &self.raster {
            backend.draw_target(r.target, Self::correction(r, viewport));
        }
        Ok(action)
    }

    /// Upload dirty batches, dropping emptied ones
    fn upload(&mut self, backend: &mut B) -> Result<(), RenderError> {
        let mut i = 0;
        while i < self.slots.len() {
            if self.slots[i].batch.is_empty() {
                let slot = self.slots.remove(i);
                if let Some(buf) = slot.buffer {
                    backend.release_buffer(buf);
                }
                continue;
            }
            let slot = &mut self.slots[i];
            if slot.batch.is_dirty() {
                match slot.buffer {
                    Some(buf) => backend.update_buffer(buf, slot.batch.data())?,
                    None => slot.buffer = Some(backend.create_buffer(slot.batch.data())?),
                }
                slot.batch.mark_clean();
            }
            i += 1;
        }
        Ok(())
    }

    /// Redraw every batch into the off-screen target
    fn rasterize(&mut self, backend: &mut B, viewport: ViewportState) -> Result<(), RenderError> {
        let view = viewport.canvas_rect();
        let margin_x = view.width() * (OVERSCAN - 1.0) / 2.0;
        let margin_y = view.height() * (OVERSCAN - 1.0) / 2.0;
        let region = Rect::new(
            scrawl_geom::Point::new(view.min.x - margin_x, view.min.y - margin_y),
            scrawl_geom::Point::new(view.max.x + margin_x, view.max.y + margin_y),
        );
        let width_px = (region.width() * viewport.zoom).ceil() as u32;
        let height_px = (region.height() * viewport.zoom).ceil() as u32;

        let needs_new_target = match &self.raster {
            Some(r) => r.width_px != width_px || r.height_px != height_px,
            None => true,
        };
        if needs_new_target {
            if let Some(old) = self.raster.take() {
                backend.release_target(old.target);
            }
            // Allocation failure is fatal: no degraded rendering path.
            let target = backend.create_target(width_px, height_px)?;
            self.raster = Some(Raster {
                target,
                region,
                zoom: viewport.zoom,
                width_px,
                height_px,
            });
        }
        let raster = self.raster.as_mut().expect("raster just ensured");
        raster.region = region;
        raster.zoom = viewport.zoom;

        backend.clear_target(raster.target);
        // Canvas space -> target pixels at the raster's fixed scale.
        let to_target = CanvasTransform::new(
            viewport.zoom,
            -region.min.x * viewport.zoom,
            -region.min.y * viewport.zoom,
        );
        for slot in &self.slots {
            if let Some(buf) = slot.buffer {
                backend.draw_strip(buf, to_target, Some(raster.target));
            }
        }
        self.content_dirty = false;
        tracing::debug!(
            layer = ?self.layer,
            width_px,
            height_px,
            "layer raster refreshed"
        );
        Ok(())
    }

    /// Target pixels -> screen pixels, correcting for sub-pixel pan and any
    /// zoom applied since the raster was drawn
    fn correction(raster: &Raster<B>, viewport: ViewportState) -> CanvasTransform {
        CanvasTransform::new(
            viewport.zoom / raster.zoom,
            (raster.region.min.x - viewport.left) * viewport.zoom,
            (raster.region.min.y - viewport.top) * viewport.zoom,
        )
    }
}

/// Both ink planes, composited highlighter below pen
pub struct LayeredRenderer<B: RenderBackend> {
    highlighter: LayerCache<B>,
    pen: LayerCache<B>,
}

impl<B: RenderBackend> LayeredRenderer<B> {
    pub fn new() -> Self {
        Self {
            highlighter: LayerCache::new(Layer::Highlighter),
            pen: LayerCache::new(Layer::Pen),
        }
    }

    pub fn layer(&self, layer: Layer) -> &LayerCache<B> {
        match layer {
            Layer::Highlighter => &self.highlighter,
            Layer::Pen => &self.pen,
        }
    }

    /// Route a committed stroke's ribbon to its layer cache
    pub fn insert_stroke(&mut self, stroke: &Stroke) {
        let cache = match stroke.layer() {
            Layer::Highlighter => &mut self.highlighter,
            Layer::Pen => &mut self.pen,
        };
        // Whole-object replacement: drop any previous ribbon for this id.
        cache.remove(stroke.id());
        cache.insert(stroke.id(), stroke.ribbon().data());
    }

    pub fn remove_stroke(&mut self, id: &str) -> bool {
        self.highlighter.remove(id) || self.pen.remove(id)
    }

    pub fn on_viewport_change(&mut self) {
        self.highlighter.on_viewport_change();
        self.pen.on_viewport_change();
    }

    /// Drive both caches for one frame, highlighter first
    pub fn frame(
        &mut self,
        backend: &mut B,
        viewport: ViewportState,
        moving: bool,
    ) -> Result<(), RenderError> {
        self.highlighter.frame(backend, viewport, moving)?;
        self.pen.frame(backend, viewport, moving)?;
        Ok(())
    }
}

impl<B: RenderBackend> Default for LayeredRenderer<B> {
    fn default() -> Self {
        Self::new()
    }
}
