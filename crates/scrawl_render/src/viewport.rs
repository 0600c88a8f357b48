//! Viewport state and change subscription
//!
//! The session owns one `Viewport`; gesture decoding lives outside the core
//! and only the resulting transform (top/left/zoom) arrives here. Consumers
//! subscribe for change notification instead of reading a global.

use scrawl_geom::Rect;

/// Viewport transform plus the view size in device pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    /// Canvas-space coordinate at the left edge
    pub left: f32,
    /// Canvas-space coordinate at the top edge
    pub top: f32,
    /// Device pixels per canvas unit
    pub zoom: f32,
    pub width_px: u32,
    pub height_px: u32,
}

impl ViewportState {
    pub fn new(left: f32, top: f32, zoom: f32, width_px: u32, height_px: u32) -> Self {
        Self {
            left,
            top,
            zoom,
            width_px,
            height_px,
        }
    }

    /// Visible canvas-space rectangle
    pub fn canvas_rect(&self) -> Rect {
        Rect::from_xywh(
            self.left,
            self.top,
            self.width_px as f32 / self.zoom,
            self.height_px as f32 / self.zoom,
        )
    }
}

type ChangeFn = Box<dyn FnMut(ViewportState)>;

/// Session-owned viewport with a change-subscription list
pub struct Viewport {
    state: ViewportState,
    subscribers: Vec<ChangeFn>,
}

impl Viewport {
    pub fn new(state: ViewportState) -> Self {
        Self {
            state,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> ViewportState {
        self.state
    }

    /// Update the transform, notifying subscribers when it actually changed
    pub fn set(&mut self, state: ViewportState) {
        if state == self.state {
            return;
        }
        self.state = state;
        for f in &mut self.subscribers {
            f(state);
        }
    }

    pub fn subscribe(&mut self, f: impl FnMut(ViewportState) + 'static) {
        self.subscribers.push(Box::new(f));
    }
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
