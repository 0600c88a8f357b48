//! Scrawl collaborative session
//!
//! The top of the stack: one [`Session`] per open document owns the
//! viewport, the live ink pipeline (smoother and vectorizer), the
//! collaborative stroke store, remote peers' presence previews, and the
//! self-throttled render loop. Everything below it is synchronous and
//! single-threaded; the embedding shell delivers pointer samples, network
//! frames, and render ticks, and takes back wire messages through the
//! [`Transport`] seam.

mod presence;
mod protocol;
mod schedule;
mod store;

pub use presence::{PeerPresence, PresenceRegistry};
pub use protocol::{CollaboratorCommand, Message};
pub use schedule::{RenderLoop, MIN_RENDER_DELAY_MS, THROTTLE_FACTOR};
pub use store::{
    CollabStore, ConnectionState, OfflineStore, StoreEvent, Transport, OFFLINE_FLUSH_INTERVAL_MS,
};

use serde_json::Value;
use std::time::Instant;

use scrawl_geom::{Color, Layer, Point};
use scrawl_ink::{StrokeSmoother, StrokeVectorizer};
use scrawl_model::{Graphic, Stroke, Tombstone};
use scrawl_render::{
    CanvasTransform, LayeredRenderer, RenderBackend, RenderError, Viewport, ViewportState,
};

/// Outcome of one render tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// A pass ran; `rerun` asks the shell to schedule another tick soon
    Rendered { rerun: bool },
    /// Guarded out (pass in flight or throttle window); request coalesced
    Throttled,
}

/// One open document: ink capture, sync, presence, and rendering
pub struct Session<B: RenderBackend> {
    peer_id: String,
    seq: u64,

    viewport: Viewport,
    renderer: LayeredRenderer<B>,
    store: CollabStore,
    presence: PresenceRegistry,
    render_loop: RenderLoop,

    smoother: StrokeSmoother,
    live: Option<StrokeVectorizer>,
    /// Scratch upload buffer reused for the live stroke and peer previews
    overlay: Option<B::Buffer>,
}

impl<B: RenderBackend> Session<B> {
    pub fn new(
        doc_id: impl Into<String>,
        peer_id: impl Into<String>,
        viewport: ViewportState,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            seq: 0,
            viewport: Viewport::new(viewport),
            renderer: LayeredRenderer::new(),
            store: CollabStore::new(doc_id),
            presence: PresenceRegistry::new(),
            render_loop: RenderLoop::new(),
            smoother: StrokeSmoother::new(),
            live: None,
            overlay: None,
        }
    }

    pub fn store(&self) -> &CollabStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CollabStore {
        &mut self.store
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport.get()
    }

    /// Update the viewport; the layer caches re-rasterize as needed
    pub fn set_viewport(&mut self, state: ViewportState) {
        if state == self.viewport.get() {
            return;
        }
        self.viewport.set(state);
        self.renderer.on_viewport_change();
    }

    /// Restore offline ink, then connect; reconciliation happens when the
    /// server's `load note` frame arrives
    pub fn start(&mut self, offline_store: &mut dyn OfflineStore) {
        self.store.load_offline(offline_store);
        for stroke in self.store.strokes() {
            self.renderer.insert_stroke(stroke);
        }
        self.store.connect();
    }

    // -- live ink ----------------------------------------------------------

    /// Begin capturing a local stroke
    pub fn begin_stroke(
        &mut self,
        timestamp: u64,
        layer: Layer,
        color: Color,
        width: f32,
        transport: &mut dyn Transport,
    ) {
        self.smoother.begin(timestamp, layer, color, width);
        self.live = Some(StrokeVectorizer::new(color.rgba(layer.alpha()), width));
        self.broadcast_presence(CollaboratorCommand::SetWidth { width }, transport);
        self.broadcast_presence(
            CollaboratorCommand::SetColor {
                color: color.to_array(),
            },
            transport,
        );
    }

    /// Ingest one raw pointer sample; geometry extends on the next tick
    pub fn pointer_sample(
        &mut self,
        x: f32,
        y: f32,
        pressure: f32,
        timestamp: u64,
        transport: &mut dyn Transport,
    ) {
        if self.live.is_none() {
            return;
        }
        self.smoother.push(x, y, pressure, timestamp);
        self.broadcast_presence(
            CollaboratorCommand::Update {
                x,
                y,
                pressure,
                timestamp,
            },
            transport,
        );
    }

    /// Commit the live stroke as a whole object; returns its id
    pub fn end_stroke(&mut self, timestamp: u64, transport: &mut dyn Transport) -> Option<String> {
        let mut live = self.live.take()?;
        for p in self.smoother.extend_to_last_point() {
            live.push(p);
        }
        self.broadcast_presence(CollaboratorCommand::Clear, transport);

        let points = live.points().to_vec();
        if points.is_empty() {
            return None;
        }
        let id = self.next_id();
        let stroke = Stroke::new(
            id.clone(),
            self.smoother.color(),
            self.smoother.width(),
            self.smoother.layer(),
            points,
            timestamp,
        );
        self.renderer.insert_stroke(&stroke);
        self.store.commit_local(Graphic::Stroke(stroke), transport);
        Some(id)
    }

    /// Tombstone every stroke touching the eraser segment `a`-`b`
    pub fn erase_at(
        &mut self,
        a: Point,
        b: Point,
        timestamp: u64,
        transport: &mut dyn Transport,
    ) -> Vec<String> {
        let ids: Vec<String> = self
            .store
            .hit_by_segment(a, b)
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        for id in &ids {
            self.renderer.remove_stroke(id);
            self.store.commit_local(
                Graphic::Tombstone(Tombstone::new(id.clone(), timestamp)),
                transport,
            );
        }
        ids
    }

    // -- network -----------------------------------------------------------

    /// Route one inbound wire frame; malformed frames are skipped
    pub fn handle_frame(
        &mut self,
        frame: &Value,
        now: u64,
        transport: &mut dyn Transport,
        offline_store: &mut dyn OfflineStore,
    ) -> Vec<StoreEvent> {
        let Some(message) = Message::decode(frame) else {
            return Vec::new();
        };
        let events = match message {
            Message::CollaboratorUpdate { peer_id, command } => {
                // Our own presence frames echo back through the server.
                if peer_id != self.peer_id {
                    self.presence.apply(&peer_id, command);
                }
                return Vec::new();
            }
            other => self
                .store
                .handle_message(other, now, transport, offline_store),
        };
        for event in &events {
            match event {
                StoreEvent::Upserted(id) => {
                    if let Some(stroke) = self.store.get(id).and_then(Graphic::as_stroke) {
                        self.renderer.insert_stroke(stroke);
                    }
                }
                StoreEvent::Removed(id) => {
                    self.renderer.remove_stroke(id);
                }
            }
        }
        events
    }

    // -- rendering ---------------------------------------------------------

    /// One render tick at `now` (milliseconds)
    ///
    /// Re-entrant calls and calls inside the throttle window coalesce; a
    /// running pass is never interrupted. The pass extends the live stroke,
    /// drives the layer caches, then draws the live and presence overlays
    /// straight to the frame.
    pub fn frame(
        &mut self,
        backend: &mut B,
        now: u64,
        moving: bool,
    ) -> Result<FrameStatus, RenderError> {
        if !self.render_loop.request(now) {
            return Ok(FrameStatus::Throttled);
        }
        let started = Instant::now();
        let result = self.render_pass(backend, moving);
        let cost = started.elapsed().as_millis() as u64;
        let rerun = self.render_loop.finish(now, cost);
        result.map(|_| FrameStatus::Rendered { rerun })
    }

    fn render_pass(&mut self, backend: &mut B, moving: bool) -> Result<(), RenderError> {
        if let Some(live) = self.live.as_mut() {
            for p in self.smoother.extend_to_last_point() {
                live.push(p);
            }
        }

        let viewport = self.viewport.get();
        self.renderer.frame(backend, viewport, moving)?;

        let to_screen = CanvasTransform::new(
            viewport.zoom,
            -viewport.left * viewport.zoom,
            -viewport.top * viewport.zoom,
        );
        if let Some(live) = &self.live {
            let data = live.committed_data();
            if !data.is_empty() {
                let buffer = Self::upload_overlay(&mut self.overlay, backend, data)?;
                backend.draw_strip(buffer, to_screen, None);
            }
        }
        for (_, data) in self.presence.previews() {
            let buffer = Self::upload_overlay(&mut self.overlay, backend, data)?;
            backend.draw_strip(buffer, to_screen, None);
        }
        Ok(())
    }

    fn upload_overlay(
        overlay: &mut Option<B::Buffer>,
        backend: &mut B,
        data: &[f32],
    ) -> Result<B::Buffer, RenderError> {
        match *overlay {
            Some(buffer) => {
                backend.update_buffer(buffer, data)?;
                Ok(buffer)
            }
            None => {
                let buffer = backend.create_buffer(data)?;
                *overlay = Some(buffer);
                Ok(buffer)
            }
        }
    }

    fn broadcast_presence(&self, command: CollaboratorCommand, transport: &mut dyn Transport) {
        if self.store.state() == ConnectionState::Synced && self.store.can_write() {
            transport.send(&Message::CollaboratorUpdate {
                peer_id: self.peer_id.clone(),
                command,
            });
        }
    }

    fn next_id(&mut self) -> String {
        self.seq += 1;
        format!("{}-{}", self.peer_id, self.seq)
    }
}
