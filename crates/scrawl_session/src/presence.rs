//! Collaborator presence previews
//!
//! Each remote peer's in-progress stroke is mirrored locally through the
//! same smoothing and vectorization pipeline used for local ink, driven by
//! the typed command stream. Previews are ephemeral overlay geometry; the
//! committed stroke arrives separately through the store.

use rustc_hash::FxHashMap;

use scrawl_geom::{Color, Layer, StrokePoint};
use scrawl_ink::{StrokeSmoother, StrokeVectorizer};

use crate::protocol::CollaboratorCommand;

/// One remote peer's pen settings and live stroke
pub struct PeerPresence {
    color: Color,
    width: f32,
    smoother: StrokeSmoother,
    live: Option<StrokeVectorizer>,
}

impl PeerPresence {
    fn new() -> Self {
        Self {
            color: Color::BLACK,
            width: 2.0,
            smoother: StrokeSmoother::new(),
            live: None,
        }
    }

    /// The peer's live ribbon, if a stroke is in progress
    pub fn preview(&self) -> Option<&[f32]> {
        self.live.as_ref().map(|v| v.committed_data())
    }

    fn apply(&mut self, command: CollaboratorCommand) {
        match command {
            CollaboratorCommand::SetWidth { width } => self.width = width,
            CollaboratorCommand::SetColor { color } => self.color = Color::from_array(color),
            CollaboratorCommand::Update {
                x,
                y,
                pressure,
                timestamp,
            } => {
                let ink = self.color.rgba(Layer::Pen.alpha());
                let width = self.width;
                if self.live.is_none() {
                    self.smoother.begin(timestamp, Layer::Pen, self.color, width);
                }
                let live = self
                    .live
                    .get_or_insert_with(|| StrokeVectorizer::new(ink, width));
                self.smoother.push(x, y, pressure, timestamp);
                for p in self.smoother.extend_to_last_point() {
                    live.push(p);
                }
            }
            CollaboratorCommand::LoadPoints { points } => {
                // Already-smoothed quadruples replace the live stroke whole.
                let mut live =
                    StrokeVectorizer::new(self.color.rgba(Layer::Pen.alpha()), self.width);
                for chunk in points.chunks_exact(4) {
                    live.push(StrokePoint::new(
                        chunk[0] as f32,
                        chunk[1] as f32,
                        (chunk[2] as f32).clamp(0.0, 1.0),
                        chunk[3] as u64,
                    ));
                }
                self.smoother = StrokeSmoother::new();
                self.live = Some(live);
            }
            CollaboratorCommand::Clear => {
                self.smoother = StrokeSmoother::new();
                self.live = None;
            }
        }
    }
}

/// All remote peers' live state, keyed by peer id
#[derive(Default)]
pub struct PresenceRegistry {
    peers: FxHashMap<String, PeerPresence>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one command to its peer, creating the peer on first sight
    pub fn apply(&mut self, peer_id: &str, command: CollaboratorCommand) {
        self.peers
            .entry(peer_id.to_string())
            .or_insert_with(PeerPresence::new)
            .apply(command);
    }

    pub fn remove(&mut self, peer_id: &str) {
        self.peers.remove(peer_id);
    }

    /// Live ribbons of every peer with a stroke in progress
    pub fn previews(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.peers
            .iter()
            .filter_map(|(id, p)| p.preview().map(|d| (id.as_str(), d)))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
