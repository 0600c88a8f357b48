//! Collaborative stroke store
//!
//! The single writer of the authoritative id -> graphic map. Every mutation
//! funnels through last-writer-wins timestamp comparison, so local edits,
//! remote edits, and reconciliation all converge to the same map regardless
//! of arrival order. The render cache and hit-testing read the map, never
//! write it.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use scrawl_geom::{Point, PolyLine};
use scrawl_model::{wire, Graphic, Stroke, Tombstone};

use crate::protocol::Message;

/// Interval between durable offline-cache flushes, milliseconds
pub const OFFLINE_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Per-session connection lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Synced,
}

/// Outbound side of the network; the transport itself is external
pub trait Transport {
    fn send(&mut self, message: &Message);
}

/// Durable key-value storage for the offline cache; owned externally
pub trait OfflineStore {
    /// The stored record map for a document, if any
    fn read(&mut self, doc_id: &str) -> Option<Value>;
    /// Replace the stored record map for a document
    fn write(&mut self, doc_id: &str, records: &Value);
    fn clear(&mut self, doc_id: &str);
}

/// A change the render cache needs to mirror
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Upserted(String),
    Removed(String),
}

/// Single writer of the authoritative stroke map
pub struct CollabStore {
    doc_id: String,
    graphics: FxHashMap<String, Graphic>,
    state: ConnectionState,
    can_write: bool,
    /// id -> serialized record, accumulated while disconnected
    offline: FxHashMap<String, Value>,
    offline_dirty: bool,
    last_flush: u64,
}

impl CollabStore {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            graphics: FxHashMap::default(),
            state: ConnectionState::Disconnected,
            can_write: true,
            offline: FxHashMap::default(),
            offline_dirty: false,
            last_flush: 0,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn can_write(&self) -> bool {
        self.can_write
    }

    pub fn get(&self, id: &str) -> Option<&Graphic> {
        self.graphics.get(id)
    }

    /// Live strokes (tombstones excluded)
    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.graphics.values().filter_map(Graphic::as_stroke)
    }

    pub fn len(&self) -> usize {
        self.graphics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphics.is_empty()
    }

    /// Restore the offline cache written by a previous run
    ///
    /// Call once at startup, before connecting: the cached records become
    /// this session's local state and the next reconciliation's input.
    pub fn load_offline(&mut self, offline_store: &mut dyn OfflineStore) {
        let Some(Value::Object(records)) = offline_store.read(&self.doc_id) else {
            return;
        };
        for (id, record) in records {
            match wire::decode(&record) {
                Some(graphic) => {
                    self.apply(graphic);
                    self.offline.insert(id, record);
                }
                None => tracing::warn!(id, "skipping malformed offline record"),
            }
        }
    }

    /// Begin connecting; the server answers with a `load note` message
    pub fn connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Recognized state transition, not an error; editing continues locally
    pub fn disconnect(&mut self) {
        tracing::debug!(doc = %self.doc_id, "store disconnected");
        self.state = ConnectionState::Disconnected;
        // The offline cache holds the full serialized map from here on.
        self.offline = self
            .graphics
            .iter()
            .map(|(id, g)| (id.clone(), wire::encode(g)))
            .collect();
        self.offline_dirty = true;
    }

    /// Commit a local edit: optimistic apply, then broadcast or cache
    ///
    /// The graphic must already carry its commit timestamp.
    pub fn commit_local(
        &mut self,
        graphic: Graphic,
        transport: &mut dyn Transport,
    ) -> Option<StoreEvent> {
        let record = wire::encode(&graphic);
        let id = graphic.id().to_string();
        let is_tombstone = graphic.is_tombstone();
        let event = self.apply(graphic)?;

        match self.state {
            ConnectionState::Synced if self.can_write => {
                if is_tombstone {
                    transport.send(&Message::RemoveStroke { id });
                } else {
                    transport.send(&Message::NewStroke(record));
                }
            }
            ConnectionState::Synced => {
                tracing::debug!(id, "read-only note: local edit not broadcast");
            }
            _ => {
                self.offline.insert(id, record);
                self.offline_dirty = true;
            }
        }
        Some(event)
    }

    /// Apply an inbound message; collaborator updates are routed elsewhere
    pub fn handle_message(
        &mut self,
        message: Message,
        now: u64,
        transport: &mut dyn Transport,
        offline_store: &mut dyn OfflineStore,
    ) -> Vec<StoreEvent> {
        match message {
            Message::LoadNote {
                strokes,
                creation_date,
                can_write,
            } => {
                self.can_write = can_write;
                self.reconcile(&strokes, creation_date, transport, offline_store)
            }
            Message::NewStroke(record) => self.apply_remote_record(&record).into_iter().collect(),
            Message::LoadStrokes(records) => records
                .iter()
                .filter_map(|r| self.apply_remote_record(r))
                .collect(),
            Message::RemoveStroke { id } => self
                .apply(Graphic::Tombstone(Tombstone::new(id, now)))
                .into_iter()
                .collect(),
            Message::CollaboratorUpdate { .. } => Vec::new(),
        }
    }

    /// Periodic durable flush; writes only while disconnected
    pub fn flush_offline(&mut self, now: u64, offline_store: &mut dyn OfflineStore) {
        if self.state != ConnectionState::Disconnected || !self.offline_dirty {
            return;
        }
        if now.saturating_sub(self.last_flush) < OFFLINE_FLUSH_INTERVAL_MS {
            return;
        }
        let records: Map<String, Value> = self
            .offline
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        offline_store.write(&self.doc_id, &Value::Object(records));
        self.offline_dirty = false;
        self.last_flush = now;
        tracing::debug!(doc = %self.doc_id, entries = self.offline.len(), "offline cache flushed");
    }

    /// Every stroke whose thickened path touches the segment `a`-`b`
    pub fn hit_by_segment(&self, a: Point, b: Point) -> Vec<&Stroke> {
        self.strokes()
            .filter(|s| s.geometry().intersects_line(a, b))
            .collect()
    }

    /// Every stroke overlapping the closed lasso polyline
    pub fn hit_by_poly(&self, lasso: &PolyLine) -> Vec<&Stroke> {
        self.strokes()
            .filter(|s| match s.geometry() {
                scrawl_geom::Geometry::Poly(p) => p.overlaps_poly(lasso),
                scrawl_geom::Geometry::Void => false,
            })
            .collect()
    }

    /// Last-writer-wins insert
    ///
    /// Equal timestamps resolve without regard to delivery order: a deletion
    /// outranks a stroke, and two strokes compare by serialized record. An
    /// identical record re-applied is a no-op-equivalent, and replicas that
    /// see the same writes in any order converge on the same winner.
    fn apply(&mut self, incoming: Graphic) -> Option<StoreEvent> {
        let id = incoming.id().to_string();
        if let Some(existing) = self.graphics.get(&id) {
            match existing.timestamp().cmp(&incoming.timestamp()) {
                std::cmp::Ordering::Greater => return None,
                std::cmp::Ordering::Equal if !wins_tie(&incoming, existing) => return None,
                _ => {}
            }
        }
        let event = match &incoming {
            Graphic::Stroke(_) => StoreEvent::Upserted(id.clone()),
            Graphic::Tombstone(_) => StoreEvent::Removed(id.clone()),
        };
        self.graphics.insert(id, incoming);
        Some(event)
    }

    fn apply_remote_record(&mut self, record: &Value) -> Option<StoreEvent> {
        match wire::decode(record) {
            Some(graphic) => self.apply(graphic),
            None => {
                tracing::warn!("skipping malformed remote record");
                None
            }
        }
    }

    /// Merge local state, the offline cache, and the server snapshot
    ///
    /// Commutative and idempotent: last-writer-wins by timestamp with a
    /// creation-date cutoff. Local strokes the server lacks (or holds older)
    /// are re-sent; this repair push does not re-verify before overwriting,
    /// so a remote edit landing between snapshot and push can be lost.
    fn reconcile(
        &mut self,
        server: &Map<String, Value>,
        creation_date: u64,
        transport: &mut dyn Transport,
        offline_store: &mut dyn OfflineStore,
    ) -> Vec<StoreEvent> {
        let mut events = Vec::new();

        // 1. Anything older than the document's creation predates a reset:
        //    tombstone locally, drop from the offline cache.
        let stale: Vec<String> = self
            .graphics
            .iter()
            .filter(|(_, g)| g.timestamp() < creation_date)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            if let Some(event) = self.apply(Graphic::Tombstone(Tombstone::new(
                id.clone(),
                creation_date,
            ))) {
                events.push(event);
            }
            self.offline.remove(id);
        }

        // 2. Repair push: local state the server is missing or holds older.
        let mut push_strokes = Vec::new();
        for (id, graphic) in &self.graphics {
            if stale.contains(id) {
                continue;
            }
            let server_ts = server
                .get(id)
                .and_then(|r| r.get("timestamp"))
                .and_then(Value::as_u64);
            let needs_push = match server_ts {
                None => true,
                Some(ts) => ts < graphic.timestamp(),
            };
            if !needs_push {
                continue;
            }
            match graphic {
                Graphic::Stroke(_) => push_strokes.push(wire::encode(graphic)),
                Graphic::Tombstone(_) => {
                    transport.send(&Message::RemoveStroke { id: id.clone() })
                }
            }
        }
        if !push_strokes.is_empty() {
            tracing::debug!(count = push_strokes.len(), "repair push");
            transport.send(&Message::LoadStrokes(push_strokes));
        }

        // 3. Server state that is missing locally or newer replaces ours.
        for record in server.values() {
            if let Some(event) = self.apply_remote_record(record) {
                events.push(event);
            }
        }

        // Offline cache is consumed; clear it and its durable copy.
        self.offline.clear();
        self.offline_dirty = false;
        offline_store.clear(&self.doc_id);
        self.state = ConnectionState::Synced;
        tracing::debug!(doc = %self.doc_id, graphics = self.graphics.len(), "reconciled");
        events
    }
}

/// Deterministic winner between two graphics carrying the same timestamp
fn wins_tie(incoming: &Graphic, existing: &Graphic) -> bool {
    match (incoming.is_tombstone(), existing.is_tombstone()) {
        (true, false) => true,
        (false, true) => false,
        _ => wire::encode(incoming).to_string() >= wire::encode(existing).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrawl_geom::{Color, Layer, StrokePoint};

    #[derive(Default)]
    struct MockTransport {
        sent: Vec<Message>,
    }

    impl Transport for MockTransport {
        fn send(&mut self, message: &Message) {
            self.sent.push(message.clone());
        }
    }

    #[derive(Default)]
    struct MockOffline {
        records: FxHashMap<String, Value>,
        writes: u32,
        clears: u32,
    }

    impl OfflineStore for MockOffline {
        fn read(&mut self, doc_id: &str) -> Option<Value> {
            self.records.get(doc_id).cloned()
        }

        fn write(&mut self, doc_id: &str, records: &Value) {
            self.records.insert(doc_id.to_string(), records.clone());
            self.writes += 1;
        }

        fn clear(&mut self, doc_id: &str) {
            self.records.remove(doc_id);
            self.clears += 1;
        }
    }

    fn stroke(id: &str, timestamp: u64) -> Graphic {
        stroke_at(id, timestamp, 0.0)
    }

    fn stroke_at(id: &str, timestamp: u64, y: f32) -> Graphic {
        Graphic::Stroke(Stroke::new(
            id,
            Color::BLACK,
            2.0,
            Layer::Pen,
            vec![
                StrokePoint::new(0.0, y, 0.5, 0),
                StrokePoint::new(10.0, y, 0.5, 16),
            ],
            timestamp,
        ))
    }

    fn snapshot(graphics: &[&Graphic]) -> Map<String, Value> {
        graphics
            .iter()
            .map(|g| (g.id().to_string(), wire::encode(g)))
            .collect()
    }

    fn synced_store() -> (CollabStore, MockTransport, MockOffline) {
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        let mut offline = MockOffline::default();
        store.connect();
        store.handle_message(
            Message::LoadNote {
                strokes: Map::new(),
                creation_date: 0,
                can_write: true,
            },
            0,
            &mut transport,
            &mut offline,
        );
        (store, transport, offline)
    }

    #[test]
    fn test_timestamp_precedence_either_order() {
        for flip in [false, true] {
            let (mut store, mut transport, _) = synced_store();
            let v1 = stroke("s", 5);
            let v2 = stroke("s", 9);
            let (first, second) = if flip { (&v2, &v1) } else { (&v1, &v2) };
            store.commit_local(first.clone(), &mut transport);
            store.commit_local(second.clone(), &mut transport);
            assert_eq!(store.get("s").unwrap().timestamp(), 9);
        }
    }

    #[test]
    fn test_equal_timestamp_ties_converge_either_order() {
        let a = stroke_at("s", 7, 0.0);
        let b = stroke_at("s", 7, 5.0);

        let survivor = |first: &Graphic, second: &Graphic| {
            let (mut store, mut transport, _) = synced_store();
            store.commit_local(first.clone(), &mut transport);
            store.commit_local(second.clone(), &mut transport);
            wire::encode(store.get("s").unwrap())
        };
        // Same winner no matter which write lands first.
        assert_eq!(survivor(&a, &b), survivor(&b, &a));

        // A deletion at the same millisecond wins in both orders.
        let t = Graphic::Tombstone(Tombstone::new("s", 7));
        let (mut store, mut transport, _) = synced_store();
        store.commit_local(a.clone(), &mut transport);
        store.commit_local(t.clone(), &mut transport);
        assert!(store.get("s").unwrap().is_tombstone());

        let (mut flipped, mut transport, _) = synced_store();
        flipped.commit_local(t, &mut transport);
        flipped.commit_local(a, &mut transport);
        assert!(flipped.get("s").unwrap().is_tombstone());
    }

    #[test]
    fn test_tombstone_supersedes_older_stroke() {
        let (mut store, mut transport, _) = synced_store();
        store.commit_local(stroke("s", 5), &mut transport);
        store.commit_local(Graphic::Tombstone(Tombstone::new("s", 9)), &mut transport);
        assert!(store.get("s").unwrap().is_tombstone());
        // An older stroke cannot resurrect it.
        store.commit_local(stroke("s", 7), &mut transport);
        assert!(store.get("s").unwrap().is_tombstone());
    }

    #[test]
    fn test_synced_commits_broadcast() {
        let (mut store, mut transport, _) = synced_store();
        store.commit_local(stroke("s", 5), &mut transport);
        store.commit_local(Graphic::Tombstone(Tombstone::new("s", 9)), &mut transport);
        assert!(matches!(transport.sent[0], Message::NewStroke(_)));
        assert!(matches!(transport.sent[1], Message::RemoveStroke { .. }));
    }

    #[test]
    fn test_disconnected_commits_accumulate_and_flush() {
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        let mut offline = MockOffline::default();

        store.commit_local(stroke("a", 5), &mut transport);
        assert!(transport.sent.is_empty());

        store.flush_offline(OFFLINE_FLUSH_INTERVAL_MS, &mut offline);
        assert_eq!(offline.writes, 1);
        let written = offline.records.get("doc").unwrap().as_object().unwrap();
        assert!(written.contains_key("a"));

        // Nothing new: no redundant write.
        store.flush_offline(OFFLINE_FLUSH_INTERVAL_MS * 2, &mut offline);
        assert_eq!(offline.writes, 1);
    }

    #[test]
    fn test_flush_respects_interval() {
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        let mut offline = MockOffline::default();
        store.commit_local(stroke("a", 5), &mut transport);
        store.flush_offline(OFFLINE_FLUSH_INTERVAL_MS, &mut offline);
        store.commit_local(stroke("b", 6), &mut transport);
        // Too soon after the last flush.
        store.flush_offline(OFFLINE_FLUSH_INTERVAL_MS + 10, &mut offline);
        assert_eq!(offline.writes, 1);
        store.flush_offline(OFFLINE_FLUSH_INTERVAL_MS * 2, &mut offline);
        assert_eq!(offline.writes, 2);
    }

    #[test]
    fn test_reconciliation_creation_date_cutoff() {
        // Local cache: A predates the document reset, B is current.
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        let mut offline = MockOffline::default();
        store.commit_local(stroke("A", 500), &mut transport);
        store.commit_local(stroke("B", 1500), &mut transport);

        store.connect();
        store.handle_message(
            Message::LoadNote {
                strokes: Map::new(),
                creation_date: 1000,
                can_write: true,
            },
            2000,
            &mut transport,
            &mut offline,
        );

        // A tombstoned locally; B retained and repair-pushed.
        assert!(store.get("A").unwrap().is_tombstone());
        assert!(!store.get("B").unwrap().is_tombstone());
        let pushed: Vec<_> = transport
            .sent
            .iter()
            .filter_map(|m| match m {
                Message::LoadStrokes(records) => Some(records),
                _ => None,
            })
            .collect();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].len(), 1);
        assert_eq!(pushed[0][0]["id"], "B");
        // A is not re-sent.
        assert!(!transport
            .sent
            .iter()
            .any(|m| matches!(m, Message::RemoveStroke { id } if id == "A")));
    }

    #[test]
    fn test_reconciliation_prefers_newer_side() {
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        let mut offline = MockOffline::default();
        store.commit_local(stroke("local-newer", 900), &mut transport);
        store.commit_local(stroke("server-newer", 300), &mut transport);

        let server = snapshot(&[&stroke("local-newer", 400), &stroke("server-newer", 800)]);
        store.connect();
        store.handle_message(
            Message::LoadNote {
                strokes: server,
                creation_date: 0,
                can_write: true,
            },
            1000,
            &mut transport,
            &mut offline,
        );

        assert_eq!(store.get("local-newer").unwrap().timestamp(), 900);
        assert_eq!(store.get("server-newer").unwrap().timestamp(), 800);
        // Only the locally-newer stroke was repair-pushed.
        let pushed: Vec<_> = transport
            .sent
            .iter()
            .filter_map(|m| match m {
                Message::LoadStrokes(records) => Some(records),
                _ => None,
            })
            .collect();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0][0]["id"], "local-newer");
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let build = || {
            let mut store = CollabStore::new("doc");
            let mut transport = MockTransport::default();
            store.commit_local(stroke("A", 500), &mut transport);
            store.commit_local(stroke("B", 1500), &mut transport);
            store.commit_local(stroke("C", 2000), &mut transport);
            (store, transport)
        };
        let server = snapshot(&[&stroke("B", 1800), &stroke("D", 1200)]);

        let load = Message::LoadNote {
            strokes: server,
            creation_date: 1000,
            can_write: true,
        };

        let (mut once, mut t1) = build();
        let mut o1 = MockOffline::default();
        once.connect();
        once.handle_message(load.clone(), 3000, &mut t1, &mut o1);

        let (mut twice, mut t2) = build();
        let mut o2 = MockOffline::default();
        twice.connect();
        twice.handle_message(load.clone(), 3000, &mut t2, &mut o2);
        twice.handle_message(load, 3000, &mut t2, &mut o2);

        for id in ["A", "B", "C", "D"] {
            let a = once.get(id).map(|g| (g.timestamp(), g.is_tombstone()));
            let b = twice.get(id).map(|g| (g.timestamp(), g.is_tombstone()));
            assert_eq!(a, b, "divergence at {id}");
        }
        assert_eq!(twice.get("B").unwrap().timestamp(), 1800);
        assert_eq!(twice.get("C").unwrap().timestamp(), 2000);
        assert!(twice.get("A").unwrap().is_tombstone());
    }

    #[test]
    fn test_offline_cache_survives_restart_and_clears_after_sync() {
        let mut offline = MockOffline::default();

        // First run: draw offline, flush, "crash".
        {
            let mut store = CollabStore::new("doc");
            let mut transport = MockTransport::default();
            store.commit_local(stroke("a", 100), &mut transport);
            store.flush_offline(OFFLINE_FLUSH_INTERVAL_MS, &mut offline);
        }

        // Second run: restore, reconcile, cache cleared.
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        store.load_offline(&mut offline);
        assert!(store.get("a").is_some());

        store.connect();
        store.handle_message(
            Message::LoadNote {
                strokes: Map::new(),
                creation_date: 0,
                can_write: true,
            },
            200,
            &mut transport,
            &mut offline,
        );
        assert_eq!(offline.clears, 1);
        assert!(offline.records.is_empty());
        // The restored stroke was repair-pushed to the server.
        assert!(transport
            .sent
            .iter()
            .any(|m| matches!(m, Message::LoadStrokes(_))));
    }

    #[test]
    fn test_malformed_remote_records_skipped() {
        let (mut store, mut transport, mut offline) = synced_store();
        let events = store.handle_message(
            Message::LoadStrokes(vec![
                serde_json::json!({"garbage": true}),
                wire::encode(&stroke("good", 10)),
            ]),
            10,
            &mut transport,
            &mut offline,
        );
        assert_eq!(events.len(), 1);
        assert!(store.get("good").is_some());
    }

    #[test]
    fn test_remove_stroke_stamps_local_clock() {
        let (mut store, mut transport, mut offline) = synced_store();
        store.commit_local(stroke("s", 5), &mut transport);
        store.handle_message(
            Message::RemoveStroke { id: "s".into() },
            50,
            &mut transport,
            &mut offline,
        );
        let g = store.get("s").unwrap();
        assert!(g.is_tombstone());
        assert_eq!(g.timestamp(), 50);
    }

    #[test]
    fn test_read_only_note_does_not_broadcast() {
        let mut store = CollabStore::new("doc");
        let mut transport = MockTransport::default();
        let mut offline = MockOffline::default();
        store.connect();
        store.handle_message(
            Message::LoadNote {
                strokes: Map::new(),
                creation_date: 0,
                can_write: false,
            },
            0,
            &mut transport,
            &mut offline,
        );
        transport.sent.clear();
        store.commit_local(stroke("s", 5), &mut transport);
        assert!(transport.sent.is_empty());
        // Still applied locally.
        assert!(store.get("s").is_some());
    }

    #[test]
    fn test_hit_testing_reads_the_map() {
        let (mut store, mut transport, _) = synced_store();
        store.commit_local(stroke("s", 5), &mut transport);
        let hits = store.hit_by_segment(Point::new(5.0, -5.0), Point::new(5.0, 5.0));
        assert_eq!(hits.len(), 1);
        assert!(store
            .hit_by_segment(Point::new(50.0, 50.0), Point::new(60.0, 60.0))
            .is_empty());
    }
}
