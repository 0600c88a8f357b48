//! Capacity-bounded stroke vertex batches
//!
//! Committed ribbons are grouped into shared append-only buffers so a layer
//! draws in a handful of calls instead of one per stroke. Removing a stroke
//! splices its span out of the float vec and the id index; the batch is then
//! dirty and re-uploads on the next frame.

use rustc_hash::FxHashMap;

/// Batch capacity in floats (~5,000 keeps re-uploads cheap on edits)
pub const BATCH_CAPACITY: usize = 5_000;

/// A stroke's slice of a batch buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

/// Append-only vertex buffer shared by many strokes
#[derive(Debug, Default)]
pub struct StrokeBatch {
    data: Vec<f32>,
    spans: FxHashMap<String, Span>,
    dirty: bool,
}

impl StrokeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Whether a ribbon of `len` floats fits
    ///
    /// An empty batch accepts any size: an oversized stroke simply owns its
    /// batch alone.
    pub fn has_room(&self, len: usize) -> bool {
        self.data.is_empty() || self.data.len() + len <= BATCH_CAPACITY
    }

    pub fn contains(&self, id: &str) -> bool {
        self.spans.contains_key(id)
    }

    pub fn span(&self, id: &str) -> Option<Span> {
        self.spans.get(id).copied()
    }

    /// Needs re-upload to the backend
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Append a stroke's ribbon to the open end of the buffer
    pub fn insert(&mut self, id: impl Into<String>, ribbon: &[f32]) {
        let id = id.into();
        debug_assert!(!self.spans.contains_key(&id), "duplicate span id");
        self.spans.insert(
            id,
            Span {
                offset: self.data.len(),
                len: ribbon.len(),
            },
        );
        self.data.extend_from_slice(ribbon);
        self.dirty = true;
    }

    /// Splice a stroke's span out of the buffer and the index
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(span) = self.spans.remove(id) else {
            return false;
        };
        self.data.drain(span.offset..span.offset + span.len);
        for s in self.spans.values_mut() {
            if s.offset > span.offset {
                s.offset -= span.len;
            }
        }
        self.dirty = true;
        tracing::trace!(id, removed = span.len, "batch span spliced");
        true
    }
}
