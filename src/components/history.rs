use std::collections::VecDeque;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::ImageEncoder;

use crate::canvas::{CanvasError, LayerId, PixelBuffer};
use crate::{log_info, log_warn};

/// Number of states kept; the oldest is evicted past this.
pub const HISTORY_CAPACITY: usize = 20;

// ============================================================================
// SNAPSHOT — PNG-encoded copy of the flattened document
// ============================================================================

/// Encoded composite image.  Bytes are shared, so cloning a snapshot (e.g. to
/// hand it to a restore ticket) does not copy pixel data.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    png: Arc<Vec<u8>>,
}

impl Snapshot {
    /// Encode `buf` as PNG.  Synchronous.
    pub fn encode(buf: &PixelBuffer) -> Result<Self, CanvasError> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            buf.as_raw(),
            buf.width(),
            buf.height(),
            image::ColorType::Rgba8,
        )?;
        Ok(Self {
            width: buf.width(),
            height: buf.height(),
            png: Arc::new(png),
        })
    }

    /// Decode back into a pixel buffer.
    pub fn decode(&self) -> Result<PixelBuffer, CanvasError> {
        let img = image::load_from_memory_with_format(&self.png, image::ImageFormat::Png)?;
        let rgba = img.into_rgba8();
        if rgba.width() != self.width || rgba.height() != self.height {
            return Err(CanvasError::Snapshot(format!(
                "decoded {}×{} image, expected {}×{}",
                rgba.width(),
                rgba.height(),
                self.width,
                self.height
            )));
        }
        PixelBuffer::from_rgba_image(rgba)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn encoded_len(&self) -> usize {
        self.png.len()
    }
}

/// Anything the history can report a memory figure for.
pub trait MemorySize {
    fn memory_size(&self) -> usize;
}

impl MemorySize for Snapshot {
    fn memory_size(&self) -> usize {
        self.encoded_len()
    }
}

// ============================================================================
// HISTORY MANAGER - bounded linear snapshot stack with a cursor
// ============================================================================

/// Linear undo history.  `entries[cursor]` is the current state; entries past
/// the cursor are the redo branch and are discarded by the next capture.
pub struct HistoryManager<T> {
    entries: VecDeque<T>,
    cursor: usize,
    capacity: usize,
    /// Bumped on every cursor-affecting call; restore tickets carry it.
    generation: u64,
}

impl<T: Clone> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl<T: Clone> HistoryManager<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1) + 1),
            cursor: 0,
            capacity: capacity.max(1),
            generation: 0,
        }
    }

    /// Record a new current state, dropping any redo branch.
    pub fn capture(&mut self, snapshot: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot);

        if self.entries.len() > self.capacity {
            // Cursor stays numerically put: it now names the new tip.
            self.entries.pop_front();
            log_info!("History full ({}), evicted oldest state", self.capacity);
        } else if self.entries.len() > 1 {
            self.cursor += 1;
        }
        self.generation += 1;
    }

    /// Step back; `None` when already at the oldest state.
    pub fn undo(&mut self) -> Option<T> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        self.generation += 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward; `None` when already at the newest state.
    pub fn redo(&mut self) -> Option<T> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.generation += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// The current state, if anything was captured yet.
    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    /// `None` while empty.
    pub fn cursor(&self) -> Option<usize> {
        if self.entries.is_empty() { None } else { Some(self.cursor) }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.generation += 1;
    }
}

impl<T: Clone + MemorySize> HistoryManager<T> {
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(|e| e.memory_size()).sum()
    }
}

// ============================================================================
// RESTORE TICKETS — deferred snapshot decode, applied only while current
// ============================================================================

/// A pending restore issued by undo/redo.  Decoding happens later; by then the
/// history may have moved on, in which case the result must be dropped.
#[derive(Clone, Debug)]
pub struct RestoreTicket {
    generation: u64,
    cursor: usize,
    snapshot: Snapshot,
    /// Layer the restored pixels are written to.
    layer: Option<LayerId>,
}

impl RestoreTicket {
    pub fn new(generation: u64, cursor: usize, snapshot: Snapshot) -> Self {
        Self { generation, cursor, snapshot, layer: None }
    }

    pub fn on_layer(mut self, id: LayerId) -> Self {
        self.layer = Some(id);
        self
    }

    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn decode(&self) -> Result<PixelBuffer, CanvasError> {
        self.snapshot.decode()
    }

    pub fn is_current<T: Clone>(&self, history: &HistoryManager<T>) -> bool {
        self.generation == history.generation()
    }
}

/// What happened to a restore once it completed.
#[derive(Clone, Debug, PartialEq)]
pub enum RestoreOutcome {
    Applied { cursor: usize },
    /// Superseded by a later history move; result discarded.
    Stale,
    Failed(CanvasError),
}

/// FIFO of in-flight restores, completed one at a time.
#[derive(Default)]
pub struct RestoreQueue {
    pending: VecDeque<RestoreTicket>,
}

impl RestoreQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, ticket: RestoreTicket) {
        if !self.pending.is_empty() {
            log_warn!(
                "Restore issued while {} still pending; older results will be dropped",
                self.pending.len()
            );
        }
        self.pending.push_back(ticket);
    }

    /// Oldest pending ticket.
    pub fn next(&mut self) -> Option<RestoreTicket> {
        self.pending.pop_front()
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::WHITE;
    use image::Rgba;

    #[test]
    fn undo_walks_back_to_oldest_then_stops() {
        let mut h = HistoryManager::new(HISTORY_CAPACITY);
        h.capture("s1");
        h.capture("s2");
        h.capture("s3");
        assert_eq!(h.undo(), Some("s2"));
        assert_eq!(h.undo(), Some("s1"));
        assert_eq!(h.undo(), None);
        assert_eq!(h.cursor(), Some(0));
    }

    #[test]
    fn capture_after_undo_discards_redo_branch() {
        let mut h = HistoryManager::new(HISTORY_CAPACITY);
        h.capture("s1");
        h.capture("s2");
        h.capture("s3");
        h.undo();
        h.undo();
        h.capture("s4");
        assert_eq!(h.redo(), None);
        assert_eq!(h.len(), 2);
        assert_eq!(h.current(), Some(&"s4"));
        assert_eq!(h.undo(), Some("s1"));
        assert_eq!(h.redo(), Some("s4"));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = HistoryManager::new(HISTORY_CAPACITY);
        for i in 0..25 {
            h.capture(i);
        }
        assert_eq!(h.capacity(), 20);
        assert_eq!(h.len(), 20);
        assert_eq!(h.cursor(), Some(19));
        let mut last = None;
        for _ in 0..19 {
            last = h.undo();
            assert!(last.is_some());
        }
        assert_eq!(last, Some(5));
        assert_eq!(h.undo(), None);
    }

    #[test]
    fn eviction_after_undo_keeps_cursor_on_same_entry() {
        let mut h = HistoryManager::new(3);
        h.capture('a');
        h.capture('b');
        h.capture('c');
        h.undo(); // at b
        h.capture('d'); // c dropped, no eviction: [a, b, d]
        assert_eq!(h.current(), Some(&'d'));
        h.capture('e'); // [b, d, e]
        assert_eq!(h.len(), 3);
        assert_eq!(h.current(), Some(&'e'));
        assert_eq!(h.undo(), Some('d'));
        assert_eq!(h.undo(), Some('b'));
        assert_eq!(h.undo(), None);
    }

    #[test]
    fn redo_at_tip_and_empty_history_are_noops() {
        let mut h: HistoryManager<u8> = HistoryManager::default();
        assert_eq!(h.undo(), None);
        assert_eq!(h.redo(), None);
        assert_eq!(h.cursor(), None);
        h.capture(1);
        assert_eq!(h.redo(), None);
        assert!(!h.can_undo());
        assert!(!h.can_redo());
    }

    #[test]
    fn generation_changes_even_when_cursor_does_not() {
        let mut h = HistoryManager::new(2);
        h.capture(1);
        h.capture(2);
        let (cursor, generation) = (h.cursor(), h.generation());
        h.capture(3);
        assert_eq!(h.cursor(), cursor);
        assert_ne!(h.generation(), generation);
    }

    #[test]
    fn snapshot_round_trips_through_png() {
        let mut buf = PixelBuffer::new_filled(5, 3, WHITE).unwrap();
        buf.set(4, 2, Rgba([1, 2, 3, 4])).unwrap();
        let snap = Snapshot::encode(&buf).unwrap();
        assert_eq!(snap.dimensions(), (5, 3));
        assert!(snap.memory_size() > 0);
        assert_eq!(snap.decode().unwrap(), buf);
    }

    #[test]
    fn memory_usage_sums_encoded_snapshots() {
        let snap = Snapshot::encode(&PixelBuffer::new_filled(8, 8, WHITE).unwrap()).unwrap();
        let mut h = HistoryManager::new(HISTORY_CAPACITY);
        assert_eq!(h.memory_usage(), 0);
        h.capture(snap.clone());
        h.capture(snap.clone());
        assert_eq!(h.memory_usage(), 2 * snap.encoded_len());
        h.clear();
        assert_eq!(h.memory_usage(), 0);
        assert!(h.is_empty());
    }

    #[test]
    fn ticket_goes_stale_after_history_moves() {
        let buf = PixelBuffer::new_filled(2, 2, WHITE).unwrap();
        let snap = Snapshot::encode(&buf).unwrap();
        let mut h = HistoryManager::new(HISTORY_CAPACITY);
        h.capture(snap.clone());
        h.capture(snap.clone());

        let undone = h.undo().unwrap();
        let layer = LayerId::new();
        let ticket = RestoreTicket::new(h.generation(), h.cursor().unwrap(), undone).on_layer(layer);
        assert!(ticket.is_current(&h));
        assert_eq!(ticket.layer(), Some(layer));
        h.redo();
        assert!(!ticket.is_current(&h));
    }

    #[test]
    fn queue_is_fifo() {
        let snap = Snapshot::encode(&PixelBuffer::new(1, 1).unwrap()).unwrap();
        let mut q = RestoreQueue::new();
        q.issue(RestoreTicket::new(1, 0, snap.clone()));
        q.issue(RestoreTicket::new(2, 1, snap));
        assert_eq!(q.len(), 2);
        assert_eq!(q.next().map(|t| t.generation()), Some(1));
        assert_eq!(q.next().map(|t| t.generation()), Some(2));
        assert!(!q.is_pending());
    }
}
