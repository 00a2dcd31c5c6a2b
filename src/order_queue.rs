//! Chunked FIFO order queue with bitmap-indexed logical deletion.
//!
//! One queue per price level. Pushes append to the tail chunk's next
//! unwritten slot; a cancel clears one validity bit and never moves the
//! survivors, so a handle stays good until the order is removed or the head
//! cursor drains past its chunk. Reclamation is amortized at chunk
//! granularity: only head advancement frees chunks, interior chunks persist
//! until the cursor crosses them.
//!
//! Cancels dominate production event mixes, which is why deletion must be a
//! single bit clear with no reshuffling, while the chunked layout keeps the
//! sequential matching path cache-friendly.

use crate::pool::{Pool, PoolIndex, NULL_INDEX};
use crate::types::{ClientId, OrderId, Quantity, CHUNK_CAPACITY};

/// Bitmap words per chunk.
const WORDS_PER_CHUNK: usize = CHUNK_CAPACITY / 64;

const _: () = assert!(
    CHUNK_CAPACITY % 64 == 0,
    "chunk capacity must be a multiple of 64"
);

/// The minimum state stored per resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BasicOrder {
    /// Client-assigned order id.
    pub order_id: OrderId,
    /// Remaining quantity; never zero while the order is queued.
    pub qty: Quantity,
    /// Owning client.
    pub client_id: ClientId,
}

impl BasicOrder {
    pub const EMPTY: BasicOrder = BasicOrder {
        order_id: 0,
        qty: 0,
        client_id: 0,
    };

    #[inline]
    pub const fn new(order_id: OrderId, qty: Quantity, client_id: ClientId) -> Self {
        Self {
            order_id,
            qty,
            client_id,
        }
    }
}

impl Default for BasicOrder {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Stable reference to a queued order: owning chunk plus slot index.
///
/// Issued by `push`; stays valid until the order is removed, popped, or its
/// chunk is freed by head advancement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderHandle {
    pub chunk: PoolIndex,
    pub slot: u32,
}

impl OrderHandle {
    pub const INVALID: OrderHandle = OrderHandle {
        chunk: NULL_INDEX,
        slot: 0,
    };

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.chunk != NULL_INDEX
    }
}

impl Default for OrderHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A fixed block of order slots with a validity bitmap.
///
/// `high_water` counts slots ever written and never decreases; bits at or
/// above it are never set. A clear bit below it is a logically deleted
/// order - the bitmap alone cannot tell "cancelled" from "unused", which is
/// why the mark is kept separately.
pub struct Chunk {
    slots: [BasicOrder; CHUNK_CAPACITY],
    bitmap: [u64; WORDS_PER_CHUNK],
    high_water: u32,
    prev: PoolIndex,
    next: PoolIndex,
}

impl Default for Chunk {
    fn default() -> Self {
        Self {
            slots: [BasicOrder::EMPTY; CHUNK_CAPACITY],
            bitmap: [0; WORDS_PER_CHUNK],
            high_water: 0,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

impl Chunk {
    /// Prepare a recycled chunk for reuse. Slot payloads are left stale;
    /// the bitmap and high-water mark are authoritative.
    fn reset(&mut self) {
        self.bitmap = [0; WORDS_PER_CHUNK];
        self.high_water = 0;
        self.prev = NULL_INDEX;
        self.next = NULL_INDEX;
    }

    #[inline]
    fn set_bit(&mut self, slot: u32) {
        self.bitmap[(slot / 64) as usize] |= 1u64 << (slot % 64);
    }

    #[inline]
    fn clear_bit(&mut self, slot: u32) {
        self.bitmap[(slot / 64) as usize] &= !(1u64 << (slot % 64));
    }

    #[inline]
    fn bit(&self, slot: u32) -> bool {
        self.bitmap[(slot / 64) as usize] & (1u64 << (slot % 64)) != 0
    }

    /// Lowest valid slot at or after `from`, bounded by the high-water mark.
    ///
    /// Masks off bits below `from` in the containing word, then scans
    /// forward - skipping four-word blocks whose aggregate is zero - and
    /// resolves the position with count-trailing-zeros.
    fn first_valid_from(&self, from: u32) -> Option<u32> {
        if from >= self.high_water {
            return None;
        }
        let mut word_idx = (from / 64) as usize;
        let mut word = self.bitmap[word_idx] & (!0u64 << (from % 64));
        loop {
            if word != 0 {
                let slot = word_idx as u32 * 64 + word.trailing_zeros();
                return (slot < self.high_water).then_some(slot);
            }
            word_idx += 1;
            while word_idx + 4 <= WORDS_PER_CHUNK
                && (self.bitmap[word_idx]
                    | self.bitmap[word_idx + 1]
                    | self.bitmap[word_idx + 2]
                    | self.bitmap[word_idx + 3])
                    == 0
            {
                word_idx += 4;
            }
            if word_idx >= WORDS_PER_CHUNK {
                return None;
            }
            word = self.bitmap[word_idx];
        }
    }

    /// Highest valid slot, scanning down from the high-water mark.
    fn last_valid(&self) -> Option<u32> {
        if self.high_water == 0 {
            return None;
        }
        let mut word_idx = ((self.high_water - 1) / 64) as usize;
        loop {
            let word = self.bitmap[word_idx];
            if word != 0 {
                return Some(word_idx as u32 * 64 + (63 - word.leading_zeros()));
            }
            if word_idx == 0 {
                return None;
            }
            word_idx -= 1;
        }
    }

    /// Set-bit count across the whole bitmap. Bits above the high-water
    /// mark are never set, so this is the chunk's live-order count.
    fn live_count(&self) -> u32 {
        self.bitmap.iter().map(|w| w.count_ones()).sum()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("high_water", &self.high_water)
            .field("live", &self.live_count())
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Chunked FIFO of resting orders at one price level.
///
/// Chunks come from the book's shared chunk pool, so every operation that
/// may touch chunk storage takes the pool explicitly. Insertion order
/// within a chunk is slot order and across chunks is link order, which
/// preserves FIFO globally.
#[derive(Debug)]
pub struct OrderQueue {
    head: PoolIndex,
    tail: PoolIndex,
    /// Cursor into the head chunk; slots below it are consumed.
    head_index: u32,
    /// Live-order count.
    len: u32,
    /// Running sum of live quantities, for O(1) depth queries.
    total_qty: u64,
}

impl Default for OrderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderQueue {
    pub const fn new() -> Self {
        Self {
            head: NULL_INDEX,
            tail: NULL_INDEX,
            head_index: 0,
            len: 0,
            total_qty: 0,
        }
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn total_qty(&self) -> u64 {
        self.total_qty
    }

    /// Append an order, allocating a fresh tail chunk if the current one is
    /// fully written. Returns the order's stable handle.
    pub fn push(&mut self, chunks: &mut Pool<Chunk>, order: BasicOrder) -> OrderHandle {
        if self.tail == NULL_INDEX {
            let idx = chunks.alloc();
            chunks.get_mut(idx).reset();
            self.head = idx;
            self.tail = idx;
            self.head_index = 0;
        } else if chunks.get(self.tail).high_water as usize == CHUNK_CAPACITY {
            let idx = chunks.alloc();
            let chunk = chunks.get_mut(idx);
            chunk.reset();
            chunk.prev = self.tail;
            chunks.get_mut(self.tail).next = idx;
            self.tail = idx;
        }
        let tail = chunks.get_mut(self.tail);
        let slot = tail.high_water;
        tail.slots[slot as usize] = order;
        tail.set_bit(slot);
        tail.high_water += 1;
        self.len += 1;
        self.total_qty += order.qty as u64;
        OrderHandle {
            chunk: self.tail,
            slot,
        }
    }

    /// Logically delete the order at `handle`: a single bit clear.
    /// Idempotent - a second call finds the bit already clear and does
    /// nothing. Chunk storage is not reclaimed here; only head advancement
    /// frees chunks, which is what keeps every other handle stable.
    pub fn remove(&mut self, chunks: &mut Pool<Chunk>, handle: OrderHandle) {
        if !handle.is_valid() {
            return;
        }
        let chunk = chunks.get_mut(handle.chunk);
        if handle.slot < chunk.high_water && chunk.bit(handle.slot) {
            chunk.clear_bit(handle.slot);
            self.total_qty -= chunk.slots[handle.slot as usize].qty as u64;
            self.len -= 1;
        }
    }

    /// Remove the current front order: advance the head cursor to the
    /// first valid slot, then clear it.
    pub fn pop(&mut self, chunks: &mut Pool<Chunk>) {
        self.advance_head(chunks);
        if self.head == NULL_INDEX {
            return;
        }
        let chunk = chunks.get_mut(self.head);
        chunk.clear_bit(self.head_index);
        self.total_qty -= chunk.slots[self.head_index as usize].qty as u64;
        self.len -= 1;
    }

    /// Advance to and return the front order, or `None` if the queue is
    /// empty. Frees drained head chunks as the cursor crosses them.
    pub fn front<'a>(&mut self, chunks: &'a mut Pool<Chunk>) -> Option<&'a mut BasicOrder> {
        self.advance_head(chunks);
        if self.head == NULL_INDEX {
            return None;
        }
        Some(&mut chunks.get_mut(self.head).slots[self.head_index as usize])
    }

    /// Front order without touching head bookkeeping or chunk storage.
    pub fn peek<'a>(&self, chunks: &'a Pool<Chunk>) -> Option<&'a BasicOrder> {
        let mut current = self.head;
        let mut from = self.head_index;
        while current != NULL_INDEX {
            let chunk = chunks.get(current);
            if let Some(slot) = chunk.first_valid_from(from) {
                return Some(&chunk.slots[slot as usize]);
            }
            current = chunk.next;
            from = 0;
        }
        None
    }

    /// Most recently inserted order still alive, scanning backward from the
    /// tail chunk.
    pub fn last<'a>(&self, chunks: &'a Pool<Chunk>) -> Option<&'a BasicOrder> {
        let mut current = self.tail;
        while current != NULL_INDEX {
            let chunk = chunks.get(current);
            if let Some(slot) = chunk.last_valid() {
                return Some(&chunk.slots[slot as usize]);
            }
            current = chunk.prev;
        }
        None
    }

    /// Account for an in-place partial fill of a queued order. The caller
    /// decrements the slot's quantity directly; this keeps the running sum
    /// in step.
    #[inline]
    pub fn subtract_qty(&mut self, qty: Quantity) {
        debug_assert!(self.total_qty >= qty as u64, "fill exceeds queued quantity");
        self.total_qty -= qty as u64;
    }

    /// Return every remaining chunk to the pool. Used when the owning price
    /// level is destroyed while logically deleted slots are still resident.
    pub fn release(&mut self, chunks: &mut Pool<Chunk>) {
        let mut current = self.head;
        while current != NULL_INDEX {
            let next = chunks.get(current).next;
            chunks.free(current);
            current = next;
        }
        self.head = NULL_INDEX;
        self.tail = NULL_INDEX;
        self.head_index = 0;
        self.len = 0;
        self.total_qty = 0;
    }

    /// Move the head cursor to the first valid slot at or after its current
    /// position, freeing fully drained head chunks along the way. When the
    /// last chunk is freed the queue returns to the unallocated state and a
    /// later `push` starts afresh.
    fn advance_head(&mut self, chunks: &mut Pool<Chunk>) {
        while self.head != NULL_INDEX {
            let chunk = chunks.get(self.head);
            if let Some(slot) = chunk.first_valid_from(self.head_index) {
                self.head_index = slot;
                return;
            }
            let next = chunk.next;
            let drained = self.head;
            chunks.free(drained);
            if drained == self.tail {
                self.head = NULL_INDEX;
                self.tail = NULL_INDEX;
            } else {
                chunks.get_mut(next).prev = NULL_INDEX;
                self.head = next;
            }
            self.head_index = 0;
        }
    }

    /// Sum of set bits across all resident chunks; equals `len()` whenever
    /// the queue is consistent.
    #[cfg(test)]
    fn live_bits(&self, chunks: &Pool<Chunk>) -> u32 {
        let mut current = self.head;
        let mut total = 0;
        while current != NULL_INDEX {
            let chunk = chunks.get(current);
            total += chunk.live_count();
            current = chunk.next;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: OrderId) -> BasicOrder {
        BasicOrder::new(id, 10, 1)
    }

    fn new_chunks() -> Pool<Chunk> {
        Pool::new(8)
    }

    #[test]
    fn test_initially_empty() {
        let chunks = new_chunks();
        let q = OrderQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.total_qty(), 0);
        assert!(q.peek(&chunks).is_none());
        assert!(q.last(&chunks).is_none());
        assert_eq!(chunks.allocated(), 0);
    }

    #[test]
    fn test_push_and_front() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        let h = q.push(&mut chunks, order(101));
        assert!(h.is_valid());
        assert_eq!(q.len(), 1);
        assert_eq!(q.total_qty(), 10);
        assert_eq!(q.peek(&chunks).unwrap().order_id, 101);
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 101);
        assert_eq!(chunks.allocated(), 1);
    }

    #[test]
    fn test_push_and_last() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        q.push(&mut chunks, order(101));
        q.push(&mut chunks, order(102));

        assert_eq!(q.last(&chunks).unwrap().order_id, 102);
        assert_eq!(q.peek(&chunks).unwrap().order_id, 101);
    }

    #[test]
    fn test_pop_fifo() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        for id in [1, 2, 3] {
            q.push(&mut chunks, order(id));
        }

        assert_eq!(q.front(&mut chunks).unwrap().order_id, 1);
        q.pop(&mut chunks);
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 2);
        q.pop(&mut chunks);
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 3);
        q.pop(&mut chunks);
        assert!(q.is_empty());
        assert!(q.front(&mut chunks).is_none());
        // Final drain returned the chunk to the pool.
        assert_eq!(chunks.allocated(), 0);
    }

    #[test]
    fn test_remove_preserves_fifo_around_gap() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        q.push(&mut chunks, order(1)); // A
        let b = q.push(&mut chunks, order(2)); // B
        q.push(&mut chunks, order(3)); // C

        q.remove(&mut chunks, b);
        assert_eq!(q.len(), 2);

        assert_eq!(q.front(&mut chunks).unwrap().order_id, 1);
        q.pop(&mut chunks);
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 3);
        q.pop(&mut chunks);
        assert!(q.is_empty());
    }

    #[test]
    fn test_remove_front_then_peek() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        let a = q.push(&mut chunks, order(1));
        q.push(&mut chunks, order(2));

        q.remove(&mut chunks, a);
        assert_eq!(q.peek(&chunks).unwrap().order_id, 2);
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 2);
    }

    #[test]
    fn test_remove_last_then_last() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        q.push(&mut chunks, order(1));
        let b = q.push(&mut chunks, order(2));

        q.remove(&mut chunks, b);
        assert_eq!(q.last(&chunks).unwrap().order_id, 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        let a = q.push(&mut chunks, order(1));
        q.push(&mut chunks, order(2));

        q.remove(&mut chunks, a);
        assert_eq!(q.len(), 1);
        q.remove(&mut chunks, a);
        assert_eq!(q.len(), 1);
        assert_eq!(q.total_qty(), 10);

        q.remove(&mut chunks, OrderHandle::INVALID);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_cross_chunk_push_and_pop() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();
        let count = CHUNK_CAPACITY as u64 + 1;

        for id in 0..count {
            q.push(&mut chunks, order(id));
        }
        assert_eq!(chunks.allocated(), 2);

        for _ in 0..CHUNK_CAPACITY {
            q.pop(&mut chunks);
        }
        assert_eq!(q.len(), 1);
        assert_eq!(q.front(&mut chunks).unwrap().order_id, count - 1);
        // The drained first chunk went back to the pool.
        assert_eq!(chunks.allocated(), 1);
    }

    #[test]
    fn test_handle_stable_across_later_pushes() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        let h = q.push(&mut chunks, order(42));
        for id in 100..100 + CHUNK_CAPACITY as u64 {
            q.push(&mut chunks, order(id));
        }

        // The early handle still addresses its order after the queue grew
        // past a chunk boundary.
        q.remove(&mut chunks, h);
        assert_eq!(q.len(), CHUNK_CAPACITY as u32);
        assert_eq!(q.peek(&chunks).unwrap().order_id, 100);
    }

    #[test]
    fn test_push_after_full_drain_allocates_fresh_chunk() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        q.push(&mut chunks, order(1));
        q.pop(&mut chunks);
        assert!(q.front(&mut chunks).is_none());
        assert_eq!(chunks.allocated(), 0);

        let h = q.push(&mut chunks, order(2));
        assert!(h.is_valid());
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 2);
        assert_eq!(chunks.allocated(), 1);
    }

    #[test]
    fn test_interior_chunk_persists_until_head_crosses() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();
        let mut handles = Vec::new();

        // Two full chunks plus one order in a third.
        for id in 0..(2 * CHUNK_CAPACITY as u64 + 1) {
            handles.push(q.push(&mut chunks, order(id)));
        }
        assert_eq!(chunks.allocated(), 3);

        // Cancel the entire middle chunk; it stays resident.
        for h in &handles[CHUNK_CAPACITY..2 * CHUNK_CAPACITY] {
            q.remove(&mut chunks, *h);
        }
        assert_eq!(chunks.allocated(), 3);

        // Drain the first chunk; advancement then skips the hollow middle
        // chunk and frees both.
        for _ in 0..CHUNK_CAPACITY {
            q.pop(&mut chunks);
        }
        assert_eq!(q.front(&mut chunks).unwrap().order_id, 2 * CHUNK_CAPACITY as u64);
        assert_eq!(chunks.allocated(), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_release_frees_resident_chunks() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();
        let mut handles = Vec::new();

        for id in 0..CHUNK_CAPACITY as u64 + 10 {
            handles.push(q.push(&mut chunks, order(id)));
        }
        for h in &handles {
            q.remove(&mut chunks, *h);
        }
        // All orders cancelled but both chunks still resident.
        assert!(q.is_empty());
        assert_eq!(chunks.allocated(), 2);

        q.release(&mut chunks);
        assert_eq!(chunks.allocated(), 0);
        assert!(q.peek(&chunks).is_none());
    }

    #[test]
    fn test_bitmap_matches_live_count() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();
        let mut handles = Vec::new();

        for id in 0..300u64 {
            handles.push(q.push(&mut chunks, order(id)));
        }
        for h in handles.iter().step_by(3) {
            q.remove(&mut chunks, *h);
        }
        q.pop(&mut chunks);
        q.pop(&mut chunks);

        assert_eq!(q.live_bits(&chunks), q.len());
    }

    #[test]
    fn test_total_qty_tracks_mutations() {
        let mut chunks = new_chunks();
        let mut q = OrderQueue::new();

        q.push(&mut chunks, BasicOrder::new(1, 100, 1));
        let b = q.push(&mut chunks, BasicOrder::new(2, 250, 1));
        q.push(&mut chunks, BasicOrder::new(3, 50, 2));
        assert_eq!(q.total_qty(), 400);

        q.remove(&mut chunks, b);
        assert_eq!(q.total_qty(), 150);

        q.pop(&mut chunks);
        assert_eq!(q.total_qty(), 50);
    }

    #[test]
    fn test_mixed_operations_against_model() {
        use std::collections::VecDeque;

        let mut chunks: Pool<Chunk> = Pool::new(16);
        let mut q = OrderQueue::new();
        let mut model: VecDeque<OrderId> = VecDeque::new();
        let mut handles = Vec::new();

        for id in 0..200u64 {
            handles.push((id, q.push(&mut chunks, order(id))));
            model.push_back(id);
        }

        // Cancel an interior run.
        for &(id, h) in &handles[50..100] {
            q.remove(&mut chunks, h);
            model.retain(|&m| m != id);
        }

        // Pop a prefix.
        for _ in 0..50 {
            q.pop(&mut chunks);
            model.pop_front();
        }

        assert_eq!(q.len() as usize, model.len());

        while let Some(expected) = model.pop_front() {
            assert_eq!(q.front(&mut chunks).unwrap().order_id, expected);
            q.pop(&mut chunks);
        }
        assert!(q.is_empty());
    }
}
