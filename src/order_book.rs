//! The order book: owns every price level and chunk, the per-client order
//! index, and the match output buffer.
//!
//! Price lookup is a direct-address table indexed by `price mod
//! MAX_PRICE_LEVELS`; the caller guarantees that concurrently active prices
//! span a narrower band, so the modulus never collides. Cancel lookup is a
//! direct-address per-client table from order id to queue handle.

use std::fmt;

use crate::order_queue::{BasicOrder, Chunk, OrderHandle};
use crate::pool::{Pool, PoolIndex, NULL_INDEX};
use crate::price_level::PriceLevel;
use crate::types::{
    ClientId, InstrumentId, OrderId, Price, Quantity, Side, INVALID_CLIENT_ID, INVALID_ORDER_ID,
    INVALID_PRICE, INVALID_QUANTITY, MAX_MATCH_EVENTS, MAX_NUM_CHUNKS, MAX_NUM_CLIENTS,
    MAX_NUM_ORDERS, MAX_PRICE_LEVELS,
};

/// Per-client index entry: the queue handle for a resting order, the
/// externally visible market order id, and the resting price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderInfo {
    pub handle: OrderHandle,
    pub market_order_id: OrderId,
    pub price: Price,
}

impl OrderInfo {
    pub const INVALID: OrderInfo = OrderInfo {
        handle: OrderHandle::INVALID,
        market_order_id: INVALID_ORDER_ID,
        price: INVALID_PRICE,
    };

    /// An entry is valid iff the order is currently resting.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }
}

impl Default for OrderInfo {
    fn default() -> Self {
        Self::INVALID
    }
}

/// One execution against a resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub incoming_order_id: OrderId,
    pub matched_order_id: OrderId,
    /// Trade price: always the resting level's price, never the
    /// aggressor's limit.
    pub price: Price,
    pub quantity: Quantity,
    /// Resting order's remaining quantity after this fill.
    pub matched_order_remaining_qty: Quantity,
    pub incoming_client_id: ClientId,
    pub matched_client_id: ClientId,
    pub incoming_side: Side,
    pub matched_side: Side,
}

impl Default for MatchResult {
    fn default() -> Self {
        Self {
            incoming_order_id: INVALID_ORDER_ID,
            matched_order_id: INVALID_ORDER_ID,
            price: INVALID_PRICE,
            quantity: INVALID_QUANTITY,
            matched_order_remaining_qty: INVALID_QUANTITY,
            incoming_client_id: INVALID_CLIENT_ID,
            matched_client_id: INVALID_CLIENT_ID,
            incoming_side: Side::Invalid,
            matched_side: Side::Invalid,
        }
    }
}

/// Result of one `match_order` call.
///
/// `matches` borrows the book's internal output buffer, which the next book
/// operation overwrites; consume it first.
#[derive(Debug)]
pub struct MatchResultSet<'a> {
    pub matches: &'a [MatchResult],
    /// Aggressor quantity left unfilled.
    pub remaining_quantity: Quantity,
    pub instrument: InstrumentId,
    /// The per-call event cap was reached with crossing liquidity still
    /// resting; re-invoke with the residual quantity.
    pub overflow: bool,
}

/// Single-instrument limit order book.
///
/// Strictly single-threaded: one logical actor owns a book. Every public
/// operation is synchronous and completes in bounded work.
pub struct OrderBook {
    instrument: InstrumentId,
    best_bid: PoolIndex,
    best_ask: PoolIndex,
    /// Direct-address table: price index -> level pool slot.
    price_levels: [PoolIndex; MAX_PRICE_LEVELS],
    /// Per-client table: client order id -> index entry.
    client_orders: Vec<Vec<OrderInfo>>,
    /// Output buffer reused by every `match_order` call.
    match_results: Vec<MatchResult>,
    level_pool: Pool<PriceLevel>,
    chunk_pool: Pool<Chunk>,
    live_orders: usize,
}

impl OrderBook {
    /// Create a book for one instrument, with every pool and table sized
    /// from the static capacity constants.
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            best_bid: NULL_INDEX,
            best_ask: NULL_INDEX,
            price_levels: [NULL_INDEX; MAX_PRICE_LEVELS],
            client_orders: vec![vec![OrderInfo::INVALID; MAX_NUM_ORDERS]; MAX_NUM_CLIENTS],
            match_results: vec![MatchResult::default(); MAX_MATCH_EVENTS],
            level_pool: Pool::new(MAX_PRICE_LEVELS as u32),
            chunk_pool: Pool::new(MAX_NUM_CHUNKS as u32),
            live_orders: 0,
        }
    }

    #[inline]
    fn price_index(price: Price) -> usize {
        price.rem_euclid(MAX_PRICE_LEVELS as i64) as usize
    }

    // ========================================================================
    // Order management
    // ========================================================================

    /// Rest a new order. The caller has already run `match_order` for any
    /// crossing quantity; `add_order` never matches.
    pub fn add_order(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        market_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Quantity,
    ) {
        let slot = Self::price_index(price);
        let mut level_idx = self.price_levels[slot];
        if level_idx == NULL_INDEX {
            level_idx = self.add_price_level(side, price);
        } else {
            debug_assert!(
                self.level_pool.get(level_idx).price == price,
                "price table collision: active prices exceed the MAX_PRICE_LEVELS band"
            );
        }
        let order = BasicOrder::new(client_order_id, qty, client_id);
        let handle = self
            .level_pool
            .get_mut(level_idx)
            .add_order(&mut self.chunk_pool, order);
        self.client_orders[client_id as usize][client_order_id as usize] = OrderInfo {
            handle,
            market_order_id,
            price,
        };
        self.live_orders += 1;
    }

    /// Cancel a resting order. Unknown, already-cancelled, and
    /// already-filled ids are silent no-ops.
    pub fn remove_order(&mut self, client_id: ClientId, order_id: OrderId) {
        let info = self.client_orders[client_id as usize][order_id as usize];
        if !info.is_valid() {
            return;
        }
        let level_idx = self.price_levels[Self::price_index(info.price)];
        if level_idx == NULL_INDEX {
            return;
        }
        self.level_pool
            .get_mut(level_idx)
            .remove_order(&mut self.chunk_pool, info.handle);
        self.client_orders[client_id as usize][order_id as usize] = OrderInfo::INVALID;
        self.live_orders -= 1;
        if self.level_pool.get(level_idx).is_empty() {
            self.remove_price_level(level_idx);
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Execute an aggressive order against the opposite side's best levels.
    ///
    /// Walks best-first, FIFO within each level, decrementing resting
    /// quantities in place. Trades print at the resting level's price.
    /// Stops when the incoming quantity is exhausted, prices no longer
    /// cross, or `MAX_MATCH_EVENTS` records have been emitted.
    pub fn match_order(
        &mut self,
        client_id: ClientId,
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> MatchResultSet<'_> {
        let mut remaining = quantity;
        let mut count = 0usize;

        while remaining > 0 && count < MAX_MATCH_EVENTS {
            let best = self.best_opposite(side);
            if best == NULL_INDEX || !self.level_pool.get(best).is_matchable(price) {
                break;
            }
            let level_price = self.level_pool.get(best).price;
            let level_side = self.level_pool.get(best).side;

            let Some(front) = self
                .level_pool
                .get_mut(best)
                .front_order(&mut self.chunk_pool)
            else {
                break;
            };
            let fill = remaining.min(front.qty);
            front.qty -= fill;
            remaining -= fill;
            let matched = *front;
            self.level_pool.get_mut(best).orders.subtract_qty(fill);

            self.match_results[count] = MatchResult {
                incoming_order_id: order_id,
                matched_order_id: matched.order_id,
                price: level_price,
                quantity: fill,
                matched_order_remaining_qty: matched.qty,
                incoming_client_id: client_id,
                matched_client_id: matched.client_id,
                incoming_side: side,
                matched_side: level_side,
            };
            count += 1;

            if matched.qty == 0 {
                self.level_pool
                    .get_mut(best)
                    .pop_front_order(&mut self.chunk_pool);
                self.client_orders[matched.client_id as usize][matched.order_id as usize] =
                    OrderInfo::INVALID;
                self.live_orders -= 1;
                if self.level_pool.get(best).is_empty() {
                    self.remove_price_level(best);
                }
            }
        }

        let mut overflow = false;
        if count == MAX_MATCH_EVENTS {
            let best = self.best_opposite(side);
            if best != NULL_INDEX && self.level_pool.get(best).is_matchable(price) {
                overflow = true;
            }
        }

        MatchResultSet {
            matches: &self.match_results[..count],
            remaining_quantity: remaining,
            instrument: self.instrument,
            overflow,
        }
    }

    #[inline]
    fn best_opposite(&self, side: Side) -> PoolIndex {
        match side {
            Side::Buy => self.best_ask,
            Side::Sell => self.best_bid,
            Side::Invalid => NULL_INDEX,
        }
    }

    // ========================================================================
    // Price-level chain maintenance
    // ========================================================================

    /// Allocate a level for a previously inactive price and splice it into
    /// its side's circular chain so that traversal from best stays sorted.
    fn add_price_level(&mut self, side: Side, price: Price) -> PoolIndex {
        debug_assert!(side != Side::Invalid, "price level with invalid side");
        let idx = self.level_pool.alloc();
        *self.level_pool.get_mut(idx) = PriceLevel::new(side, price, idx);
        self.price_levels[Self::price_index(price)] = idx;

        let best = if side == Side::Buy {
            self.best_bid
        } else {
            self.best_ask
        };
        if best == NULL_INDEX {
            self.set_best(side, idx);
        } else if self.is_better(idx, best) {
            self.link_before(best, idx);
            self.set_best(side, idx);
        } else {
            let mut current = self.level_pool.get(best).next;
            while current != best && !self.is_better(idx, current) {
                current = self.level_pool.get(current).next;
            }
            // Either `current` is the first level the new one beats, or the
            // walk wrapped and the new level is the worst on its side; both
            // cases splice immediately before `current`.
            self.link_before(current, idx);
        }
        idx
    }

    /// Detach an empty level from its chain, clear its table slot, and free
    /// it. Promotes the side's best pointer when the best level dies.
    fn remove_price_level(&mut self, idx: PoolIndex) {
        let (side, price, prev, next) = {
            let level = self.level_pool.get(idx);
            (level.side, level.price, level.prev, level.next)
        };
        self.level_pool
            .get_mut(idx)
            .orders
            .release(&mut self.chunk_pool);

        if next == idx {
            // Last level on its side.
            self.set_best(side, NULL_INDEX);
        } else {
            self.level_pool.get_mut(prev).next = next;
            self.level_pool.get_mut(next).prev = prev;
            let best = if side == Side::Buy {
                self.best_bid
            } else {
                self.best_ask
            };
            if best == idx {
                self.set_best(side, next);
            }
        }
        self.price_levels[Self::price_index(price)] = NULL_INDEX;
        self.level_pool.free(idx);
    }

    #[inline]
    fn is_better(&self, a: PoolIndex, b: PoolIndex) -> bool {
        self.level_pool.get(a).is_better(self.level_pool.get(b))
    }

    /// Splice `node` immediately before `at` in the circular chain.
    fn link_before(&mut self, at: PoolIndex, node: PoolIndex) {
        let at_prev = self.level_pool.get(at).prev;
        {
            let n = self.level_pool.get_mut(node);
            n.prev = at_prev;
            n.next = at;
        }
        self.level_pool.get_mut(at_prev).next = node;
        self.level_pool.get_mut(at).prev = node;
    }

    #[inline]
    fn set_best(&mut self, side: Side, idx: PoolIndex) {
        if side == Side::Buy {
            self.best_bid = idx;
        } else {
            self.best_ask = idx;
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    /// Index entry for a resting order; `None` once cancelled or fully
    /// filled.
    pub fn get_order(&self, client_id: ClientId, order_id: OrderId) -> Option<&OrderInfo> {
        let info = &self.client_orders[client_id as usize][order_id as usize];
        info.is_valid().then_some(info)
    }

    /// Active level at `price`, if any.
    pub fn get_price_level(&self, price: Price) -> Option<&PriceLevel> {
        let idx = self.price_levels[Self::price_index(price)];
        (idx != NULL_INDEX).then(|| self.level_pool.get(idx))
    }

    /// Best bid price, if any bids are resting.
    pub fn best_bid(&self) -> Option<Price> {
        (self.best_bid != NULL_INDEX).then(|| self.level_pool.get(self.best_bid).price)
    }

    /// Best ask price, if any asks are resting.
    pub fn best_ask(&self) -> Option<Price> {
        (self.best_ask != NULL_INDEX).then(|| self.level_pool.get(self.best_ask).price)
    }

    /// Best ask minus best bid, when both sides are populated and the book
    /// is not crossed.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Total resting orders across both sides.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.live_orders
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_orders == 0
    }

    /// Resting depth at `price`: total quantity and order count.
    pub fn depth_at(&self, price: Price) -> (u64, u32) {
        self.get_price_level(price)
            .map(|l| (l.orders.total_qty(), l.orders.len()))
            .unwrap_or((0, 0))
    }

    /// Front (oldest, next to match) resting order at `price`.
    pub fn front_order_at(&self, price: Price) -> Option<&BasicOrder> {
        self.get_price_level(price)?.peek_order(&self.chunk_pool)
    }

    /// Most recently queued order at `price`.
    pub fn last_order_at(&self, price: Price) -> Option<&BasicOrder> {
        self.get_price_level(price)?.orders.last(&self.chunk_pool)
    }

    /// Walk a side's active levels from best to worst.
    pub fn levels(&self, side: Side) -> SideLevels<'_> {
        let best = match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
            Side::Invalid => NULL_INDEX,
        };
        SideLevels {
            book: self,
            best,
            current: best,
            done: best == NULL_INDEX,
        }
    }
}

impl fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderBook")
            .field("instrument", &self.instrument)
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("orders", &self.live_orders)
            .field("levels", &self.level_pool.allocated())
            .finish()
    }
}

/// Iterator over one side's price levels, best first.
pub struct SideLevels<'a> {
    book: &'a OrderBook,
    best: PoolIndex,
    current: PoolIndex,
    done: bool,
}

impl<'a> Iterator for SideLevels<'a> {
    type Item = &'a PriceLevel;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let level = self.book.level_pool.get(self.current);
        self.current = level.next;
        if self.current == self.best {
            self.done = true;
        }
        Some(level)
    }
}
