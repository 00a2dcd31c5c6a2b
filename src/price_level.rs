//! A price level: one side, one price, one FIFO queue of resting orders.
//!
//! Levels are pool-allocated and chained into a circular doubly linked list
//! per side, best price first. A freshly constructed level is a singleton
//! ring: prev and next reference its own slot.

use crate::order_queue::{BasicOrder, Chunk, OrderHandle, OrderQueue};
use crate::pool::{Pool, PoolIndex, NULL_INDEX};
use crate::types::{Price, Side, INVALID_PRICE};

#[derive(Debug)]
pub struct PriceLevel {
    pub side: Side,
    pub price: Price,
    pub orders: OrderQueue,
    /// Previous (better) level in the side's circular chain.
    pub prev: PoolIndex,
    /// Next (worse) level in the side's circular chain.
    pub next: PoolIndex,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self {
            side: Side::Invalid,
            price: INVALID_PRICE,
            orders: OrderQueue::new(),
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

impl PriceLevel {
    /// `index` is the level's own slot in the level pool; a new level forms
    /// a singleton circular list.
    pub fn new(side: Side, price: Price, index: PoolIndex) -> Self {
        Self {
            side,
            price,
            orders: OrderQueue::new(),
            prev: index,
            next: index,
        }
    }

    #[inline]
    pub fn add_order(&mut self, chunks: &mut Pool<Chunk>, order: BasicOrder) -> OrderHandle {
        self.orders.push(chunks, order)
    }

    #[inline]
    pub fn remove_order(&mut self, chunks: &mut Pool<Chunk>, handle: OrderHandle) {
        self.orders.remove(chunks, handle)
    }

    #[inline]
    pub fn pop_front_order(&mut self, chunks: &mut Pool<Chunk>) {
        self.orders.pop(chunks)
    }

    #[inline]
    pub fn front_order<'a>(&mut self, chunks: &'a mut Pool<Chunk>) -> Option<&'a mut BasicOrder> {
        self.orders.front(chunks)
    }

    #[inline]
    pub fn peek_order<'a>(&self, chunks: &'a Pool<Chunk>) -> Option<&'a BasicOrder> {
        self.orders.peek(chunks)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// True when an aggressor limited at `price` crosses this level. The
    /// aggressor passes its own limit to test the crossing.
    #[inline]
    pub fn is_matchable(&self, price: Price) -> bool {
        match self.side {
            Side::Buy => self.price >= price,
            Side::Sell => self.price <= price,
            Side::Invalid => false,
        }
    }

    /// Strictly more favourable than `other`: higher for bids, lower for
    /// asks.
    #[inline]
    pub fn is_better(&self, other: &PriceLevel) -> bool {
        match self.side {
            Side::Buy => self.price > other.price,
            Side::Sell => self.price < other.price,
            Side::Invalid => false,
        }
    }
}
