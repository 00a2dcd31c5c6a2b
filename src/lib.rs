//! # Ember-LOB
//!
//! A single-instrument, single-threaded limit order book core.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one logical actor owns a book exclusively (no locks)
//! - **Pooled Storage**: price levels and queue chunks come from
//!   fixed-capacity slabs sized at construction; the hot path never
//!   allocates
//! - **O(1) Cancel**: cancellation clears one validity bit through a stable
//!   handle; surviving orders never move
//! - **Bounded Calls**: one match invocation emits at most
//!   `MAX_MATCH_EVENTS` records, a hard ceiling on per-call work
//!
//! ## Architecture
//!
//! ```text
//! add / cancel / match
//!         |
//!   [OrderBook]   direct price table + per-client order index
//!         |
//!   [PriceLevel]  circular per-side chain, best first
//!         |
//!   [OrderQueue]  chunked FIFO, bitmap deletion
//!         |
//!     [Pool]      fixed slabs, stable indices
//! ```

pub mod order_book;
pub mod order_queue;
pub mod pool;
pub mod price_level;
pub mod types;

// Re-exports for convenience
pub use order_book::{MatchResult, MatchResultSet, OrderBook, OrderInfo, SideLevels};
pub use order_queue::{BasicOrder, Chunk, OrderHandle, OrderQueue};
pub use pool::{Pool, PoolIndex, NULL_INDEX};
pub use price_level::PriceLevel;
pub use types::{
    ClientId, InstrumentId, OrderId, Price, Quantity, Side, CHUNK_CAPACITY, INVALID_CLIENT_ID,
    INVALID_INSTRUMENT_ID, INVALID_ORDER_ID, INVALID_PRICE, INVALID_QUANTITY, MAX_MATCH_EVENTS,
    MAX_NUM_CHUNKS, MAX_NUM_CLIENTS, MAX_NUM_ORDERS, MAX_PRICE_LEVELS,
};
