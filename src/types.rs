//! Integer domains, sentinels, and static capacities.
//!
//! Prices are fixed-point venue ticks, quantities are whole units. Every
//! domain reserves its maximum value as the invalid sentinel.

use std::fmt;

/// Order identifier, caller-chosen within a client namespace.
pub type OrderId = u64;
/// Sentinel for "no order".
pub const INVALID_ORDER_ID: OrderId = OrderId::MAX;

/// Trading client identifier.
pub type ClientId = u32;
/// Sentinel for "no client".
pub const INVALID_CLIENT_ID: ClientId = ClientId::MAX;

/// Instrument identifier; one book serves exactly one instrument.
pub type InstrumentId = u8;
/// Sentinel for "no instrument".
pub const INVALID_INSTRUMENT_ID: InstrumentId = InstrumentId::MAX;

/// Fixed-point price in venue ticks.
pub type Price = i64;
/// Sentinel for "no price".
pub const INVALID_PRICE: Price = Price::MAX;

/// Whole-unit order quantity.
pub type Quantity = u32;
/// Sentinel for "no quantity".
pub const INVALID_QUANTITY: Quantity = Quantity::MAX;

/// Order side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    #[default]
    Invalid = 0,
    Buy = 1,
    Sell = 2,
}

impl Side {
    /// The side an aggressor on `self` executes against.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Invalid => Side::Invalid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Static capacities
// ============================================================================
//
// All pools and tables are sized from these at construction. Exceeding a
// capacity at runtime is a configuration error, not recoverable pressure.

/// Maximum trading clients per book.
pub const MAX_NUM_CLIENTS: usize = 10;

/// Per-client order-id range; also the resting-order capacity of the book.
pub const MAX_NUM_ORDERS: usize = 1_000_000;

/// Width of the direct-address price table. Concurrently active prices must
/// span fewer than this many ticks so the modulus never collides.
pub const MAX_PRICE_LEVELS: usize = 256;

/// Per-call cap on emitted match records.
pub const MAX_MATCH_EVENTS: usize = 100;

/// Order slots per queue chunk. Must be a multiple of 64 so the validity
/// bitmap stays word-aligned.
pub const CHUNK_CAPACITY: usize = 1024;

/// Chunk pool capacity: enough full chunks for `MAX_NUM_ORDERS` resting
/// orders plus a partially drained tail per active level.
pub const MAX_NUM_CHUNKS: usize = 2048;
