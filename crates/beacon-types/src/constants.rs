//! System-wide constants for the BEACON exchange engine.

use crate::amount::{Timestamp, Tokens};

/// One minute in nanoseconds.
pub const MINUTE: Timestamp = 60_000_000_000;

/// One hour in nanoseconds.
pub const HOUR: Timestamp = 60 * MINUTE;

/// One day in nanoseconds.
pub const DAY: Timestamp = 24 * HOUR;

/// Default per-side trading fee, in basis points (0.20%).
pub const DEFAULT_FEE_BPS: u32 = 20;

/// Default listing price: 100 whole payment units at 10^6 payment decimals.
pub const DEFAULT_LISTING_PRICE: Tokens = 100_000_000;

/// Orders older than this are closed by the janitor.
pub const DEFAULT_ORDER_TTL: Timestamp = 90 * DAY;

/// Archived trades older than this are dropped by the janitor.
pub const DEFAULT_ARCHIVE_TTL: Timestamp = 180 * DAY;

/// Tokens inactive for longer than this (with empty books) are delisted.
pub const DEFAULT_DELIST_TTL: Timestamp = 180 * DAY;

/// Maximum in-memory event log entries.
pub const LOG_RING: usize = 10_000;

/// Maximum fills one `trade` call may perform before it aborts with
/// a resource-exhaustion error and rolls back.
pub const DEFAULT_MAX_FILLS_PER_TRADE: usize = 10_000;

/// Per-user sliding-window order budget (cycle drain protection).
pub const DEFAULT_MAX_ORDERS_PER_HOUR: usize = 15;

/// Maximum orders the janitor closes in one tick.
pub const DEFAULT_JANITOR_BATCH: usize = 100_000;

/// Maximum supported token decimals.
pub const MAX_DECIMALS: u32 = 24;

/// How many archived trades a single `executed_orders` query returns.
pub const ARCHIVE_QUERY_LIMIT: usize = 75;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "BEACON";
