//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{
    amount::{Timestamp, Tokens},
    constants,
    ids::UserId,
};

/// Static configuration of one BEACON engine process.
///
/// The payment token and revenue account are deliberately *not* here: they
/// are one-shot runtime settings (`set_payment_token`,
/// `set_revenue_account`) and live with the engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The engine's own principal on external ledgers; deposit subaccounts
    /// are reserved under this owner.
    pub engine_id: UserId,
    /// Per-side trading fee in basis points.
    pub fee_bps: u32,
    /// Listing fee, in payment smallest units.
    pub listing_price: Tokens,
    /// Janitor threshold: close orders older than this.
    pub order_ttl: Timestamp,
    /// Janitor threshold: drop archived trades older than this.
    pub archive_ttl: Timestamp,
    /// Janitor threshold: delist tokens inactive for longer than this.
    pub delist_ttl: Timestamp,
    /// Maximum in-memory event log entries.
    pub log_ring: usize,
    /// Fill budget per `trade` call.
    pub max_fills_per_trade: usize,
    /// Per-user sliding-window order budget.
    pub max_orders_per_hour: usize,
    /// Maximum orders closed per janitor tick.
    pub janitor_batch: usize,
}

impl EngineConfig {
    /// Default configuration under the given engine principal.
    #[must_use]
    pub fn new(engine_id: UserId) -> Self {
        Self {
            engine_id,
            fee_bps: constants::DEFAULT_FEE_BPS,
            listing_price: constants::DEFAULT_LISTING_PRICE,
            order_ttl: constants::DEFAULT_ORDER_TTL,
            archive_ttl: constants::DEFAULT_ARCHIVE_TTL,
            delist_ttl: constants::DEFAULT_DELIST_TTL,
            log_ring: constants::LOG_RING,
            max_fills_per_trade: constants::DEFAULT_MAX_FILLS_PER_TRADE,
            max_orders_per_hour: constants::DEFAULT_MAX_ORDERS_PER_HOUR,
            janitor_batch: constants::DEFAULT_JANITOR_BATCH,
        }
    }
}
