//! Archived trade records.
//!
//! A [`Trade`] is the immutable record of one fill: an incoming (taker)
//! order paired against one resting (maker) order. Fees on both sides are
//! recorded as collected, in payment token.

use serde::{Deserialize, Serialize};

use crate::{
    amount::{PricePerBase, Timestamp, Tokens},
    ids::{TokenId, UserId},
    order::OrderSide,
};

// ---------------------------------------------------------------------------
// TradeId
// ---------------------------------------------------------------------------

/// Unique trade identifier, derived deterministically from the engine's
/// monotone fill sequence so a restored engine reproduces identical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TradeId(pub [u8; 16]);

impl TradeId {
    /// Deterministic `TradeId` from the engine-wide fill sequence.
    #[must_use]
    pub fn deterministic(fill_sequence: u64) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"beacon:trade_id:v1:");
        hasher.update(fill_sequence.to_le_bytes());
        let hash = hasher.finalize();
        let bytes: [u8; 16] = hash[..16].try_into().expect("SHA-256 produces 32 bytes");
        Self(bytes)
    }
}

impl std::fmt::Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// One fill between a taker and a maker order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    /// The traded token; payment is always in the process-wide quote asset.
    pub token: TokenId,
    /// Owner of the resting order.
    pub maker: UserId,
    /// Owner of the incoming order.
    pub taker: UserId,
    /// Which side the taker was on.
    pub taker_side: OrderSide,
    /// Filled amount of the traded token.
    pub amount: Tokens,
    /// The maker's price; fills always execute at the resting price.
    pub price: PricePerBase,
    /// Gross payment, floored from `amount * price / base`.
    pub volume: Tokens,
    /// Fee collected from the maker's side, in payment token.
    pub maker_fee: Tokens,
    /// Fee collected from the taker's side, in payment token.
    pub taker_fee: Tokens,
    /// Execution time.
    pub executed: Timestamp,
}

impl Trade {
    /// Total fee revenue of this fill.
    #[must_use]
    pub fn fees(&self) -> Tokens {
        self.maker_fee + self.taker_fee
    }

    #[must_use]
    pub fn taker_is_buyer(&self) -> bool {
        self.taker_side == OrderSide::Buy
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} {} @ {} = {}",
            self.id, self.token, self.taker_side, self.amount, self.price, self.volume,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade() -> Trade {
        Trade {
            id: TradeId::deterministic(0),
            token: TokenId::dummy(1),
            maker: UserId::dummy(1),
            taker: UserId::dummy(2),
            taker_side: OrderSide::Buy,
            amount: 500_000_000,
            price: 2_000_000,
            volume: 10_000_000,
            maker_fee: 20_000,
            taker_fee: 20_000,
            executed: 123_456,
        }
    }

    #[test]
    fn trade_id_deterministic() {
        assert_eq!(TradeId::deterministic(9), TradeId::deterministic(9));
        assert_ne!(TradeId::deterministic(9), TradeId::deterministic(10));
    }

    #[test]
    fn fees_sum_both_sides() {
        assert_eq!(make_trade().fees(), 40_000);
    }

    #[test]
    fn taker_side_helper() {
        assert!(make_trade().taker_is_buyer());
    }

    #[test]
    fn trade_serde_roundtrip() {
        let trade = make_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
