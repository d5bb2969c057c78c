//! Order model for the BEACON matching engine.
//!
//! An order is immutable apart from its remaining `amount`: amendment is
//! cancel-and-repost. The `decimals` and `payment_token_fee` fields are
//! snapshots taken when the order is accepted, so a later re-listing of the
//! token with different metadata cannot change the arithmetic of an order
//! that already rests in a book.

use serde::{Deserialize, Serialize};

use crate::{
    amount::{gross_payment, trading_fee, PricePerBase, Timestamp, Tokens},
    error::Result,
    ids::UserId,
};

/// Which side of the book an order is on, relative to the traded token:
/// `Buy` pays the payment token for it, `Sell` offers it for payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub fn buy(self) -> bool {
        self == Self::Buy
    }

    #[must_use]
    pub fn sell(self) -> bool {
        self == Self::Sell
    }

    /// The side a taker on `self` matches against.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Outcome of a `trade` call: how much filled immediately, and whether the
/// unfilled remainder now rests in the book as a maker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderExecution {
    Filled(Tokens),
    FilledAndOrderCreated(Tokens),
}

impl OrderExecution {
    /// The immediately filled amount, whichever variant.
    #[must_use]
    pub fn filled(&self) -> Tokens {
        match self {
            Self::Filled(amount) | Self::FilledAndOrderCreated(amount) => *amount,
        }
    }
}

/// Composite key locating an order within one side of a book:
/// price level, then creation time (FIFO), then owner as the final tiebreak.
pub type BookKey = (PricePerBase, Timestamp, UserId);

/// A resting or archived order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub owner: UserId,
    pub side: OrderSide,
    /// Remaining (unfilled) amount of the traded token.
    pub amount: Tokens,
    /// Payment units per `10^decimals` traded units. Always positive for a
    /// resting order.
    pub price: PricePerBase,
    /// Creation time; part of the book key.
    pub timestamp: Timestamp,
    /// Execution time; `0` while the order is open.
    pub executed: Timestamp,
    /// Decimals of the traded token, snapshotted at acceptance.
    pub decimals: u32,
    /// Transfer fee of the payment ledger, snapshotted at acceptance.
    pub payment_token_fee: Tokens,
}

impl Order {
    /// Gross payment for the remaining amount at the order's price, floored.
    ///
    /// # Errors
    /// Propagates overflow from the payment multiplication.
    pub fn volume(&self) -> Result<Tokens> {
        gross_payment(self.amount, self.price, self.decimals)
    }

    /// The liquidity this order keeps locked in its owner's balance:
    /// - Buy: the gross payment plus the owner's side of the trading fee,
    ///   in payment token;
    /// - Sell: the remaining amount, in the traded token.
    ///
    /// # Errors
    /// Propagates overflow from the payment arithmetic.
    pub fn reserved_liquidity(&self, fee_bps: u32) -> Result<Tokens> {
        if self.side.buy() {
            let volume = self.volume()?;
            volume
                .checked_add(trading_fee(volume, fee_bps)?)
                .ok_or(crate::error::BeaconError::AmountOverflow)
        } else {
            Ok(self.amount)
        }
    }

    /// The key this order occupies in its side of the book.
    #[must_use]
    pub fn key(&self) -> BookKey {
        (self.price, self.timestamp, self.owner)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.executed == 0
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy(
        owner: UserId,
        side: OrderSide,
        amount: Tokens,
        price: PricePerBase,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            owner,
            side,
            amount,
            price,
            timestamp,
            executed: 0,
            decimals: 8,
            payment_token_fee: 10_000,
        }
    }
}
