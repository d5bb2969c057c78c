//! Balance tracking types for the BEACON escrow model.
//!
//! Every (user, token) pair has a `liquid` amount (usable for new orders
//! and withdrawal) and a `locked` amount (reserved by resting orders).

use serde::{Deserialize, Serialize};

use crate::amount::Tokens;

/// A single balance entry for a (user, token) pair.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    /// Available for new orders / withdrawal.
    pub liquid: Tokens,
    /// Reserved by resting orders awaiting a fill or cancellation.
    pub locked: Tokens,
}

impl BalanceEntry {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total balance (liquid + locked). Saturates rather than wraps; the
    /// engine's overflow checks keep the sum in range long before this.
    #[must_use]
    pub fn total(&self) -> Tokens {
        self.liquid.saturating_add(self.locked)
    }

    /// Whether this entry holds nothing at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.liquid == 0 && self.locked == 0
    }
}
