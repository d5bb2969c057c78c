//! Listed-token records.

use serde::{Deserialize, Serialize};

use crate::amount::{Timestamp, Tokens};

/// Metadata and lifecycle state of a listed token.
///
/// Created by `list_token`, removed by the janitor once the token has been
/// inactive for the delisting TTL with empty books. Balances survive a
/// delisting; re-listing restores access to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub symbol: String,
    /// ICRC-style decimals; capped at [`crate::constants::MAX_DECIMALS`].
    pub decimals: u32,
    /// The ledger's transfer fee, charged by the ledger on every transfer.
    pub fee: Tokens,
    pub logo: Option<String>,
    /// When the current listing was created.
    pub listed_at: Timestamp,
    /// Last order or fill touching this token; drives delisting.
    pub last_activity: Timestamp,
    /// Set when a custody invariant check failed for this token's ledger;
    /// cleared by an out-of-band admin reconciliation.
    pub needs_reconciliation: bool,
}

impl TokenRecord {
    /// `10^decimals`: one whole unit in smallest units.
    #[must_use]
    pub fn base(&self) -> Tokens {
        10u128.pow(self.decimals)
    }
}
