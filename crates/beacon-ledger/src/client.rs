//! The ledger client interface.
//!
//! One [`LedgerClient`] talks to one external ledger on the engine's behalf.
//! The client is stateless: callers reason about idempotency by re-reading
//! balances, never by replaying transfers.

use serde::{Deserialize, Serialize};

use beacon_types::{LedgerError, Tokens, UserId};

/// A 32-byte ledger subaccount discriminator.
pub type Subaccount = [u8; 32];

/// An account on an external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub owner: UserId,
    pub subaccount: Option<Subaccount>,
}

impl Account {
    /// The main account of `owner` (no subaccount).
    #[must_use]
    pub fn main(owner: UserId) -> Self {
        Self {
            owner,
            subaccount: None,
        }
    }

    /// A subaccount under `owner`.
    #[must_use]
    pub fn sub(owner: UserId, subaccount: Subaccount) -> Self {
        Self {
            owner,
            subaccount: Some(subaccount),
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subaccount {
            None => write!(f, "{}", self.owner),
            Some(sub) => write!(f, "{}.{}", self.owner, hex::encode(&sub[..4])),
        }
    }
}

/// The deposit subaccount the engine reserves for `user` on every ledger:
/// the user's principal bytes, verbatim.
#[must_use]
pub fn subaccount_for(user: &UserId) -> Subaccount {
    *user.as_bytes()
}

/// Metadata published by a fungible-token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u32,
    /// The ledger's transfer fee, burned on every transfer.
    pub fee: Tokens,
    pub logo: Option<String>,
}

/// Request/response interface over one external fungible-token ledger.
///
/// `transfer` moves funds out of the engine's main account; `transfer_from`
/// moves funds out of one of the engine's subaccounts (deposits). Both burn
/// the ledger's transfer fee on top of `amount`.
pub trait LedgerClient {
    /// Current balance of an account.
    ///
    /// # Errors
    /// Transport errors only; an unknown account reads as zero.
    fn balance_of(&self, account: &Account) -> Result<Tokens, LedgerError>;

    /// Transfer `amount` from the engine's main account to `to`, paying
    /// `fee` on top. Returns the ledger's block index.
    ///
    /// # Errors
    /// Transport errors or ledger-level rejections (insufficient funds,
    /// bad fee, bad recipient, rate limit, duplicate).
    fn transfer(&self, to: &Account, amount: Tokens, fee: Tokens) -> Result<u64, LedgerError>;

    /// Transfer `amount` out of the engine-owned subaccount `from` to `to`,
    /// paying `fee` on top. Returns the ledger's block index.
    ///
    /// # Errors
    /// As for [`LedgerClient::transfer`].
    fn transfer_from(
        &self,
        from: Subaccount,
        to: &Account,
        amount: Tokens,
        fee: Tokens,
    ) -> Result<u64, LedgerError>;

    /// The ledger's published token metadata.
    ///
    /// # Errors
    /// Transport errors or incomplete metadata.
    fn metadata(&self) -> Result<TokenMetadata, LedgerError>;
}

/// Resolves a token id to the client for its ledger.
pub trait LedgerRegistry {
    fn client(&self, token: &beacon_types::TokenId) -> Option<&dyn LedgerClient>;
}
