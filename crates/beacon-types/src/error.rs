//! Error types for the BEACON exchange engine.
//!
//! All errors use the `BCN_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Balance errors
//! - 3xx: Ledger errors
//! - 4xx: Listing errors
//! - 5xx: Matching errors
//! - 6xx: Custody errors
//! - 7xx: Invariant errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{ids::TokenId, Tokens};

/// Errors reported by an external fungible-token ledger, or by the transport
/// used to reach it. Wrapped into [`BeaconError::Ledger`] at the engine
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The call never reached the ledger, or the reply was malformed.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// The source account cannot cover the transfer.
    #[error("insufficient funds: balance {balance}")]
    InsufficientFunds { balance: Tokens },

    /// The fee supplied does not match the ledger's expectation.
    #[error("bad fee: expected {expected}")]
    BadFee { expected: Tokens },

    /// The ledger rejected the recipient account.
    #[error("bad recipient")]
    BadRecipient,

    /// The ledger is rate limiting or under maintenance.
    #[error("temporarily unavailable")]
    TemporarilyUnavailable,

    /// The ledger saw this transfer already.
    #[error("duplicate transfer")]
    Duplicate,

    /// No ledger is known under the given token id.
    #[error("unknown ledger: {0}")]
    UnknownLedger(TokenId),
}

/// Central error enum for all BEACON operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The request failed validation before touching any state.
    #[error("BCN_ERR_100: invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// A zero amount where a positive amount is required.
    #[error("BCN_ERR_101: amount must be positive")]
    ZeroAmount,

    /// The order's gross payment rounds to zero; zero-payment fills are
    /// forbidden.
    #[error("BCN_ERR_102: order volume rounds to zero payment units")]
    ZeroVolume,

    /// The order's gross payment does not clear the payment ledger's
    /// transfer fee.
    #[error("BCN_ERR_103: order volume {volume} does not cover the payment transfer fee {fee}")]
    DustOrder { volume: Tokens, fee: Tokens },

    /// An order with the same book key already rests on this side.
    #[error("BCN_ERR_104: order exists already")]
    DuplicateOrder,

    /// Integer overflow while computing a payment or a lock.
    #[error("BCN_ERR_105: amount arithmetic overflow")]
    AmountOverflow,

    /// A ledger reported more decimals than the engine supports.
    #[error("BCN_ERR_106: token decimals {0} exceed the supported maximum")]
    DecimalsTooLarge(u32),

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// Not enough liquid balance for the requested debit or lock.
    #[error("BCN_ERR_200: insufficient liquidity: need {needed}, have {available}")]
    InsufficientLiquidity { needed: Tokens, available: Tokens },

    /// Not enough locked balance to settle or unlock.
    #[error("BCN_ERR_201: insufficient locked balance")]
    InsufficientLocked,

    /// A credit would overflow the balance field.
    #[error("BCN_ERR_202: balance overflow")]
    BalanceOverflow,

    // =================================================================
    // Ledger Errors (3xx)
    // =================================================================
    /// An external ledger call failed; local state has been rolled back.
    #[error("BCN_ERR_300: ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Required metadata entries were missing from the ledger's reply.
    #[error("BCN_ERR_301: incomplete ledger metadata: {missing}")]
    MetadataIncomplete { missing: &'static str },

    // =================================================================
    // Listing Errors (4xx)
    // =================================================================
    /// The token is not currently listed.
    #[error("BCN_ERR_400: token not listed: {0}")]
    NotListed(TokenId),

    /// The token is already listed.
    #[error("BCN_ERR_401: token already listed: {0}")]
    AlreadyListed(TokenId),

    /// Books never open for the payment token itself.
    #[error("BCN_ERR_402: the payment token is not tradable")]
    PaymentTokenNotTradable,

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// The caller exceeded the per-hour order budget.
    #[error("BCN_ERR_500: too many orders within one hour; please try again later")]
    RateLimited,

    /// The trade exceeded the per-call fill budget; the pre-trade state has
    /// been restored.
    #[error("BCN_ERR_501: fill budget exhausted after {fills} fills")]
    ResourceExhausted { fills: usize },

    // =================================================================
    // Custody Errors (6xx)
    // =================================================================
    /// The withdrawable balance does not clear the ledger transfer fee.
    #[error("BCN_ERR_600: balance {available} does not cover the transfer fee {fee}")]
    AmountBelowTransferFee { available: Tokens, fee: Tokens },

    // =================================================================
    // Invariant Errors (7xx)
    // =================================================================
    /// A post-mutation conservation check failed; the mutation has been
    /// reverted.
    #[error("BCN_ERR_700: invariant violation: {reason}")]
    InvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// A one-shot setting has not been configured yet.
    #[error("BCN_ERR_900: not configured: {0}")]
    NotConfigured(&'static str),

    /// A one-shot setting was already configured.
    #[error("BCN_ERR_901: already configured: {0}")]
    AlreadyConfigured(&'static str),

    /// The caller may not perform this administrative operation.
    #[error("BCN_ERR_902: not authorized")]
    NotAuthorized,

    /// Serialization / deserialization error.
    #[error("BCN_ERR_903: serialization error: {0}")]
    Serialization(String),

    /// Unrecoverable internal error.
    #[error("BCN_ERR_904: internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BeaconError>;
