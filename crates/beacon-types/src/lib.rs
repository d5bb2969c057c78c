//! # beacon-types
//!
//! Shared types, errors, and configuration for the **BEACON** exchange engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`TokenId`], [`TradeId`]
//! - **Amounts and price math**: [`Tokens`], [`PricePerBase`], [`gross_payment`], [`trading_fee`]
//! - **Order model**: [`Order`], [`OrderSide`], [`OrderExecution`], [`BookKey`]
//! - **Trade model**: [`Trade`]
//! - **Balance model**: [`BalanceEntry`]
//! - **Token model**: [`TokenRecord`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`BeaconError`] / [`LedgerError`] with `BCN_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod amount;
pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod token;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use beacon_types::{Order, OrderSide, Tokens, TradeId, ...};

pub use amount::*;
pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use token::*;
pub use trade::*;

// Constants are accessed via `beacon_types::constants::FOO`
// (not re-exported to avoid name collisions).
