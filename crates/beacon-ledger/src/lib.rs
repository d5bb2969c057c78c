//! # beacon-ledger
//!
//! **The engine's window onto external fungible-token ledgers.**
//!
//! Every listed token lives on its own external ledger; the engine custodies
//! deposits in a main account and reserves a per-user deposit subaccount on
//! each ledger. This crate defines the narrow [`LedgerClient`] interface the
//! engine consumes, the [`LedgerRegistry`] that resolves a token id to its
//! client, and an in-memory implementation used by tests and local runs.
//!
//! Ledger calls are the engine's **only** suspension points: nothing in this
//! crate is ever invoked from inside the matcher's atomic body.

pub mod client;
pub mod memory;

pub use client::{subaccount_for, Account, LedgerClient, LedgerRegistry, Subaccount, TokenMetadata};
pub use memory::{InMemoryLedger, InMemoryLedgers};
