//! # beacon-engine
//!
//! The BEACON exchange engine: escrow, matching, custody, and token
//! lifecycle behind one single-threaded [`Engine`] facade.
//!
//! ## Architecture
//!
//! ```text
//! deposit_liquidity ─┐                         ┌─ orders / prices / data
//!                    ▼                         ▼   (immutable queries)
//!            ┌──────────────┐  lock/settle ┌────────┐
//!  ledgers ─▶│   Custody    │─────────────▶│ Engine │◀── trade / close_order
//!            └──────────────┘              │ state  │
//!                    ▲                     └────────┘
//!                    │ one ledger call per op  │ verify after every mutation
//!            ┌──────────────┐          ┌──────────────┐
//!            │ LedgerClient │          │  Invariants  │
//!            └──────────────┘          └──────────────┘
//! ```
//!
//! All mutating operations run to completion on one logical thread; only
//! [`beacon_ledger::LedgerClient`] calls cross the system boundary, and none
//! of them happen inside the matcher's atomic body. That discipline is
//! structural here: the matcher modules never receive a ledger handle.
//!
//! Every externally-initiated mutation ends in a conservation check; a
//! failed check rolls the mutation back and surfaces `BCN_ERR_700`.

pub mod archive;
pub mod balances;
pub mod custody;
pub mod engine;
pub mod invariants;
pub mod janitor;
pub mod listing;
pub mod matcher;
pub mod persist;

pub use archive::TradeArchive;
pub use balances::VirtualBalances;
pub use engine::{AggregateStats, Engine, FEE_CONVENTION};
pub use janitor::JanitorReport;
