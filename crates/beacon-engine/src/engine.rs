//! The engine facade: the process-wide root container and its query surface.
//!
//! All books, balances, token records, and counters hang off one [`Engine`]
//! value. Mutating entry points take `&mut self` and run to completion;
//! queries take `&self` and observe only committed state. Identifier-based
//! indirection everywhere: orders reference owners by id, balances are
//! looked up by `(owner, token)`, and nothing holds back-pointers.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use beacon_book::Book;
use beacon_types::{
    constants, BalanceEntry, BeaconError, EngineConfig, Order, OrderSide, Result, Timestamp,
    TokenId, TokenRecord, Tokens, Trade, UserId,
};

use crate::{archive::TradeArchive, balances::VirtualBalances};

/// The fee convention this engine implements, reported via [`Engine::data`]:
/// each side of a fill is charged the same fee computed on the maker-priced
/// gross; the buyer pays it on top of the gross, the seller receives the
/// gross net of it.
pub const FEE_CONVENTION: &str =
    "per-side fee on gross; buyer pays gross + fee, seller receives gross - fee";

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Bounded in-memory event ring, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EventLog {
    entries: VecDeque<(u64, String)>,
    next_id: u64,
}

impl EventLog {
    fn push(&mut self, cap: usize, message: String) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_front((id, message));
        while self.entries.len() > cap {
            self.entries.pop_back();
        }
    }

    pub(crate) fn trim(&mut self, cap: usize) -> usize {
        let mut dropped = 0;
        while self.entries.len() > cap {
            self.entries.pop_back();
            dropped += 1;
        }
        dropped
    }

    fn iter(&self) -> impl Iterator<Item = &(u64, String)> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the engine persists: books, balances, token records, archive,
/// counters, and the one-shot runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct State {
    pub books: BTreeMap<TokenId, Book>,
    pub balances: VirtualBalances,
    pub tokens: BTreeMap<TokenId, TokenRecord>,
    pub archive: TradeArchive,
    /// The engine's running ledger of in-custody tokens: deposits add,
    /// withdrawals subtract. Reference value for the conservation check.
    pub custodied: BTreeMap<TokenId, Tokens>,
    pub payment_token: Option<TokenId>,
    pub revenue_account: Option<UserId>,
    /// Sliding-window order timestamps per user (cycle drain protection).
    pub order_activity: BTreeMap<UserId, VecDeque<Timestamp>>,
    pub events: EventLog,
    /// Monotone fill sequence; trade ids derive from it.
    pub trade_seq: u64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Aggregate statistics served by [`Engine::data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub fee_bps: u32,
    pub fee_convention: String,
    pub volume_day: Tokens,
    pub trades_day: u64,
    pub payment_token_locked: Tokens,
    pub tokens_listed: usize,
    pub active_traders: usize,
}

/// The BEACON exchange engine.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) state: State,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: State::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Append to the event ring and emit a tracing event.
    pub(crate) fn log(&mut self, message: String) {
        tracing::info!(target: "beacon", "{message}");
        self.state.events.push(self.config.log_ring, message);
    }

    pub(crate) fn payment_token(&self) -> Result<TokenId> {
        self.state
            .payment_token
            .ok_or(BeaconError::NotConfigured("payment token"))
    }

    pub(crate) fn revenue_account(&self) -> Result<UserId> {
        self.state
            .revenue_account
            .ok_or(BeaconError::NotConfigured("revenue account"))
    }

    pub(crate) fn token_record(&self, token: &TokenId) -> Result<&TokenRecord> {
        self.state
            .tokens
            .get(token)
            .ok_or(BeaconError::NotListed(*token))
    }

    // =================================================================
    // Admin (one-shot configuration)
    // =================================================================

    /// Set the fee destination. Allowed while unset, or by the current
    /// revenue account itself.
    ///
    /// # Errors
    /// Returns `BCN_ERR_902` for anyone else.
    pub fn set_revenue_account(&mut self, caller: UserId, account: UserId) -> Result<()> {
        match self.state.revenue_account {
            None => {}
            Some(current) if current == caller => {}
            Some(_) => return Err(BeaconError::NotAuthorized),
        }
        self.state.revenue_account = Some(account);
        self.log(format!("revenue account set to {account}"));
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Open orders on one side of a token's book, best price first.
    #[must_use]
    pub fn orders(&self, token: &TokenId, side: OrderSide) -> Vec<Order> {
        self.state
            .books
            .get(token)
            .map(|book| book.orders(side).cloned().collect())
            .unwrap_or_default()
    }

    /// Recent fills for a token, newest first.
    #[must_use]
    pub fn executed_orders(&self, token: &TokenId) -> Vec<Trade> {
        self.state
            .archive
            .recent(token, constants::ARCHIVE_QUERY_LIMIT)
    }

    /// The last fill of every listed token.
    #[must_use]
    pub fn prices(&self) -> BTreeMap<TokenId, Trade> {
        self.state
            .tokens
            .keys()
            .filter_map(|token| {
                self.state
                    .archive
                    .last(token)
                    .map(|trade| (*token, trade.clone()))
            })
            .collect()
    }

    /// Metadata of all listed tokens.
    #[must_use]
    pub fn tokens(&self) -> &BTreeMap<TokenId, TokenRecord> {
        &self.state.tokens
    }

    /// The caller's `(liquid, locked)` pair for every listed token.
    #[must_use]
    pub fn token_balances(&self, caller: &UserId) -> BTreeMap<TokenId, (Tokens, Tokens)> {
        self.state
            .tokens
            .keys()
            .map(|token| {
                let entry = self.state.balances.read(caller, token);
                (*token, (entry.liquid, entry.locked))
            })
            .collect()
    }

    /// One balance row. Mostly useful for tests and dashboards.
    #[must_use]
    pub fn balance(&self, user: &UserId, token: &TokenId) -> BalanceEntry {
        self.state.balances.read(user, token)
    }

    /// Event log entries, newest first.
    #[must_use]
    pub fn logs(&self) -> Vec<(u64, String)> {
        self.state.events.iter().cloned().collect()
    }

    /// Number of distinct users with at least one open order.
    #[must_use]
    pub fn active_traders(&self) -> usize {
        let mut owners: Vec<UserId> = self
            .state
            .books
            .values()
            .flat_map(|book| {
                book.orders(OrderSide::Buy)
                    .chain(book.orders(OrderSide::Sell))
            })
            .map(|order| order.owner)
            .collect();
        owners.sort_unstable();
        owners.dedup();
        owners.len()
    }

    /// Aggregate statistics for dashboards.
    #[must_use]
    pub fn data(&self, now: Timestamp) -> AggregateStats {
        let (volume_day, trades_day) = self.state.archive.window_stats(now, constants::DAY);
        let payment_token_locked = self
            .state
            .payment_token
            .and_then(|payment| self.state.custodied.get(&payment).copied())
            .unwrap_or(0);
        AggregateStats {
            fee_bps: self.config.fee_bps,
            fee_convention: FEE_CONVENTION.to_string(),
            volume_day,
            trades_day,
            payment_token_locked,
            // The payment token itself is always in the listing map.
            tokens_listed: self.state.tokens.len().saturating_sub(1),
            active_traders: self.active_traders(),
        }
    }

    // =================================================================
    // Shared internals
    // =================================================================

    /// Sliding-window rate limit on order placement.
    pub(crate) fn record_activity(&mut self, user: UserId, now: Timestamp) -> Result<()> {
        let window = self.state.order_activity.entry(user).or_default();
        window.retain(|ts| ts + constants::HOUR >= now);
        if window.len() >= self.config.max_orders_per_hour {
            return Err(BeaconError::RateLimited);
        }
        window.push_back(now);
        Ok(())
    }
}
