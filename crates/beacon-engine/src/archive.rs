//! The executed-trade archive.
//!
//! A time-ordered log of fills per token, newest first. Queries read it for
//! price discovery and daily statistics; the janitor trims entries older
//! than the archive TTL.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use beacon_types::{Timestamp, TokenId, Tokens, Trade};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeArchive {
    /// `token → fills, newest first`.
    trades: BTreeMap<TokenId, VecDeque<Trade>>,
}

impl TradeArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fill (newest first).
    pub fn push(&mut self, trade: Trade) {
        self.trades.entry(trade.token).or_default().push_front(trade);
    }

    /// Remove the `count` most recent fills for `token` (trade rollback).
    pub fn pop_recent(&mut self, token: &TokenId, count: usize) {
        if let Some(archive) = self.trades.get_mut(token) {
            for _ in 0..count {
                archive.pop_front();
            }
        }
    }

    /// The most recent fill for a token.
    #[must_use]
    pub fn last(&self, token: &TokenId) -> Option<&Trade> {
        self.trades.get(token).and_then(VecDeque::front)
    }

    /// Up to `limit` most recent fills, newest first.
    #[must_use]
    pub fn recent(&self, token: &TokenId, limit: usize) -> Vec<Trade> {
        self.trades
            .get(token)
            .map(|archive| archive.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Drop fills executed before `cutoff`. Returns how many were dropped.
    pub fn prune(&mut self, cutoff: Timestamp) -> usize {
        let mut dropped = 0;
        for archive in self.trades.values_mut() {
            let before = archive.len();
            archive.retain(|trade| trade.executed >= cutoff);
            dropped += before - archive.len();
        }
        self.trades.retain(|_, archive| !archive.is_empty());
        dropped
    }

    /// Gross payment volume and fill count within the last `window`
    /// nanoseconds before `now`.
    #[must_use]
    pub fn window_stats(&self, now: Timestamp, window: Timestamp) -> (Tokens, u64) {
        let cutoff = now.saturating_sub(window);
        let mut volume: Tokens = 0;
        let mut count: u64 = 0;
        for trade in self.trades.values().flatten() {
            if trade.executed >= cutoff {
                volume = volume.saturating_add(trade.volume);
                count += 1;
            }
        }
        (volume, count)
    }

    /// Total archived fills across all tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.values().map(VecDeque::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.values().all(VecDeque::is_empty)
    }
}
