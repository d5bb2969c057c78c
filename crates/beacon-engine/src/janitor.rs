//! Periodic maintenance: stale-order closing, archive pruning, delisting.
//!
//! The tick is preemptible in spirit: the order sweep processes a bounded
//! batch (`janitor_batch`) and leaves the rest for the next tick. Closed
//! orders take the same unlock path as a user cancellation. Delisting
//! removes the token record and its empty book; balances are preserved and
//! become reachable again if the token is re-listed.

use beacon_types::{BookKey, OrderSide, Timestamp, TokenId};

use crate::engine::Engine;

/// What one janitor tick accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorReport {
    pub closed_orders: usize,
    pub pruned_trades: usize,
    pub delisted_tokens: usize,
    pub dropped_logs: usize,
}

impl Engine {
    /// Run one maintenance tick at time `now`.
    pub fn janitor_tick(&mut self, now: Timestamp) -> JanitorReport {
        let mut report = JanitorReport {
            dropped_logs: self.state.events.trim(self.config.log_ring),
            ..JanitorReport::default()
        };

        // Drop archived trades past the archive TTL.
        let archive_cutoff = now.saturating_sub(self.config.archive_ttl);
        report.pruned_trades = self.state.archive.prune(archive_cutoff);

        // Close orders past the order TTL, bounded per tick.
        let order_cutoff = now.saturating_sub(self.config.order_ttl);
        report.closed_orders =
            self.close_orders_by_condition(|timestamp| timestamp < order_cutoff, self.config.janitor_batch);

        // Delist tokens with no recent activity and empty books.
        report.delisted_tokens = self.delist_inactive(now);

        if report != JanitorReport::default() {
            self.log(format!(
                "clean up: {} orders closed, {} archived trades removed, {} tokens delisted, {} logs dropped",
                report.closed_orders, report.pruned_trades, report.delisted_tokens, report.dropped_logs
            ));
        }
        if let Err(err) = self.verify_invariants() {
            // The sweep uses the audited cancel path, so this is a bug; it
            // is logged loudly rather than crashing the engine.
            tracing::error!(target: "beacon", %err, "janitor tick broke an invariant");
            self.log(format!("janitor invariant failure: {err}"));
        }
        report
    }

    /// Close every order whose creation timestamp satisfies `expired`,
    /// up to `max_chunk` orders. Returns how many actually closed.
    fn close_orders_by_condition(
        &mut self,
        expired: impl Fn(Timestamp) -> bool,
        max_chunk: usize,
    ) -> usize {
        let stale: Vec<(TokenId, OrderSide, BookKey)> = self
            .state
            .books
            .iter()
            .flat_map(|(token, book)| {
                book.orders(OrderSide::Buy)
                    .chain(book.orders(OrderSide::Sell))
                    .filter(|order| expired(order.timestamp))
                    .map(|order| (*token, order.side, order.key()))
                    .collect::<Vec<_>>()
            })
            .take(max_chunk)
            .collect();

        let mut closed = 0;
        for (token, side, key) in stale {
            match self.close_resting_order(token, side, key) {
                Ok(Some(_)) => closed += 1,
                Ok(None) => {}
                Err(err) => self.log(format!("failed to close an expired order: {err}")),
            }
        }
        closed
    }

    fn delist_inactive(&mut self, now: Timestamp) -> usize {
        let payment = self.state.payment_token;
        let stale: Vec<TokenId> = self
            .state
            .tokens
            .iter()
            .filter(|(token, record)| {
                Some(**token) != payment
                    && record.last_activity.saturating_add(self.config.delist_ttl) < now
                    && self
                        .state
                        .books
                        .get(token)
                        .map_or(true, beacon_book::Book::is_empty)
            })
            .map(|(token, _)| *token)
            .collect();

        for token in &stale {
            self.state.tokens.remove(token);
            self.state.books.remove(token);
            // Balances and the custody ledger stay: funds survive a
            // delisting and a re-listing makes them reachable again.
            self.log(format!("{token} was delisted after inactivity"));
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use beacon_book::Book;
    use beacon_types::{
        constants, EngineConfig, Order, OrderSide, TokenRecord, Trade, TradeId, UserId,
    };

    use super::*;

    fn record(decimals: u32, last_activity: Timestamp) -> TokenRecord {
        TokenRecord {
            symbol: "TKN".into(),
            decimals,
            fee: 25,
            logo: None,
            listed_at: 0,
            last_activity,
            needs_reconciliation: false,
        }
    }

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::new(UserId::dummy(0xEE)));
        let payment = beacon_types::TokenId::dummy(0xFF);
        engine.state.payment_token = Some(payment);
        engine.state.revenue_account = Some(UserId::dummy(0xFE));
        engine.state.tokens.insert(payment, record(6, 0));
        engine.state.custodied.insert(payment, 0);
        engine
    }

    fn trade_at(token: TokenId, seq: u64, executed: Timestamp) -> Trade {
        Trade {
            id: TradeId::deterministic(seq),
            token,
            maker: UserId::dummy(1),
            taker: UserId::dummy(2),
            taker_side: OrderSide::Buy,
            amount: 1,
            price: 1_000_000,
            volume: 1,
            maker_fee: 0,
            taker_fee: 0,
            executed,
        }
    }

    #[test]
    fn expired_orders_are_closed_and_unlocked() {
        let mut engine = engine();
        let token = TokenId::dummy(1);
        let seller = UserId::dummy(1);
        engine.state.tokens.insert(token, record(8, 0));
        engine.state.custodied.insert(token, 100);
        engine
            .state
            .balances
            .credit_liquid(&seller, &token, 100)
            .unwrap();
        engine.state.balances.lock(&seller, &token, 100).unwrap();
        let mut book = Book::new();
        book.insert(Order::dummy(seller, OrderSide::Sell, 100, 1_000_000, 1))
            .unwrap();
        engine.state.books.insert(token, book);

        let report = engine.janitor_tick(constants::DAY * 91);
        assert_eq!(report.closed_orders, 1);
        assert!(engine.state.books.get(&token).unwrap().is_empty());
        let entry = engine.state.balances.read(&seller, &token);
        assert_eq!(entry.liquid, 100);
        assert_eq!(entry.locked, 0);
    }

    #[test]
    fn fresh_orders_survive_the_sweep() {
        let mut engine = engine();
        let token = TokenId::dummy(1);
        let seller = UserId::dummy(1);
        let now = constants::DAY * 100;
        engine.state.tokens.insert(token, record(8, now));
        engine.state.custodied.insert(token, 100);
        engine
            .state
            .balances
            .credit_liquid(&seller, &token, 100)
            .unwrap();
        engine.state.balances.lock(&seller, &token, 100).unwrap();
        let mut book = Book::new();
        book.insert(Order::dummy(
            seller,
            OrderSide::Sell,
            100,
            1_000_000,
            now - constants::DAY,
        ))
        .unwrap();
        engine.state.books.insert(token, book);

        let report = engine.janitor_tick(now);
        assert_eq!(report.closed_orders, 0);
        assert_eq!(engine.state.books.get(&token).unwrap().order_count(), 1);
    }

    #[test]
    fn old_archive_entries_pruned() {
        let mut engine = engine();
        let token = TokenId::dummy(1);
        engine.state.tokens.insert(token, record(8, u64::MAX - constants::DAY));
        engine.state.custodied.insert(token, 0);
        engine.state.books.insert(token, Book::new());

        let now = constants::DAY * 200;
        engine.state.archive.push(trade_at(token, 0, 0));
        engine.state.archive.push(trade_at(token, 1, now - 1));

        let report = engine.janitor_tick(now);
        assert_eq!(report.pruned_trades, 1);
        assert_eq!(engine.state.archive.len(), 1);
    }

    #[test]
    fn inactive_empty_token_delisted_payment_kept() {
        let mut engine = engine();
        let token = TokenId::dummy(1);
        engine.state.tokens.insert(token, record(8, 0));
        engine.state.custodied.insert(token, 50);
        engine.state.books.insert(token, Book::new());
        // A user still holds balance; delisting must preserve it.
        engine
            .state
            .balances
            .credit_liquid(&UserId::dummy(1), &token, 50)
            .unwrap();

        let report = engine.janitor_tick(constants::DAY * 181);
        assert_eq!(report.delisted_tokens, 1);
        assert!(!engine.state.tokens.contains_key(&token));
        // Payment token survives any amount of inactivity.
        assert!(engine
            .state
            .tokens
            .contains_key(&engine.state.payment_token.unwrap()));
        // The balance row is intact.
        assert_eq!(
            engine.state.balances.read(&UserId::dummy(1), &token).liquid,
            50
        );
    }

    #[test]
    fn active_or_nonempty_tokens_not_delisted() {
        let mut engine = engine();
        let now = constants::DAY * 200;

        // Recent activity.
        let active = TokenId::dummy(1);
        engine.state.tokens.insert(active, record(8, now - constants::DAY));
        engine.state.custodied.insert(active, 0);
        engine.state.books.insert(active, Book::new());

        // Stale but with a resting order.
        let busy = TokenId::dummy(2);
        let seller = UserId::dummy(1);
        engine.state.tokens.insert(busy, record(8, 0));
        engine.state.custodied.insert(busy, 10);
        engine
            .state
            .balances
            .credit_liquid(&seller, &busy, 10)
            .unwrap();
        engine.state.balances.lock(&seller, &busy, 10).unwrap();
        let mut book = Book::new();
        // Fresh order so the TTL sweep leaves it alone.
        book.insert(Order::dummy(seller, OrderSide::Sell, 10, 1_000_000, now))
            .unwrap();
        engine.state.books.insert(busy, book);

        let report = engine.janitor_tick(now);
        assert_eq!(report.delisted_tokens, 0);
        assert!(engine.state.tokens.contains_key(&active));
        assert!(engine.state.tokens.contains_key(&busy));
    }

    #[test]
    fn batch_bound_respected() {
        let mut engine = engine();
        engine.config.janitor_batch = 2;
        let token = TokenId::dummy(1);
        let seller = UserId::dummy(1);
        engine.state.tokens.insert(token, record(8, u64::MAX - constants::DAY));
        engine.state.custodied.insert(token, 50);
        engine
            .state
            .balances
            .credit_liquid(&seller, &token, 50)
            .unwrap();
        engine.state.balances.lock(&seller, &token, 50).unwrap();
        let mut book = Book::new();
        for i in 0..5 {
            book.insert(Order::dummy(seller, OrderSide::Sell, 10, 1_000_000, i))
                .unwrap();
        }
        engine.state.books.insert(token, book);

        let report = engine.janitor_tick(constants::DAY * 91);
        assert_eq!(report.closed_orders, 2);
        assert_eq!(engine.state.books.get(&token).unwrap().order_count(), 3);
    }
}
