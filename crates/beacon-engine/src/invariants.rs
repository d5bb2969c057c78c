//! Conservation checks wrapping every state transition.
//!
//! Three families of invariant, verified after every externally-initiated
//! mutation:
//!
//! 1. **Custody conservation**: per token, the sum of all users' virtual
//!    balances (fee account included) equals the engine's running ledger of
//!    in-custody tokens.
//! 2. **Locked backing**: per user, the locked payment balance equals the
//!    summed reservation of their open buy orders, and the locked balance
//!    of each traded token equals the summed residual of their open sell
//!    orders. Equality is stronger than the `≥` the resting orders need.
//! 3. **Field sanity**: no open order with a zero amount or zero price.
//!
//! A violation means a bug, not a user error: the caller rolls the
//! offending mutation back, logs `BCN_ERR_700`, and the engine stays up.

use std::collections::BTreeMap;

use beacon_types::{BeaconError, OrderSide, Result, TokenId, Tokens, UserId};

use crate::engine::Engine;

impl Engine {
    /// Verify all engine invariants. Read-only.
    ///
    /// # Errors
    /// Returns `BCN_ERR_700` describing the first violated invariant.
    pub fn verify_invariants(&self) -> Result<()> {
        self.verify_custody()?;
        self.verify_locked_backing()
    }

    fn verify_custody(&self) -> Result<()> {
        for (token, expected) in &self.state.custodied {
            let total = self.state.balances.token_total(token)?;
            if total != *expected {
                return Err(BeaconError::InvariantViolation {
                    reason: format!(
                        "{token}: virtual balances sum to {total}, custody ledger says {expected}"
                    ),
                });
            }
        }
        // Every balance row must belong to a custodied token.
        for ((user, token), _) in self.state.balances.entries() {
            if !self.state.custodied.contains_key(token) {
                return Err(BeaconError::InvariantViolation {
                    reason: format!("{user} holds a balance in untracked token {token}"),
                });
            }
        }
        Ok(())
    }

    fn verify_locked_backing(&self) -> Result<()> {
        let fee_bps = self.config.fee_bps;
        let mut expected: BTreeMap<(UserId, TokenId), Tokens> = BTreeMap::new();

        for (token, book) in &self.state.books {
            for order in book.orders(OrderSide::Buy) {
                if order.amount == 0 || order.price == 0 {
                    return Err(BeaconError::InvariantViolation {
                        reason: format!("{token}: resting buy order with a zero field"),
                    });
                }
                let payment = self.state.payment_token.ok_or_else(|| {
                    BeaconError::InvariantViolation {
                        reason: "buy orders exist without a payment token".into(),
                    }
                })?;
                let reserve = order.reserved_liquidity(fee_bps)?;
                let slot = expected.entry((order.owner, payment)).or_insert(0);
                *slot = slot
                    .checked_add(reserve)
                    .ok_or(BeaconError::BalanceOverflow)?;
            }
            for order in book.orders(OrderSide::Sell) {
                if order.amount == 0 || order.price == 0 {
                    return Err(BeaconError::InvariantViolation {
                        reason: format!("{token}: resting sell order with a zero field"),
                    });
                }
                let slot = expected.entry((order.owner, *token)).or_insert(0);
                *slot = slot
                    .checked_add(order.amount)
                    .ok_or(BeaconError::BalanceOverflow)?;
            }
        }

        for ((user, token), entry) in self.state.balances.entries() {
            let backing = expected.remove(&(*user, *token)).unwrap_or(0);
            if entry.locked != backing {
                return Err(BeaconError::InvariantViolation {
                    reason: format!(
                        "{user} has {} locked in {token}, resting orders account for {backing}",
                        entry.locked
                    ),
                });
            }
        }
        // Orders whose owner has no balance row at all.
        if let Some(((user, token), backing)) = expected.into_iter().next() {
            return Err(BeaconError::InvariantViolation {
                reason: format!("{user} has orders reserving {backing} of {token} but no balance"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use beacon_book::Book;
    use beacon_types::{EngineConfig, Order, TokenRecord};

    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::new(UserId::dummy(0xEE)));
        let payment = TokenId::dummy(0xFF);
        engine.state.payment_token = Some(payment);
        engine.state.revenue_account = Some(UserId::dummy(0xFE));
        engine.state.tokens.insert(
            payment,
            TokenRecord {
                symbol: "PAY".into(),
                decimals: 6,
                fee: 10_000,
                logo: None,
                listed_at: 0,
                last_activity: 0,
                needs_reconciliation: false,
            },
        );
        engine.state.custodied.insert(payment, 0);
        engine
    }

    #[test]
    fn empty_engine_verifies() {
        engine().verify_invariants().unwrap();
    }

    #[test]
    fn custody_mismatch_detected() {
        let mut engine = engine();
        let payment = engine.state.payment_token.unwrap();
        // Credit without recording custody.
        engine
            .state
            .balances
            .credit_liquid(&UserId::dummy(1), &payment, 100)
            .unwrap();
        assert!(matches!(
            engine.verify_invariants(),
            Err(BeaconError::InvariantViolation { .. })
        ));
        // Recording the custody heals it.
        engine.state.custodied.insert(payment, 100);
        engine.verify_invariants().unwrap();
    }

    #[test]
    fn untracked_balance_token_detected() {
        let mut engine = engine();
        engine
            .state
            .balances
            .credit_liquid(&UserId::dummy(1), &TokenId::dummy(5), 1)
            .unwrap();
        assert!(matches!(
            engine.verify_invariants(),
            Err(BeaconError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn unbacked_lock_detected() {
        let mut engine = engine();
        let payment = engine.state.payment_token.unwrap();
        engine.state.custodied.insert(payment, 100);
        engine
            .state
            .balances
            .credit_liquid(&UserId::dummy(1), &payment, 100)
            .unwrap();
        engine
            .state
            .balances
            .lock(&UserId::dummy(1), &payment, 40)
            .unwrap();
        // Locked funds with no resting order backing them.
        assert!(matches!(
            engine.verify_invariants(),
            Err(BeaconError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn order_without_balance_detected() {
        let mut engine = engine();
        let token = TokenId::dummy(1);
        engine.state.custodied.insert(token, 0);
        let mut book = Book::new();
        book.insert(Order::dummy(UserId::dummy(1), OrderSide::Sell, 10, 1_000_000, 1))
            .unwrap();
        engine.state.books.insert(token, book);
        assert!(matches!(
            engine.verify_invariants(),
            Err(BeaconError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn backed_sell_order_verifies() {
        let mut engine = engine();
        let token = TokenId::dummy(1);
        let user = UserId::dummy(1);
        engine.state.custodied.insert(token, 10);
        engine
            .state
            .balances
            .credit_liquid(&user, &token, 10)
            .unwrap();
        engine.state.balances.lock(&user, &token, 10).unwrap();
        let mut book = Book::new();
        book.insert(Order::dummy(user, OrderSide::Sell, 10, 1_000_000, 1))
            .unwrap();
        engine.state.books.insert(token, book);
        engine.verify_invariants().unwrap();
    }
}
