//! Snapshot persistence: the whole engine state as one versioned blob.
//!
//! The blob is the authoritative store between process lifecycle events;
//! the in-memory shape is a faithful deserialization of it. A version tag
//! guards against loading a blob written by an incompatible engine.

use serde::{Deserialize, Serialize};

use beacon_types::{BeaconError, EngineConfig, Result};

use crate::engine::{Engine, State};

/// Bump on any breaking change to the persisted state layout.
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    state: State,
}

impl Engine {
    /// Serialize the engine state to a versioned blob.
    ///
    /// # Errors
    /// `BCN_ERR_903` if encoding fails.
    pub fn persist(&self) -> Result<Vec<u8>> {
        bincode::serialize(&PersistedState {
            version: FORMAT_VERSION,
            state: self.state.clone(),
        })
        .map_err(|err| BeaconError::Serialization(err.to_string()))
    }

    /// Rebuild an engine from a blob written by [`Engine::persist`].
    ///
    /// # Errors
    /// `BCN_ERR_903` on a decode failure or a version mismatch.
    pub fn restore(config: EngineConfig, bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedState = bincode::deserialize(bytes)
            .map_err(|err| BeaconError::Serialization(err.to_string()))?;
        if persisted.version != FORMAT_VERSION {
            return Err(BeaconError::Serialization(format!(
                "unsupported state version {} (engine speaks {FORMAT_VERSION})",
                persisted.version
            )));
        }
        let engine = Engine {
            config,
            state: persisted.state,
        };
        // A snapshot that fails verification must not be traded on.
        engine.verify_invariants()?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use beacon_book::Book;
    use beacon_types::{Order, OrderSide, TokenId, TokenRecord, UserId};

    use super::*;

    fn populated_engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::new(UserId::dummy(0xEE)));
        let payment = TokenId::dummy(0xFF);
        let token = TokenId::dummy(1);
        let user = UserId::dummy(1);
        engine.state.payment_token = Some(payment);
        engine.state.revenue_account = Some(UserId::dummy(0xFE));
        for (id, decimals) in [(payment, 6), (token, 8)] {
            engine.state.tokens.insert(
                id,
                TokenRecord {
                    symbol: "TKN".into(),
                    decimals,
                    fee: 10_000,
                    logo: None,
                    listed_at: 0,
                    last_activity: 0,
                    needs_reconciliation: false,
                },
            );
            engine.state.custodied.insert(id, 0);
        }
        engine.state.custodied.insert(token, 500);
        engine
            .state
            .balances
            .credit_liquid(&user, &token, 500)
            .unwrap();
        engine.state.balances.lock(&user, &token, 200).unwrap();
        let mut book = Book::new();
        book.insert(Order::dummy(user, OrderSide::Sell, 200, 2_000_000, 7))
            .unwrap();
        engine.state.books.insert(token, book);
        engine.state.trade_seq = 42;
        engine
    }

    #[test]
    fn roundtrip_preserves_state() {
        let engine = populated_engine();
        let blob = engine.persist().unwrap();
        let restored = Engine::restore(engine.config.clone(), &blob).unwrap();

        assert_eq!(restored.state.trade_seq, 42);
        assert_eq!(restored.state.payment_token, engine.state.payment_token);
        let token = TokenId::dummy(1);
        let user = UserId::dummy(1);
        assert_eq!(restored.state.balances.read(&user, &token).locked, 200);
        assert_eq!(
            restored.state.books.get(&token).unwrap().order_count(),
            1
        );
        assert_eq!(restored.state.custodied.get(&token), Some(&500));
    }

    #[test]
    fn version_mismatch_rejected() {
        let engine = populated_engine();
        let blob = engine.persist().unwrap();
        let mut wrong: PersistedState = bincode::deserialize(&blob).unwrap();
        wrong.version = FORMAT_VERSION + 1;
        let bytes = bincode::serialize(&wrong).unwrap();

        assert!(matches!(
            Engine::restore(engine.config.clone(), &bytes),
            Err(BeaconError::Serialization(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        let config = EngineConfig::new(UserId::dummy(0xEE));
        assert!(matches!(
            Engine::restore(config, b"not a snapshot"),
            Err(BeaconError::Serialization(_))
        ));
    }

    #[test]
    fn corrupt_snapshot_fails_verification() {
        let mut engine = populated_engine();
        // Break conservation before persisting.
        engine.state.custodied.insert(TokenId::dummy(1), 1);
        let blob = engine.persist().unwrap();
        assert!(matches!(
            Engine::restore(engine.config.clone(), &blob),
            Err(BeaconError::InvariantViolation { .. })
        ));
    }
}
