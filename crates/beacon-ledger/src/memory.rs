//! Deterministic in-memory ledgers.
//!
//! [`InMemoryLedger`] implements [`LedgerClient`] against a plain map of
//! account balances, burning the transfer fee exactly like a real ledger.
//! A failure-injection switch lets tests exercise the custody
//! partial-failure paths without a flaky transport.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use beacon_types::{LedgerError, TokenId, Tokens, UserId};

use crate::client::{Account, LedgerClient, LedgerRegistry, Subaccount, TokenMetadata};

/// One simulated fungible-token ledger.
pub struct InMemoryLedger {
    /// The engine's principal; `transfer`/`transfer_from` spend from
    /// accounts under this owner.
    engine: UserId,
    meta: TokenMetadata,
    balances: RefCell<HashMap<Account, Tokens>>,
    next_block: Cell<u64>,
    fail_next_transfer: Cell<bool>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new(engine: UserId, meta: TokenMetadata) -> Self {
        Self {
            engine,
            meta,
            balances: RefCell::new(HashMap::new()),
            next_block: Cell::new(0),
            fail_next_transfer: Cell::new(false),
        }
    }

    /// Credit an account out of thin air (genesis / faucet).
    pub fn mint(&self, account: Account, amount: Tokens) {
        *self.balances.borrow_mut().entry(account).or_insert(0) += amount;
    }

    /// Make the next `transfer`/`transfer_from` fail with a transport error.
    pub fn fail_next_transfer(&self) {
        self.fail_next_transfer.set(true);
    }

    fn execute(
        &self,
        from: Account,
        to: &Account,
        amount: Tokens,
        fee: Tokens,
    ) -> Result<u64, LedgerError> {
        if self.fail_next_transfer.replace(false) {
            return Err(LedgerError::Transport {
                reason: "injected failure".into(),
            });
        }
        if fee != self.meta.fee {
            return Err(LedgerError::BadFee {
                expected: self.meta.fee,
            });
        }
        let mut balances = self.balances.borrow_mut();
        let total = amount
            .checked_add(fee)
            .ok_or(LedgerError::TemporarilyUnavailable)?;
        let source = balances.get(&from).copied().unwrap_or(0);
        if source < total {
            return Err(LedgerError::InsufficientFunds { balance: source });
        }
        balances.insert(from, source - total);
        *balances.entry(to.clone()).or_insert(0) += amount;

        let block = self.next_block.get();
        self.next_block.set(block + 1);
        tracing::debug!(%to, amount, fee, block, "ledger transfer");
        Ok(block)
    }
}

impl LedgerClient for InMemoryLedger {
    fn balance_of(&self, account: &Account) -> Result<Tokens, LedgerError> {
        Ok(self.balances.borrow().get(account).copied().unwrap_or(0))
    }

    fn transfer(&self, to: &Account, amount: Tokens, fee: Tokens) -> Result<u64, LedgerError> {
        self.execute(Account::main(self.engine), to, amount, fee)
    }

    fn transfer_from(
        &self,
        from: Subaccount,
        to: &Account,
        amount: Tokens,
        fee: Tokens,
    ) -> Result<u64, LedgerError> {
        self.execute(Account::sub(self.engine, from), to, amount, fee)
    }

    fn metadata(&self) -> Result<TokenMetadata, LedgerError> {
        Ok(self.meta.clone())
    }
}

/// A registry holding one [`InMemoryLedger`] per token id.
#[derive(Default)]
pub struct InMemoryLedgers {
    ledgers: HashMap<TokenId, InMemoryLedger>,
}

impl InMemoryLedgers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ledger under `token`, replacing any previous one.
    pub fn register(&mut self, token: TokenId, ledger: InMemoryLedger) {
        self.ledgers.insert(token, ledger);
    }

    /// Direct access for test setup (minting, failure injection).
    #[must_use]
    pub fn ledger(&self, token: &TokenId) -> Option<&InMemoryLedger> {
        self.ledgers.get(token)
    }
}

impl LedgerRegistry for InMemoryLedgers {
    fn client(&self, token: &TokenId) -> Option<&dyn LedgerClient> {
        self.ledgers.get(token).map(|l| l as &dyn LedgerClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(fee: Tokens) -> TokenMetadata {
        TokenMetadata {
            symbol: "TKN".into(),
            decimals: 8,
            fee,
            logo: None,
        }
    }

    fn setup() -> (UserId, InMemoryLedger) {
        let engine = UserId::dummy(0xEE);
        (engine, InMemoryLedger::new(engine, meta(10)))
    }

    #[test]
    fn balances_start_at_zero() {
        let (_, ledger) = setup();
        let account = Account::main(UserId::dummy(1));
        assert_eq!(ledger.balance_of(&account).unwrap(), 0);
    }

    #[test]
    fn transfer_moves_funds_and_burns_fee() {
        let (engine, ledger) = setup();
        ledger.mint(Account::main(engine), 1_000);

        let user = Account::main(UserId::dummy(1));
        ledger.transfer(&user, 500, 10).unwrap();

        assert_eq!(ledger.balance_of(&user).unwrap(), 500);
        assert_eq!(ledger.balance_of(&Account::main(engine)).unwrap(), 490);
    }

    #[test]
    fn transfer_from_spends_subaccount() {
        let (engine, ledger) = setup();
        let sub = *UserId::dummy(1).as_bytes();
        ledger.mint(Account::sub(engine, sub), 200);

        ledger.transfer_from(sub, &Account::main(engine), 190, 10).unwrap();
        assert_eq!(ledger.balance_of(&Account::sub(engine, sub)).unwrap(), 0);
        assert_eq!(ledger.balance_of(&Account::main(engine)).unwrap(), 190);
    }

    #[test]
    fn insufficient_funds_rejected() {
        let (engine, ledger) = setup();
        ledger.mint(Account::main(engine), 100);
        let err = ledger
            .transfer(&Account::main(UserId::dummy(1)), 200, 10)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { balance: 100 }));
    }

    #[test]
    fn wrong_fee_rejected() {
        let (engine, ledger) = setup();
        ledger.mint(Account::main(engine), 100);
        let err = ledger
            .transfer(&Account::main(UserId::dummy(1)), 50, 7)
            .unwrap_err();
        assert!(matches!(err, LedgerError::BadFee { expected: 10 }));
    }

    #[test]
    fn injected_failure_fires_once() {
        let (engine, ledger) = setup();
        ledger.mint(Account::main(engine), 1_000);
        ledger.fail_next_transfer();

        let user = Account::main(UserId::dummy(1));
        assert!(matches!(
            ledger.transfer(&user, 100, 10),
            Err(LedgerError::Transport { .. })
        ));
        // State untouched, and the next attempt succeeds.
        assert_eq!(ledger.balance_of(&user).unwrap(), 0);
        ledger.transfer(&user, 100, 10).unwrap();
        assert_eq!(ledger.balance_of(&user).unwrap(), 100);
    }

    #[test]
    fn registry_resolves_clients() {
        let (_, ledger) = setup();
        let token = TokenId::dummy(1);
        let mut registry = InMemoryLedgers::new();
        registry.register(token, ledger);

        assert!(registry.client(&token).is_some());
        assert!(registry.client(&TokenId::dummy(2)).is_none());
        assert_eq!(
            registry.client(&token).unwrap().metadata().unwrap().fee,
            10
        );
    }
}
