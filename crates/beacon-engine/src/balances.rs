//! The virtual-balance ledger.
//!
//! Tracks per-(user, token) [`BalanceEntry`] rows with a `liquid` and a
//! `locked` component. The lifecycle of a trade:
//! 1. `credit_liquid`: custody deposits funds
//! 2. `lock`: an order reserves funds (liquid → locked)
//! 3. `settle` / `spend_locked`: a fill pays out of the reservation
//! 4. `unlock`: a cancellation returns the reservation (locked → liquid)
//!
//! A journal records the pre-image of every row touched while active, so
//! the matcher can restore the exact prior state when a trade aborts
//! mid-walk. The journal holds one pre-image per touched row.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use beacon_types::{BalanceEntry, BeaconError, Result, TokenId, Tokens, UserId};

type RowKey = (UserId, TokenId);

/// In-memory balance ledger for all users and tokens under custody.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualBalances {
    /// `(user, token) → BalanceEntry`
    balances: BTreeMap<RowKey, BalanceEntry>,
    /// Pre-images of rows touched since `begin_journal`. Never persisted:
    /// a journal only lives inside one mutating call.
    #[serde(skip)]
    journal: Option<HashMap<RowKey, BalanceEntry>>,
}

impl VirtualBalances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The balance entry for a user + token. Absent rows read as zero.
    #[must_use]
    pub fn read(&self, user: &UserId, token: &TokenId) -> BalanceEntry {
        self.balances
            .get(&(*user, *token))
            .copied()
            .unwrap_or_default()
    }

    /// Iterate all balance rows.
    pub fn entries(&self) -> impl Iterator<Item = (&RowKey, &BalanceEntry)> {
        self.balances.iter()
    }

    /// Sum of `liquid + locked` over every user for one token.
    ///
    /// # Errors
    /// Returns `BCN_ERR_202` if the sum overflows.
    pub fn token_total(&self, token: &TokenId) -> Result<Tokens> {
        let mut total: Tokens = 0;
        for ((_, t), entry) in &self.balances {
            if t == token {
                total = total
                    .checked_add(entry.total())
                    .ok_or(BeaconError::BalanceOverflow)?;
            }
        }
        Ok(total)
    }

    fn touch(&mut self, key: RowKey) {
        if let Some(journal) = &mut self.journal {
            let current = self.balances.get(&key).copied().unwrap_or_default();
            journal.entry(key).or_insert(current);
        }
    }

    fn write(&mut self, key: RowKey, entry: BalanceEntry) {
        if entry.is_zero() {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, entry);
        }
    }

    // =================================================================
    // Core operations
    // =================================================================

    /// Credit `amount` to the liquid balance. Zero is a no-op.
    ///
    /// # Errors
    /// Returns `BCN_ERR_202` on overflow.
    pub fn credit_liquid(&mut self, user: &UserId, token: &TokenId, amount: Tokens) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let key = (*user, *token);
        self.touch(key);
        let mut entry = self.read(user, token);
        entry.liquid = entry
            .liquid
            .checked_add(amount)
            .ok_or(BeaconError::BalanceOverflow)?;
        self.write(key, entry);
        Ok(())
    }

    /// Debit `amount` from the liquid balance.
    ///
    /// # Errors
    /// Returns `BCN_ERR_200` if the liquid balance is insufficient.
    pub fn debit_liquid(&mut self, user: &UserId, token: &TokenId, amount: Tokens) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let key = (*user, *token);
        self.touch(key);
        let mut entry = self.read(user, token);
        entry.liquid =
            entry
                .liquid
                .checked_sub(amount)
                .ok_or(BeaconError::InsufficientLiquidity {
                    needed: amount,
                    available: entry.liquid,
                })?;
        self.write(key, entry);
        Ok(())
    }

    /// Reserve `amount`: liquid decreases, locked increases, atomically.
    ///
    /// # Errors
    /// Returns `BCN_ERR_200` if the liquid balance is insufficient.
    pub fn lock(&mut self, user: &UserId, token: &TokenId, amount: Tokens) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let key = (*user, *token);
        self.touch(key);
        let mut entry = self.read(user, token);
        entry.liquid =
            entry
                .liquid
                .checked_sub(amount)
                .ok_or(BeaconError::InsufficientLiquidity {
                    needed: amount,
                    available: entry.liquid,
                })?;
        entry.locked = entry
            .locked
            .checked_add(amount)
            .ok_or(BeaconError::BalanceOverflow)?;
        self.write(key, entry);
        Ok(())
    }

    /// Reverse of [`VirtualBalances::lock`].
    ///
    /// # Errors
    /// Returns `BCN_ERR_201` if the locked balance is insufficient.
    pub fn unlock(&mut self, user: &UserId, token: &TokenId, amount: Tokens) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let key = (*user, *token);
        self.touch(key);
        let mut entry = self.read(user, token);
        entry.locked = entry
            .locked
            .checked_sub(amount)
            .ok_or(BeaconError::InsufficientLocked)?;
        entry.liquid = entry
            .liquid
            .checked_add(amount)
            .ok_or(BeaconError::BalanceOverflow)?;
        self.write(key, entry);
        Ok(())
    }

    /// Consume `amount` from a user's locked balance without crediting a
    /// counterparty row. The matcher uses this for the payment leg of a
    /// fill, whose proceeds split between maker, taker, and the fee account.
    ///
    /// # Errors
    /// Returns `BCN_ERR_201` if the locked balance is insufficient.
    pub fn spend_locked(&mut self, user: &UserId, token: &TokenId, amount: Tokens) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let key = (*user, *token);
        self.touch(key);
        let mut entry = self.read(user, token);
        entry.locked = entry
            .locked
            .checked_sub(amount)
            .ok_or(BeaconError::InsufficientLocked)?;
        self.write(key, entry);
        Ok(())
    }

    /// Move `amount` from one user's locked balance to another user's
    /// liquid balance: the token leg of a fill.
    ///
    /// # Errors
    /// Returns `BCN_ERR_201` / `BCN_ERR_202` from the underlying steps.
    pub fn settle(
        &mut self,
        locked_from: &UserId,
        to: &UserId,
        token: &TokenId,
        amount: Tokens,
    ) -> Result<()> {
        self.spend_locked(locked_from, token, amount)?;
        self.credit_liquid(to, token, amount)
    }

    // =================================================================
    // Journaling
    // =================================================================

    /// Start recording pre-images. Any journal still active is discarded.
    pub fn begin_journal(&mut self) {
        self.journal = Some(HashMap::new());
    }

    /// Drop the journal, keeping all mutations.
    pub fn commit_journal(&mut self) {
        self.journal = None;
    }

    /// Restore every touched row to its pre-journal state.
    pub fn rollback_journal(&mut self) {
        if let Some(journal) = self.journal.take() {
            for (key, entry) in journal {
                self.write(key, entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (UserId, TokenId) {
        (UserId::dummy(1), TokenId::dummy(1))
    }

    #[test]
    fn credit_and_read() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.credit_liquid(&user, &token, 1_000).unwrap();
        let entry = balances.read(&user, &token);
        assert_eq!(entry.liquid, 1_000);
        assert_eq!(entry.locked, 0);
    }

    #[test]
    fn absent_row_reads_zero() {
        let balances = VirtualBalances::new();
        let (user, token) = ids();
        assert!(balances.read(&user, &token).is_zero());
    }

    #[test]
    fn debit_insufficient() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.credit_liquid(&user, &token, 100).unwrap();
        let err = balances.debit_liquid(&user, &token, 200).unwrap_err();
        assert!(matches!(
            err,
            BeaconError::InsufficientLiquidity {
                needed: 200,
                available: 100
            }
        ));
    }

    #[test]
    fn lock_and_unlock() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.credit_liquid(&user, &token, 1_000).unwrap();

        balances.lock(&user, &token, 400).unwrap();
        let entry = balances.read(&user, &token);
        assert_eq!(entry.liquid, 600);
        assert_eq!(entry.locked, 400);
        assert_eq!(entry.total(), 1_000);

        balances.unlock(&user, &token, 400).unwrap();
        let entry = balances.read(&user, &token);
        assert_eq!(entry.liquid, 1_000);
        assert_eq!(entry.locked, 0);
    }

    #[test]
    fn lock_insufficient() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.credit_liquid(&user, &token, 100).unwrap();
        assert!(matches!(
            balances.lock(&user, &token, 200),
            Err(BeaconError::InsufficientLiquidity { .. })
        ));
    }

    #[test]
    fn unlock_insufficient() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.credit_liquid(&user, &token, 100).unwrap();
        balances.lock(&user, &token, 50).unwrap();
        assert!(matches!(
            balances.unlock(&user, &token, 100),
            Err(BeaconError::InsufficientLocked)
        ));
    }

    #[test]
    fn settle_moves_between_users() {
        let mut balances = VirtualBalances::new();
        let token = TokenId::dummy(1);
        let (seller, buyer) = (UserId::dummy(1), UserId::dummy(2));
        balances.credit_liquid(&seller, &token, 10).unwrap();
        balances.lock(&seller, &token, 10).unwrap();

        balances.settle(&seller, &buyer, &token, 10).unwrap();
        assert!(balances.read(&seller, &token).is_zero());
        assert_eq!(balances.read(&buyer, &token).liquid, 10);
    }

    #[test]
    fn token_total_sums_all_users() {
        let mut balances = VirtualBalances::new();
        let token = TokenId::dummy(1);
        balances
            .credit_liquid(&UserId::dummy(1), &token, 100)
            .unwrap();
        balances
            .credit_liquid(&UserId::dummy(2), &token, 50)
            .unwrap();
        balances.lock(&UserId::dummy(2), &token, 20).unwrap();
        assert_eq!(balances.token_total(&token).unwrap(), 150);
        // Another token does not leak in.
        balances
            .credit_liquid(&UserId::dummy(1), &TokenId::dummy(2), 7)
            .unwrap();
        assert_eq!(balances.token_total(&token).unwrap(), 150);
    }

    #[test]
    fn journal_rollback_restores_rows() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        let other = UserId::dummy(2);
        balances.credit_liquid(&user, &token, 1_000).unwrap();

        balances.begin_journal();
        balances.lock(&user, &token, 500).unwrap();
        balances.settle(&user, &other, &token, 300).unwrap();
        balances.credit_liquid(&other, &token, 42).unwrap();
        balances.rollback_journal();

        assert_eq!(balances.read(&user, &token).liquid, 1_000);
        assert_eq!(balances.read(&user, &token).locked, 0);
        assert!(balances.read(&other, &token).is_zero());
    }

    #[test]
    fn journal_commit_keeps_mutations() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.credit_liquid(&user, &token, 1_000).unwrap();

        balances.begin_journal();
        balances.lock(&user, &token, 500).unwrap();
        balances.commit_journal();
        // Rollback after commit is a no-op.
        balances.rollback_journal();

        assert_eq!(balances.read(&user, &token).locked, 500);
    }

    #[test]
    fn rollback_removes_created_rows() {
        let mut balances = VirtualBalances::new();
        let (user, token) = ids();
        balances.begin_journal();
        balances.credit_liquid(&user, &token, 10).unwrap();
        balances.rollback_journal();
        assert!(balances.entries().next().is_none());
    }
}
