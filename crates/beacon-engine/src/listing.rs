//! Token listing: metadata intake, fee charge, record and book creation.
//!
//! Listing is permissionless but paid: the caller's liquid payment balance
//! covers the listing price, which moves to the revenue account. The
//! metadata fetch is the only ledger call and happens before any state
//! change, so every failure path is trivially atomic.

use beacon_ledger::LedgerRegistry;
use beacon_types::{
    constants, BeaconError, LedgerError, Result, Timestamp, TokenId, TokenRecord, UserId,
};

use crate::engine::Engine;

impl Engine {
    /// List `token` for trading, charging the listing price from the
    /// caller's payment-token liquid balance.
    ///
    /// A token delisted by the janitor can be listed again; the fee is
    /// charged anew and preserved balances become reachable again.
    ///
    /// # Errors
    /// `BCN_ERR_401` if already listed, `BCN_ERR_300` if the metadata
    /// fetch fails, `BCN_ERR_106` on unsupported decimals,
    /// `BCN_ERR_200` if the caller cannot pay. All paths are atomic.
    pub fn list_token(
        &mut self,
        ledgers: &dyn LedgerRegistry,
        caller: UserId,
        token: TokenId,
        now: Timestamp,
    ) -> Result<()> {
        let payment = self.payment_token()?;
        let revenue = self.revenue_account()?;
        if self.state.tokens.contains_key(&token) {
            return Err(BeaconError::AlreadyListed(token));
        }

        let meta = ledgers
            .client(&token)
            .ok_or(LedgerError::UnknownLedger(token))?
            .metadata()?;
        if meta.decimals > constants::MAX_DECIMALS {
            return Err(BeaconError::DecimalsTooLarge(meta.decimals));
        }

        // Charge the listing fee. The debit can fail; the credit to the
        // revenue account cannot realistically overflow, but if it does the
        // debit is returned.
        let price = self.config.listing_price;
        self.state.balances.debit_liquid(&caller, &payment, price)?;
        if let Err(err) = self.state.balances.credit_liquid(&revenue, &payment, price) {
            self.state.balances.credit_liquid(&caller, &payment, price)?;
            return Err(err);
        }

        self.state.tokens.insert(
            token,
            TokenRecord {
                symbol: meta.symbol,
                decimals: meta.decimals,
                fee: meta.fee,
                logo: meta.logo,
                listed_at: now,
                last_activity: now,
                needs_reconciliation: false,
            },
        );
        self.state.books.entry(token).or_default();
        self.state.custodied.entry(token).or_insert(0);
        self.log(format!("{token} was listed by {caller}"));

        if let Err(err) = self.verify_invariants() {
            // Listing only moved the fee and created empty structures;
            // reverse both.
            self.state.tokens.remove(&token);
            self.state.balances.debit_liquid(&revenue, &payment, price)?;
            self.state.balances.credit_liquid(&caller, &payment, price)?;
            return Err(err);
        }
        Ok(())
    }

    /// One-shot registration of the process-wide quote asset. The payment
    /// token gets a record (its transfer fee and decimals drive custody and
    /// order validation) but never a book.
    ///
    /// # Errors
    /// `BCN_ERR_901` if a payment token is already set.
    pub fn set_payment_token(
        &mut self,
        ledgers: &dyn LedgerRegistry,
        token: TokenId,
        now: Timestamp,
    ) -> Result<()> {
        if self.state.payment_token.is_some() {
            return Err(BeaconError::AlreadyConfigured("payment token"));
        }
        let meta = ledgers
            .client(&token)
            .ok_or(LedgerError::UnknownLedger(token))?
            .metadata()?;
        if meta.decimals > constants::MAX_DECIMALS {
            return Err(BeaconError::DecimalsTooLarge(meta.decimals));
        }

        self.state.tokens.insert(
            token,
            TokenRecord {
                symbol: meta.symbol,
                decimals: meta.decimals,
                fee: meta.fee,
                logo: meta.logo,
                listed_at: now,
                last_activity: now,
                needs_reconciliation: false,
            },
        );
        self.state.custodied.entry(token).or_insert(0);
        self.state.payment_token = Some(token);
        self.log(format!("payment token set to {token}"));
        Ok(())
    }
}
