//! The matcher: atomic trade execution against the resting book.
//!
//! `trade` walks the opposite side in price-time priority, settles each fill
//! through [`crate::VirtualBalances`], archives a [`Trade`] record, and
//! either posts the unfilled remainder of a limit order or unlocks the
//! surplus. The walk never suspends: ledger clients are not reachable from
//! this module.
//!
//! Rollback works without transactions. Balance rows journal their
//! pre-images on first touch; the [`TradeJournal`] remembers every order
//! the walk removed or inserted and every archive entry it appended. Any
//! error, including a failed post-trade invariant check, restores the
//! exact pre-trade state before surfacing.

use beacon_types::{
    gross_payment, max_affordable, trading_fee, BeaconError, BookKey, Order, OrderExecution,
    OrderSide, PricePerBase, Result, Timestamp, TokenId, Tokens, Trade, TradeId, UserId,
};

use crate::engine::{Engine, State};

/// Everything about the incoming order that stays fixed during the walk.
struct FillCtx {
    caller: UserId,
    token: TokenId,
    payment: TokenId,
    revenue: UserId,
    decimals: u32,
    payment_fee: Tokens,
    /// The taker's limit; `0` = market.
    price: PricePerBase,
    side: OrderSide,
    now: Timestamp,
}

/// Undo log for one `trade` call.
struct TradeJournal {
    token: TokenId,
    /// Pre-images of makers taken off the book.
    removed: Vec<Order>,
    /// The caller's own makers, set aside during the walk and returned to
    /// the book untouched.
    skipped: Vec<Order>,
    /// Keys inserted during the walk (reduced makers, taker residual).
    inserted: Vec<(OrderSide, BookKey)>,
    /// Archive entries appended during the walk.
    archived: usize,
    trade_seq_before: u64,
    last_activity_before: Timestamp,
}

impl TradeJournal {
    fn new(token: TokenId, trade_seq_before: u64, last_activity_before: Timestamp) -> Self {
        Self {
            token,
            removed: Vec::new(),
            skipped: Vec::new(),
            inserted: Vec::new(),
            archived: 0,
            trade_seq_before,
            last_activity_before,
        }
    }

    /// Restore books, archive, and counters to their pre-trade state.
    /// Balance rows roll back separately through their own journal.
    fn undo(self, state: &mut State) {
        if let Some(book) = state.books.get_mut(&self.token) {
            for (side, key) in self.inserted {
                book.cancel(side, key);
            }
            for order in self.removed.into_iter().chain(self.skipped) {
                if book.insert(order).is_err() {
                    // Unreachable: every key was unique before the walk.
                    tracing::error!(target: "beacon", token = %self.token, "trade rollback hit a duplicate book key");
                }
            }
        }
        state.archive.pop_recent(&self.token, self.archived);
        state.trade_seq = self.trade_seq_before;
        if let Some(record) = state.tokens.get_mut(&self.token) {
            record.last_activity = self.last_activity_before;
        }
    }
}

impl Engine {
    // =================================================================
    // trade
    // =================================================================

    /// Execute an order against the book of `token`.
    ///
    /// `price > 0` is a limit; `price == 0` is a market order. Fills settle
    /// at the resting maker's price. If a limit remainder survives the walk
    /// it rests in the book and the call reports `FilledAndOrderCreated`.
    ///
    /// # Errors
    /// Validation, liquidity, and budget errors; every error path leaves
    /// the engine exactly as it was before the call.
    #[allow(clippy::too_many_arguments)]
    pub fn trade(
        &mut self,
        caller: UserId,
        token: TokenId,
        amount: Tokens,
        price: PricePerBase,
        side: OrderSide,
        now: Timestamp,
    ) -> Result<OrderExecution> {
        let payment = self.payment_token()?;
        let revenue = self.revenue_account()?;
        if amount == 0 {
            return Err(BeaconError::ZeroAmount);
        }
        if token == payment {
            return Err(BeaconError::PaymentTokenNotTradable);
        }
        let record = self.token_record(&token)?;
        let decimals = record.decimals;
        let last_activity_before = record.last_activity;
        let payment_fee = self.token_record(&payment)?.fee;

        // Failed attempts still count toward the hourly budget.
        self.record_activity(caller, now)?;

        if price > 0 {
            let volume = gross_payment(amount, price, decimals)?;
            if volume == 0 {
                return Err(BeaconError::ZeroVolume);
            }
            if volume <= payment_fee {
                return Err(BeaconError::DustOrder {
                    volume,
                    fee: payment_fee,
                });
            }
        }
        if let Some(record) = self.state.tokens.get_mut(&token) {
            record.last_activity = now;
        }

        let ctx = FillCtx {
            caller,
            token,
            payment,
            revenue,
            decimals,
            payment_fee,
            price,
            side,
            now,
        };
        let mut journal = TradeJournal::new(token, self.state.trade_seq, last_activity_before);
        self.state.balances.begin_journal();

        let result = self
            .trade_inner(&ctx, amount, &mut journal)
            .and_then(|execution| {
                self.verify_invariants()?;
                Ok(execution)
            });
        match result {
            Ok(execution) => {
                self.state.balances.commit_journal();
                self.log(format!(
                    "{caller} {} {} of {token} at limit price {price}, filled {}",
                    if side.buy() { "bought" } else { "sold" },
                    amount,
                    execution.filled(),
                ));
                Ok(execution)
            }
            Err(err) => {
                journal.undo(&mut self.state);
                self.state.balances.rollback_journal();
                self.log(format!("trade by {caller} rolled back: {err}"));
                Err(err)
            }
        }
    }

    /// Payment needed to consume the visible sell side up to `amount`,
    /// at each maker's own price plus the taker fee. Pre-walk for the
    /// market-buy lock.
    fn market_buy_budget(&self, ctx: &FillCtx, amount: Tokens) -> Result<Tokens> {
        let Some(book) = self.state.books.get(&ctx.token) else {
            return Ok(0);
        };
        let fee_bps = self.config.fee_bps;
        let mut remaining = amount;
        let mut needed: Tokens = 0;
        for maker in book.iter_matchable(OrderSide::Buy, None) {
            if remaining == 0 {
                break;
            }
            if maker.owner == ctx.caller {
                continue;
            }
            let fill = remaining.min(maker.amount);
            let gross = gross_payment(fill, maker.price, ctx.decimals)?;
            let fee = trading_fee(gross, fee_bps)?;
            needed = needed
                .checked_add(gross)
                .and_then(|n| n.checked_add(fee))
                .ok_or(BeaconError::AmountOverflow)?;
            remaining -= fill;
        }
        Ok(needed)
    }

    fn trade_inner(
        &mut self,
        ctx: &FillCtx,
        amount: Tokens,
        journal: &mut TradeJournal,
    ) -> Result<OrderExecution> {
        let fee_bps = self.config.fee_bps;
        let max_fills = self.config.max_fills_per_trade;

        // Step 1: take the lock. `budget` tracks what remains of it:
        // payment units for a buy, traded-token units for a sell.
        let mut budget = match (ctx.side, ctx.price) {
            (OrderSide::Sell, _) => {
                self.state.balances.lock(&ctx.caller, &ctx.token, amount)?;
                amount
            }
            (OrderSide::Buy, price) if price > 0 => {
                let volume = gross_payment(amount, price, ctx.decimals)?;
                let required = volume
                    .checked_add(trading_fee(volume, fee_bps)?)
                    .ok_or(BeaconError::AmountOverflow)?;
                self.state
                    .balances
                    .lock(&ctx.caller, &ctx.payment, required)?;
                required
            }
            (OrderSide::Buy, _) => {
                // Market buy: lock the caller's liquid payment, capped by
                // what the visible opposite side can consume.
                let needed = self.market_buy_budget(ctx, amount)?;
                let liquid = self.state.balances.read(&ctx.caller, &ctx.payment).liquid;
                let lock = needed.min(liquid);
                self.state.balances.lock(&ctx.caller, &ctx.payment, lock)?;
                lock
            }
        };

        let State {
            books,
            balances,
            archive,
            trade_seq,
            ..
        } = &mut self.state;
        let book = books.entry(ctx.token).or_default();
        let maker_side = ctx.side.opposite();

        let mut remaining = amount;
        let mut filled: Tokens = 0;
        let mut fills: usize = 0;

        // Step 2: walk the opposite side in priority order.
        while remaining > 0 {
            let Some(maker) = book.pop_best(maker_side) else {
                break;
            };

            // First maker beyond the limit: put it back and stop.
            if ctx.price > 0 {
                let crossed = match ctx.side {
                    OrderSide::Buy => maker.price > ctx.price,
                    OrderSide::Sell => maker.price < ctx.price,
                };
                if crossed {
                    book.insert(maker)?;
                    break;
                }
            }

            // Own orders never match; they return to the book untouched.
            if maker.owner == ctx.caller {
                journal.skipped.push(maker);
                continue;
            }

            // From here on the maker is off the book; journal it first so
            // every error path can restore it.
            journal.removed.push(maker.clone());

            if fills >= max_fills {
                return Err(BeaconError::ResourceExhausted { fills });
            }

            let mut fill = remaining.min(maker.amount);
            let mut gross = gross_payment(fill, maker.price, ctx.decimals)?;
            let mut fee = trading_fee(gross, fee_bps)?;
            if ctx.side.buy() {
                let cost = gross.checked_add(fee).ok_or(BeaconError::AmountOverflow)?;
                if cost > budget {
                    fill = max_affordable(budget, maker.price, ctx.decimals, fee_bps, fill);
                    gross = gross_payment(fill, maker.price, ctx.decimals)?;
                    fee = trading_fee(gross, fee_bps)?;
                }
            }
            // Zero-payment fills are forbidden; nothing smaller can settle.
            if fill == 0 || gross == 0 {
                journal.removed.pop();
                book.insert(maker)?;
                break;
            }

            let maker_fee;
            let taker_fee;
            match ctx.side {
                OrderSide::Buy => {
                    // Payment leg: the taker pays gross + fee out of the
                    // lock; the sell maker receives gross net of their fee;
                    // both fees go to the revenue account.
                    let cost = gross + fee;
                    balances.spend_locked(&ctx.caller, &ctx.payment, cost)?;
                    budget -= cost;
                    balances.credit_liquid(
                        &maker.owner,
                        &ctx.payment,
                        gross.checked_sub(fee).ok_or(BeaconError::AmountOverflow)?,
                    )?;
                    balances.credit_liquid(
                        &ctx.revenue,
                        &ctx.payment,
                        fee.checked_mul(2).ok_or(BeaconError::AmountOverflow)?,
                    )?;
                    // Token leg: the maker's locked tokens go to the taker.
                    balances.settle(&maker.owner, &ctx.caller, &ctx.token, fill)?;
                    maker_fee = fee;
                    taker_fee = fee;
                }
                OrderSide::Sell => {
                    // The buy maker pays out of its reservation, which
                    // releases by the difference of reserved liquidity
                    // before and after the fill. Floor rounding can leave
                    // the release a unit short of the nominal fee (the fee
                    // account absorbs it) or a unit over (refunded to the
                    // maker).
                    let reserved_before = maker.reserved_liquidity(fee_bps)?;
                    let reserved_after = if maker.amount == fill {
                        0
                    } else {
                        let mut rest = maker.clone();
                        rest.amount -= fill;
                        rest.reserved_liquidity(fee_bps)?
                    };
                    let released = reserved_before
                        .checked_sub(reserved_after)
                        .ok_or(BeaconError::InsufficientLocked)?;
                    let available_fee = released
                        .checked_sub(gross)
                        .ok_or(BeaconError::InsufficientLocked)?;
                    let collected = fee.min(available_fee);
                    let refund = available_fee - collected;

                    balances.spend_locked(&maker.owner, &ctx.payment, released)?;
                    balances.credit_liquid(
                        &ctx.caller,
                        &ctx.payment,
                        gross.checked_sub(fee).ok_or(BeaconError::AmountOverflow)?,
                    )?;
                    balances.credit_liquid(
                        &ctx.revenue,
                        &ctx.payment,
                        fee.checked_add(collected)
                            .ok_or(BeaconError::AmountOverflow)?,
                    )?;
                    balances.credit_liquid(&maker.owner, &ctx.payment, refund)?;
                    // Token leg: the taker's locked tokens go to the maker.
                    balances.settle(&ctx.caller, &maker.owner, &ctx.token, fill)?;
                    budget -= fill;
                    maker_fee = collected;
                    taker_fee = fee;
                }
            }

            remaining -= fill;
            filled += fill;
            fills += 1;

            let trade = Trade {
                id: TradeId::deterministic(*trade_seq),
                token: ctx.token,
                maker: maker.owner,
                taker: ctx.caller,
                taker_side: ctx.side,
                amount: fill,
                price: maker.price,
                volume: gross,
                maker_fee,
                taker_fee,
                executed: ctx.now,
            };
            *trade_seq += 1;
            archive.push(trade);
            journal.archived += 1;

            tracing::debug!(
                target: "beacon",
                token = %ctx.token,
                maker = %maker.owner,
                taker = %ctx.caller,
                amount = fill,
                price = maker.price,
                gross,
                "fill"
            );

            // Partially consumed maker: rest under the same key.
            if fill < maker.amount {
                let mut rest = maker;
                rest.amount -= fill;
                let key = rest.key();
                book.insert(rest)?;
                journal.inserted.push((maker_side, key));
            }
        }

        // The caller's own makers return to the book untouched.
        for order in journal.skipped.drain(..) {
            book.insert(order)?;
        }

        // Step 3: post the remainder of a limit order, or unlock surplus.
        if remaining > 0 && ctx.price > 0 {
            let residual = Order {
                owner: ctx.caller,
                side: ctx.side,
                amount: remaining,
                price: ctx.price,
                timestamp: ctx.now,
                executed: 0,
                decimals: ctx.decimals,
                payment_token_fee: ctx.payment_fee,
            };
            let volume = residual.volume()?;
            if volume == 0 || volume <= ctx.payment_fee {
                // The remainder is dust; return it instead of posting an
                // unfillable order.
                match ctx.side {
                    OrderSide::Buy => balances.unlock(&ctx.caller, &ctx.payment, budget)?,
                    OrderSide::Sell => balances.unlock(&ctx.caller, &ctx.token, remaining)?,
                }
                return Ok(OrderExecution::Filled(filled));
            }
            if ctx.side.buy() {
                let reserve = residual.reserved_liquidity(fee_bps)?;
                if budget > reserve {
                    balances.unlock(&ctx.caller, &ctx.payment, budget - reserve)?;
                } else if budget < reserve {
                    // Fee rounding across fills can leave the lock a few
                    // units short of the residual reservation; top it up.
                    balances.lock(&ctx.caller, &ctx.payment, reserve - budget)?;
                }
            }
            let key = residual.key();
            book.insert(residual)?;
            journal.inserted.push((ctx.side, key));
            Ok(OrderExecution::FilledAndOrderCreated(filled))
        } else {
            match ctx.side {
                OrderSide::Buy => balances.unlock(&ctx.caller, &ctx.payment, budget)?,
                OrderSide::Sell => balances.unlock(&ctx.caller, &ctx.token, remaining)?,
            }
            Ok(OrderExecution::Filled(filled))
        }
    }

    // =================================================================
    // close_order
    // =================================================================

    /// Cancel the caller's resting order identified by its full tuple.
    /// Idempotent: an absent (or differently-sized) order is an Ok no-op.
    ///
    /// # Errors
    /// Only balance or invariant failures; both leave state untouched.
    pub fn close_order(
        &mut self,
        caller: UserId,
        token: TokenId,
        side: OrderSide,
        amount: Tokens,
        price: PricePerBase,
        timestamp: Timestamp,
    ) -> Result<()> {
        let key: BookKey = (price, timestamp, caller);
        match self.state.books.get(&token).and_then(|b| b.get(side, key)) {
            None => return Ok(()),
            Some(order) if order.amount != amount => return Ok(()),
            Some(_) => {}
        }
        if let Some(order) = self.close_resting_order(token, side, key)? {
            if let Err(err) = self.verify_invariants() {
                self.reinstate_order(token, order)?;
                return Err(err);
            }
            self.log(format!(
                "{caller} closed {side} order for {amount} of {token} at price {price}"
            ));
        }
        Ok(())
    }

    /// Cancel every order the caller has resting, across all books.
    ///
    /// # Errors
    /// On any failure all orders closed so far are reinstated.
    pub fn close_all_orders(&mut self, caller: UserId) -> Result<()> {
        let mine: Vec<(TokenId, OrderSide, BookKey)> = self
            .state
            .books
            .iter()
            .flat_map(|(token, book)| {
                book.orders(OrderSide::Buy)
                    .chain(book.orders(OrderSide::Sell))
                    .filter(|order| order.owner == caller)
                    .map(|order| (*token, order.side, order.key()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut closed: Vec<(TokenId, Order)> = Vec::new();
        for (token, side, key) in mine {
            match self.close_resting_order(token, side, key) {
                Ok(Some(order)) => closed.push((token, order)),
                Ok(None) => {}
                Err(err) => {
                    self.reinstate_all(closed);
                    return Err(err);
                }
            }
        }
        let count = closed.len();
        if let Err(err) = self.verify_invariants() {
            self.reinstate_all(closed);
            return Err(err);
        }
        if count > 0 {
            self.log(format!("{caller} closed {count} orders"));
        }
        Ok(())
    }

    /// Remove one resting order and return its reservation to the owner's
    /// liquid balance. No invariant check; callers decide when to verify.
    pub(crate) fn close_resting_order(
        &mut self,
        token: TokenId,
        side: OrderSide,
        key: BookKey,
    ) -> Result<Option<Order>> {
        let order = {
            let Some(book) = self.state.books.get_mut(&token) else {
                return Ok(None);
            };
            let Some(order) = book.cancel(side, key) else {
                return Ok(None);
            };
            order
        };
        let result = (|| -> Result<()> {
            let reserved = order.reserved_liquidity(self.config.fee_bps)?;
            let unlock_token = if side.buy() {
                self.payment_token()?
            } else {
                token
            };
            self.state
                .balances
                .unlock(&order.owner, &unlock_token, reserved)
        })();
        match result {
            Ok(()) => Ok(Some(order)),
            Err(err) => {
                // Put the order back before surfacing.
                if let Some(book) = self.state.books.get_mut(&token) {
                    if book.insert(order).is_err() {
                        tracing::error!(target: "beacon", %token, "close rollback hit a duplicate book key");
                    }
                }
                Err(err)
            }
        }
    }

    fn reinstate_order(&mut self, token: TokenId, order: Order) -> Result<()> {
        let reserved = order.reserved_liquidity(self.config.fee_bps)?;
        let lock_token = if order.side.buy() {
            self.payment_token()?
        } else {
            token
        };
        self.state.balances.lock(&order.owner, &lock_token, reserved)?;
        self.state.books.entry(token).or_default().insert(order)
    }

    fn reinstate_all(&mut self, closed: Vec<(TokenId, Order)>) {
        for (token, order) in closed {
            if let Err(err) = self.reinstate_order(token, order) {
                tracing::error!(target: "beacon", %token, %err, "failed to reinstate a closed order");
            }
        }
    }
}
