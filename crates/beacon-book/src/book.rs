//! The order book for a single traded token.
//!
//! Uses `BTreeMap` with composite keys for price-time ordering:
//! - **Buys**: keyed `(Reverse(price), timestamp, owner)` -- highest price first
//! - **Sells**: keyed `(price, timestamp, owner)` -- lowest price first
//!
//! Within a price level orders serve in FIFO timestamp order; identical
//! timestamps break by owner id, so iteration order is stable across runs.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use beacon_types::{
    BeaconError, BookKey, Order, OrderSide, PricePerBase, Result, Timestamp, UserId,
};

/// Internal key of the buy side: `Reverse` puts the highest price first
/// while timestamps and owners still order ascending within a level.
type BuyKey = (Reverse<PricePerBase>, Timestamp, UserId);

/// The two sides of one traded token's market.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Book {
    buys: BTreeMap<BuyKey, Order>,
    sells: BTreeMap<BookKey, Order>,
}

fn buy_key((price, timestamp, owner): BookKey) -> BuyKey {
    (Reverse(price), timestamp, owner)
}

impl Book {
    /// Create a new empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Insert a resting order under its `(price, timestamp, owner)` key.
    ///
    /// # Errors
    /// Returns `BCN_ERR_104` if an order with the same key already rests on
    /// this side.
    pub fn insert(&mut self, order: Order) -> Result<()> {
        let key = order.key();
        match order.side {
            OrderSide::Buy => {
                if self.buys.contains_key(&buy_key(key)) {
                    return Err(BeaconError::DuplicateOrder);
                }
                self.buys.insert(buy_key(key), order);
            }
            OrderSide::Sell => {
                if self.sells.contains_key(&key) {
                    return Err(BeaconError::DuplicateOrder);
                }
                self.sells.insert(key, order);
            }
        }
        Ok(())
    }

    // =================================================================
    // Cancellation
    // =================================================================

    /// Remove and return the order at `key`, or `None` if absent.
    pub fn cancel(&mut self, side: OrderSide, key: BookKey) -> Option<Order> {
        match side {
            OrderSide::Buy => self.buys.remove(&buy_key(key)),
            OrderSide::Sell => self.sells.remove(&key),
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    /// The best order on a side: highest-priced buy or lowest-priced sell.
    #[must_use]
    pub fn best(&self, side: OrderSide) -> Option<&Order> {
        match side {
            OrderSide::Buy => self.buys.values().next(),
            OrderSide::Sell => self.sells.values().next(),
        }
    }

    #[must_use]
    pub fn get(&self, side: OrderSide, key: BookKey) -> Option<&Order> {
        match side {
            OrderSide::Buy => self.buys.get(&buy_key(key)),
            OrderSide::Sell => self.sells.get(&key),
        }
    }

    #[must_use]
    pub fn side_len(&self, side: OrderSide) -> usize {
        match side {
            OrderSide::Buy => self.buys.len(),
            OrderSide::Sell => self.sells.len(),
        }
    }

    /// Total number of resting orders on both sides.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    /// Returns `true` if the book has no orders on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    // =================================================================
    // Iteration
    // =================================================================

    /// Iterate one side in priority order (best price first, FIFO within a
    /// level).
    pub fn orders(&self, side: OrderSide) -> Box<dyn Iterator<Item = &Order> + '_> {
        match side {
            OrderSide::Buy => Box::new(self.buys.values()),
            OrderSide::Sell => Box::new(self.sells.values()),
        }
    }

    /// Lazily traverse the side a `taker_side` order matches against,
    /// stopping at the first price that crosses `limit`. `None` never
    /// crosses (market order).
    pub fn iter_matchable(
        &self,
        taker_side: OrderSide,
        limit: Option<PricePerBase>,
    ) -> Box<dyn Iterator<Item = &Order> + '_> {
        let maker_side = taker_side.opposite();
        Box::new(self.orders(maker_side).take_while(move |order| {
            match (limit, taker_side) {
                (None, _) => true,
                // A buyer matches sells priced at or below their limit.
                (Some(limit), OrderSide::Buy) => order.price <= limit,
                // A seller matches buys priced at or above their limit.
                (Some(limit), OrderSide::Sell) => order.price >= limit,
            }
        }))
    }

    /// Remove and return the best order on a side. The matcher's walk pops
    /// makers one at a time and reinserts the ones it does not consume.
    pub fn pop_best(&mut self, side: OrderSide) -> Option<Order> {
        match side {
            OrderSide::Buy => self.buys.pop_first().map(|(_, order)| order),
            OrderSide::Sell => self.sells.pop_first().map(|(_, order)| order),
        }
    }
}
