//! Integer amount and price arithmetic.
//!
//! All amounts are unsigned integers in the token's smallest unit; there is
//! no floating point anywhere in the engine. A price quotes the payment cost
//! of one whole unit (`10^decimals`) of the traded token, so the gross
//! payment of a fill is `amount * price / 10^decimals`, floored.
//!
//! Rounding policy, fixed once for the whole engine:
//! - payment division floors (under-collection is the maker's cost);
//! - fees round to nearest, ties toward zero.

use crate::error::{BeaconError, Result};

/// A token amount in the ledger's smallest unit.
pub type Tokens = u128;

/// Payment smallest units per `10^decimals` units of a traded token.
/// `0` denotes a market order at the RPC boundary; it never enters a book.
pub type PricePerBase = u128;

/// Nanoseconds since the UNIX epoch.
pub type Timestamp = u64;

/// Basis-point denominator for fee rates.
pub const BPS: u128 = 10_000;

/// `10^decimals`: one whole unit of a token in smallest units.
#[must_use]
pub fn base(decimals: u32) -> Tokens {
    10u128.pow(decimals)
}

/// Gross payment for filling `amount` of a token at `price`, floored.
///
/// # Errors
/// Returns `BCN_ERR_105` if `amount * price` overflows.
pub fn gross_payment(amount: Tokens, price: PricePerBase, decimals: u32) -> Result<Tokens> {
    amount
        .checked_mul(price)
        .map(|product| product / base(decimals))
        .ok_or(BeaconError::AmountOverflow)
}

/// Per-side fee on a gross payment: nearest multiple of `1/BPS`, ties
/// toward zero.
///
/// # Errors
/// Returns `BCN_ERR_105` if the scaled product overflows.
pub fn trading_fee(gross: Tokens, fee_bps: u32) -> Result<Tokens> {
    let scaled = gross
        .checked_mul(u128::from(fee_bps))
        .ok_or(BeaconError::AmountOverflow)?;
    let fee = scaled / BPS;
    let remainder = scaled % BPS;
    Ok(fee + u128::from(remainder * 2 > BPS))
}

/// Largest amount that can be bought at `price` without the total cost
/// (gross payment plus taker fee) exceeding `budget`. Used to cap the final
/// fill of a market buy against its locked payment budget.
///
/// Binary search over the monotone cost function; `cap` bounds the answer
/// from above (the maker's remaining amount).
#[must_use]
pub fn max_affordable(
    budget: Tokens,
    price: PricePerBase,
    decimals: u32,
    fee_bps: u32,
    cap: Tokens,
) -> Tokens {
    let affordable = |amount: Tokens| -> bool {
        match gross_payment(amount, price, decimals) {
            Ok(gross) => match trading_fee(gross, fee_bps) {
                Ok(fee) => gross.saturating_add(fee) <= budget,
                Err(_) => false,
            },
            Err(_) => false,
        }
    };
    if affordable(cap) {
        return cap;
    }
    let (mut lo, mut hi) = (0, cap); // invariant: affordable(lo), !affordable(hi)
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if affordable(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}
