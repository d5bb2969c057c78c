//! # beacon-book
//!
//! **Price-time priority order books for BEACON.**
//!
//! One [`Book`] holds both sides of a single traded token's market against
//! the process-wide payment token. It is a pure data structure: no balance
//! checks, no fees, no side effects. The matcher in `beacon-engine` drives
//! it and owns all settlement logic.

pub mod book;

pub use book::Book;
