//! Property-based tests

mod ledger_proptest;
#[cfg(feature = "ssr")]
mod board_proptest;
