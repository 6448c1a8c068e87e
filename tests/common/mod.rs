//! Common test utilities and helpers
//!
//! - In-process application over the memory store, driven through the router
//! - Seeded boards
//! - Assertions on positions and error envelopes

pub mod assertions;
#[cfg(feature = "ssr")]
pub mod harness;

pub use assertions::*;
#[cfg(feature = "ssr")]
pub use harness::*;
