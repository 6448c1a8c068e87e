//! Backend Error Module
//!
//! The HTTP-facing error type and its conversion into responses.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - BackendError and its status/code mapping
//! └── conversion.rs - IntoResponse implementation
//! ```
//!
//! Handlers return `Result<_, BackendError>`; `?` lifts `BoardError`,
//! `RealtimeError`, `SharedError` and JSON rejections into it.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::BackendError;
