//! Client Module
//!
//! Everything a Rust client needs to talk to a boardsync server and keep a
//! board on screen while other people edit it.
//!
//! - **`api`** - reqwest HTTP client and SSE stream decoding
//! - **`board_view`** - optimistic view model reconciled against broadcasts
//! - **`retry`** - bounded backoff for contended writes

/// HTTP client
pub mod api;

/// Optimistic board view
pub mod board_view;

/// Retry policies
pub mod retry;

pub use api::{BoardClient, ClientError, EventStream, MoveResult};
pub use board_view::{BoardView, ViewError};
pub use retry::{BackoffStrategy, Retriable, RetryPolicy};
