//! Backend Module
//!
//! The Axum server: board operations, the lease manager, persistence, rooms
//! and presence, plus the HTTP plumbing around them. Only compiled with the
//! `ssr` feature.
//!
//! # Architecture
//!
//! - **`server`** - Configuration, application state, initialization
//! - **`routes`** - Route configuration and router assembly
//! - **`board`** - Board, column and card operations and the move coordinator
//! - **`store`** - `BoardStore` persistence (memory and Postgres)
//! - **`locks`** - Per-entity leases (memory and Postgres)
//! - **`realtime`** - Connections, rooms, presence and the SSE stream
//! - **`auth`** - JWT issuing and verification
//! - **`middleware`** - Bearer token middleware and the `AuthUser` extractor
//! - **`error`** - `BackendError` and its response envelope
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── server/         - Config, state, init
//! ├── routes/         - Route configuration
//! ├── board/          - Board service and handlers
//! ├── store/          - Persistence
//! ├── locks/          - Lease manager
//! ├── realtime/       - Rooms and presence
//! ├── auth/           - Tokens
//! ├── middleware/     - Request middleware
//! └── error/          - Error types
//! ```
//!
//! # Write Path
//!
//! A card write takes the card's lease, opens one store transaction, locks
//! the affected column rows, re-derives positions through the ledger,
//! commits, then broadcasts to the board room and appends an audit entry.
//! Anything that fails before the commit leaves the store untouched.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Board operations
pub mod board;

/// Persistence
pub mod store;

/// Entity leases
pub mod locks;

/// Real-time rooms and presence
pub mod realtime;

/// Authentication tokens
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Backend error types
pub mod error;

pub use board::BoardService;
pub use error::BackendError;
pub use realtime::RealtimeService;
pub use server::{create_app, AppState, ServerConfig};
