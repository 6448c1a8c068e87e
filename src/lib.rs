//! boardsync - Main Library
//!
//! A realtime collaborative kanban server. Cards keep a dense, zero-based
//! order inside their column; concurrent writers on the same card are
//! serialized by short leases; every committed change is fanned out to the
//! board's room over Server-Sent Events.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between server and client
//!   - Board, column and card records, request DTOs, response envelope
//!   - Realtime events
//!   - The position ledger
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum HTTP server and SSE stream
//!   - Board service, move coordinator, lease manager
//!   - Memory and Postgres persistence
//!
//! - **`client`** - HTTP client and optimistic board view model
//!
//! # Feature Flags
//!
//! - **`ssr`** - Server build (enabled by default)
//!
//! # Usage
//!
//! ```rust,no_run
//! use boardsync::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load()?;
//! let app = create_app(config).await;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// HTTP client and optimistic view model
pub mod client;
