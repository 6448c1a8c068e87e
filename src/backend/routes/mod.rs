//! Route Configuration Module
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs              - Module exports and documentation
//! ├── router.rs           - Main router creation and layers
//! ├── board_routes.rs     - Board, column and card endpoints
//! └── realtime_routes.rs  - SSE stream and realtime commands
//! ```

/// Main router creation
pub mod router;

/// Board, column and card routes
pub mod board_routes;

/// Realtime routes
pub mod realtime_routes;

pub use router::create_router;
