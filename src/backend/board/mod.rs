//! Board Module
//!
//! Board, column and card operations on top of the store, the lease manager
//! and the ordering ledger. Every state change commits in one transaction,
//! appends a best-effort audit entry and is broadcast to the board's room.
//!
//! # Module Structure
//!
//! ```text
//! board/
//! ├── mod.rs          - Module exports
//! ├── service.rs      - BoardService and shared lookups
//! ├── boards.rs       - Board create/list/get/update, audit trail
//! ├── columns.rs      - Column create/rename/delete/reorder
//! ├── cards.rs        - Card create/update/delete
//! ├── coordinator.rs  - Card moves
//! ├── policy.rs       - Access policies
//! ├── audit.rs        - Best-effort audit append
//! ├── error.rs        - BoardError
//! └── handlers.rs     - HTTP handlers
//! ```

pub mod audit;
pub mod boards;
pub mod cards;
pub mod columns;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod policy;
pub mod service;

pub use coordinator::{MoveReport, MoveStage};
pub use error::BoardError;
pub use policy::{AccessPolicy, AnyAuthenticated, OwnerOnly, PolicyKind};
pub use service::BoardService;
