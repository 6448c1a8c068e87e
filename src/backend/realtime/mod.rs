//! Real-time Module
//!
//! Presence and room broadcasting for board viewers.
//!
//! # Architecture
//!
//! - **`hub`** - live connections, room membership and event delivery
//! - **`presence`** - who is in which room, with heartbeat expiry and typing
//! - **`service`** - connection lifecycle and the notices membership changes produce
//! - **`subscription`** - the per-connection Server-Sent Events stream
//! - **`handlers`** - join/leave/typing/ping commands
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── hub.rs          - RoomHub
//! ├── presence.rs     - PresenceStore and its in-memory implementation
//! ├── service.rs      - RealtimeService
//! ├── subscription.rs - SSE handler
//! └── handlers.rs     - Command handlers
//! ```
//!
//! # Transport
//!
//! Each client holds one SSE stream (`GET /api/realtime`). The first event is
//! `connected`; its connection id addresses the HTTP commands
//! (`POST /api/realtime/{connection_id}/join` and friends). Events are named
//! after their payload type, e.g. `card_moved` or `board_users`, and carry
//! JSON data. Board changes are delivered only to the board's room.

pub mod handlers;
pub mod hub;
pub mod presence;
pub mod service;
pub mod subscription;

pub use hub::{ConnectionInfo, RoomHub};
pub use presence::{MemoryPresenceStore, PresenceStore};
pub use service::{PresenceSettings, RealtimeError, RealtimeService, RoomRequest, TypingRequest};
pub use subscription::handle_realtime_connection;
