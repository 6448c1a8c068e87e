//! Server Module
//!
//! Everything needed to turn a configuration into a running router.
//!
//! - **`config`** - `ServerConfig`: defaults, TOML file, environment
//! - **`state`** - `AppState` and its `FromRef` implementations
//! - **`init`** - persistence selection, state assembly, `create_app`
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs      - Module exports and documentation
//! ├── config.rs   - Configuration loading
//! ├── state.rs    - AppState
//! └── init.rs     - Server initialization and app creation
//! ```

/// Server configuration loading
pub mod config;

/// Application state management
pub mod state;

/// Server initialization
pub mod init;

pub use config::{ConfigLoadError, ServerConfig};
pub use init::{build_state, create_app, Persistence};
pub use state::AppState;
