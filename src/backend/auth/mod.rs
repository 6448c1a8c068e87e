//! Authentication Module
//!
//! The server only verifies bearer tokens; accounts and sign-in live in the
//! identity service that issues them. Tokens are HS256 JWTs signed with the
//! configured `JWT_SECRET`, whose `sub` claim is the user id.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! └── sessions.rs     - JWT claims, signing and verification
//! ```

pub mod sessions;

pub use sessions::{Claims, JwtKeys, TokenError};
