//! Middleware Module
//!
//! HTTP middleware applied before requests reach handlers.
//!
//! - **`auth`** - Bearer token verification for the API routes

pub mod auth;

pub use auth::{auth_middleware, AuthUser, AuthenticatedUser};
