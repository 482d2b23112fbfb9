//! HTTP middleware and extractors for the API server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//!
//! Identity comes from the authenticating proxy in front of this server;
//! see [`identity`].

pub mod identity;

pub use identity::{Identity, RequireAdmin, RequireUser, ROLE_HEADER, USER_HEADER};
