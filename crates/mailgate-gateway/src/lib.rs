//! # Mailgate Gateway
//!
//! The HTTP surface: an unauthenticated health probe, and bearer-token
//! protected routes for listing alerts, triggering a scan, and creating
//! draft replies.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
