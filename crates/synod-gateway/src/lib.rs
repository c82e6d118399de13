//! HTTP surface for the Synod review service.
//!
//! Owns everything between the socket and [`synod_review::service::ReviewService`]:
//! routing, bearer authentication, per-credential rate limiting, error-to-status
//! mapping, request logging, and CORS.

pub mod rate;
pub mod server;

pub use server::{router, serve, AppState};
