//! Shopcheck Web Service
//!
//! Exposes journey runs over HTTP: `POST /run-tests` starts a run and returns
//! its report, `GET /api/health` reports liveness.

pub mod server;

pub use server::{serve, ApiError, AppState, WebServer};
