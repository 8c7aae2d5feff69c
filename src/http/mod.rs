//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS)
//!     → tracker.rs (in-flight and lifetime request counts)
//!     → /health, /version handlers
//! ```

pub mod server;
pub mod tracker;

pub use server::{HttpServer, HttpServerFactory, ServerPhase};
