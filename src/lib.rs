//! API host daemon library.
//!
//! The lifecycle controller owns a single managed HTTP server and applies
//! reload, shutdown and dump-state control events to it in order.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod server;
pub mod version;

pub use config::Config;
pub use http::{HttpServer, HttpServerFactory};
pub use lifecycle::{ControlEvent, Controller, LifecycleError, SignalRegistry};
