//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → stdout (JSON lines by default)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Level follows the active config's verbosity unless RUST_LOG is set

pub mod logging;
