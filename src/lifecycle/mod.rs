//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGHUP → Reload
//!     SIGTERM/SIGINT/SIGABRT → Shutdown
//!     SIGUSR1 → DumpState
//!
//! Intake (events.rs):
//!     signal tasks, config watcher → bounded queue (+ shutdown latch) → one receiver
//!
//! Controller (controller.rs):
//!     Startup: resolve config → start server → Running
//!     Loop: receive event → run its transition to completion → next event
//! ```
//!
//! # Design Decisions
//! - One owner for the current server; no shared mutable handle
//! - Transitions never overlap: the next event waits for the current one
//! - Fatal conditions are returned as errors; only the binary exits

pub mod controller;
pub mod error;
pub mod events;
pub mod signals;

pub use controller::{Controller, Flow, LifecycleState};
pub use error::LifecycleError;
pub use events::{ControlEvent, Delivery, EventReceiver, EventSender};
pub use signals::{Signal, SignalRegistry};
