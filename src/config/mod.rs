//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → config file (explicit path, else /etc/api-host/api-host.conf if present)
//!     → API_HOSTD_* environment overrides
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → moved into the server instance built from it
//!
//! On reload:
//!     SIGHUP or watcher.rs detects change
//!     → lifecycle controller calls ConfigSource::resolve again
//!     → new Config → new server instance
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigSource, FileConfigSource};
pub use schema::{Config, CorsConfig};
