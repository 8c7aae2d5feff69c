//! Managed server contract.
//!
//! # Data Flow
//! ```text
//! Config
//!     → ServerFactory::start (bind, begin serving)
//!     → ServerHandle (current, owned by the lifecycle controller)
//!     → stop (drain) → [purge on shutdown] → dropped
//! ```
//!
//! # Design Decisions
//! - A handle is started exactly once; a reload builds a new handle
//! - `stop` and `purge` are idempotent and never fail the process
//! - `snapshot` is read-only and must not block on in-flight work

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

/// Error type for managed server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address {ip:?}:{port}")]
    Address { ip: String, port: u16 },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize server state: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Builds running server instances from a configuration.
#[async_trait]
pub trait ServerFactory: Send + Sync {
    type Handle: ServerHandle;

    /// Construct a server from `config` and begin serving.
    async fn start(&self, config: Config) -> Result<Self::Handle, ServerError>;
}

/// One running (or stopped) server instance.
#[async_trait]
pub trait ServerHandle: Send {
    /// Identity of this instance; distinct for every `start`.
    fn id(&self) -> Uuid;

    /// Stop accepting work and wait for outstanding work to finish or be
    /// abandoned. Safe to call on an already stopped handle.
    async fn stop(&mut self);

    /// Release resources retained after `stop`. Only used on shutdown.
    async fn purge(&mut self);

    /// Serialized point-in-time view of the instance for diagnostics.
    fn snapshot(&self) -> Result<Vec<u8>, ServerError>;
}
