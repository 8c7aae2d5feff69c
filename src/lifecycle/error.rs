//! Fatal lifecycle errors.
//!
//! Everything here ends the process; only the binary turns these into an exit
//! status. Recoverable conditions are logged by the controller and never
//! surface as a `LifecycleError`.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::server::ServerError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to resolve configuration: {0}")]
    StartupConfig(#[source] ConfigError),

    #[error("failed creating server: {0}")]
    StartupServer(#[source] ServerError),

    #[error("failed to start replacement server during reload, nothing is serving: {0}")]
    ReloadServer(#[source] ServerError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl LifecycleError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
