//! The lifecycle controller: owns the current server and applies control
//! events to it one at a time.
//!
//! # States
//! ```text
//! Starting → Running → (ReloadInProgress → Running)* → ShuttingDown → Terminated
//! ```
//!
//! # Transitions
//! - Reload: re-resolve config; on failure keep the current server. On
//!   success stop the current server, then start a new one (never two at
//!   once). A new server that fails to start is fatal.
//! - Shutdown: stop, purge, terminate. Final; later events are ignored.
//! - DumpState: snapshot the current server and write it in one write.

use std::io::Write;

use crate::config::loader::ConfigSource;
use crate::config::Config;
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::events::{ControlEvent, EventReceiver};
use crate::observability::logging::LevelHandle;
use crate::server::{ServerFactory, ServerHandle};

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    ReloadInProgress,
    ShuttingDown,
    Terminated,
}

/// What the dispatch loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Serializes lifecycle transitions for a single managed server.
pub struct Controller<S, F: ServerFactory> {
    source: S,
    factory: F,
    current: Option<F::Handle>,
    state: LifecycleState,
    dump: Box<dyn Write + Send>,
    log_level: Option<LevelHandle>,
}

impl<S, F> Controller<S, F>
where
    S: ConfigSource,
    F: ServerFactory,
{
    /// Create a controller in the `Starting` state. Nothing runs until
    /// [`Controller::startup`].
    pub fn new(source: S, factory: F) -> Self {
        Self {
            source,
            factory,
            current: None,
            state: LifecycleState::Starting,
            dump: Box::new(std::io::stdout()),
            log_level: None,
        }
    }

    /// Send state dumps somewhere other than stdout.
    pub fn with_dump_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.dump = Box::new(writer);
        self
    }

    /// Re-apply config verbosity to the global log level on every resolution.
    pub fn with_log_level(mut self, handle: LevelHandle) -> Self {
        self.log_level = Some(handle);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The server currently receiving traffic.
    pub fn current(&self) -> Option<&F::Handle> {
        self.current.as_ref()
    }

    /// Resolve the initial configuration and start the first server.
    pub async fn startup(&mut self) -> Result<(), LifecycleError> {
        // Resolution reads a small file synchronously. Nothing else runs on
        // the dispatch loop meanwhile, so it stays on this task.
        let config = self.source.resolve().map_err(|e| {
            self.state = LifecycleState::Terminated;
            LifecycleError::StartupConfig(e)
        })?;
        self.apply_config(&config);

        let handle = self.factory.start(config).await.map_err(|e| {
            self.state = LifecycleState::Terminated;
            LifecycleError::StartupServer(e)
        })?;

        tracing::info!(server_id = %handle.id(), "Server started");
        self.current = Some(handle);
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Block on `events` and handle them in order until shutdown.
    ///
    /// If every event source goes away the controller shuts down as if it had
    /// received a Shutdown event.
    pub async fn run(mut self, mut events: EventReceiver) -> Result<(), LifecycleError> {
        loop {
            let event = match events.recv().await {
                Some(event) => event,
                None => {
                    tracing::warn!("Control event sources closed, shutting down");
                    ControlEvent::Shutdown
                }
            };

            if self.handle(event).await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Apply one control event. The transition fully completes before this
    /// returns.
    pub async fn handle(&mut self, event: ControlEvent) -> Result<Flow, LifecycleError> {
        tracing::debug!(event = %event, state = ?self.state, "Handling control event");

        match (self.state, event) {
            (LifecycleState::ShuttingDown | LifecycleState::Terminated, _) => {
                tracing::debug!(event = %event, "Already shutting down, ignoring event");
                Ok(Flow::Exit)
            }
            (_, ControlEvent::Shutdown) => {
                self.shutdown().await;
                Ok(Flow::Exit)
            }
            (LifecycleState::Running, ControlEvent::Reload) => {
                self.reload().await?;
                Ok(Flow::Continue)
            }
            (LifecycleState::Running, ControlEvent::DumpState) => {
                self.dump_state();
                Ok(Flow::Continue)
            }
            (state, event) => {
                tracing::warn!(event = %event, state = ?state, "Ignoring control event in this state");
                Ok(Flow::Continue)
            }
        }
    }

    async fn reload(&mut self) -> Result<(), LifecycleError> {
        tracing::info!("Reloading configuration");
        self.state = LifecycleState::ReloadInProgress;

        // Blocking read, same as in startup.
        let config = match self.source.resolve() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Reload aborted, keeping current server");
                self.state = LifecycleState::Running;
                return Ok(());
            }
        };
        self.apply_config(&config);

        tracing::info!("Restarting server components");
        if let Some(mut old) = self.current.take() {
            old.stop().await;
            tracing::info!(server_id = %old.id(), "Server stopped");
        }

        match self.factory.start(config).await {
            Ok(handle) => {
                tracing::info!(server_id = %handle.id(), "Server started");
                self.current = Some(handle);
                self.state = LifecycleState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Terminated;
                Err(LifecycleError::ReloadServer(e))
            }
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("Gracefully shutting down");
        self.state = LifecycleState::ShuttingDown;

        if let Some(mut handle) = self.current.take() {
            handle.stop().await;
            handle.purge().await;
            tracing::info!(server_id = %handle.id(), "Server stopped and purged");
        }

        self.state = LifecycleState::Terminated;
    }

    fn dump_state(&mut self) {
        tracing::info!("Dumping server state");

        let Some(handle) = self.current.as_ref() else {
            tracing::warn!("No server to dump");
            return;
        };

        let mut encoded = match handle.snapshot() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to dump server state");
                return;
            }
        };
        encoded.push(b'\n');

        if let Err(e) = self.dump.write_all(&encoded).and_then(|()| self.dump.flush()) {
            tracing::error!(error = %e, "Failed to dump server state");
        }
    }

    fn apply_config(&self, config: &Config) {
        if let Some(level) = &self.log_level {
            level.apply_verbosity(config.verbosity);
        }
        tracing::info!(config = ?config, "Loaded config");
    }
}
