//! OS signal handling.
//!
//! # Responsibilities
//! - Hold the static table of control event → OS signals
//! - Register signal handlers for every bound signal
//! - Translate delivered signals into control events on the intake
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The controller never sees raw signals; tests raise control events directly
//! - Table is built once at startup and read-only afterwards

use std::fmt;

use tokio::task::JoinHandle;

use crate::lifecycle::events::{ControlEvent, Delivery, EventSender};

/// A platform signal the registry can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Hangup,
    Terminate,
    Interrupt,
    Abort,
    User1,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Terminate => "SIGTERM",
            Signal::Interrupt => "SIGINT",
            Signal::Abort => "SIGABRT",
            Signal::User1 => "SIGUSR1",
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Signal::Hangup => SignalKind::hangup(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Interrupt => SignalKind::interrupt(),
            // SIGABRT is 6 on every Unix tokio supports.
            Signal::Abort => SignalKind::from_raw(6),
            Signal::User1 => SignalKind::user_defined1(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static mapping from control events to the signals that raise them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRegistry {
    bindings: Vec<(ControlEvent, Vec<Signal>)>,
}

impl SignalRegistry {
    /// Build a registry from explicit bindings.
    ///
    /// A signal bound to more than one event keeps its first binding.
    pub fn from_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (ControlEvent, Vec<Signal>)>,
    {
        let mut seen = Vec::new();
        let bindings = bindings
            .into_iter()
            .map(|(event, signals)| {
                let signals = signals
                    .into_iter()
                    .filter(|signal| {
                        if seen.contains(signal) {
                            tracing::warn!(signal = %signal, event = %event, "Signal already bound, ignoring");
                            false
                        } else {
                            seen.push(*signal);
                            true
                        }
                    })
                    .collect();
                (event, signals)
            })
            .collect();
        Self { bindings }
    }

    /// Signals bound to `event`.
    pub fn signals_for(&self, event: ControlEvent) -> &[Signal] {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == event)
            .map(|(_, signals)| signals.as_slice())
            .unwrap_or(&[])
    }

    /// Event raised by `signal`, if it is bound.
    pub fn event_for(&self, signal: Signal) -> Option<ControlEvent> {
        self.bindings
            .iter()
            .find(|(_, signals)| signals.contains(&signal))
            .map(|(event, _)| *event)
    }

    /// Every (event, signal) pair in the table.
    pub fn iter(&self) -> impl Iterator<Item = (ControlEvent, Signal)> + '_ {
        self.bindings
            .iter()
            .flat_map(|(event, signals)| signals.iter().map(move |signal| (*event, *signal)))
    }

    /// Install handlers for every bound signal, forwarding them to `events`.
    ///
    /// Must be called from within a Tokio runtime. Each signal gets its own
    /// forwarding task; the returned handles may be dropped to detach them.
    #[cfg(unix)]
    pub fn listen(&self, events: &EventSender) -> std::io::Result<Vec<JoinHandle<()>>> {
        let mut tasks = Vec::new();

        for (event, signal) in self.iter() {
            let mut stream = tokio::signal::unix::signal(signal.kind())?;
            let events = events.clone();

            tasks.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    tracing::info!(signal = %signal, event = %event, "Signal received");
                    if events.send(event) == Delivery::Closed {
                        break;
                    }
                }
            }));
            tracing::debug!(signal = %signal, event = %event, "Signal handler installed");
        }

        Ok(tasks)
    }

    /// Install handlers for every bound signal, forwarding them to `events`.
    ///
    /// Only Ctrl-C exists off Unix; it raises whatever `Interrupt` is bound to.
    #[cfg(not(unix))]
    pub fn listen(&self, events: &EventSender) -> std::io::Result<Vec<JoinHandle<()>>> {
        let Some(event) = self.event_for(Signal::Interrupt) else {
            return Ok(Vec::new());
        };
        let events = events.clone();

        Ok(vec![tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(signal = %Signal::Interrupt, event = %event, "Signal received");
                if events.send(event) == Delivery::Closed {
                    break;
                }
            }
        })])
    }
}

impl Default for SignalRegistry {
    /// SIGHUP reloads; SIGTERM, SIGINT and SIGABRT shut down; SIGUSR1 dumps state.
    fn default() -> Self {
        Self::from_bindings([
            (ControlEvent::Reload, vec![Signal::Hangup]),
            (
                ControlEvent::Shutdown,
                vec![Signal::Terminate, Signal::Interrupt, Signal::Abort],
            ),
            (ControlEvent::DumpState, vec![Signal::User1]),
        ])
    }
}
