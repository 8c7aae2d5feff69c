//! Configuration file watcher for hot reload.
//!
//! The watcher never parses the file itself: a change raises a Reload control
//! event and the lifecycle controller re-resolves through its normal path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::lifecycle::events::{ControlEvent, Delivery, EventSender};

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    events: EventSender,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher raising events on `events`.
    pub fn new(path: &Path, events: EventSender) -> Self {
        Self {
            path: path.to_path_buf(),
            events,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let events = self.events;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_reload_trigger(&event) {
                        tracing::info!("Config file change detected, requesting reload");
                        if events.send(ControlEvent::Reload) == Delivery::Closed {
                            tracing::debug!("Controller gone, ignoring config change");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn is_reload_trigger(event: &Event) -> bool {
    event.kind.is_modify() || event.kind.is_create()
}
