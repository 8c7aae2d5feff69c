//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_host::config::{Config, ConfigError, ConfigSource};
use api_host::server::{ServerError, ServerFactory, ServerHandle};
use async_trait::async_trait;
use uuid::Uuid;

/// A call observed by the recording server factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(u64),
    Stop(u64),
    Purge(u64),
    Snapshot(u64),
    /// A stop that began while another transition was still running.
    Overlap,
}

/// Config source whose next resolution can be made to fail.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    fail: Arc<AtomicBool>,
    resolutions: Arc<AtomicU64>,
}

impl ScriptedSource {
    pub fn fail_resolution(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::SeqCst)
    }
}

impl ConfigSource for ScriptedSource {
    fn resolve(&self) -> Result<Config, ConfigError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConfigError::NotAFile("/missing/api-host.conf".into()));
        }
        Ok(Config::default())
    }
}

/// Server factory that records every call in order.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    calls: Arc<Mutex<Vec<Call>>>,
    next_id: Arc<AtomicU64>,
    fail_start: Arc<AtomicBool>,
    fail_snapshot: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    slow: Arc<AtomicBool>,
}

impl RecordingFactory {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_snapshot(&self, fail: bool) {
        self.fail_snapshot.store(fail, Ordering::SeqCst);
    }

    /// Make stop and start yield to the runtime for a while.
    pub fn slow(&self, slow: bool) {
        self.slow.store(slow, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.record(Call::Overlap);
        }
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct RecordingHandle {
    n: u64,
    factory: RecordingFactory,
}

impl RecordingHandle {
    pub fn n(&self) -> u64 {
        self.n
    }
}

#[async_trait]
impl ServerFactory for RecordingFactory {
    type Handle = RecordingHandle;

    async fn start(&self, _config: Config) -> Result<RecordingHandle, ServerError> {
        self.enter().await;
        let result = if self.fail_start.load(Ordering::SeqCst) {
            Err(ServerError::Other("address already in use".into()))
        } else {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.record(Call::Start(n));
            Ok(RecordingHandle {
                n,
                factory: self.clone(),
            })
        };
        self.leave();
        result
    }
}

#[async_trait]
impl ServerHandle for RecordingHandle {
    fn id(&self) -> Uuid {
        Uuid::from_u128(self.n as u128)
    }

    async fn stop(&mut self) {
        self.factory.enter().await;
        self.factory.record(Call::Stop(self.n));
        self.factory.leave();
    }

    async fn purge(&mut self) {
        self.factory.record(Call::Purge(self.n));
    }

    fn snapshot(&self) -> Result<Vec<u8>, ServerError> {
        self.factory.record(Call::Snapshot(self.n));
        if self.factory.fail_snapshot.load(Ordering::SeqCst) {
            return Err(ServerError::Other("state is not serializable".into()));
        }
        Ok(format!("{{\"handle\":{}}}", self.n).into_bytes())
    }
}

/// In-memory writer whose contents stay readable after it is moved.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
    writes: Arc<AtomicU64>,
    fail: Arc<AtomicBool>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.inner.lock().unwrap().clone()).unwrap()
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
        }
        self.inner.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
