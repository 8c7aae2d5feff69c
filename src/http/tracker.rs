//! Request tracking for drain and diagnostics.
//!
//! # Responsibilities
//! - Count in-flight requests (drained by `stop`)
//! - Count requests served over the server's lifetime (reported by `snapshot`)
//! - Generate unique request sequence numbers for tracing

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

/// Shared request counters for one server instance.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    in_flight: Arc<AtomicU64>,
    served: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. Returns a guard that ends it on drop.
    pub fn track(&self) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let seq = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        RequestGuard {
            in_flight: Arc::clone(&self.in_flight),
            seq,
        }
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Requests accepted since start (or since the last reset).
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    /// Forget lifetime statistics. In-flight requests are left alone.
    pub fn reset(&self) {
        self.served.store(0, Ordering::SeqCst);
    }
}

/// Guard that tracks a request's lifetime.
/// Decrements the in-flight count when dropped, even if the handler panics.
#[derive(Debug)]
pub struct RequestGuard {
    in_flight: Arc<AtomicU64>,
    seq: u64,
}

impl RequestGuard {
    /// Sequence number of this request within its server instance.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(seq = self.seq, "Request finished");
    }
}

/// Middleware that holds a [`RequestGuard`] for the duration of each request.
pub async fn track_requests(
    State(tracker): State<RequestTracker>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let guard = tracker.track();
    tracing::trace!(seq = guard.seq(), path = %request.uri().path(), "Request started");
    next.run(request).await
}
