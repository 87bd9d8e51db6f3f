//! Image service supervision.
//!
//! # Data Flow
//! ```text
//! Invocation
//!     → ensure_available() (launch worker if Absent, non-blocking)
//!     → health_check() (bounded probes over the local socket)
//!         → 200: Healthy, hand the live session to the proxy
//!         → exhausted: Unhealthy → restart() → 502 for this invocation
//! ```
//!
//! # Design Decisions
//! - One supervisor per process, shared by every invocation via `Arc`
//! - State transitions happen under a short, non-async lock
//! - Restart cancels the current worker's own token and launches the
//!   replacement with a fresh one; the stop signal never leaks into it
//! - Restart does not wait for readiness; the next probe verifies it
//! - Concurrent invocations may both restart; this is best-effort
//!   self-healing, not mutual exclusion

pub mod state;
pub mod worker;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::ServerConfig;
use crate::engine::ImageEngine;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::proxy::UpstreamSession;

pub use state::WorkerState;
pub use worker::{spawn_worker, WorkerHandle};

#[derive(Debug)]
struct SupervisorInner {
    state: WorkerState,
    worker: Option<WorkerHandle>,
    generation: u64,
}

/// Owns the lifecycle of the background image worker.
pub struct Supervisor {
    engine: Arc<dyn ImageEngine>,
    config: ServerConfig,
    inner: Mutex<SupervisorInner>,
    restarts: AtomicU64,
}

impl Supervisor {
    pub fn new(engine: Arc<dyn ImageEngine>, config: ServerConfig) -> Self {
        Self {
            engine,
            config,
            inner: Mutex::new(SupervisorInner {
                state: WorkerState::Absent,
                worker: None,
                generation: 0,
            }),
            restarts: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SupervisorInner> {
        // State stays consistent even if a holder panicked; every write is a
        // single assignment.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    /// Number of workers launched so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn restart_count(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    fn launch(&self, inner: &mut SupervisorInner) {
        inner.generation += 1;
        let handle = spawn_worker(self.engine.clone(), self.config.socket_path.clone(), inner.generation);
        inner.worker = Some(handle);
        inner.state = WorkerState::Starting;
    }

    /// Launch the worker if none exists. Does not wait for readiness.
    pub fn ensure_available(&self) {
        let mut inner = self.lock();
        if inner.state == WorkerState::Absent {
            self.launch(&mut inner);
            tracing::info!(generation = inner.generation, "Image worker starting");
        }
    }

    /// Probe the liveness endpoint until it answers 200 or attempts run out.
    ///
    /// On success the probing session is returned for reuse. On exhaustion the
    /// worker is restarted once and `UpstreamUnavailable` is returned.
    pub async fn health_check(&self) -> Result<UpstreamSession, GatewayError> {
        let attempts = self.config.probe_attempts.max(1);
        let interval = Duration::from_millis(self.config.probe_interval_ms);
        let probe_timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let mut session = UpstreamSession::new(self.config.socket_path.clone()).with_timeout(probe_timeout);

        for attempt in 1..=attempts {
            match session.get(&self.config.health_path, &[]).await {
                Ok(response) if response.status == 200 => {
                    self.mark_healthy();
                    session.set_timeout(Some(Duration::from_secs(self.config.request_timeout_secs)));
                    session.set_body_limit(Some(self.config.max_response_bytes));
                    return Ok(session);
                }
                Ok(response) => {
                    tracing::debug!(attempt, status = response.status, "Health probe returned non-200");
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Health probe failed");
                }
            }
            metrics::record_probe_failure();
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        tracing::error!(
            attempts,
            socket = %self.config.socket_path.display(),
            "Image service unavailable, proceeding with worker restart"
        );
        self.lock().state = WorkerState::Unhealthy;
        self.restart();
        Err(GatewayError::UpstreamUnavailable { attempts })
    }

    /// `ensure_available` followed by `health_check`.
    pub async fn acquire_session(&self) -> Result<UpstreamSession, GatewayError> {
        self.ensure_available();
        self.health_check().await
    }

    fn mark_healthy(&self) {
        let mut inner = self.lock();
        if inner.state != WorkerState::Healthy {
            tracing::info!(generation = inner.generation, previous = %inner.state, "Image worker healthy");
        }
        inner.state = WorkerState::Healthy;
    }

    /// Signal the current worker to stop and launch a replacement.
    pub fn restart(&self) {
        let mut inner = self.lock();
        inner.state = WorkerState::Restarting;
        if let Some(previous) = inner.worker.take() {
            previous.cancel();
            tracing::info!(generation = previous.generation(), "Stop signal sent to image worker");
        }
        self.launch(&mut inner);
        self.restarts.fetch_add(1, Ordering::SeqCst);
        metrics::record_restart();
        tracing::warn!(generation = inner.generation, "Image worker restarted");
    }

    /// Stop the worker and remove its socket file.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if let Some(worker) = inner.worker.take() {
            worker.cancel();
        }
        inner.state = WorkerState::Absent;
        if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(socket = %self.config.socket_path.display(), error = %e, "Failed to remove socket file");
            }
        }
        tracing::info!("Image worker stopped");
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("socket_path", &self.config.socket_path)
            .field("state", &self.state())
            .field("restarts", &self.restart_count())
            .finish()
    }
}
