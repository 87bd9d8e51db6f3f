//! Anonymous usage reporting.
//!
//! # Responsibilities
//! - Describe one completed invocation as a [`UsageEvent`]
//! - Deliver events to a [`UsageReporter`] without blocking the caller
//!
//! # Design Decisions
//! - Bounded: at most `max_in_flight` reports run at once; extras are dropped
//! - Every report has a hard deadline so a stalled collector cannot pin tasks
//! - Failures are logged at debug and otherwise ignored

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("usage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("usage collector returned status {0}")]
    Status(u16),
}

/// Summary of a single invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Stable anonymous identifier of this process.
    pub instance_id: Uuid,
    pub request_id: Option<String>,
    pub method: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub response_bytes: usize,
    pub timestamp: u64,
}

impl UsageEvent {
    pub fn new(
        instance_id: Uuid,
        request_id: Option<String>,
        method: &str,
        status_code: u16,
        duration: Duration,
        response_bytes: usize,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            instance_id,
            request_id,
            method: method.to_string(),
            status_code,
            duration_ms: duration.as_millis() as u64,
            response_bytes,
            timestamp,
        }
    }
}

/// Destination for usage events.
#[async_trait]
pub trait UsageReporter: Send + Sync + std::fmt::Debug {
    async fn report(&self, event: UsageEvent) -> Result<(), UsageError>;
}

/// Posts events as JSON to a collector endpoint.
#[derive(Debug, Clone)]
pub struct HttpUsageReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUsageReporter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UsageReporter for HttpUsageReporter {
    async fn report(&self, event: UsageEvent) -> Result<(), UsageError> {
        let response = self.client.post(&self.endpoint).json(&event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UsageError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Bounded fire-and-forget queue in front of a [`UsageReporter`].
#[derive(Debug, Clone)]
pub struct UsageDispatcher {
    reporter: Arc<dyn UsageReporter>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    instance_id: Uuid,
}

impl UsageDispatcher {
    pub fn new(reporter: Arc<dyn UsageReporter>, max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            reporter,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Queue `event` for delivery. Returns `false` when the event was dropped
    /// because the queue is full.
    pub fn dispatch(&self, event: UsageEvent) -> bool {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!(status = event.status_code, "Usage queue full, dropping report");
                return false;
            }
        };

        let reporter = self.reporter.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(timeout, reporter.report(event)).await {
                Ok(Ok(())) => tracing::trace!("Usage report delivered"),
                Ok(Err(e)) => tracing::debug!(error = %e, "Usage report failed"),
                Err(_) => tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Usage report timed out"),
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingReporter {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl UsageReporter for CountingReporter {
        async fn report(&self, _event: UsageEvent) -> Result<(), UsageError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct StalledReporter;

    #[async_trait]
    impl UsageReporter for StalledReporter {
        async fn report(&self, _event: UsageEvent) -> Result<(), UsageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn event() -> UsageEvent {
        UsageEvent::new(Uuid::new_v4(), None, "GET", 200, Duration::from_millis(12), 1024)
    }

    #[tokio::test]
    async fn delivers_in_background() {
        let reporter = Arc::new(CountingReporter::default());
        let dispatcher = UsageDispatcher::new(reporter.clone(), 4, Duration::from_secs(1));

        assert!(dispatcher.dispatch(event()));
        assert!(dispatcher.dispatch(event()));

        for _ in 0..50 {
            if reporter.delivered.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(reporter.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn drops_when_full_and_recovers_after_timeout() {
        let dispatcher = UsageDispatcher::new(Arc::new(StalledReporter), 1, Duration::from_millis(50));

        assert!(dispatcher.dispatch(event()));
        assert!(!dispatcher.dispatch(event()), "second report should be dropped");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(dispatcher.dispatch(event()), "permit should be released after timeout");
    }

    #[test]
    fn event_serializes_fields() {
        let event = event();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["method"], "GET");
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["duration_ms"], 12);
    }
}
