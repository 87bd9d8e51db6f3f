//! Background worker lifecycle states.
//!
//! # State Transitions
//! ```text
//! Absent → Starting: ensure_available() launches the first worker
//! Starting → Healthy: a health probe returns 200
//! Healthy/Starting → Unhealthy: every probe attempt failed
//! Unhealthy → Restarting → Starting: restart() replaces the worker
//! any → Absent: stop()
//! ```
//!
//! # Design Decisions
//! - No terminal state; the supervisor cycles for the life of the process
//! - State is explicit and updated under a lock, never inferred from the
//!   socket file

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Absent,
    Starting,
    Healthy,
    Unhealthy,
    Restarting,
}

impl WorkerState {
    /// Whether a worker is expected to be running in this state.
    pub fn has_worker(&self) -> bool {
        !matches!(self, WorkerState::Absent)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Absent => "absent",
            WorkerState::Starting => "starting",
            WorkerState::Healthy => "healthy",
            WorkerState::Unhealthy => "unhealthy",
            WorkerState::Restarting => "restarting",
        };
        f.write_str(name)
    }
}
