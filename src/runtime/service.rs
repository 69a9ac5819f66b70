// src/runtime/service.rs
//! Service lifecycle for background telemetry components
//!
//! ```text
//! STOPPED --enable()--> RUNNING
//! RUNNING --enable()--> RUNNING   (no-op)
//! RUNNING --disable()--> STOPPED
//! STOPPED --disable()--> STOPPED  (no-op)
//! ```
//!
//! [`ServiceLifecycle::transition`] reports whether the state actually
//! changed, so callers start or stop background work only on a real
//! transition. [`PeriodicWorker`] is the background work.

use crate::utils::errors::{Result, TelemetryError};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::Serialize;
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Status of a background service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Stopped => f.write_str("STOPPED"),
            ServiceStatus::Running => f.write_str("RUNNING"),
        }
    }
}

/// Enable/disable state machine
#[derive(Debug, Clone, Default)]
pub struct ServiceLifecycle {
    status: ServiceStatus,
}

impl ServiceLifecycle {
    /// Create a stopped lifecycle
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Move to `target`, returning true if the status changed
    pub fn transition(&mut self, target: ServiceStatus) -> bool {
        if self.status == target {
            return false;
        }
        debug!("Service transition {} -> {}", self.status, target);
        self.status = target;
        true
    }
}

/// Background thread running a task at a fixed interval
pub struct PeriodicWorker {
    name: String,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicWorker {
    /// Spawn a named thread running `task` every `interval`
    ///
    /// The first run happens one interval after spawning.
    pub fn spawn<F>(name: &str, interval: Duration, mut task: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => task(),
                    // stop requested or the worker handle is gone
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(TelemetryError::WorkerSpawn)?;

        debug!("Started periodic worker {} (interval {:?})", name, interval);

        Ok(Self {
            name: name.to_string(),
            stop_tx,
            handle,
        })
    }

    /// Signal the worker to stop and wait for it to exit
    ///
    /// A task run already in progress completes first.
    pub fn stop(self) {
        let _ = self.stop_tx.try_send(());
        if self.handle.join().is_err() {
            warn!("Periodic worker {} panicked", self.name);
        } else {
            debug!("Stopped periodic worker {}", self.name);
        }
    }

    /// Forget the worker without signalling or joining it
    ///
    /// Used in a forked child, where the thread behind the handle only
    /// exists in the parent.
    pub fn abandon(self) {
        std::mem::forget(self);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PeriodicWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicWorker").field("name", &self.name).finish()
    }
}
