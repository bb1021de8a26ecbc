use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api_client::TrialService;
use crate::events::ApiEvent;

/// How often the background poll re-checks reachability.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// The reentrancy guard, collapsed into one authoritative field: a check is
/// in flight exactly while this is `Checking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Idle,
    Checking,
}

/// The client's current belief about remote-service reachability.
#[derive(Debug, Clone)]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub last_checked: Option<DateTime<Local>>,
    pub check: CheckState,
    pub last_error: Option<String>,
}

impl ConnectivityState {
    pub fn is_checking(&self) -> bool {
        self.check == CheckState::Checking
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            is_connected: false,
            last_checked: None,
            check: CheckState::Idle,
            last_error: None,
        }
    }
}

/// Tracks reachability of the remote service.
///
/// Owns the periodic poll, a manual force-check path, and a subscription to
/// the api client's failure notifications. The other managers read
/// connectivity from here before issuing work; they never write to it.
pub struct ConnectionMonitor {
    service: Arc<dyn TrialService>,
    state: Mutex<ConnectivityState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Restores the guard to `Idle` however the check exits.
struct CheckGuard<'a> {
    state: &'a Mutex<ConnectivityState>,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().unwrap().check = CheckState::Idle;
    }
}

impl ConnectionMonitor {
    pub fn new(service: Arc<dyn TrialService>) -> Self {
        Self {
            service,
            state: Mutex::new(ConnectivityState::default()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state.lock().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().is_connected
    }

    pub fn is_checking(&self) -> bool {
        self.state.lock().unwrap().is_checking()
    }

    /// Probe the service and update connectivity state.
    ///
    /// If a check is already in flight and `force` is false this is a pure
    /// skip: no state change, no network call, returns the current belief.
    /// Failures are absorbed into state and never propagate to the caller.
    pub async fn check_connection(&self, force: bool) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.check == CheckState::Checking && !force {
                debug!(target: "monitor", "health check already in flight, skipping");
                return state.is_connected;
            }
            state.check = CheckState::Checking;
            state.last_error = None;
        }
        let _guard = CheckGuard { state: &self.state };

        let outcome = self.service.health_check().await;

        let mut state = self.state.lock().unwrap();
        match outcome {
            Ok(health) => {
                state.is_connected = health.is_ok();
                state.last_checked = Some(Local::now());
                debug!(target: "monitor", connected = state.is_connected, "health check finished");
            }
            Err(failure) => {
                state.is_connected = false;
                state.last_error = Some(failure.to_string());
                debug!(target: "monitor", "health check failed: {}", failure);
            }
        }
        state.is_connected
    }

    /// Manual re-check that bypasses the reentrancy guard. Two forced checks
    /// may overlap; whichever resolves last writes the final state.
    pub async fn check_health(&self) -> bool {
        self.check_connection(true).await
    }

    /// Spawn the background behavior: an immediate unforced check, a
    /// periodic unforced re-check, and a listener that flips to disconnected
    /// as soon as the client reports a network or server failure.
    ///
    /// The spawned tasks hold only weak references, so dropping the last
    /// external handle (or calling `shutdown`) tears them down.
    pub fn start(self: &Arc<Self>, poll_interval: Duration) {
        let monitor = Arc::downgrade(self);
        let poll = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.check_connection(false).await;
            }
        });

        let monitor = Arc::downgrade(self);
        let mut events = self.service.events().subscribe();
        let listener = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                match event {
                    ApiEvent::NetworkError => monitor.mark_disconnected("network failure"),
                    ApiEvent::ServerError(status) => {
                        monitor.mark_disconnected(&format!("server error {status}"))
                    }
                    ApiEvent::Unauthorized => {}
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(poll);
        tasks.push(listener);
    }

    fn mark_disconnected(&self, reason: &str) {
        info!(target: "monitor", "marking disconnected: {}", reason);
        self.state.lock().unwrap().is_connected = false;
    }

    pub fn shutdown(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_and_idle() {
        let state = ConnectivityState::default();
        assert!(!state.is_connected);
        assert!(!state.is_checking());
        assert!(state.last_checked.is_none());
        assert!(state.last_error.is_none());
    }
}
