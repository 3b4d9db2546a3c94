// ─── Process Target Tracker ───
// Polls for the watched game process and reports when it appears or exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::locator::{FoundProcess, ProcessError, ProcessLocator};
use super::target::ProcessTarget;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const EVENT_CAPACITY: usize = 64;

/// Transitions published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Appeared { name: String, pid: u32 },
    Disappeared { name: String, pid: u32 },
    /// A poll failed. When `recoverable` is false polling has stopped.
    PollingError { message: String, recoverable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    NoTarget,
    /// Target set, no matching process seen yet.
    Watching,
    Tracking(FoundProcess),
}

/// Polling state machine for one logical game-process lifecycle.
pub struct ProcessTargetTracker<L> {
    locator: L,
    target: Option<ProcessTarget>,
    tracked: Option<FoundProcess>,
    events: broadcast::Sender<TrackerEvent>,
}

impl<L: ProcessLocator> ProcessTargetTracker<L> {
    pub fn new(locator: L) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            locator,
            target: None,
            tracked: None,
            events,
        }
    }

    /// Receive transitions from now on. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Replace the target. A process tracked under the old target is
    /// forgotten without a `Disappeared` event.
    pub fn set_target(&mut self, target: ProcessTarget) {
        debug!("Tracker target set to {}", target);
        self.target = Some(target);
        self.tracked = None;
    }

    /// Stop watching. Like `set_target`, this fires no `Disappeared`.
    pub fn unset_target(&mut self) {
        self.target = None;
        self.tracked = None;
    }

    pub fn state(&self) -> TrackerState {
        match (&self.target, &self.tracked) {
            (None, _) => TrackerState::NoTarget,
            (Some(_), None) => TrackerState::Watching,
            (Some(_), Some(found)) => TrackerState::Tracking(found.clone()),
        }
    }

    /// Run one poll step.
    ///
    /// Recoverable locator errors are published as `PollingError` and
    /// swallowed; anything else is published and returned.
    pub fn poll(&mut self) -> Result<(), ProcessError> {
        match self.step() {
            Ok(()) => Ok(()),
            Err(error) => {
                let recoverable = error.is_recoverable();
                warn!("Process polling failed (recoverable={}): {}", recoverable, error);
                self.publish(TrackerEvent::PollingError {
                    message: error.to_string(),
                    recoverable,
                });
                if recoverable {
                    Ok(())
                } else {
                    Err(error)
                }
            }
        }
    }

    fn step(&mut self) -> Result<(), ProcessError> {
        let Some(target) = self.target.clone() else {
            return Ok(());
        };

        match self.tracked.take() {
            None => {
                if !self.locator.exists(&target)? {
                    return Ok(());
                }
                let Some(found) = self.locator.resolve(&target)? else {
                    return Ok(());
                };
                info!("Target process appeared: {} (pid {})", found.name, found.pid);
                self.publish(TrackerEvent::Appeared {
                    name: found.name.clone(),
                    pid: found.pid,
                });
                self.tracked = Some(found);
            }
            Some(found) => {
                let still_running = match self.locator.exists(&target) {
                    Ok(running) => running,
                    Err(e) => {
                        self.tracked = Some(found);
                        return Err(e);
                    }
                };
                if still_running {
                    self.tracked = Some(found);
                } else {
                    info!("Target process ended: {} (pid {})", found.name, found.pid);
                    self.publish(TrackerEvent::Disappeared {
                        name: found.name,
                        pid: found.pid,
                    });
                }
            }
        }
        Ok(())
    }

    fn publish(&self, event: TrackerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl<L: ProcessLocator + 'static> ProcessTargetTracker<L> {
    /// Move the tracker onto a background task polling every `interval`.
    pub fn start(self, interval: Duration) -> TrackerHandle<L> {
        let events = self.events.clone();
        let shared = Arc::new(Mutex::new(self));
        let task = tokio::spawn(poll_loop(Arc::clone(&shared), interval));
        TrackerHandle {
            shared,
            events,
            task: Some(task),
        }
    }
}

async fn poll_loop<L: ProcessLocator + 'static>(
    shared: Arc<Mutex<ProcessTargetTracker<L>>>,
    interval: Duration,
) -> Result<(), ProcessError> {
    let mut ticker = tokio::time::interval(interval);
    // A slow poll delays the next one instead of queueing catch-up polls.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // Snapshots hit the OS process table, so they run on the blocking pool.
        let mut tracker = Arc::clone(&shared).lock_owned().await;
        tokio::task::spawn_blocking(move || tracker.poll())
            .await
            .map_err(|e| ProcessError::Unavailable(format!("poll task failed: {e}")))??;
    }
}

/// Owner of a running poll task. Dropping it stops polling.
pub struct TrackerHandle<L> {
    shared: Arc<Mutex<ProcessTargetTracker<L>>>,
    events: broadcast::Sender<TrackerEvent>,
    task: Option<JoinHandle<Result<(), ProcessError>>>,
}

impl<L: ProcessLocator> TrackerHandle<L> {
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub async fn set_target(&self, target: ProcessTarget) {
        self.shared.lock().await.set_target(target);
    }

    pub async fn unset_target(&self) {
        self.shared.lock().await.unset_target();
    }

    pub async fn state(&self) -> TrackerState {
        self.shared.lock().await.state()
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for polling to end. It only ends by itself on an unrecoverable
    /// locator error, which is returned here.
    pub async fn wait(mut self) -> Result<(), ProcessError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(join_error) => Err(ProcessError::Unavailable(join_error.to_string())),
        }
    }
}

impl<L> Drop for TrackerHandle<L> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
