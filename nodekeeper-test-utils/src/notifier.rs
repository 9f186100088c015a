//! Service notifier that records every notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use nodekeeper::errors::{NodekeeperError, NodekeeperResult};
use nodekeeper::notifier::ServiceNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Ready,
    Watchdog,
    Stopping,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    watchdog: Option<Duration>,
    fail_ready: AtomicBool,
    fail_watchdog: AtomicBool,
    fail_stopping: AtomicBool,
}

impl RecordingNotifier {
    /// Notifier with the watchdog disabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watchdog(interval: Duration) -> Self {
        Self {
            watchdog: Some(interval),
            ..Self::default()
        }
    }

    pub fn fail_ready(&self) {
        self.fail_ready.store(true, Ordering::SeqCst);
    }

    pub fn fail_watchdog(&self) {
        self.fail_watchdog.store(true, Ordering::SeqCst);
    }

    pub fn fail_stopping(&self) {
        self.fail_stopping.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self, kind: Notification) -> usize {
        self.sent.lock().iter().filter(|n| **n == kind).count()
    }

    fn record(&self, kind: Notification, fail: &AtomicBool) -> NodekeeperResult<()> {
        if fail.load(Ordering::SeqCst) {
            return Err(NodekeeperError::Notify(format!(
                "injected {:?} failure",
                kind
            )));
        }
        self.sent.lock().push(kind);
        Ok(())
    }
}

impl ServiceNotifier for RecordingNotifier {
    fn notify_ready(&self) -> NodekeeperResult<()> {
        self.record(Notification::Ready, &self.fail_ready)
    }

    fn notify_watchdog(&self) -> NodekeeperResult<()> {
        self.record(Notification::Watchdog, &self.fail_watchdog)
    }

    fn notify_stopping(&self) -> NodekeeperResult<()> {
        self.record(Notification::Stopping, &self.fail_stopping)
    }

    fn watchdog_interval(&self) -> Option<Duration> {
        self.watchdog
    }
}
