//! Liveness notifications to the service manager.
//!
//! After the node reports readiness the supervisor sends `READY=1` once and
//! then keeps the service manager's watchdog fed until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::runtime::constants::timing;

/// One-way channel to the process supervising nodekeeper (e.g. systemd).
pub trait ServiceNotifier: Send + Sync {
    fn notify_ready(&self) -> NodekeeperResult<()>;

    fn notify_watchdog(&self) -> NodekeeperResult<()>;

    fn notify_stopping(&self) -> NodekeeperResult<()>;

    /// Watchdog interval advertised by the service manager. `None` when disabled.
    fn watchdog_interval(&self) -> Option<Duration>;
}

/// [`ServiceNotifier`] speaking the systemd `sd_notify` protocol.
///
/// Every call is a no-op when `NOTIFY_SOCKET` is unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemdNotifier;

impl SystemdNotifier {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, state: sd_notify::NotifyState<'_>, what: &str) -> NodekeeperResult<()> {
        sd_notify::notify(false, &[state])
            .map_err(|e| NodekeeperError::Notify(format!("{}: {}", what, e)))
    }
}

impl ServiceNotifier for SystemdNotifier {
    fn notify_ready(&self) -> NodekeeperResult<()> {
        self.send(sd_notify::NotifyState::Ready, "READY")
    }

    fn notify_watchdog(&self) -> NodekeeperResult<()> {
        self.send(sd_notify::NotifyState::Watchdog, "WATCHDOG")
    }

    fn notify_stopping(&self) -> NodekeeperResult<()> {
        self.send(sd_notify::NotifyState::Stopping, "STOPPING")
    }

    fn watchdog_interval(&self) -> Option<Duration> {
        let mut usec = 0u64;
        if sd_notify::watchdog_enabled(false, &mut usec) && usec > 0 {
            Some(Duration::from_micros(usec))
        } else {
            None
        }
    }
}

/// Interval between heartbeats for a given watchdog interval.
pub fn heartbeat_period(watchdog: Duration) -> Duration {
    watchdog / timing::WATCHDOG_DIVISOR
}

/// Feed the watchdog until `token` is cancelled.
///
/// Returns immediately when the watchdog is disabled. A failed pulse ends the
/// loop with the error.
pub async fn run_heartbeat(
    notifier: Arc<dyn ServiceNotifier>,
    token: CancellationToken,
) -> NodekeeperResult<()> {
    let Some(interval) = notifier.watchdog_interval() else {
        tracing::debug!("Watchdog disabled, no heartbeat");
        return Ok(());
    };
    if interval.is_zero() {
        return Ok(());
    }

    let period = heartbeat_period(interval);
    tracing::info!(
        watchdog_ms = interval.as_millis() as u64,
        period_ms = period.as_millis() as u64,
        "Starting watchdog heartbeat"
    );

    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Heartbeat cancelled");
                return Ok(());
            }
            _ = ticker.tick() => {
                notifier.notify_watchdog()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CountingNotifier {
        interval: Option<Duration>,
        pulses: Mutex<u32>,
        fail_after: Option<u32>,
    }

    impl CountingNotifier {
        fn new(interval: Option<Duration>) -> Self {
            Self {
                interval,
                pulses: Mutex::new(0),
                fail_after: None,
            }
        }
    }

    impl ServiceNotifier for CountingNotifier {
        fn notify_ready(&self) -> NodekeeperResult<()> {
            Ok(())
        }

        fn notify_watchdog(&self) -> NodekeeperResult<()> {
            let mut pulses = self.pulses.lock();
            if let Some(limit) = self.fail_after
                && *pulses >= limit
            {
                return Err(NodekeeperError::Notify("socket gone".into()));
            }
            *pulses += 1;
            Ok(())
        }

        fn notify_stopping(&self) -> NodekeeperResult<()> {
            Ok(())
        }

        fn watchdog_interval(&self) -> Option<Duration> {
            self.interval
        }
    }

    #[test]
    fn test_heartbeat_period_is_a_third() {
        assert_eq!(
            heartbeat_period(Duration::from_secs(30)),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_disabled_watchdog_returns_immediately() {
        let notifier = Arc::new(CountingNotifier::new(None));
        run_heartbeat(notifier.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*notifier.pulses.lock(), 0);

        let zero = Arc::new(CountingNotifier::new(Some(Duration::ZERO)));
        run_heartbeat(zero, CancellationToken::new()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulses_until_cancelled() {
        let notifier = Arc::new(CountingNotifier::new(Some(Duration::from_secs(3))));
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(notifier.clone(), token.clone()));

        // First tick fires immediately, then every second.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(*notifier.pulses.lock(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pulse_is_reported() {
        let notifier = Arc::new(CountingNotifier {
            fail_after: Some(2),
            ..CountingNotifier::new(Some(Duration::from_secs(3)))
        });

        let result = run_heartbeat(notifier, CancellationToken::new()).await;
        assert!(matches!(result, Err(NodekeeperError::Notify(_))));
    }
}
