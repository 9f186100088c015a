//! Wait loop: multiplexes container exit, signals and readiness.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::driver::ContainerId;
use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::notifier::run_heartbeat;
use crate::retry::retry_transport;
use crate::runtime::constants::timing;
use crate::signals::SignalKind;
use crate::watcher::{ReadinessWatcher, WatchOutcome};

use super::{LifecycleEvent, LifecycleStatus, ShutdownCause, ShutdownReport, Supervisor};

const EVENT_CHANNEL_CAPACITY: usize = 8;

pub(super) async fn run(
    sup: &Supervisor,
    mut signals: mpsc::Receiver<SignalKind>,
) -> NodekeeperResult<ShutdownReport> {
    let container_id = {
        let state = sup.state.lock();
        if state.status != LifecycleStatus::Running {
            return Err(NodekeeperError::InvalidState(format!(
                "cannot wait on a supervisor in state {}",
                state.status
            )));
        }
        state
            .container_id
            .clone()
            .ok_or_else(|| NodekeeperError::Internal("running without a container".into()))?
    };

    let (tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut tasks = BackgroundTasks::default();
    tasks.push("exit waiter", spawn_exit_waiter(sup, &container_id, tx.clone()));
    tasks.push("readiness watcher", spawn_watcher(sup, &container_id, tx.clone()));

    tracing::info!(container_id = %container_id, "Waiting for node events");

    let mut signals_open = true;
    let cause = loop {
        let event = tokio::select! {
            _ = sup.token.cancelled() => break None,
            Some(event) = events.recv() => event,
            (task, result) = tasks.next_finished() => match result {
                Ok(()) => continue,
                Err(e) => LifecycleEvent::TaskFailed { task, error: e.to_string() },
            },
            signal = signals.recv(), if signals_open => match signal {
                Some(kind) => LifecycleEvent::SignalReceived(kind),
                None => {
                    tracing::warn!("Signal channel closed, signals will be ignored");
                    signals_open = false;
                    continue;
                }
            },
        };

        if let Some(cause) = handle_event(sup, event, &tx, &mut tasks) {
            break Some(cause);
        }
    };

    // Senders still running fail fast from here on
    drop(events);
    drop(tx);

    let report = match cause {
        Some(cause) => sup.shutdown(cause).await,
        None => None,
    };
    tasks
        .join(Duration::from_millis(timing::TASK_JOIN_TIMEOUT_MS))
        .await;

    report.ok_or_else(|| NodekeeperError::InvalidState("shutdown already in progress".into()))
}

/// Decide whether `event` ends the wait loop.
fn handle_event(
    sup: &Supervisor,
    event: LifecycleEvent,
    tx: &mpsc::Sender<LifecycleEvent>,
    tasks: &mut BackgroundTasks,
) -> Option<ShutdownCause> {
    match event {
        LifecycleEvent::ContainerExited(code) => Some(ShutdownCause::ContainerExited { code }),
        LifecycleEvent::SignalReceived(kind) if kind.is_shutdown() => {
            Some(ShutdownCause::Signal(kind))
        }
        LifecycleEvent::SignalReceived(kind) => {
            tracing::info!(signal = %kind, "Ignoring signal");
            None
        }
        LifecycleEvent::WatcherReady => {
            if sup.is_ready() {
                return None;
            }
            if let Err(e) = sup.notifier.notify_ready() {
                tracing::error!(error = %e, "Failed to notify service manager of readiness");
                return Some(ShutdownCause::Fault(e));
            }
            sup.state.lock().ready = true;
            tracing::info!("Node is ready, service manager notified");
            tasks.push("heartbeat", spawn_heartbeat(sup, tx.clone()));
            None
        }
        LifecycleEvent::DriverError(e) | LifecycleEvent::NotifyError(e) => {
            Some(ShutdownCause::Fault(e))
        }
        LifecycleEvent::TaskFailed { task, error } => {
            tracing::error!(task, error = %error, "Background task failed");
            Some(ShutdownCause::Fault(NodekeeperError::Internal(format!(
                "{} failed: {}",
                task, error
            ))))
        }
    }
}

fn spawn_exit_waiter(
    sup: &Supervisor,
    id: &ContainerId,
    tx: mpsc::Sender<LifecycleEvent>,
) -> JoinHandle<()> {
    let driver = sup.driver.clone();
    let policy = sup.options.retry.policy();
    let token = sup.token.child_token();
    let id = id.clone();

    tokio::spawn(async move {
        let wait = retry_transport(&policy, "wait for container", || {
            let driver = driver.clone();
            let id = id.clone();
            async move { driver.wait_exit(&id).await }
        });

        let event = tokio::select! {
            _ = token.cancelled() => return,
            result = wait => match result {
                Ok(code) => LifecycleEvent::ContainerExited(code),
                Err(e) => LifecycleEvent::DriverError(e),
            },
        };
        let _ = tx.send(event).await;
    })
}

fn spawn_watcher(
    sup: &Supervisor,
    id: &ContainerId,
    tx: mpsc::Sender<LifecycleEvent>,
) -> JoinHandle<()> {
    let watcher = ReadinessWatcher::new(sup.driver.clone(), id.clone(), &sup.options);
    let token = sup.token.child_token();

    tokio::spawn(async move {
        let event = match watcher.run(token).await {
            Ok(WatchOutcome::Ready) => LifecycleEvent::WatcherReady,
            Ok(WatchOutcome::Cancelled) => return,
            Err(e) => LifecycleEvent::DriverError(e),
        };
        let _ = tx.send(event).await;
    })
}

fn spawn_heartbeat(sup: &Supervisor, tx: mpsc::Sender<LifecycleEvent>) -> JoinHandle<()> {
    let notifier = sup.notifier.clone();
    let token = sup.token.child_token();

    tokio::spawn(async move {
        if let Err(e) = run_heartbeat(notifier, token).await {
            tracing::error!(error = %e, "Watchdog heartbeat failed");
            let _ = tx.send(LifecycleEvent::NotifyError(e)).await;
        }
    })
}

/// Handles of the tasks spawned for one wait loop.
#[derive(Default)]
struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    fn push(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    /// Resolve with the next task to end and remove it. Pending while no
    /// task is left.
    async fn next_finished(&mut self) -> (&'static str, Result<(), JoinError>) {
        if self.handles.is_empty() {
            return std::future::pending().await;
        }
        let (result, index, rest) =
            futures::future::select_all(self.handles.iter_mut().map(|(_, handle)| handle)).await;
        drop(rest);
        let (name, _) = self.handles.swap_remove(index);
        (name, result)
    }

    /// Wait for every task, aborting those still running after `bound`.
    async fn join(self, bound: Duration) {
        let deadline = Instant::now() + bound;
        for (name, mut handle) in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task finished"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "Background task failed"),
                Err(_) => {
                    tracing::warn!(task = name, "Background task did not finish in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}
