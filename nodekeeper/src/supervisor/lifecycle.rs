//! Shutdown sequence and operator stop.

use std::sync::atomic::Ordering;

use crate::driver::ContainerId;
use crate::errors::NodekeeperResult;
use crate::retry::retry_transport;

use super::{LifecycleStatus, ShutdownCause, ShutdownReport, Supervisor};

/// Run the shutdown sequence once.
///
/// Whichever cause reaches the latch first wins; every later caller gets
/// `None` and changes nothing.
pub(super) async fn shutdown(sup: &Supervisor, cause: ShutdownCause) -> Option<ShutdownReport> {
    // Use atomic compare-exchange to ensure shutdown only runs once
    if sup
        .is_shutdown
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        tracing::debug!(cause = %cause, "Shutdown already in progress, ignoring");
        return None;
    }

    let container_id = {
        let mut state = sup.state.lock();
        if let Err(e) = state.transition_to(LifecycleStatus::ShuttingDown) {
            tracing::debug!(error = %e, "Forcing shutdown");
            state.status = LifecycleStatus::ShuttingDown;
        }
        state.container_id.clone()
    };

    // Background tasks stop polling before the container goes away
    sup.token.cancel();

    match &cause {
        ShutdownCause::ContainerExited { code } => {
            tracing::error!(code, "Container stopped with status {}", code);
        }
        ShutdownCause::Signal(kind) => {
            tracing::info!(signal = %kind, "Exiting with signal: {}", kind);
        }
        ShutdownCause::OperatorStop => tracing::info!("Stopping node on request"),
        ShutdownCause::Fault(e) => tracing::error!(error = %e, "Shutting down after failure"),
    }

    let mut stop_issued = false;
    let mut stop_error = None;
    if cause.requires_stop() {
        if let Err(e) = sup.notifier.notify_stopping() {
            tracing::warn!(error = %e, "Failed to notify service manager of shutdown");
        }
        if let Some(id) = &container_id {
            stop_issued = true;
            stop_error = stop_bounded(sup, id).await.err();
        }
    }

    if let Err(e) = sup.store.clear() {
        tracing::error!(
            path = %sup.store.path().display(),
            error = %e,
            "Failed to clear container record"
        );
    }
    sup.state.lock().mark_stopped();

    Some(ShutdownReport {
        cause,
        container_id,
        stop_issued,
        stop_error,
    })
}

pub(super) async fn stop(sup: &Supervisor) -> NodekeeperResult<Option<ShutdownReport>> {
    if !sup.container_is_up() {
        tracing::info!("No running container recorded, nothing to stop");
        return Ok(None);
    }
    Ok(shutdown(sup, ShutdownCause::OperatorStop).await)
}

/// Stop `id`, giving up after the configured deadline.
///
/// A container the engine no longer knows counts as stopped.
pub(super) async fn stop_bounded(sup: &Supervisor, id: &ContainerId) -> Result<(), String> {
    let timeout = sup.options.stop_timeout();
    let deadline = sup.options.stop_deadline();
    let policy = sup.options.retry.policy();
    let driver = sup.driver.clone();

    tracing::info!(
        container_id = %id,
        timeout_secs = timeout.as_secs(),
        "Stopping container"
    );

    let stop = retry_transport(&policy, "stop container", || {
        let driver = driver.clone();
        let id = id.clone();
        async move { driver.stop_container(&id, timeout).await }
    });

    match tokio::time::timeout(deadline, stop).await {
        Ok(Ok(())) => {
            tracing::info!(container_id = %id, "Container stopped");
            Ok(())
        }
        Ok(Err(e)) if e.is_not_found() => {
            tracing::info!(container_id = %id, "Container already removed");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!(container_id = %id, error = %e, "Failed to stop container");
            Err(e.to_string())
        }
        Err(_) => {
            tracing::error!(
                container_id = %id,
                deadline_secs = deadline.as_secs(),
                "Stop did not return in time, container may still be running"
            );
            Err(format!("stop did not return within {:?}", deadline))
        }
    }
}
