//! Reconciliation and container launch.

use crate::driver::{ContainerId, ContainerSummary};
use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::retry::retry_transport;

use super::lifecycle::stop_bounded;
use super::{LifecycleStatus, Reconciliation, StartOutcome, Supervisor};

/// Compare the recorded container against the engine's list without
/// touching the record.
///
/// A failed list call is an error, never an empty list: treating it as
/// "absent" would launch a second node next to a live one.
pub(super) async fn inspect(sup: &Supervisor) -> NodekeeperResult<Reconciliation> {
    let Some(id) = sup.store.load() else {
        tracing::debug!("No managed container recorded");
        return Ok(Reconciliation::NoRecord);
    };
    tracing::info!(container_id = %id, "Container ID found");

    let policy = sup.options.retry.policy();
    let driver = sup.driver.clone();
    let containers = retry_transport(&policy, "list containers", || {
        let driver = driver.clone();
        async move { driver.list_containers().await }
    })
    .await?;

    Ok(match containers.into_iter().find(|c| matches_record(c, &id)) {
        Some(c) if c.is_running() => Reconciliation::Live(id),
        Some(c) => Reconciliation::Exited { id, state: c.state },
        None => Reconciliation::Stale(id),
    })
}

/// [`inspect`], then adopt a live record or discard a dead one.
pub(super) async fn reconcile(sup: &Supervisor) -> NodekeeperResult<Reconciliation> {
    let result = inspect(sup).await?;

    match &result {
        Reconciliation::Live(id) => {
            tracing::info!(container_id = %id, "Recorded container is running");
            let mut state = sup.state.lock();
            state.container_id = Some(id.clone());
            state.container_is_up = true;
        }
        Reconciliation::Stale(id) | Reconciliation::Exited { id, .. } => {
            tracing::warn!(
                container_id = %id,
                "Recorded container is not running, discarding record"
            );
            sup.store.clear()?;
            let mut state = sup.state.lock();
            state.container_id = None;
            state.container_is_up = false;
        }
        Reconciliation::NoRecord => {
            let mut state = sup.state.lock();
            state.container_id = None;
            state.container_is_up = false;
        }
    }

    Ok(result)
}

/// The engine lists full IDs; the record may hold a short prefix.
fn matches_record(summary: &ContainerSummary, recorded: &ContainerId) -> bool {
    !recorded.as_str().is_empty() && summary.id.as_str().starts_with(recorded.as_str())
}

pub(super) async fn start(sup: &Supervisor) -> NodekeeperResult<StartOutcome> {
    {
        let state = sup.state.lock();
        if state.status != LifecycleStatus::Idle {
            tracing::warn!(status = %state.status, "Start requested on a supervisor that already started");
            return match &state.container_id {
                Some(id) => Ok(StartOutcome::AlreadyRunning(id.clone())),
                None => Err(NodekeeperError::InvalidState(format!(
                    "cannot start from {}",
                    state.status
                ))),
            };
        }
    }

    if let Reconciliation::Live(id) = reconcile(sup).await? {
        tracing::warn!(container_id = %id, "Container is already running");
        return Ok(StartOutcome::AlreadyRunning(id));
    }

    sup.state.lock().transition_to(LifecycleStatus::Launching)?;

    match launch(sup).await {
        Ok(id) => {
            let mut state = sup.state.lock();
            state.container_id = Some(id.clone());
            state.container_is_up = true;
            state.transition_to(LifecycleStatus::Running)?;
            Ok(StartOutcome::Launched(id))
        }
        Err(e) => {
            sup.state.lock().mark_stopped();
            Err(e)
        }
    }
}

/// Pull, create, start and record the container.
async fn launch(sup: &Supervisor) -> NodekeeperResult<ContainerId> {
    sup.spec.log_summary();

    let policy = sup.options.retry.policy();
    let driver = sup.driver.clone();
    let image = sup.spec.image.clone();
    tracing::info!(image = %image, "Pulling image");
    retry_transport(&policy, "pull image", || {
        let driver = driver.clone();
        let image = image.clone();
        async move { driver.pull_image(&image).await }
    })
    .await?;

    // Create and start are not idempotent, so they are never retried.
    let id = sup.driver.create_container(&sup.spec).await?;
    tracing::info!(container_id = %id, "Container created");

    if let Err(e) = sup.driver.start_container(&id).await {
        tracing::error!(
            container_id = %id,
            error = %e,
            "Container was created but failed to start; it is not recorded and must be removed manually"
        );
        return Err(e);
    }
    tracing::info!(container_id = %id, "Container started");

    if let Err(e) = sup.store.save(&id) {
        tracing::error!(
            container_id = %id,
            path = %sup.store.path().display(),
            error = %e,
            "Failed to record container, stopping it"
        );
        if let Err(stop_err) = stop_bounded(sup, &id).await {
            tracing::error!(container_id = %id, error = %stop_err, "Unrecorded container may still be running");
        }
        return Err(e);
    }
    tracing::debug!(container_id = %id, path = %sup.store.path().display(), "Container recorded");

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_record_by_prefix() {
        let summary = ContainerSummary {
            id: ContainerId::new("abc123def456"),
            state: "running".into(),
        };
        assert!(matches_record(&summary, &ContainerId::new("abc123def456")));
        assert!(matches_record(&summary, &ContainerId::new("abc123")));
        assert!(!matches_record(&summary, &ContainerId::new("zzz")));
        assert!(!matches_record(&summary, &ContainerId::new("")));
    }
}
