//! Lifecycle supervisor for the node container.
//!
//! One [`Supervisor`] owns one node container from launch to teardown:
//! it reconciles persisted state against the engine, launches the container,
//! multiplexes exit/signal/readiness events, and shuts down exactly once.

mod event;
mod launch;
mod lifecycle;
mod state;
mod wait;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::driver::{ContainerDriver, ContainerId};
use crate::errors::NodekeeperResult;
use crate::notifier::ServiceNotifier;
use crate::runtime::options::SupervisorOptions;
use crate::signals::SignalKind;
use crate::spec::ContainerSpec;
use crate::state_store::StateStore;

pub use event::{LifecycleEvent, ShutdownCause, ShutdownReport, exit_codes};
pub use state::{LifecycleStatus, SupervisorState};

/// Persisted record checked against the engine's container list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No state file, or an unreadable one.
    NoRecord,
    /// Recorded container is running.
    Live(ContainerId),
    /// Recorded container is unknown to the engine. The record was cleared.
    Stale(ContainerId),
    /// Recorded container exists but is not running. The record was cleared.
    Exited { id: ContainerId, state: String },
}

impl Reconciliation {
    pub fn is_live(&self) -> bool {
        matches!(self, Reconciliation::Live(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new container was launched and recorded.
    Launched(ContainerId),
    /// A live container was already recorded; nothing was launched.
    AlreadyRunning(ContainerId),
}

impl StartOutcome {
    pub fn container_id(&self) -> &ContainerId {
        match self {
            StartOutcome::Launched(id) | StartOutcome::AlreadyRunning(id) => id,
        }
    }
}

pub struct Supervisor {
    driver: Arc<dyn ContainerDriver>,
    notifier: Arc<dyn ServiceNotifier>,
    store: StateStore,
    spec: ContainerSpec,
    options: SupervisorOptions,
    state: Mutex<SupervisorState>,
    is_shutdown: AtomicBool,
    /// Parent of every background task's token.
    token: CancellationToken,
}

impl Supervisor {
    pub fn new(
        driver: Arc<dyn ContainerDriver>,
        notifier: Arc<dyn ServiceNotifier>,
        spec: ContainerSpec,
        options: SupervisorOptions,
    ) -> Self {
        let store = StateStore::new(&options.state_file);
        Self {
            driver,
            notifier,
            store,
            spec,
            options,
            state: Mutex::new(SupervisorState::new()),
            is_shutdown: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> LifecycleStatus {
        self.state.lock().status
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn container_id(&self) -> Option<ContainerId> {
        self.state.lock().container_id.clone()
    }

    /// Whether reconciliation or launch found the recorded container running.
    pub fn container_is_up(&self) -> bool {
        self.state.lock().container_is_up
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    pub fn state_store(&self) -> &StateStore {
        &self.store
    }

    /// Classify the persisted container record without changing it.
    pub async fn inspect(&self) -> NodekeeperResult<Reconciliation> {
        launch::inspect(self).await
    }

    /// Check the persisted container record against the engine, discarding
    /// it unless the container is running.
    pub async fn reconcile(&self) -> NodekeeperResult<Reconciliation> {
        launch::reconcile(self).await
    }

    /// Reconcile, then launch a container unless a live one is recorded.
    pub async fn start(&self) -> NodekeeperResult<StartOutcome> {
        launch::start(self).await
    }

    /// Block until the first shutdown cause and return its report.
    ///
    /// Requires a container launched by [`Supervisor::start`].
    pub async fn run(
        &self,
        signals: mpsc::Receiver<SignalKind>,
    ) -> NodekeeperResult<ShutdownReport> {
        wait::run(self, signals).await
    }

    /// Run the shutdown sequence for `cause`.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub async fn shutdown(&self, cause: ShutdownCause) -> Option<ShutdownReport> {
        lifecycle::shutdown(self, cause).await
    }

    /// Stop the recorded container on operator request.
    ///
    /// Returns `None` when no running container is recorded.
    pub async fn stop(&self) -> NodekeeperResult<Option<ShutdownReport>> {
        lifecycle::stop(self).await
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
