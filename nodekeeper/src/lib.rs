//! nodekeeper: keeps one containerized Cardano node running.
//!
//! The [`Supervisor`] launches the node through a [`ContainerDriver`],
//! records the container in a [`StateStore`], watches the node log for the
//! readiness marker, reports readiness and liveness through a
//! [`ServiceNotifier`], and tears the container down exactly once on exit,
//! signal or failure.

pub mod driver;
pub mod errors;
pub mod node_config;
pub mod notifier;
pub mod retry;
pub mod runtime;
pub mod signals;
pub mod spec;
pub mod state_store;
pub mod supervisor;
pub mod util;
pub mod watcher;

pub use driver::{ContainerDriver, ContainerId, DockerDriver};
pub use errors::{NodekeeperError, NodekeeperResult};
pub use notifier::{ServiceNotifier, SystemdNotifier};
pub use runtime::NodekeeperOptions;
pub use signals::SignalKind;
pub use spec::ContainerSpec;
pub use state_store::StateStore;
pub use supervisor::{
    LifecycleStatus, Reconciliation, ShutdownCause, ShutdownReport, StartOutcome, Supervisor,
};
