//! Fakes and fixtures for nodekeeper integration tests.

mod driver;
mod notifier;

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use nodekeeper::runtime::options::{NodekeeperOptions, RetryOptions, SupervisorOptions};
use nodekeeper::spec::ContainerSpec;
use nodekeeper::{StateStore, Supervisor};

pub use driver::{Failure, MockDriver, Op, STOPPED_EXIT_CODE};
pub use notifier::{Notification, RecordingNotifier};

/// Readiness line printed by the node.
pub const READY_LINE: &str = "block replay progress (%) = 99";

/// Poll interval used by [`fast_options`].
pub const POLL_INTERVAL_MS: u64 = 100;

/// Supervisor options with short timers and a state file at `state_file`.
pub fn fast_options(state_file: PathBuf) -> SupervisorOptions {
    SupervisorOptions {
        state_file,
        log_poll_interval_ms: POLL_INTERVAL_MS,
        stop_timeout_secs: 1,
        stop_grace_secs: 1,
        readiness_timeout_secs: None,
        retry: RetryOptions {
            first_ms: 10,
            max_ms: 40,
            factor: 2.0,
            max_attempts: 3,
        },
        log_dir: None,
    }
}

/// Test context with an isolated state file and automatic cleanup.
pub struct TestContext {
    pub driver: Arc<MockDriver>,
    pub notifier: Arc<RecordingNotifier>,
    pub options: SupervisorOptions,
    temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_parts(MockDriver::new(), RecordingNotifier::new())
    }

    pub fn with_driver(driver: MockDriver) -> Self {
        Self::with_parts(driver, RecordingNotifier::new())
    }

    pub fn with_parts(driver: MockDriver, notifier: RecordingNotifier) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let options = fast_options(temp_dir.path().join("nodekeeper.state.yaml"));
        Self {
            driver: Arc::new(driver),
            notifier: Arc::new(notifier),
            options,
            temp_dir,
        }
    }

    pub fn dir(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(&self.options.state_file)
    }

    pub fn spec(&self) -> ContainerSpec {
        ContainerSpec::from_options(&NodekeeperOptions::default())
    }

    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(
            self.driver.clone(),
            self.notifier.clone(),
            self.spec(),
            self.options.clone(),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
