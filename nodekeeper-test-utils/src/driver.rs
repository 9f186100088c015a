//! In-memory container engine.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use nodekeeper::driver::{ContainerDriver, ContainerId, ContainerSummary, LogCursor, LogLine};
use nodekeeper::errors::{NodekeeperError, NodekeeperResult};
use nodekeeper::spec::ContainerSpec;

/// Exit code reported for a container stopped through the driver.
pub const STOPPED_EXIT_CODE: i64 = 143;

/// Driver operation, used to count calls and inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Pull,
    Create,
    Start,
    Stop,
    Wait,
    Logs,
    List,
}

/// Kind of error an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transport,
    Driver,
    NotFound,
    /// Panic inside the call instead of returning.
    Panic,
}

impl Failure {
    fn error(self, op: Op) -> NodekeeperError {
        let message = format!("injected {:?} failure", op);
        match self {
            Failure::Transport => NodekeeperError::Transport(message),
            Failure::Driver => NodekeeperError::Driver(message),
            Failure::NotFound => NodekeeperError::NotFound(message),
            Failure::Panic => panic!("injected {:?} panic", op),
        }
    }
}

struct MockState {
    next_id: ContainerId,
    containers: Vec<ContainerSummary>,
    log_batches: VecDeque<Vec<LogLine>>,
    failures: HashMap<Op, VecDeque<Failure>>,
    calls: HashMap<Op, usize>,
    pulled: Vec<String>,
    created: Vec<ContainerSpec>,
    stopped: Vec<ContainerId>,
    cursors: Vec<LogCursor>,
    stop_delay: Duration,
}

/// Scriptable [`ContainerDriver`].
///
/// `wait_exit` blocks until [`MockDriver::exit_container`] is called or the
/// container is stopped through the driver.
pub struct MockDriver {
    state: Mutex<MockState>,
    exit_tx: watch::Sender<Option<i64>>,
}

impl MockDriver {
    pub fn new() -> Self {
        let (exit_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(MockState {
                next_id: ContainerId::new("abc123"),
                containers: Vec::new(),
                log_batches: VecDeque::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                pulled: Vec::new(),
                created: Vec::new(),
                stopped: Vec::new(),
                cursors: Vec::new(),
                stop_delay: Duration::ZERO,
            }),
            exit_tx,
        }
    }

    /// ID assigned to the next created container.
    pub fn with_container_id(self, id: &str) -> Self {
        self.state.lock().next_id = ContainerId::new(id);
        self
    }

    /// Pretend the engine already runs a container with `id`.
    pub fn with_running(self, id: &str) -> Self {
        self.add_container(id, "running");
        self
    }

    pub fn with_exited(self, id: &str) -> Self {
        self.add_container(id, "exited");
        self
    }

    /// Each inner list is returned by one log fetch, in order.
    pub fn with_log_batches(self, batches: &[&[&str]]) -> Self {
        for batch in batches {
            self.push_logs(batch);
        }
        self
    }

    pub fn with_stop_delay(self, delay: Duration) -> Self {
        self.state.lock().stop_delay = delay;
        self
    }

    pub fn add_container(&self, id: &str, state: &str) {
        self.state.lock().containers.push(ContainerSummary {
            id: ContainerId::new(id),
            state: state.to_string(),
        });
    }

    /// Queue one log fetch result.
    pub fn push_logs(&self, lines: &[&str]) {
        self.state
            .lock()
            .log_batches
            .push_back(lines.iter().map(|l| LogLine::new(*l)).collect());
    }

    pub fn push_log_lines(&self, lines: Vec<LogLine>) {
        self.state.lock().log_batches.push_back(lines);
    }

    /// Fail the next `times` calls of `op`.
    pub fn fail_next(&self, op: Op, failure: Failure, times: usize) {
        let mut state = self.state.lock();
        let queue = state.failures.entry(op).or_default();
        queue.extend(std::iter::repeat_n(failure, times));
    }

    /// Simulate the container stopping on its own.
    pub fn exit_container(&self, code: i64) {
        for c in self.state.lock().containers.iter_mut() {
            c.state = "exited".to_string();
        }
        self.exit_tx.send_replace(Some(code));
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn stop_calls(&self) -> Vec<ContainerId> {
        self.state.lock().stopped.clone()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.state.lock().pulled.clone()
    }

    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state.lock().created.clone()
    }

    pub fn log_cursors(&self) -> Vec<LogCursor> {
        self.state.lock().cursors.clone()
    }

    pub fn container_state(&self, id: &str) -> Option<String> {
        self.state
            .lock()
            .containers
            .iter()
            .find(|c| c.id.as_str() == id)
            .map(|c| c.state.clone())
    }

    /// Count the call and pop an injected failure, if any.
    fn enter(&self, op: Op) -> NodekeeperResult<()> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(failure) => Err(failure.error(op)),
            None => Ok(()),
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerDriver for MockDriver {
    async fn pull_image(&self, image: &str) -> NodekeeperResult<()> {
        self.enter(Op::Pull)?;
        self.state.lock().pulled.push(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> NodekeeperResult<ContainerId> {
        self.enter(Op::Create)?;
        let mut state = self.state.lock();
        let id = state.next_id.clone();
        state.created.push(spec.clone());
        state.containers.push(ContainerSummary {
            id: id.clone(),
            state: "created".to_string(),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> NodekeeperResult<()> {
        self.enter(Op::Start)?;
        let mut state = self.state.lock();
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| NodekeeperError::NotFound(format!("no such container: {}", id)))?;
        container.state = "running".to_string();
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, _timeout: Duration) -> NodekeeperResult<()> {
        self.enter(Op::Stop)?;
        let delay = {
            let mut state = self.state.lock();
            state.stopped.push(id.clone());
            state.stop_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let was_running = {
            let mut state = self.state.lock();
            let container = state
                .containers
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| NodekeeperError::NotFound(format!("no such container: {}", id)))?;
            let was_running = container.is_running();
            container.state = "exited".to_string();
            was_running
        };
        if was_running {
            self.exit_tx.send_replace(Some(STOPPED_EXIT_CODE));
        }
        Ok(())
    }

    async fn wait_exit(&self, _id: &ContainerId) -> NodekeeperResult<i64> {
        self.enter(Op::Wait)?;
        let mut rx = self.exit_tx.subscribe();
        let code = *rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| NodekeeperError::Internal("mock driver dropped".into()))?;
        Ok(code.unwrap_or_default())
    }

    async fn fetch_logs(
        &self,
        _id: &ContainerId,
        cursor: LogCursor,
    ) -> NodekeeperResult<Vec<LogLine>> {
        self.enter(Op::Logs)?;
        let mut state = self.state.lock();
        state.cursors.push(cursor);
        Ok(state.log_batches.pop_front().unwrap_or_default())
    }

    async fn list_containers(&self) -> NodekeeperResult<Vec<ContainerSummary>> {
        self.enter(Op::List)?;
        Ok(self.state.lock().containers.clone())
    }
}
