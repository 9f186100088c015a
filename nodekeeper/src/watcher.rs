//! Readiness watcher.
//!
//! Polls the node container's stdout on a fixed interval, re-emits every
//! line it has not emitted before, and completes once the readiness marker
//! appears. The watcher is consumed by [`ReadinessWatcher::run`], so
//! readiness fires at most once per watcher.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::driver::{ContainerDriver, ContainerId, LogCursor};
use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::retry::{BackoffPolicy, retry_transport};
use crate::runtime::constants::node_log;
use crate::runtime::options::SupervisorOptions;

/// Result of a single log poll.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Lines emitted to the operator log by this poll, in order.
    pub emitted: Vec<String>,
    /// Whether the readiness marker was seen.
    pub ready: bool,
}

/// How a watch run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Ready,
    Cancelled,
}

pub struct ReadinessWatcher {
    driver: Arc<dyn ContainerDriver>,
    container_id: ContainerId,
    marker: String,
    seen: HashSet<String>,
    cursor: LogCursor,
    poll_interval: Duration,
    retry: BackoffPolicy,
    timeout: Option<Duration>,
    polls: u64,
}

impl ReadinessWatcher {
    pub fn new(
        driver: Arc<dyn ContainerDriver>,
        container_id: ContainerId,
        options: &SupervisorOptions,
    ) -> Self {
        Self {
            driver,
            container_id,
            marker: node_log::READINESS_MARKER.to_string(),
            seen: HashSet::new(),
            cursor: LogCursor::start(),
            poll_interval: options.log_poll_interval(),
            retry: options.retry.policy(),
            timeout: options.readiness_timeout(),
            polls: 0,
        }
    }

    /// Number of log fetches performed so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Fetch the log tail once and emit unseen lines.
    ///
    /// Scanning stops at the first line containing the marker. Transport
    /// failures are retried per the backoff policy before being returned.
    pub async fn poll_once(&mut self) -> NodekeeperResult<PollOutcome> {
        let driver = self.driver.clone();
        let id = self.container_id.clone();
        let cursor = self.cursor;

        let lines = retry_transport(&self.retry, "fetch logs", || {
            let driver = driver.clone();
            let id = id.clone();
            async move { driver.fetch_logs(&id, cursor).await }
        })
        .await?;
        self.polls += 1;

        let mut outcome = PollOutcome::default();
        for line in lines {
            self.cursor.advance(line.timestamp);
            let text = strip_ansi_codes(&line.text);

            if !self.seen.contains(&text) {
                tracing::info!(target: node_log::TARGET, "{}", text);
                outcome.emitted.push(text.clone());
                self.seen.insert(text.clone());
            }

            if text.contains(&self.marker) {
                tracing::info!(container_id = %self.container_id, "block replay complete");
                outcome.ready = true;
                break;
            }
        }

        Ok(outcome)
    }

    /// Poll until the marker appears, the budget expires, or `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) -> NodekeeperResult<WatchOutcome> {
        tracing::debug!(
            container_id = %self.container_id,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Watching node logs for readiness"
        );

        // A budget too large to represent never expires
        let deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));
        let budget = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(budget);

        let first_tick = Instant::now()
            .checked_add(self.poll_interval)
            .unwrap_or_else(Instant::now);
        let mut ticker = tokio::time::interval_at(first_tick, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(WatchOutcome::Cancelled),
                _ = &mut budget => {
                    return Err(NodekeeperError::ReadinessTimeout(self.timeout.unwrap_or_default()));
                }
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(WatchOutcome::Cancelled),
                outcome = self.poll_once() => outcome?,
            };

            if outcome.ready {
                return Ok(WatchOutcome::Ready);
            }
        }
    }
}

/// Strips ANSI escape codes from a string.
///
/// Node output may carry color codes; they are removed before re-logging.
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.next() == Some('[') {
                for next_char in chars.by_ref() {
                    if next_char == 'm' {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[32minfo\x1b[0m ok"), "info ok");
        assert_eq!(strip_ansi_codes("plain"), "plain");
        assert_eq!(strip_ansi_codes(""), "");
    }
}
