//! The connection state machine, free of timers and I/O. The driver feeds it
//! [`Input`]s and carries out the returned [`Effect`]s.

use crate::state::ConnectionStatus;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    Uninitialized,
    Initializing,
    Healthy,
    Unhealthy,
    /// Immediate retries are exhausted; retrying on a slow fixed period.
    DegradedPeriodicRetry,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Uninitialized => "uninitialized",
            LinkState::Initializing => "initializing",
            LinkState::Healthy => "healthy",
            LinkState::Unhealthy => "unhealthy",
            LinkState::DegradedPeriodicRetry => "degraded-periodic-retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Begin (or force) initialization.
    Start,
    InitSucceeded,
    InitFailed,
    RetryDue,
    HealthCheckPassed,
    HealthCheckFailed,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Build a fresh session (the previous one, if any, is discarded first).
    BeginInit,
    ScheduleRetry(Duration),
    StartHealthChecks(Duration),
    StopHealthChecks,
    CancelRetry,
    /// Discard the current session.
    TearDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
    pub periodic_retry: Duration,
    pub health_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            max_retries: 5,
            periodic_retry: Duration::from_secs(30),
            health_interval: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: LinkState,
    retry_count: u32,
    last_success_ms: Option<u64>,
    policy: RetryPolicy,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ConnectionMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { state: LinkState::Uninitialized, retry_count: 0, last_success_ms: None, policy }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn status(&self, now_ms: u64) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            is_healthy: self.state == LinkState::Healthy,
            retry_count: self.retry_count,
            last_successful_connection: self.last_success_ms,
            time_since_last_success: None,
        }
        .at(now_ms)
    }

    pub fn handle(&mut self, input: Input, now_ms: u64) -> Vec<Effect> {
        use Effect::*;
        use LinkState::*;
        let from = self.state;
        let effects = match (self.state, input) {
            (_, Input::Shutdown) => {
                self.state = Uninitialized;
                vec![StopHealthChecks, CancelRetry, TearDown]
            }
            (Initializing, Input::Start) => Vec::new(),
            (Healthy, Input::Start) => {
                self.state = Initializing;
                vec![StopHealthChecks, BeginInit]
            }
            (_, Input::Start) => {
                self.state = Initializing;
                vec![CancelRetry, BeginInit]
            }
            (Initializing, Input::InitSucceeded) => {
                self.state = Healthy;
                self.retry_count = 0;
                self.last_success_ms = Some(now_ms);
                vec![StartHealthChecks(self.policy.health_interval)]
            }
            (Initializing, Input::InitFailed) => {
                if self.retry_count < self.policy.max_retries {
                    self.state = Unhealthy;
                    self.retry_count += 1;
                    vec![TearDown, ScheduleRetry(self.policy.backoff(self.retry_count))]
                } else {
                    self.state = DegradedPeriodicRetry;
                    vec![TearDown, ScheduleRetry(self.policy.periodic_retry)]
                }
            }
            (Unhealthy, Input::RetryDue) => {
                self.state = Initializing;
                vec![BeginInit]
            }
            (DegradedPeriodicRetry, Input::RetryDue) => {
                self.retry_count = 0;
                self.state = Initializing;
                vec![BeginInit]
            }
            (Healthy, Input::HealthCheckPassed) => {
                self.last_success_ms = Some(now_ms);
                Vec::new()
            }
            (Healthy, Input::HealthCheckFailed) => {
                // Recover right away rather than waiting for a retry slot.
                self.state = Initializing;
                vec![StopHealthChecks, TearDown, BeginInit]
            }
            _ => Vec::new(),
        };
        if from != self.state {
            tracing::info!(from = from.as_str(), to = self.state.as_str(), ?input, retry = self.retry_count, "Connection state");
        }
        effects
    }
}
