// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Circuit breaker guarding the remote parsing service.
//!
//! Closed admits every call and counts consecutive failures; reaching the
//! threshold opens the circuit. Open rejects calls until the recovery
//! timeout has elapsed since the last failure, at which point the next
//! [`CircuitBreaker::try_acquire`] moves to HalfOpen and admits a single
//! probe. The probe's outcome closes or re-opens the circuit.
//!
//! Admission and outcome recording each run under the state mutex, and a
//! HalfOpen probe is exclusive: concurrent callers are rejected until it
//! reports back.

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        })
    }
}

/// Breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// A disabled breaker admits every call and records nothing.
    pub enabled: bool,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of the breaker, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub enabled: bool,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask to make a remote call.
    ///
    /// Returns `None` while the circuit is open (or a HalfOpen probe is
    /// already running). The returned permit must be settled with
    /// [`BreakerPermit::success`] or [`BreakerPermit::failure`]; dropping it
    /// unsettled releases a HalfOpen probe slot without changing counters.
    pub fn try_acquire(&self) -> Option<BreakerPermit<'_>> {
        if !self.config.enabled {
            return Some(BreakerPermit::new(self, false));
        }

        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(BreakerPermit::new(self, false)),
            CircuitState::Open => {
                let recovered = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() > self.config.recovery_timeout);
                if !recovered {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                Some(BreakerPermit::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return None;
                }
                inner.probe_in_flight = true;
                Some(BreakerPermit::new(self, true))
            }
        }
    }

    /// Current state. Does not perform the lazy Open to HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            enabled: self.config.enabled,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout_ms: self.config.recovery_timeout.as_millis() as u64,
        }
    }

    fn record_success(&self, probe: bool) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.lock();
        if probe {
            inner.probe_in_flight = false;
        }
        inner.consecutive_failures = 0;
        inner.state = CircuitState::Closed;
    }

    fn record_failure(&self, probe: bool) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.lock();
        if probe {
            inner.probe_in_flight = false;
        }
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold.max(1) {
                    inner.state = CircuitState::Open;
                    inner.last_failure = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                inner.state = CircuitState::Open;
                inner.last_failure = Some(Instant::now());
            }
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        inner.probe_in_flight = false;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admission to make one remote call.
#[derive(Debug)]
#[must_use = "a permit must be settled with success() or failure()"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    /// Whether this permit is the HalfOpen recovery probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.probe);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}
