// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker state machine.
//!
//! ## States
//! - **Closed**: calls pass through; consecutive failures are counted and
//!   reaching the threshold opens the breaker.
//! - **Open**: calls are rejected without a network attempt until the reset
//!   timeout has elapsed since `opened_at`.
//! - **Half-open**: a bounded number of trial calls run concurrently. Any
//!   trial failure reopens; enough consecutive trial successes close.
//!
//! The machine is synchronous and takes the current instant from the caller,
//! so the registry controls locking and tests control time.

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::Instant;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Thresholds shared by every breaker in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_trials: u32,
    pub half_open_success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_trials: 1,
            half_open_success_threshold: 2,
        }
    }
}

/// How an admitted call was admitted. Outcomes are interpreted per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Admitted while closed.
    Normal,
    /// Admitted as a half-open trial.
    Trial,
}

/// Point-in-time view of a breaker, for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub successes_in_half_open: u32,
    pub trials_in_flight: u32,
}

/// Per-target breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    successes_in_half_open: u32,
    trials_in_flight: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            successes_in_half_open: 0,
            trials_in_flight: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            successes_in_half_open: self.successes_in_half_open,
            trials_in_flight: self.trials_in_flight,
        }
    }

    /// Ask to make a call. `None` means short-circuit.
    pub fn try_acquire(&mut self, now: Instant) -> Option<CallKind> {
        match self.state {
            CircuitState::Closed => Some(CallKind::Normal),
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed < self.config.reset_timeout {
                    return None;
                }
                self.state = CircuitState::HalfOpen;
                self.successes_in_half_open = 0;
                self.trials_in_flight = 1;
                Some(CallKind::Trial)
            }
            CircuitState::HalfOpen => {
                if self.trials_in_flight >= self.config.half_open_max_trials {
                    return None;
                }
                self.trials_in_flight += 1;
                Some(CallKind::Trial)
            }
        }
    }

    /// Record a successful call. Returns the new state if it changed.
    pub fn record_success(&mut self, kind: CallKind) -> Option<CircuitState> {
        match (kind, self.state) {
            (CallKind::Normal, CircuitState::Closed) => {
                self.consecutive_failures = 0;
                None
            }
            (CallKind::Trial, CircuitState::HalfOpen) => {
                self.release_trial();
                self.successes_in_half_open += 1;
                if self.successes_in_half_open >= self.config.half_open_success_threshold {
                    self.close();
                    Some(CircuitState::Closed)
                } else {
                    None
                }
            }
            // Stale outcome from before the last transition.
            _ => None,
        }
    }

    /// Record a failed call. Returns the new state if it changed.
    pub fn record_failure(&mut self, kind: CallKind, now: Instant) -> Option<CircuitState> {
        match (kind, self.state) {
            (CallKind::Normal, CircuitState::Closed) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.open(now);
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            (CallKind::Trial, CircuitState::HalfOpen) => {
                self.consecutive_failures += 1;
                self.open(now);
                Some(CircuitState::Open)
            }
            _ => None,
        }
    }

    /// Give back a trial slot whose call never produced an outcome.
    pub fn abandon(&mut self, kind: CallKind) {
        if kind == CallKind::Trial && self.state == CircuitState::HalfOpen {
            self.release_trial();
        }
    }

    /// Operator override: open now, regardless of counters.
    pub fn force_open(&mut self, now: Instant) {
        self.open(now);
    }

    /// Operator override: close now and clear counters.
    pub fn force_close(&mut self) {
        self.close();
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.successes_in_half_open = 0;
        self.trials_in_flight = 0;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.successes_in_half_open = 0;
        self.trials_in_flight = 0;
    }

    fn release_trial(&mut self) {
        self.trials_in_flight = self.trials_in_flight.saturating_sub(1);
    }
}
