// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-target breaker registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::circuit_breaker::{BreakerConfig, BreakerSnapshot, CallKind, CircuitBreaker, CircuitState};

/// Rejection returned when a target's breaker does not admit the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitOpen {
    pub target: String,
}

type SharedBreaker = Arc<Mutex<CircuitBreaker>>;

fn lock(breaker: &SharedBreaker) -> MutexGuard<'_, CircuitBreaker> {
    // The state machine has no invariants a panic mid-update could break.
    breaker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Breakers keyed by target identity (URL authority).
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, SharedBreaker>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    fn breaker(&self, target: &str) -> SharedBreaker {
        if let Some(existing) = self.breakers.get(target) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.breakers
                .entry(target.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new(self.config))))
                .value(),
        )
    }

    /// Ask to call `target`. The returned permit must be resolved with
    /// [`BreakerPermit::success`] or [`BreakerPermit::failure`]; dropping it
    /// unresolved releases any trial slot without counting an outcome.
    pub fn acquire(&self, target: &str) -> Result<BreakerPermit, CircuitOpen> {
        let breaker = self.breaker(target);
        let kind = {
            let mut guard = lock(&breaker);
            let before = guard.state();
            let kind = guard.try_acquire(Instant::now());
            if before == CircuitState::Open && kind.is_some() {
                info!(target = %target, "circuit half-open, admitting trial call");
            }
            kind
        };

        match kind {
            Some(kind) => Ok(BreakerPermit {
                target: target.to_string(),
                breaker,
                kind,
                resolved: false,
            }),
            None => Err(CircuitOpen {
                target: target.to_string(),
            }),
        }
    }

    /// Current state of a target's breaker (`Closed` for unknown targets).
    pub fn state(&self, target: &str) -> CircuitState {
        self.breakers
            .get(target)
            .map(|b| lock(b.value()).state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn snapshot(&self, target: &str) -> Option<BreakerSnapshot> {
        self.breakers.get(target).map(|b| lock(b.value()).snapshot())
    }

    /// All known targets and their snapshots, sorted by target.
    pub fn snapshots(&self) -> Vec<(String, BreakerSnapshot)> {
        let mut all: Vec<(String, BreakerSnapshot)> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), lock(entry.value()).snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn force_open(&self, target: &str) {
        lock(&self.breaker(target)).force_open(Instant::now());
        warn!(target = %target, "circuit forced open");
        rosalind_prometheus::record_circuit_open();
    }

    pub fn force_close(&self, target: &str) {
        lock(&self.breaker(target)).force_close();
        info!(target = %target, "circuit forced closed");
    }

    /// Forget every breaker; all targets start closed again.
    pub fn reset(&self) {
        self.breakers.clear();
        info!("all circuit breakers reset");
    }
}

/// Admission to call a target, resolved exactly once.
#[derive(Debug)]
pub struct BreakerPermit {
    target: String,
    breaker: SharedBreaker,
    kind: CallKind,
    resolved: bool,
}

impl BreakerPermit {
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn success(mut self) {
        self.resolved = true;
        let transition = lock(&self.breaker).record_success(self.kind);
        if transition == Some(CircuitState::Closed) {
            info!(target = %self.target, "circuit closed after successful trials");
        }
    }

    pub fn failure(mut self) {
        self.resolved = true;
        let transition = lock(&self.breaker).record_failure(self.kind, Instant::now());
        if transition == Some(CircuitState::Open) {
            warn!(target = %self.target, "circuit opened");
            rosalind_prometheus::record_circuit_open();
        }
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.resolved {
            lock(&self.breaker).abandon(self.kind);
        }
    }
}
