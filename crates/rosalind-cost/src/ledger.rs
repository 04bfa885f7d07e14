// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage ledger persisting one row per routing attempt to SQLite.
//!
//! Rows carry identifiers and counts only. The ledger is the default
//! observability sink for the model router, which calls it fire-and-forget.

use async_trait::async_trait;
use rosalind_core::{
    AdapterType, HealthStatus, ObservabilityAdapter, PluginAdapter, RosalindError, Tier,
    UsageTrace,
};
use rosalind_storage::{Database, map_tr_err, now_timestamp};
use tracing::debug;

/// Persistent usage ledger backed by the shared database.
///
/// Records are written to the `usage_ledger` table (created by the V3
/// migration). All operations go through the single tokio-rusqlite thread.
#[derive(Debug, Clone)]
pub struct UsageLedger {
    db: Database,
}

impl UsageLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a trace row.
    pub async fn insert(&self, trace: &UsageTrace) -> Result<(), RosalindError> {
        let trace = trace.clone();
        let created_at = now_timestamp();
        let (tier, task_type, outcome) = (
            trace.tier.to_string(),
            trace.task_type.to_string(),
            trace.outcome.to_string(),
        );
        let latency_ms = i64::try_from(trace.latency_ms).unwrap_or(i64::MAX);

        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO usage_ledger (id, task_type, tier, provider, model, attempt, \
                     input_tokens, output_tokens, cost_usd, latency_ms, outcome, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        trace.id,
                        task_type,
                        tier,
                        trace.provider,
                        trace.model,
                        trace.attempt,
                        trace.input_tokens,
                        trace.output_tokens,
                        trace.cost_usd,
                        latency_ms,
                        outcome,
                        created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Total recorded cost across every tier.
    pub async fn total_cost(&self) -> Result<f64, RosalindError> {
        self.db
            .connection()
            .call(|conn| -> Result<f64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(SUM(cost_usd), 0.0) FROM usage_ledger",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Total recorded cost for one tier.
    pub async fn tier_total(&self, tier: Tier) -> Result<f64, RosalindError> {
        let tier = tier.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<f64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(SUM(cost_usd), 0.0) FROM usage_ledger WHERE tier = ?1",
                    rusqlite::params![tier],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Sum of costs for a given date (ISO 8601 date prefix, e.g. "2026-03-01").
    pub async fn daily_total(&self, date: &str) -> Result<f64, RosalindError> {
        let prefix = format!("{date}%");
        self.db
            .connection()
            .call(move |conn| -> Result<f64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(SUM(cost_usd), 0.0) FROM usage_ledger \
                     WHERE created_at LIKE ?1",
                    rusqlite::params![prefix],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Number of attempts recorded.
    pub async fn attempt_count(&self) -> Result<u64, RosalindError> {
        self.db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM usage_ledger", [], |row| row.get(0))
            })
            .await
            .map(|n| n.max(0) as u64)
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for UsageLedger {
    fn name(&self) -> &str {
        "usage-ledger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, RosalindError> {
        self.attempt_count().await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RosalindError> {
        Ok(())
    }
}

#[async_trait]
impl ObservabilityAdapter for UsageLedger {
    async fn record(&self, trace: UsageTrace) -> Result<(), RosalindError> {
        self.insert(&trace).await?;
        debug!(
            tier = %trace.tier,
            attempt = trace.attempt,
            input_tokens = trace.input_tokens,
            output_tokens = trace.output_tokens,
            cost_usd = trace.cost_usd,
            outcome = %trace.outcome,
            "usage recorded"
        );
        Ok(())
    }
}
