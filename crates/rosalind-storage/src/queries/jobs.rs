// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage job rows: enqueue, claim under lease, complete, fail with backoff,
//! and retention pruning.

use std::str::FromStr;
use std::time::Duration;

use rosalind_core::{JobStatus, NewStageJob, RosalindError, StageJob};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use crate::database::{Database, map_tr_err, now_timestamp, timestamp_after};
use crate::queries::{conversion_error, events};

const JOB_COLUMNS: &str = "job_id, stage, workflow_id, inputs, status, attempts, max_attempts, \
     progress, created_at, processed_at, finished_at, result, failure_reason";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<StageJob> {
    let job_id: String = row.get(0)?;
    let workflow_id: String = row.get(2)?;
    let inputs: String = row.get(3)?;
    let status: String = row.get(4)?;
    let result: Option<String> = row.get(11)?;
    let progress: i64 = row.get(7)?;

    Ok(StageJob {
        job_id: Uuid::parse_str(&job_id).map_err(|e| conversion_error(0, e))?,
        stage: row.get(1)?,
        workflow_id: Uuid::parse_str(&workflow_id).map_err(|e| conversion_error(2, e))?,
        inputs: serde_json::from_str(&inputs).map_err(|e| conversion_error(3, e))?,
        status: JobStatus::from_str(&status).map_err(|e| conversion_error(4, e))?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        progress: progress.clamp(0, 100) as u8,
        created_at: row.get(8)?,
        processed_at: row.get(9)?,
        finished_at: row.get(10)?,
        result: result
            .map(|r| serde_json::from_str(&r))
            .transpose()
            .map_err(|e| conversion_error(11, e))?,
        failure_reason: row.get(12)?,
    })
}

fn not_found(job_id: Uuid) -> RosalindError {
    RosalindError::NotFound {
        kind: "stage job",
        id: job_id.to_string(),
    }
}

/// Insert a new `queued` job and its seq-0 `queued` event in one transaction.
pub async fn insert_job(db: &Database, job: &NewStageJob) -> Result<StageJob, RosalindError> {
    let created = StageJob {
        job_id: Uuid::new_v4(),
        stage: job.stage,
        workflow_id: job.workflow_id,
        inputs: job.inputs.clone(),
        status: JobStatus::Queued,
        attempts: 0,
        max_attempts: job.max_attempts.max(1),
        progress: 0,
        created_at: now_timestamp(),
        processed_at: None,
        finished_at: None,
        result: None,
        failure_reason: None,
    };

    let row = created.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO stage_jobs (job_id, stage, workflow_id, inputs, status, attempts, \
                 max_attempts, progress, created_at, available_at) \
                 VALUES (?1, ?2, ?3, ?4, 'queued', 0, ?5, 0, ?6, ?6)",
                params![
                    row.job_id.to_string(),
                    row.stage,
                    row.workflow_id.to_string(),
                    row.inputs.to_string(),
                    row.max_attempts,
                    row.created_at,
                ],
            )?;
            events::insert_queued(&tx, row.job_id, row.stage, &row.created_at)?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)?;

    Ok(created)
}

pub async fn get_job(db: &Database, job_id: Uuid) -> Result<Option<StageJob>, RosalindError> {
    db.connection()
        .call(move |conn| -> Result<Option<StageJob>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM stage_jobs WHERE job_id = ?1"),
                params![job_id.to_string()],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the oldest runnable job, mark it `active`, and lease it.
///
/// Runnable is `queued` past its backoff gate, or `active` with an expired
/// lease. An expired job that has already used every attempt is failed in
/// place instead of being handed out again.
pub async fn claim_next(db: &Database, lease: Duration) -> Result<Option<StageJob>, RosalindError> {
    db.connection()
        .call(move |conn| -> Result<Option<StageJob>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            let claimed = loop {
                let candidate = tx
                    .query_row(
                        &format!(
                            "SELECT {JOB_COLUMNS} FROM stage_jobs \
                             WHERE (status = 'queued' AND available_at <= ?1) \
                                OR (status = 'active' AND locked_until IS NOT NULL \
                                    AND locked_until <= ?1) \
                             ORDER BY created_at ASC, rowid ASC LIMIT 1"
                        ),
                        params![now],
                        job_from_row,
                    )
                    .optional()?;

                let Some(job) = candidate else {
                    break None;
                };

                if job.status == JobStatus::Active && job.attempts >= job.max_attempts {
                    tx.execute(
                        "UPDATE stage_jobs SET status = 'failed', locked_until = NULL, \
                         finished_at = ?1, \
                         failure_reason = COALESCE(failure_reason, 'worker lease expired') \
                         WHERE job_id = ?2",
                        params![now, job.job_id.to_string()],
                    )?;
                    continue;
                }

                let locked_until = timestamp_after(lease);
                tx.execute(
                    "UPDATE stage_jobs SET status = 'active', attempts = attempts + 1, \
                     processed_at = ?1, locked_until = ?2 WHERE job_id = ?3",
                    params![now, locked_until, job.job_id.to_string()],
                )?;
                break Some(StageJob {
                    status: JobStatus::Active,
                    attempts: job.attempts + 1,
                    processed_at: Some(now.clone()),
                    ..job
                });
            };
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an active job `completed` with its result.
pub async fn complete(
    db: &Database,
    job_id: Uuid,
    result: serde_json::Value,
) -> Result<(), RosalindError> {
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE stage_jobs SET status = 'completed', progress = 100, result = ?1, \
                 finished_at = ?2, locked_until = NULL, failure_reason = NULL \
                 WHERE job_id = ?3 AND status = 'active'",
                params![result.to_string(), now_timestamp(), job_id.to_string()],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(not_found(job_id));
    }
    Ok(())
}

/// Record a failed attempt; see [`rosalind_core::StorageAdapter::fail_job`].
pub async fn fail(
    db: &Database,
    job_id: Uuid,
    reason: &str,
    retryable: bool,
    backoff: Duration,
) -> Result<JobStatus, RosalindError> {
    let reason = reason.to_string();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Option<JobStatus>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let counts: Option<(u32, u32)> = tx
                .query_row(
                    "SELECT attempts, max_attempts FROM stage_jobs \
                     WHERE job_id = ?1 AND status = 'active'",
                    params![job_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((attempts, max_attempts)) = counts else {
                return Ok(None);
            };

            let status = if !retryable || attempts >= max_attempts {
                tx.execute(
                    "UPDATE stage_jobs SET status = 'failed', failure_reason = ?1, \
                     finished_at = ?2, locked_until = NULL WHERE job_id = ?3",
                    params![reason, now_timestamp(), job_id.to_string()],
                )?;
                JobStatus::Failed
            } else {
                tx.execute(
                    "UPDATE stage_jobs SET status = 'queued', failure_reason = ?1, \
                     available_at = ?2, locked_until = NULL WHERE job_id = ?3",
                    params![reason, timestamp_after(backoff), job_id.to_string()],
                )?;
                JobStatus::Queued
            };
            tx.commit()?;
            Ok(Some(status))
        })
        .await
        .map_err(map_tr_err)?;

    outcome.ok_or_else(|| not_found(job_id))
}

/// Update the progress of an active job (clamped to 100).
pub async fn set_progress(db: &Database, job_id: Uuid, progress: u8) -> Result<(), RosalindError> {
    let progress = progress.min(100);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE stage_jobs SET progress = ?1 WHERE job_id = ?2 AND status = 'active'",
                params![progress, job_id.to_string()],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(not_found(job_id));
    }
    Ok(())
}

/// Delete finished jobs beyond the newest `keep_completed` / `keep_failed`,
/// along with their events. Returns the number of jobs removed.
pub async fn prune_finished(
    db: &Database,
    keep_completed: u32,
    keep_failed: u32,
) -> Result<u64, RosalindError> {
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut removed = 0u64;
            for (status, keep) in [("completed", keep_completed), ("failed", keep_failed)] {
                let expired: Vec<String> = {
                    let mut stmt = tx.prepare(
                        "SELECT job_id FROM stage_jobs WHERE status = ?1 \
                         ORDER BY finished_at DESC, rowid DESC LIMIT -1 OFFSET ?2",
                    )?;
                    let rows = stmt.query_map(params![status, keep], |row| row.get(0))?;
                    rows.collect::<Result<_, _>>()?
                };
                for job_id in &expired {
                    crate::queries::events::delete_for_job(&tx, job_id)?;
                    removed += tx.execute(
                        "DELETE FROM stage_jobs WHERE job_id = ?1",
                        params![job_id],
                    )? as u64;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}
