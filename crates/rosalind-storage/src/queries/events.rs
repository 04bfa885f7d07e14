// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only per-job event log.
//!
//! Sequence numbers are assigned inside the writer thread, so each job's
//! sequence is gapless and strictly increasing from 0.

use rosalind_core::{RosalindError, StreamEvent};
use rusqlite::params;
use uuid::Uuid;

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::queries::conversion_error;

/// Append an event and return its sequence number.
pub async fn append_event(
    db: &Database,
    job_id: Uuid,
    event: &str,
    data: serde_json::Value,
) -> Result<i64, RosalindError> {
    let event = event.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let tx = conn.transaction()?;
            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM stage_events WHERE job_id = ?1",
                params![job_id.to_string()],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO stage_events (job_id, seq, event, data, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![job_id.to_string(), seq, event, data.to_string(), now_timestamp()],
            )?;
            tx.commit()?;
            Ok(seq)
        })
        .await
        .map_err(map_tr_err)
}

/// Events with `seq > after_seq` (every event when `None`), ascending.
pub async fn events_after(
    db: &Database,
    job_id: Uuid,
    after_seq: Option<i64>,
) -> Result<Vec<StreamEvent>, RosalindError> {
    let after = after_seq.unwrap_or(-1);
    db.connection()
        .call(move |conn| -> Result<Vec<StreamEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT seq, event, data FROM stage_events \
                 WHERE job_id = ?1 AND seq > ?2 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![job_id.to_string(), after], |row| {
                let data: String = row.get(2)?;
                Ok(StreamEvent {
                    seq: row.get(0)?,
                    event: row.get(1)?,
                    data: serde_json::from_str(&data).map_err(|e| conversion_error(2, e))?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Write a new job's first event inside the enqueue transaction.
pub(crate) fn insert_queued(
    tx: &rusqlite::Transaction<'_>,
    job_id: Uuid,
    stage: u32,
    created_at: &str,
) -> rusqlite::Result<usize> {
    tx.execute(
        "INSERT INTO stage_events (job_id, seq, event, data, created_at) \
         VALUES (?1, 0, 'queued', ?2, ?3)",
        params![
            job_id.to_string(),
            serde_json::json!({ "job_id": job_id, "stage": stage }).to_string(),
            created_at
        ],
    )
}

/// Remove a job's events inside an open transaction (used by retention).
pub(crate) fn delete_for_job(tx: &rusqlite::Transaction<'_>, job_id: &str) -> rusqlite::Result<usize> {
    tx.execute("DELETE FROM stage_events WHERE job_id = ?1", params![job_id])
}
