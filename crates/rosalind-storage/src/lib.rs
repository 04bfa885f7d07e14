// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Rosalind dispatch backend.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for the
//! durable stage job queue and its append-only per-job event log.
//!
//! All writes are serialized through the one background thread owned by
//! [`Database`]. Query modules accept `&Database` and go through
//! `connection().call()`; no other connection is ever opened for writes.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::{Database, map_tr_err, now_timestamp, timestamp_after};
