// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-running stage work for Rosalind.
//!
//! - [`StageQueue`]: PHI-gated enqueue and status reads for the API process
//! - [`StageWorker`]: the claim-execute-record loop run by `rosalind worker`
//! - [`StageExecutor`] / [`AgentExecutor`]: how one job is executed
//! - [`relay`]: replay-then-tail event streaming for a job

pub mod executor;
pub mod queue;
pub mod relay;
pub mod worker;

pub use executor::{AgentExecutor, ProgressReporter, StageExecutor, StageFailure};
pub use queue::StageQueue;
pub use relay::{RelayItem, RelaySettings, Termination, relay};
pub use worker::{JobOutcome, StageWorker, WorkerSettings};
