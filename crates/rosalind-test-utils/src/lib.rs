// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Rosalind integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without model endpoints or agents.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock provider adapter with scripted replies
//! - [`MockExecutor`] - Mock stage executor with scripted outcomes
//! - [`TestHarness`] - Temp SQLite storage, usage ledger, and stage queue

pub mod harness;
pub mod mock_executor;
pub mod mock_provider;

pub use harness::TestHarness;
pub use mock_executor::MockExecutor;
pub use mock_provider::{MockProvider, MockReply};
