// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost estimation and usage accounting for routed model calls.
//!
//! Provides per-tier pricing drawn from routing configuration and a
//! SQLite-backed ledger that records one row per routing attempt.

pub mod ledger;
pub mod pricing;

pub use ledger::UsageLedger;
pub use pricing::{PricingTable, TierPricing, calculate_cost};
