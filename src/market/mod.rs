// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Marketplace Operations
//!
//! Business logic behind the HTTP handlers. Every operation that moves
//! points runs inside a single database write transaction, so balance,
//! ledger row and post state change together or not at all.
//!
//! Operations take `now` explicitly instead of reading the clock.

pub mod accounts;
pub mod admin;
pub mod batch;
pub mod cleanup;
pub mod contacts;
pub mod error;
pub mod files;
pub mod ledger;
pub mod payments;
pub mod posts;
pub mod recharge;
pub mod referrals;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{MarketError, MarketResult};
