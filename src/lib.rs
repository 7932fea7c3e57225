// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Niuniu Market - Classifieds & Points Ledger Service
//!
//! Users publish buy/sell listings and pay points to reveal a seller's
//! WeChat contact. Points come from a registration bonus, referral rewards
//! and admin-reviewed recharges; every balance change is written to an
//! append-only ledger in the same transaction.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Phone/password accounts and session tokens
//! - `market` - Marketplace operations and business rules
//! - `providers` - Chat-completions client for batch listing parsing
//! - `storage` - Embedded database, uploads and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod expiry_sweeper;
pub mod market;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;
pub mod telemetry;
