// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Two stores live under the data directory:
//!
//! - an embedded **redb** database (`market.redb`) holding every record
//!   whose consistency matters: users, posts, the points ledger,
//!   invitations, recharge requests, view history and payment QR codes;
//! - a plain **file store** for uploads and the daily JSONL audit log.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   market.redb
//!   uploads/{bucket}/{name}
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```

pub mod audit;
pub mod database;
pub mod files;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditFilter, AuditRepository};
pub use database::{DbError, DbResult, MarketDb, ReadTables, TableAccess, WriteTables};
pub use files::{FileStore, StorageError, StorageResult, StoredFile};
pub use paths::StoragePaths;
pub use repository::{
    ChangeType, InvitationReads, LedgerPage, LedgerReads, PaymentType, PostReads, PostStatus,
    QrCodeReads, RechargeReads, RechargeStatus, StoredInvitation, StoredPointTransaction,
    StoredPost, StoredQrCode, StoredRechargeRequest, StoredUser, StoredView, TradeType,
    UserReads, UserStatus, ViewReads,
};
