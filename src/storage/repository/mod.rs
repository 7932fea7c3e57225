// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed records and lookups over the marketplace database.
//!
//! Each module defines one stored entity, a read trait blanket-implemented
//! for every [`TableAccess`](super::database::TableAccess) and the write
//! helpers on [`WriteTables`](super::database::WriteTables).

pub mod invitations;
pub mod ledger;
pub mod posts;
pub mod qrcodes;
pub mod recharges;
pub mod users;
pub mod views;

pub use invitations::{InvitationReads, StoredInvitation};
pub use ledger::{ChangeType, LedgerPage, LedgerReads, StoredPointTransaction};
pub use posts::{PostReads, PostStatus, StoredPost, TradeType};
pub use qrcodes::{PaymentType, QrCodeReads, StoredQrCode};
pub use recharges::{RechargeReads, RechargeStatus, StoredRechargeRequest};
pub use users::{StoredUser, UserReads, UserStatus};
pub use views::{StoredView, ViewReads};
