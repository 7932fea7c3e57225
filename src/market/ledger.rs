// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Points ledger: the only code path that changes a balance.

use chrono::{DateTime, Utc};

use super::{MarketError, MarketResult};
use crate::storage::{
    ChangeType, LedgerPage, LedgerReads, MarketDb, StoredPointTransaction, StoredUser, WriteTables,
};

pub const MAX_LEDGER_PAGE: usize = 100;

/// A balance change to apply.
#[derive(Debug, Clone)]
pub struct PointsChange {
    pub change_type: ChangeType,
    /// Signed delta.
    pub amount: i64,
    pub related_id: Option<String>,
    pub description: String,
}

impl PointsChange {
    pub fn new(change_type: ChangeType, amount: i64, description: impl Into<String>) -> Self {
        Self {
            change_type,
            amount,
            related_id: None,
            description: description.into(),
        }
    }

    pub fn related_to(mut self, id: impl Into<String>) -> Self {
        self.related_id = Some(id.into());
        self
    }
}

/// Apply `change` to `user` inside the caller's write transaction.
///
/// Stores the updated user and appends a ledger row whose `balance_after`
/// equals the stored balance. Fails without writing anything when the
/// balance would go negative. A zero `amount` is a no-op.
pub fn apply_points(
    tables: &mut WriteTables<'_>,
    user: &mut StoredUser,
    change: PointsChange,
    now: DateTime<Utc>,
) -> MarketResult<Option<StoredPointTransaction>> {
    if change.amount == 0 {
        return Ok(None);
    }

    let new_balance = user
        .points
        .checked_add(change.amount)
        .ok_or_else(|| MarketError::Internal("points balance overflow".to_string()))?;
    if new_balance < 0 {
        return Err(MarketError::InsufficientPoints {
            required: -change.amount,
            available: user.points,
        });
    }

    user.points = new_balance;
    user.updated_at = now;
    tables.update_user(user)?;

    let row = StoredPointTransaction {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        change_type: change.change_type,
        change_amount: change.amount,
        balance_after: new_balance,
        related_id: change.related_id,
        description: change.description,
        created_at: now,
    };
    tables.append_ledger(&row)?;

    tracing::debug!(
        user_id = %user.id,
        change_type = ?row.change_type,
        amount = row.change_amount,
        balance_after = row.balance_after,
        "Points applied"
    );
    Ok(Some(row))
}

/// Newest-first page of a user's ledger.
pub fn list_transactions(
    db: &MarketDb,
    user_id: &str,
    cursor: Option<&str>,
    limit: usize,
) -> MarketResult<LedgerPage> {
    let limit = limit.clamp(1, MAX_LEDGER_PAGE);
    db.read(|t| Ok(t.ledger_page(user_id, cursor, limit)?))
}
