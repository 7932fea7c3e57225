// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only points ledger.
//!
//! ## Storage Layout
//!
//! - `point_transactions`: txn_id → StoredPointTransaction
//! - `user_ledger_index`: `user_id|!seq|txn_id` → txn_id
//!
//! `seq` is a per-user counter assigned at append time, so the index order
//! is the write order even when several rows share a timestamp. Rows are
//! never updated or removed.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    descending_key, descending_ordinal, owner_prefix_bounds, DbError, DbResult, IndexTable,
    RecordTable, TableAccess, WriteTables,
};

/// Reason for a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    RegistrationBonus,
    Recharge,
    Publish,
    ViewContact,
    Reward,
    /// Unused views returned when a post is delisted or expires.
    Refund,
    Relist,
    /// Refund issued while repairing posts that exceeded their view limit.
    CleanupRefund,
}

/// One ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredPointTransaction {
    pub id: String,
    pub user_id: String,
    pub change_type: ChangeType,
    /// Signed delta applied to the balance.
    pub change_amount: i64,
    /// Balance immediately after this row was applied.
    pub balance_after: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A page of ledger rows plus the cursor for the next page.
#[derive(Debug)]
pub struct LedgerPage {
    pub transactions: Vec<StoredPointTransaction>,
    pub next_cursor: Option<String>,
}

pub trait LedgerReads: TableAccess {
    /// Newest-first page of a user's ledger.
    ///
    /// `cursor` is the opaque value returned as `next_cursor` by the
    /// previous page. An unreadable cursor restarts from the newest row.
    fn ledger_page(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> DbResult<LedgerPage> {
        let (prefix, prefix_end) = owner_prefix_bounds(user_id);

        let resume_after = cursor
            .and_then(decode_cursor)
            .filter(|key| key.starts_with(&prefix));
        let start = resume_after.clone().unwrap_or_else(|| prefix.clone());

        // One extra entry: the cursor row itself when resuming.
        let fetch = limit + usize::from(resume_after.is_some());
        let mut entries = self.index_range(IndexTable::UserLedger, &start, &prefix_end, fetch)?;
        if let Some(after) = &resume_after {
            entries.retain(|(key, _)| key != after);
        }
        entries.truncate(limit);

        let mut transactions = Vec::with_capacity(entries.len());
        for (_, txn_id) in &entries {
            let row: StoredPointTransaction = self
                .get_record(RecordTable::PointTransactions, txn_id)?
                .ok_or_else(|| DbError::DanglingIndex(format!("ledger row {txn_id}")))?;
            transactions.push(row);
        }

        let next_cursor = if entries.len() >= limit {
            entries.last().map(|(key, _)| encode_cursor(key))
        } else {
            None
        };

        Ok(LedgerPage {
            transactions,
            next_cursor,
        })
    }

    /// Every ledger row of a user, newest first.
    fn ledger_for_user(&self, user_id: &str) -> DbResult<Vec<StoredPointTransaction>> {
        let (start, end) = owner_prefix_bounds(user_id);
        let mut rows = Vec::new();
        for (_, txn_id) in self.index_range(IndexTable::UserLedger, &start, &end, usize::MAX)? {
            if let Some(row) = self.get_record(RecordTable::PointTransactions, &txn_id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

impl<T: TableAccess> LedgerReads for T {}

impl WriteTables<'_> {
    /// Append a ledger row and its per-user index entry.
    ///
    /// The entry takes the user's next sequence number, one past the newest
    /// existing entry, so it always sorts ahead of earlier rows.
    pub fn append_ledger(&mut self, row: &StoredPointTransaction) -> DbResult<()> {
        let (prefix, prefix_end) = owner_prefix_bounds(&row.user_id);
        let seq = match self
            .index_range(IndexTable::UserLedger, &prefix, &prefix_end, 1)?
            .first()
        {
            Some((newest, _)) => descending_ordinal(&row.user_id, newest)?
                .checked_add(1)
                .ok_or_else(|| DbError::MalformedKey(newest.clone()))?,
            None => 0,
        };

        self.put_record(RecordTable::PointTransactions, &row.id, row)?;
        let key = descending_key(&row.user_id, seq, &row.id);
        self.put_index(IndexTable::UserLedger, &key, &row.id)
    }
}

fn encode_cursor(key: &str) -> String {
    Base64UrlUnpadded::encode_string(key.as_bytes())
}

fn decode_cursor(cursor: &str) -> Option<String> {
    let bytes = Base64UrlUnpadded::decode_vec(cursor).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::MarketDb;
    use chrono::Duration;

    fn row(user_id: &str, amount: i64, at: DateTime<Utc>) -> StoredPointTransaction {
        StoredPointTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            change_type: ChangeType::Recharge,
            change_amount: amount,
            balance_after: amount,
            related_id: None,
            description: "test".to_string(),
            created_at: at,
        }
    }

    fn seeded(count: i64) -> (MarketDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("test.redb")).unwrap();
        let base = Utc::now();
        db.write(|t| {
            for i in 0..count {
                t.append_ledger(&row("u1", i, base + Duration::seconds(i)))?;
            }
            t.append_ledger(&row("u2", 999, base))
        })
        .unwrap();
        (db, dir)
    }

    #[test]
    fn pages_walk_newest_to_oldest() {
        let (db, _dir) = seeded(5);

        let first = db.read(|t| t.ledger_page("u1", None, 2)).unwrap();
        let amounts: Vec<i64> = first.transactions.iter().map(|r| r.change_amount).collect();
        assert_eq!(amounts, vec![4, 3]);
        let cursor = first.next_cursor.expect("more rows");

        let second = db.read(|t| t.ledger_page("u1", Some(&cursor), 2)).unwrap();
        let amounts: Vec<i64> = second.transactions.iter().map(|r| r.change_amount).collect();
        assert_eq!(amounts, vec![2, 1]);

        let third = db
            .read(|t| t.ledger_page("u1", second.next_cursor.as_deref(), 2))
            .unwrap();
        let amounts: Vec<i64> = third.transactions.iter().map(|r| r.change_amount).collect();
        assert_eq!(amounts, vec![0]);
        assert!(third.next_cursor.is_none());
    }

    #[test]
    fn foreign_cursor_restarts_from_newest() {
        let (db, _dir) = seeded(3);
        let other = db.read(|t| t.ledger_page("u2", None, 1)).unwrap();
        let cursor = other.next_cursor.unwrap();

        let page = db.read(|t| t.ledger_page("u1", Some(&cursor), 10)).unwrap();
        assert_eq!(page.transactions.len(), 3);
        assert_eq!(page.transactions[0].change_amount, 2);
    }

    #[test]
    fn rows_sharing_a_timestamp_keep_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("test.redb")).unwrap();
        let at = Utc::now();
        db.write(|t| {
            for amount in 0..6 {
                t.append_ledger(&row("u1", amount, at))?;
            }
            Ok::<_, DbError>(())
        })
        .unwrap();
        // A later transaction continues the same sequence.
        db.write(|t| t.append_ledger(&row("u1", 6, at))).unwrap();

        let rows = db.read(|t| t.ledger_for_user("u1")).unwrap();
        let amounts: Vec<i64> = rows.iter().map(|r| r.change_amount).collect();
        assert_eq!(amounts, vec![6, 5, 4, 3, 2, 1, 0]);

        let first = db.read(|t| t.ledger_page("u1", None, 4)).unwrap();
        let second = db
            .read(|t| t.ledger_page("u1", first.next_cursor.as_deref(), 4))
            .unwrap();
        let paged: Vec<i64> = first
            .transactions
            .iter()
            .chain(&second.transactions)
            .map(|r| r.change_amount)
            .collect();
        assert_eq!(paged, amounts);
    }

    #[test]
    fn change_type_uses_snake_case() {
        let json = serde_json::to_string(&ChangeType::CleanupRefund).unwrap();
        assert_eq!(json, "\"cleanup_refund\"");
    }

    #[test]
    fn ledger_for_user_only_returns_own_rows() {
        let (db, _dir) = seeded(2);
        let rows = db.read(|t| t.ledger_for_user("u2")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].change_amount, 999);
    }
}
