// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded marketplace database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! Record tables map an id to a JSON-serialized record:
//!
//! - `users`: user_id → StoredUser
//! - `posts`: post_id → StoredPost
//! - `point_transactions`: txn_id → StoredPointTransaction
//! - `invitations`: invitee_id → StoredInvitation (one per invitee)
//! - `recharge_requests`: request_id → StoredRechargeRequest
//! - `view_history`: `user_id|post_id` → StoredView
//! - `payment_qrcodes`: payment_type → StoredQrCode
//!
//! Index tables map a lookup key to a record id:
//!
//! - `user_phone_index`: phone → user_id
//! - `user_invite_code_index`: invite_code → user_id
//! - `user_ledger_index`: `user_id|!seq_hex|txn_id` → txn_id, where `seq`
//!   counts up per user so rows written in the same millisecond keep order
//! - `active_post_index`: `!created_millis_hex|post_id` → post_id, active
//!   posts only
//! - `user_post_index`: `user_id|!created_millis_hex|post_id` → post_id
//!
//! Every business operation runs inside exactly one write transaction
//! ([`MarketDb::write`]). redb serializes writers, so a balance read, the
//! balance update and the ledger append can never interleave with another
//! operation.

use std::path::Path;

use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable,
    ReadableTableMetadata, Table, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("posts");
const POINT_TRANSACTIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("point_transactions");
const INVITATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("invitations");
const RECHARGE_REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("recharge_requests");
const VIEW_HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("view_history");
const PAYMENT_QRCODES: TableDefinition<&str, &[u8]> = TableDefinition::new("payment_qrcodes");

const USER_PHONE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("user_phone_index");
const USER_INVITE_CODE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_invite_code_index");
/// Key format: `user_id|!seq_hex|txn_id` for newest-first scans.
const USER_LEDGER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("user_ledger_index");
const ACTIVE_POST_INDEX: TableDefinition<&str, &str> = TableDefinition::new("active_post_index");
const USER_POST_INDEX: TableDefinition<&str, &str> = TableDefinition::new("user_post_index");

/// Selects one of the JSON record tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTable {
    Users,
    Posts,
    PointTransactions,
    Invitations,
    RechargeRequests,
    ViewHistory,
    PaymentQrCodes,
}

/// Selects one of the key → id index tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTable {
    UserPhone,
    UserInviteCode,
    UserLedger,
    ActivePosts,
    UserPosts,
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dangling index entry: {0}")]
    DanglingIndex(String),

    #[error("malformed index key: {0}")]
    MalformedKey(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Table access
// =============================================================================

/// Read access shared by read-only and read-write transactions.
///
/// Repository read traits are blanket-implemented for every `TableAccess`,
/// so the same lookup code serves queries and the read half of a
/// read-modify-write operation.
pub trait TableAccess {
    type Records: ReadableTable<&'static str, &'static [u8]>;
    type Index: ReadableTable<&'static str, &'static str>;

    fn records(&self, table: RecordTable) -> &Self::Records;

    fn index(&self, table: IndexTable) -> &Self::Index;

    /// Fetch and decode a single record.
    fn get_record<T: DeserializeOwned>(&self, table: RecordTable, key: &str) -> DbResult<Option<T>> {
        match self.records(table).get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Decode every record of a table in key order.
    fn scan_records<T: DeserializeOwned>(&self, table: RecordTable) -> DbResult<Vec<T>> {
        let mut out = Vec::new();
        for entry in self.records(table).iter()? {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    fn count_records(&self, table: RecordTable) -> DbResult<u64> {
        Ok(self.records(table).len()?)
    }

    /// Resolve an index key to the record id it points at.
    fn lookup(&self, table: IndexTable, key: &str) -> DbResult<Option<String>> {
        Ok(self.index(table).get(key)?.map(|v| v.value().to_string()))
    }

    /// Scan an index range `[start, end)`, returning `(key, id)` pairs.
    fn index_range(
        &self,
        table: IndexTable,
        start: &str,
        end: &str,
        limit: usize,
    ) -> DbResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        self.visit_index(table, Some((start, end)), |key, id| {
            out.push((key.to_string(), id.to_string()));
            Ok(out.len() < limit)
        })?;
        Ok(out)
    }

    /// Walk an index in key order, over `[start, end)` or the whole table.
    ///
    /// Stops as soon as `visit` returns `false`.
    fn visit_index<F>(
        &self,
        table: IndexTable,
        bounds: Option<(&str, &str)>,
        mut visit: F,
    ) -> DbResult<()>
    where
        F: FnMut(&str, &str) -> DbResult<bool>,
    {
        let entries = match bounds {
            Some((start, end)) => self.index(table).range(start..end)?,
            None => self.index(table).iter()?,
        };
        for entry in entries {
            let (key, value) = entry?;
            if !visit(key.value(), value.value())? {
                break;
            }
        }
        Ok(())
    }
}

/// Tables opened inside a read transaction.
pub struct ReadTables {
    users: ReadOnlyTable<&'static str, &'static [u8]>,
    posts: ReadOnlyTable<&'static str, &'static [u8]>,
    point_transactions: ReadOnlyTable<&'static str, &'static [u8]>,
    invitations: ReadOnlyTable<&'static str, &'static [u8]>,
    recharge_requests: ReadOnlyTable<&'static str, &'static [u8]>,
    view_history: ReadOnlyTable<&'static str, &'static [u8]>,
    payment_qrcodes: ReadOnlyTable<&'static str, &'static [u8]>,
    user_phone_index: ReadOnlyTable<&'static str, &'static str>,
    user_invite_code_index: ReadOnlyTable<&'static str, &'static str>,
    user_ledger_index: ReadOnlyTable<&'static str, &'static str>,
    active_post_index: ReadOnlyTable<&'static str, &'static str>,
    user_post_index: ReadOnlyTable<&'static str, &'static str>,
}

impl ReadTables {
    fn open(txn: &ReadTransaction) -> DbResult<Self> {
        Ok(Self {
            users: txn.open_table(USERS)?,
            posts: txn.open_table(POSTS)?,
            point_transactions: txn.open_table(POINT_TRANSACTIONS)?,
            invitations: txn.open_table(INVITATIONS)?,
            recharge_requests: txn.open_table(RECHARGE_REQUESTS)?,
            view_history: txn.open_table(VIEW_HISTORY)?,
            payment_qrcodes: txn.open_table(PAYMENT_QRCODES)?,
            user_phone_index: txn.open_table(USER_PHONE_INDEX)?,
            user_invite_code_index: txn.open_table(USER_INVITE_CODE_INDEX)?,
            user_ledger_index: txn.open_table(USER_LEDGER_INDEX)?,
            active_post_index: txn.open_table(ACTIVE_POST_INDEX)?,
            user_post_index: txn.open_table(USER_POST_INDEX)?,
        })
    }
}

impl TableAccess for ReadTables {
    type Records = ReadOnlyTable<&'static str, &'static [u8]>;
    type Index = ReadOnlyTable<&'static str, &'static str>;

    fn records(&self, table: RecordTable) -> &Self::Records {
        match table {
            RecordTable::Users => &self.users,
            RecordTable::Posts => &self.posts,
            RecordTable::PointTransactions => &self.point_transactions,
            RecordTable::Invitations => &self.invitations,
            RecordTable::RechargeRequests => &self.recharge_requests,
            RecordTable::ViewHistory => &self.view_history,
            RecordTable::PaymentQrCodes => &self.payment_qrcodes,
        }
    }

    fn index(&self, table: IndexTable) -> &Self::Index {
        match table {
            IndexTable::UserPhone => &self.user_phone_index,
            IndexTable::UserInviteCode => &self.user_invite_code_index,
            IndexTable::UserLedger => &self.user_ledger_index,
            IndexTable::ActivePosts => &self.active_post_index,
            IndexTable::UserPosts => &self.user_post_index,
        }
    }
}

/// Tables opened inside a write transaction.
pub struct WriteTables<'txn> {
    users: Table<'txn, &'static str, &'static [u8]>,
    posts: Table<'txn, &'static str, &'static [u8]>,
    point_transactions: Table<'txn, &'static str, &'static [u8]>,
    invitations: Table<'txn, &'static str, &'static [u8]>,
    recharge_requests: Table<'txn, &'static str, &'static [u8]>,
    view_history: Table<'txn, &'static str, &'static [u8]>,
    payment_qrcodes: Table<'txn, &'static str, &'static [u8]>,
    user_phone_index: Table<'txn, &'static str, &'static str>,
    user_invite_code_index: Table<'txn, &'static str, &'static str>,
    user_ledger_index: Table<'txn, &'static str, &'static str>,
    active_post_index: Table<'txn, &'static str, &'static str>,
    user_post_index: Table<'txn, &'static str, &'static str>,
}

impl<'txn> WriteTables<'txn> {
    fn open(txn: &'txn WriteTransaction) -> DbResult<Self> {
        Ok(Self {
            users: txn.open_table(USERS)?,
            posts: txn.open_table(POSTS)?,
            point_transactions: txn.open_table(POINT_TRANSACTIONS)?,
            invitations: txn.open_table(INVITATIONS)?,
            recharge_requests: txn.open_table(RECHARGE_REQUESTS)?,
            view_history: txn.open_table(VIEW_HISTORY)?,
            payment_qrcodes: txn.open_table(PAYMENT_QRCODES)?,
            user_phone_index: txn.open_table(USER_PHONE_INDEX)?,
            user_invite_code_index: txn.open_table(USER_INVITE_CODE_INDEX)?,
            user_ledger_index: txn.open_table(USER_LEDGER_INDEX)?,
            active_post_index: txn.open_table(ACTIVE_POST_INDEX)?,
            user_post_index: txn.open_table(USER_POST_INDEX)?,
        })
    }

    fn records_mut(&mut self, table: RecordTable) -> &mut Table<'txn, &'static str, &'static [u8]> {
        match table {
            RecordTable::Users => &mut self.users,
            RecordTable::Posts => &mut self.posts,
            RecordTable::PointTransactions => &mut self.point_transactions,
            RecordTable::Invitations => &mut self.invitations,
            RecordTable::RechargeRequests => &mut self.recharge_requests,
            RecordTable::ViewHistory => &mut self.view_history,
            RecordTable::PaymentQrCodes => &mut self.payment_qrcodes,
        }
    }

    fn index_mut(&mut self, table: IndexTable) -> &mut Table<'txn, &'static str, &'static str> {
        match table {
            IndexTable::UserPhone => &mut self.user_phone_index,
            IndexTable::UserInviteCode => &mut self.user_invite_code_index,
            IndexTable::UserLedger => &mut self.user_ledger_index,
            IndexTable::ActivePosts => &mut self.active_post_index,
            IndexTable::UserPosts => &mut self.user_post_index,
        }
    }

    /// Serialize and insert (or replace) a record.
    pub fn put_record<T: Serialize>(
        &mut self,
        table: RecordTable,
        key: &str,
        record: &T,
    ) -> DbResult<()> {
        let json = serde_json::to_vec(record)?;
        self.records_mut(table).insert(key, json.as_slice())?;
        Ok(())
    }

    pub fn put_index(&mut self, table: IndexTable, key: &str, id: &str) -> DbResult<()> {
        self.index_mut(table).insert(key, id)?;
        Ok(())
    }

    pub fn remove_index(&mut self, table: IndexTable, key: &str) -> DbResult<bool> {
        Ok(self.index_mut(table).remove(key)?.is_some())
    }
}

impl<'txn> TableAccess for WriteTables<'txn> {
    type Records = Table<'txn, &'static str, &'static [u8]>;
    type Index = Table<'txn, &'static str, &'static str>;

    fn records(&self, table: RecordTable) -> &Self::Records {
        match table {
            RecordTable::Users => &self.users,
            RecordTable::Posts => &self.posts,
            RecordTable::PointTransactions => &self.point_transactions,
            RecordTable::Invitations => &self.invitations,
            RecordTable::RechargeRequests => &self.recharge_requests,
            RecordTable::ViewHistory => &self.view_history,
            RecordTable::PaymentQrCodes => &self.payment_qrcodes,
        }
    }

    fn index(&self, table: IndexTable) -> &Self::Index {
        match table {
            IndexTable::UserPhone => &self.user_phone_index,
            IndexTable::UserInviteCode => &self.user_invite_code_index,
            IndexTable::UserLedger => &self.user_ledger_index,
            IndexTable::ActivePosts => &self.active_post_index,
            IndexTable::UserPosts => &self.user_post_index,
        }
    }
}

// =============================================================================
// MarketDb
// =============================================================================

/// Embedded ACID marketplace database.
pub struct MarketDb {
    db: Database,
}

impl MarketDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(POSTS)?;
            let _ = write_txn.open_table(POINT_TRANSACTIONS)?;
            let _ = write_txn.open_table(INVITATIONS)?;
            let _ = write_txn.open_table(RECHARGE_REQUESTS)?;
            let _ = write_txn.open_table(VIEW_HISTORY)?;
            let _ = write_txn.open_table(PAYMENT_QRCODES)?;
            let _ = write_txn.open_table(USER_PHONE_INDEX)?;
            let _ = write_txn.open_table(USER_INVITE_CODE_INDEX)?;
            let _ = write_txn.open_table(USER_LEDGER_INDEX)?;
            let _ = write_txn.open_table(ACTIVE_POST_INDEX)?;
            let _ = write_txn.open_table(USER_POST_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTables) -> Result<T, E>,
        E: From<DbError>,
    {
        let txn = self.db.begin_read().map_err(DbError::from)?;
        let tables = ReadTables::open(&txn)?;
        f(&tables)
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`; aborts (discarding every write `f`
    /// made) when it returns `Err`.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTables<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let txn = self.db.begin_write().map_err(DbError::from)?;
        let outcome = {
            let mut tables = WriteTables::open(&txn)?;
            f(&mut tables)
        };

        match outcome {
            Ok(value) => {
                txn.commit().map_err(DbError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    /// Cheap liveness probe used by the readiness endpoint.
    pub fn health_check(&self) -> DbResult<()> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS)?;
        let _ = table.len()?;
        Ok(())
    }
}

// =============================================================================
// Key helpers
// =============================================================================

/// Newest-first key: `inverted_ordinal_hex | id`. Larger ordinals sort first.
pub fn newest_first_key(ordinal: u64, id: &str) -> String {
    format!("{:016x}|{id}", !ordinal)
}

/// Build a per-owner, newest-first composite key.
///
/// Format: `owner | inverted_ordinal_hex | id`.
pub fn descending_key(owner: &str, ordinal: u64, id: &str) -> String {
    format!("{owner}|{}", newest_first_key(ordinal, id))
}

/// Recover the ordinal from a key built by [`descending_key`].
pub fn descending_ordinal(owner: &str, key: &str) -> DbResult<u64> {
    key.strip_prefix(owner)
        .and_then(|rest| rest.strip_prefix('|'))
        .and_then(|rest| rest.get(..16))
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .map(|inverted| !inverted)
        .ok_or_else(|| DbError::MalformedKey(key.to_string()))
}

/// Ordinal used for timestamp-ordered keys. Pre-epoch times clamp to zero.
pub fn millis_ordinal(ts: chrono::DateTime<chrono::Utc>) -> u64 {
    u64::try_from(ts.timestamp_millis()).unwrap_or(0)
}

/// Bounds covering every key produced by [`descending_key`] for `owner`.
pub fn owner_prefix_bounds(owner: &str) -> (String, String) {
    // '}' sorts immediately after '|'
    (format!("{owner}|"), format!("{owner}}}"))
}

/// Key of the `view_history` table.
pub fn view_key(user_id: &str, post_id: &str) -> String {
    format!("{user_id}|{post_id}")
}

// =============================================================================
// Tests
// =============================================================================
