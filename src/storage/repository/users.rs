// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User accounts.
//!
//! Stored in the `users` table with two unique indexes: phone number and
//! invite code. The password hash never leaves this layer through the API
//! (see [`crate::models::UserProfile`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    DbResult, IndexTable, RecordTable, TableAccess, WriteTables,
};

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    /// Disabled accounts cannot log in or use their session tokens.
    Disabled,
}

/// Stored user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    pub phone: String,
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wechat_id: Option<String>,
    pub invite_code: String,
    /// Invite code of the user who referred this account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
    /// Points balance. Only [`crate::market::ledger::apply_points`] changes it.
    pub points: i64,
    pub total_posts: u32,
    pub total_invites: u32,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    /// A fresh account with a zero balance; the registration bonus is
    /// credited through the ledger afterwards.
    pub fn new(
        phone: String,
        password_hash: String,
        wechat_id: Option<String>,
        invite_code: String,
        invited_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phone,
            password_hash,
            wechat_id,
            invite_code,
            invited_by,
            points: 0,
            total_posts: 0,
            total_invites: 0,
            is_admin: false,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// User lookups, available inside read and write transactions.
pub trait UserReads: TableAccess {
    fn user(&self, user_id: &str) -> DbResult<Option<StoredUser>> {
        self.get_record(RecordTable::Users, user_id)
    }

    fn user_by_phone(&self, phone: &str) -> DbResult<Option<StoredUser>> {
        match self.lookup(IndexTable::UserPhone, phone)? {
            Some(id) => self.user(&id),
            None => Ok(None),
        }
    }

    fn user_by_invite_code(&self, code: &str) -> DbResult<Option<StoredUser>> {
        match self.lookup(IndexTable::UserInviteCode, code)? {
            Some(id) => self.user(&id),
            None => Ok(None),
        }
    }

    fn phone_taken(&self, phone: &str) -> DbResult<bool> {
        Ok(self.lookup(IndexTable::UserPhone, phone)?.is_some())
    }

    fn invite_code_taken(&self, code: &str) -> DbResult<bool> {
        Ok(self.lookup(IndexTable::UserInviteCode, code)?.is_some())
    }

    /// All users, newest account first.
    fn all_users(&self) -> DbResult<Vec<StoredUser>> {
        let mut users: Vec<StoredUser> = self.scan_records(RecordTable::Users)?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}

impl<T: TableAccess> UserReads for T {}

impl WriteTables<'_> {
    /// Insert a new user together with its phone and invite-code indexes.
    pub fn insert_user(&mut self, user: &StoredUser) -> DbResult<()> {
        self.put_record(RecordTable::Users, &user.id, user)?;
        self.put_index(IndexTable::UserPhone, &user.phone, &user.id)?;
        self.put_index(IndexTable::UserInviteCode, &user.invite_code, &user.id)?;
        Ok(())
    }

    /// Replace an existing user record. Phone and invite code are immutable.
    pub fn update_user(&mut self, user: &StoredUser) -> DbResult<()> {
        self.put_record(RecordTable::Users, &user.id, user)
    }
}
