// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Referral invitations, keyed by invitee (one invitation per invitee).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{DbResult, RecordTable, TableAccess, WriteTables};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredInvitation {
    pub invitee_id: String,
    pub inviter_id: String,
    pub inviter_code: String,
    /// Set once the invitee publishes their first post.
    pub has_posted: bool,
    /// Set once both referral rewards were credited.
    pub reward_sent: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StoredInvitation {
    pub fn pending(
        invitee_id: String,
        inviter_id: String,
        inviter_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            invitee_id,
            inviter_id,
            inviter_code,
            has_posted: false,
            reward_sent: false,
            created_at: now,
            completed_at: None,
        }
    }
}

pub trait InvitationReads: TableAccess {
    fn invitation_for_invitee(&self, invitee_id: &str) -> DbResult<Option<StoredInvitation>> {
        self.get_record(RecordTable::Invitations, invitee_id)
    }

    /// Invitations sent by a user, newest first.
    fn invitations_by_inviter(&self, inviter_id: &str) -> DbResult<Vec<StoredInvitation>> {
        let mut rows: Vec<StoredInvitation> = self
            .scan_records::<StoredInvitation>(RecordTable::Invitations)?
            .into_iter()
            .filter(|inv| inv.inviter_id == inviter_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

impl<T: TableAccess> InvitationReads for T {}

impl WriteTables<'_> {
    pub fn put_invitation(&mut self, invitation: &StoredInvitation) -> DbResult<()> {
        self.put_record(RecordTable::Invitations, &invitation.invitee_id, invitation)
    }
}
