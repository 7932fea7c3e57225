// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Referral invitations and their one-time rewards.
//!
//! An invitation is recorded when an invitee registers with (or later binds)
//! an invite code. Both rewards are paid once, inside the transaction that
//! publishes the invitee's first post.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::ledger::{apply_points, PointsChange};
use super::rules::{normalize_invite_code, INVITEE_REWARD, INVITER_REWARD};
use super::{MarketError, MarketResult};
use crate::storage::{
    ChangeType, InvitationReads, LedgerReads, MarketDb, PostReads, StoredInvitation, StoredUser,
    UserReads, WriteTables,
};

/// Invite code, shareable link and referral statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationInfo {
    pub invite_code: String,
    pub invitation_link: String,
    pub statistics: InvitationStatistics,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationStatistics {
    pub total_invites: u32,
    pub successful_invites: usize,
    pub pending_invites: usize,
    pub total_points_earned: i64,
}

/// Rewards credited when an invitation completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReferralReward {
    pub inviter_id: String,
    pub inviter_reward: i64,
    pub invitee_reward: i64,
}

/// Link `invitee` to `inviter` with a pending invitation.
pub(crate) fn attach_inviter(
    tables: &mut WriteTables<'_>,
    invitee: &mut StoredUser,
    inviter: &StoredUser,
    now: DateTime<Utc>,
) -> MarketResult<()> {
    invitee.invited_by = Some(inviter.invite_code.clone());
    invitee.updated_at = now;
    tables.update_user(invitee)?;

    let invitation = StoredInvitation::pending(
        invitee.id.clone(),
        inviter.id.clone(),
        inviter.invite_code.clone(),
        now,
    );
    tables.put_invitation(&invitation)?;
    tracing::info!(invitee_id = %invitee.id, inviter_id = %inviter.id, "Invitation recorded");
    Ok(())
}

/// Pay both referral rewards for `invitee` if a pending invitation exists.
///
/// Runs in the caller's transaction. An invitation whose inviter no longer
/// exists is marked posted without paying anything.
pub(crate) fn settle_first_post(
    tables: &mut WriteTables<'_>,
    invitee: &mut StoredUser,
    now: DateTime<Utc>,
) -> MarketResult<Option<ReferralReward>> {
    let Some(mut invitation) = tables.invitation_for_invitee(&invitee.id)? else {
        return Ok(None);
    };
    if invitation.reward_sent {
        return Ok(None);
    }

    invitation.has_posted = true;
    let Some(mut inviter) = tables.user(&invitation.inviter_id)? else {
        tracing::warn!(
            invitee_id = %invitee.id,
            inviter_id = %invitation.inviter_id,
            "Inviter missing, referral reward skipped"
        );
        tables.put_invitation(&invitation)?;
        return Ok(None);
    };

    inviter.total_invites += 1;
    apply_points(
        tables,
        &mut inviter,
        PointsChange::new(ChangeType::Reward, INVITER_REWARD, "Invited a new user")
            .related_to(invitee.id.clone()),
        now,
    )?;
    apply_points(
        tables,
        invitee,
        PointsChange::new(ChangeType::Reward, INVITEE_REWARD, "Invitation bonus")
            .related_to(inviter.id.clone()),
        now,
    )?;

    invitation.reward_sent = true;
    invitation.completed_at = Some(now);
    tables.put_invitation(&invitation)?;

    tracing::info!(invitee_id = %invitee.id, inviter_id = %inviter.id, "Referral rewards paid");
    Ok(Some(ReferralReward {
        inviter_id: inviter.id,
        inviter_reward: INVITER_REWARD,
        invitee_reward: INVITEE_REWARD,
    }))
}

/// Invite code, link and statistics for `user_id`.
///
/// `base_url` is the request origin when present, otherwise the configured
/// public URL.
pub fn invitation_info(db: &MarketDb, user_id: &str, base_url: &str) -> MarketResult<InvitationInfo> {
    db.read(|t| {
        let user = t
            .user(user_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        let invitations = t.invitations_by_inviter(user_id)?;

        let successful_invites = invitations.iter().filter(|i| i.reward_sent).count();
        let total_points_earned = t
            .ledger_for_user(user_id)?
            .iter()
            .filter(|row| row.change_type == ChangeType::Reward)
            .filter(|row| {
                row.related_id
                    .as_deref()
                    .is_some_and(|id| invitations.iter().any(|i| i.invitee_id == id))
            })
            .map(|row| row.change_amount)
            .sum();

        Ok(InvitationInfo {
            invitation_link: format!(
                "{}/login?invite={}",
                base_url.trim_end_matches('/'),
                user.invite_code
            ),
            invite_code: user.invite_code,
            statistics: InvitationStatistics {
                total_invites: user.total_invites,
                successful_invites,
                pending_invites: invitations.len() - successful_invites,
                total_points_earned,
            },
        })
    })
}

/// Attach an inviter to an account that registered without one.
///
/// Only allowed before the account's first post, since rewards are settled
/// at that point.
pub fn bind_invite_code(
    db: &MarketDb,
    user_id: &str,
    invite_code: &str,
    now: DateTime<Utc>,
) -> MarketResult<StoredInvitation> {
    let code = normalize_invite_code(Some(invite_code))
        .ok_or_else(|| MarketError::validation("Invite code is required"))?;

    db.write(|t| {
        let mut user = t
            .user(user_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        if user.invited_by.is_some() || t.invitation_for_invitee(user_id)?.is_some() {
            return Err(MarketError::AlreadyProcessed(
                "Invitation already processed".to_string(),
            ));
        }
        if user.total_posts > 0 || t.has_posts(user_id)? {
            return Err(MarketError::conflict(
                "Invite codes can only be bound before the first post",
            ));
        }

        let inviter = t
            .user_by_invite_code(&code)?
            .ok_or_else(|| MarketError::not_found("Inviter not found"))?;
        if inviter.id == user.id {
            return Err(MarketError::validation("You cannot use your own invite code"));
        }

        attach_inviter(t, &mut user, &inviter, now)?;
        Ok(StoredInvitation::pending(
            user.id.clone(),
            inviter.id.clone(),
            inviter.invite_code.clone(),
            now,
        ))
    })
}
