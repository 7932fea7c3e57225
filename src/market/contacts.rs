// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paid contact reveal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::ledger::{apply_points, PointsChange};
use super::rules::VIEW_CONTACT_COST;
use super::{MarketError, MarketResult};
use crate::storage::{
    ChangeType, MarketDb, PostReads, PostStatus, StoredView, UserReads, ViewReads,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContactReveal {
    /// Empty when the seller never set one.
    pub wechat_id: String,
    pub already_viewed: bool,
    pub message: String,
}

/// Reveal the seller's WeChat ID for `post_id`.
///
/// The first view by a user costs [`VIEW_CONTACT_COST`] and consumes one of
/// the post's paid views; the view that reaches `view_limit` delists the
/// post. Repeat views are free while the post is still listed. Owners see
/// their own contact for free.
pub fn view_contact(
    db: &MarketDb,
    viewer_id: &str,
    post_id: &str,
    now: DateTime<Utc>,
) -> MarketResult<ContactReveal> {
    let reveal = db.write(|t| {
        let mut viewer = t
            .user(viewer_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        let mut post = t
            .post(post_id)?
            .ok_or_else(|| MarketError::not_found("Post not found"))?;
        let owner = t
            .user(&post.user_id)?
            .ok_or_else(|| MarketError::not_found("Post owner not found"))?;
        let wechat_id = owner.wechat_id.clone().unwrap_or_default();

        if owner.id == viewer.id {
            return Ok(ContactReveal {
                wechat_id,
                already_viewed: true,
                message: "This is your own post".to_string(),
            });
        }

        if !post.is_active() {
            return Err(MarketError::conflict("This post has been delisted"));
        }
        if post.expire_at <= now {
            return Err(MarketError::conflict("This post has expired"));
        }
        if post.is_exhausted() {
            return Err(MarketError::conflict("This post has no contact views left"));
        }

        if let Some(mut view) = t.view(viewer_id, post_id)? {
            view.viewed_at = now;
            t.put_view(&view)?;
            return Ok(ContactReveal {
                wechat_id,
                already_viewed: true,
                message: "You have already viewed this contact".to_string(),
            });
        }

        if viewer.points < VIEW_CONTACT_COST {
            return Err(MarketError::InsufficientPoints {
                required: VIEW_CONTACT_COST,
                available: viewer.points,
            });
        }
        apply_points(
            t,
            &mut viewer,
            PointsChange::new(ChangeType::ViewContact, -VIEW_CONTACT_COST, "Viewed contact")
                .related_to(post.id.clone()),
            now,
        )?;

        post.view_count += 1;
        if post.is_exhausted() {
            post.status = PostStatus::Delisted;
            tracing::info!(post_id = %post.id, view_limit = post.view_limit, "Post exhausted, delisted");
        }
        post.updated_at = now;
        t.put_post(&post)?;

        t.put_view(&StoredView {
            user_id: viewer.id.clone(),
            post_id: post.id.clone(),
            viewed_at: now,
            is_deal_confirmed: None,
        })?;

        Ok(ContactReveal {
            wechat_id,
            already_viewed: false,
            message: "Contact revealed".to_string(),
        })
    })?;

    tracing::debug!(
        viewer_id = %viewer_id,
        post_id = %post_id,
        already_viewed = reveal.already_viewed,
        "Contact viewed"
    );
    Ok(reveal)
}
