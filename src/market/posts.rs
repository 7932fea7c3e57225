// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Post lifecycle: publish, browse, delist/relist and deal confirmation.
//!
//! The points a post holds always equal its remaining views: publishing
//! buys `view_limit` views, delisting refunds what was not consumed and
//! relisting buys a fresh batch.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::ledger::{apply_points, PointsChange};
use super::referrals::{settle_first_post, ReferralReward};
use super::rules::{
    normalize_search_text, post_ttl, required_text, DEFAULT_PAGE_SIZE, DEFAULT_VIEW_LIMIT,
    MAX_DELIVERY_DAYS, MAX_EXTRA_INFO_CHARS, MAX_KEYWORDS_CHARS, MAX_PAGE_SIZE, MAX_TITLE_CHARS,
    MAX_VIEW_LIMIT, RELIST_COST, RELIST_VIEWS,
};
use super::{MarketError, MarketResult};
use crate::storage::{
    ChangeType, MarketDb, PostReads, PostStatus, StoredPost, TradeType, UserReads, ViewReads,
    WriteTables,
};

/// Publish input. `trade_type` is the raw client value (1-4).
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub keywords: String,
    pub price: f64,
    pub trade_type: u8,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_days: Option<u32>,
    pub extra_info: Option<String>,
    pub category_id: Option<String>,
    pub view_limit: Option<u32>,
}

/// Result of a successful publish.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublishedPost {
    pub post: StoredPost,
    pub points_spent: i64,
    pub balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_reward: Option<ReferralReward>,
}

#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub trade_type: Option<u8>,
    pub keyword: Option<String>,
    pub page: usize,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PostPage {
    pub posts: Vec<StoredPost>,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

/// Outcome of a status toggle. `points_change` is signed: positive for a
/// refund, negative for a relist charge.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToggleOutcome {
    pub new_status: PostStatus,
    pub points_change: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DealConfirmation {
    pub post_id: String,
    pub confirmed: bool,
    pub deal_count: u32,
}

struct ValidPost {
    title: String,
    keywords: String,
    price: f64,
    trade_type: TradeType,
    delivery_date: Option<NaiveDate>,
    extra_info: Option<String>,
    category_id: Option<String>,
    view_limit: u32,
}

fn validate_post(input: NewPost, now: DateTime<Utc>) -> MarketResult<ValidPost> {
    let title = required_text("title", &input.title, MAX_TITLE_CHARS)?;
    let keywords = required_text("keywords", &input.keywords, MAX_KEYWORDS_CHARS)?;
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(MarketError::validation("price must be a non-negative number"));
    }
    let trade_type = TradeType::try_from(input.trade_type).map_err(MarketError::Validation)?;

    let view_limit = input.view_limit.unwrap_or(DEFAULT_VIEW_LIMIT);
    if !(1..=MAX_VIEW_LIMIT).contains(&view_limit) {
        return Err(MarketError::validation(format!(
            "view_limit must be between 1 and {MAX_VIEW_LIMIT}"
        )));
    }

    let delivery_date = match (input.delivery_date, input.delivery_days) {
        (Some(date), _) => Some(date),
        (None, Some(days)) => {
            if !(1..=MAX_DELIVERY_DAYS).contains(&days) {
                return Err(MarketError::validation(format!(
                    "delivery_days must be between 1 and {MAX_DELIVERY_DAYS}"
                )));
            }
            Some((now + Duration::days(i64::from(days))).date_naive())
        }
        (None, None) => None,
    };
    if trade_type.requires_delivery() && delivery_date.is_none() {
        return Err(MarketError::validation(
            "Long and short posts need a delivery date",
        ));
    }

    let extra_info = match input.extra_info.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            Some(required_text("extra_info", text, MAX_EXTRA_INFO_CHARS)?)
        }
        _ => None,
    };
    let category_id = input
        .category_id
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(ValidPost {
        title,
        keywords,
        price: input.price,
        trade_type,
        delivery_date,
        extra_info,
        category_id,
        view_limit,
    })
}

/// Create a post and charge its views in one transaction.
///
/// The first post of an invited user also pays the referral rewards.
pub fn publish_post(
    db: &MarketDb,
    user_id: &str,
    input: NewPost,
    now: DateTime<Utc>,
) -> MarketResult<PublishedPost> {
    let valid = validate_post(input, now)?;
    db.write(|t| publish_in(t, user_id, valid, now))
}

fn publish_in(
    t: &mut WriteTables<'_>,
    user_id: &str,
    valid: ValidPost,
    now: DateTime<Utc>,
) -> MarketResult<PublishedPost> {
    let mut user = t
        .user(user_id)?
        .ok_or_else(|| MarketError::not_found("User not found"))?;
    let cost = i64::from(valid.view_limit);
    if user.points < cost {
        return Err(MarketError::InsufficientPoints {
            required: cost,
            available: user.points,
        });
    }

    let post = StoredPost {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        title: valid.title,
        keywords: valid.keywords,
        price: valid.price,
        trade_type: valid.trade_type,
        delivery_date: valid.delivery_date,
        extra_info: valid.extra_info,
        category_id: valid.category_id,
        view_limit: valid.view_limit,
        view_count: 0,
        deal_count: 0,
        status: PostStatus::Active,
        expire_at: now + post_ttl(),
        created_at: now,
        updated_at: now,
    };
    t.put_post(&post)?;

    let first_post = user.total_posts == 0;
    user.total_posts += 1;
    apply_points(
        t,
        &mut user,
        PointsChange::new(ChangeType::Publish, -cost, "Published a post").related_to(post.id.clone()),
        now,
    )?;

    let referral_reward = if first_post {
        settle_first_post(t, &mut user, now)?
    } else {
        None
    };

    tracing::info!(
        user_id = %user.id,
        post_id = %post.id,
        cost,
        balance = user.points,
        "Post published"
    );
    Ok(PublishedPost {
        post,
        points_spent: cost,
        balance: user.points,
        referral_reward,
    })
}

/// Active, unexpired posts, newest first.
pub fn get_posts(db: &MarketDb, query: PostQuery, now: DateTime<Utc>) -> MarketResult<PostPage> {
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let trade_type = match query.trade_type {
        None | Some(0) => None,
        Some(raw) => Some(TradeType::try_from(raw).map_err(MarketError::Validation)?),
    };
    let needle = query
        .keyword
        .as_deref()
        .map(normalize_search_text)
        .filter(|k| !k.is_empty());

    let matches = |p: &StoredPost| {
        p.expire_at > now
            && trade_type.is_none_or(|kind| p.trade_type == kind)
            && needle.as_deref().is_none_or(|needle| {
                normalize_search_text(&p.title).contains(needle)
                    || normalize_search_text(&p.keywords).contains(needle)
            })
    };
    let skip = query.page.saturating_mul(page_size);
    let posts = db.read(|t| {
        Ok::<_, MarketError>(t.find_active_posts(skip, page_size, matches)?)
    })?;

    Ok(PostPage {
        has_more: posts.len() == page_size,
        posts,
        page: query.page,
        page_size,
    })
}

pub fn get_post(db: &MarketDb, post_id: &str) -> MarketResult<StoredPost> {
    db.read(|t| Ok::<_, MarketError>(t.post(post_id)?))?
        .ok_or_else(|| MarketError::not_found("Post not found"))
}

/// The caller's own posts in any status.
pub fn my_posts(db: &MarketDb, user_id: &str) -> MarketResult<Vec<StoredPost>> {
    db.read(|t| Ok(t.posts_by_user(user_id)?))
}

/// Delist `post`, refunding its remaining views to the owner.
///
/// Caps `view_limit` at `view_count` so no further views can be consumed.
/// Returns the refunded amount (possibly zero).
pub(crate) fn delist_with_refund(
    t: &mut WriteTables<'_>,
    post: &mut StoredPost,
    change_type: ChangeType,
    description: &str,
    now: DateTime<Utc>,
) -> MarketResult<i64> {
    let refund = i64::from(post.remaining_views());
    if refund > 0 {
        let mut owner = t.user(&post.user_id)?.ok_or_else(|| {
            MarketError::Internal(format!("owner {} of post {} is missing", post.user_id, post.id))
        })?;
        apply_points(
            t,
            &mut owner,
            PointsChange::new(change_type, refund, description).related_to(post.id.clone()),
            now,
        )?;
    }

    post.view_limit = post.view_limit.min(post.view_count);
    post.status = PostStatus::Delisted;
    post.updated_at = now;
    t.put_post(post)?;
    Ok(refund)
}

/// Flip a post between active and delisted.
///
/// Delisting refunds the remaining views. Relisting costs
/// [`RELIST_COST`] points, buys [`RELIST_VIEWS`] views and restarts the TTL.
pub fn toggle_post_status(
    db: &MarketDb,
    user_id: &str,
    post_id: &str,
    now: DateTime<Utc>,
) -> MarketResult<ToggleOutcome> {
    let outcome = db.write(|t| {
        let mut post = t
            .post(post_id)?
            .ok_or_else(|| MarketError::not_found("Post not found"))?;
        if post.user_id != user_id {
            return Err(MarketError::forbidden("Only the owner can change this post"));
        }

        if post.is_active() {
            let refund = delist_with_refund(
                t,
                &mut post,
                ChangeType::Refund,
                "Delisted post, unused views refunded",
                now,
            )?;
            let message = if refund > 0 {
                format!("Delisted, {refund} points refunded")
            } else {
                "Delisted".to_string()
            };
            return Ok(ToggleOutcome {
                new_status: PostStatus::Delisted,
                points_change: refund,
                message,
            });
        }

        let mut owner = t
            .user(user_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        apply_points(
            t,
            &mut owner,
            PointsChange::new(ChangeType::Relist, -RELIST_COST, "Relisted post")
                .related_to(post.id.clone()),
            now,
        )?;

        post.view_limit = post.view_count + RELIST_VIEWS;
        post.status = PostStatus::Active;
        post.expire_at = now + post_ttl();
        post.updated_at = now;
        t.put_post(&post)?;

        Ok(ToggleOutcome {
            new_status: PostStatus::Active,
            points_change: -RELIST_COST,
            message: format!("Relisted, {RELIST_COST} points deducted"),
        })
    })?;

    tracing::info!(
        user_id = %user_id,
        post_id = %post_id,
        new_status = ?outcome.new_status,
        points_change = outcome.points_change,
        "Post status toggled"
    );
    Ok(outcome)
}

/// Record whether a deal happened after viewing a post's contact.
///
/// Each viewer may answer once; a positive answer increments `deal_count`.
pub fn confirm_deal(
    db: &MarketDb,
    user_id: &str,
    post_id: &str,
    confirmed: bool,
    now: DateTime<Utc>,
) -> MarketResult<DealConfirmation> {
    db.write(|t| {
        let mut post = t
            .post(post_id)?
            .ok_or_else(|| MarketError::not_found("Post not found"))?;
        if post.user_id == user_id {
            return Err(MarketError::validation("You cannot confirm a deal on your own post"));
        }
        let mut view = t
            .view(user_id, post_id)?
            .ok_or_else(|| MarketError::forbidden("View the contact before confirming a deal"))?;
        if view.is_deal_confirmed.is_some() {
            return Err(MarketError::AlreadyProcessed(
                "Deal already confirmed for this post".to_string(),
            ));
        }

        view.is_deal_confirmed = Some(confirmed);
        t.put_view(&view)?;
        if confirmed {
            post.deal_count += 1;
            post.updated_at = now;
            t.put_post(&post)?;
        }

        Ok(DealConfirmation {
            post_id: post.id,
            confirmed,
            deal_count: post.deal_count,
        })
    })
}
