// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Listing endpoints: browse, publish, delist/relist, contact reveal and
//! deal confirmation.

use axum::extract::{Path, State};
use chrono::Utc;

use crate::{
    audit_log,
    auth::Auth,
    error::{ok, ApiError, ApiJson, ApiResult},
    market::{
        contacts::{self, ContactReveal},
        posts::{self, DealConfirmation, PostPage, PostQuery, PublishedPost, ToggleOutcome},
    },
    models::{ConfirmDealRequest, GetPostsRequest, PostIdRequest, PublishPostRequest},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository, StoredPost},
};

/// Active listings, newest first.
#[utoipa::path(
    post,
    path = "/api/get-posts",
    tag = "Posts",
    request_body = GetPostsRequest,
    responses(
        (status = 200, description = "One page of active posts", body = PostPage),
        (status = 400, description = "Unknown trade type")
    )
)]
pub async fn get_posts(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GetPostsRequest>,
) -> ApiResult<PostPage> {
    let query = PostQuery {
        trade_type: req.trade_type,
        keyword: req.keyword,
        page: req.page,
        page_size: req.page_size,
    };
    ok(posts::get_posts(&state.db, query, Utc::now()).map_err(ApiError::op("GET_POSTS_FAILED"))?)
}

#[utoipa::path(
    get,
    path = "/api/posts/{post_id}",
    tag = "Posts",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post detail without contact", body = StoredPost),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<StoredPost> {
    ok(posts::get_post(&state.db, &post_id).map_err(ApiError::op("GET_POST_FAILED"))?)
}

/// Publish a post, paying one point per contact view.
#[utoipa::path(
    post,
    path = "/api/publish-post",
    tag = "Posts",
    request_body = PublishPostRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Post published", body = PublishedPost),
        (status = 400, description = "Invalid post"),
        (status = 422, description = "Insufficient points")
    )
)]
pub async fn publish_post(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PublishPostRequest>,
) -> ApiResult<PublishedPost> {
    let published = posts::publish_post(&state.db, &user.user_id, req.into(), Utc::now())
        .map_err(ApiError::op("PUBLISH_FAILED"))?;

    let audit = AuditRepository::new(&state.files);
    audit.record(
        AuditEvent::new(AuditEventType::PostPublished)
            .with_user(&user.user_id)
            .with_resource("post", &published.post.id)
            .with_details(serde_json::json!({ "cost": published.points_spent })),
    );
    if let Some(reward) = &published.referral_reward {
        audit.record(
            AuditEvent::new(AuditEventType::ReferralRewarded)
                .with_user(&reward.inviter_id)
                .with_resource("user", &user.user_id),
        );
    }
    ok(published)
}

#[utoipa::path(
    post,
    path = "/api/my-posts",
    tag = "Posts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's posts, any status", body = [StoredPost])
    )
)]
pub async fn my_posts(Auth(user): Auth, State(state): State<AppState>) -> ApiResult<Vec<StoredPost>> {
    ok(posts::my_posts(&state.db, &user.user_id).map_err(ApiError::op("GET_POSTS_FAILED"))?)
}

/// Delist (refunding unused views) or relist (10 points for 10 views).
#[utoipa::path(
    post,
    path = "/api/toggle-post-status",
    tag = "Posts",
    request_body = PostIdRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New status and points change", body = ToggleOutcome),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Post not found"),
        (status = 422, description = "Insufficient points to relist")
    )
)]
pub async fn toggle_post_status(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PostIdRequest>,
) -> ApiResult<ToggleOutcome> {
    let outcome = posts::toggle_post_status(&state.db, &user.user_id, &req.post_id, Utc::now())
        .map_err(ApiError::op("TOGGLE_STATUS_FAILED"))?;
    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::PostStatusToggled)
            .with_user(&user.user_id)
            .with_resource("post", &req.post_id)
            .with_details(serde_json::json!({
                "new_status": outcome.new_status,
                "points_change": outcome.points_change,
            })),
    );
    ok(outcome)
}

/// Reveal the seller's WeChat ID for one point.
#[utoipa::path(
    post,
    path = "/api/view-contact",
    tag = "Posts",
    request_body = PostIdRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Contact revealed", body = ContactReveal),
        (status = 404, description = "Post not found"),
        (status = 409, description = "Post delisted, expired or out of views"),
        (status = 422, description = "Insufficient points")
    )
)]
pub async fn view_contact(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PostIdRequest>,
) -> ApiResult<ContactReveal> {
    let reveal = contacts::view_contact(&state.db, &user.user_id, &req.post_id, Utc::now())
        .map_err(ApiError::op("VIEW_CONTACT_FAILED"))?;
    if !reveal.already_viewed {
        audit_log!(&state.files, AuditEventType::ContactViewed, &user, "post", &req.post_id);
    }
    ok(reveal)
}

#[utoipa::path(
    post,
    path = "/api/confirm-deal",
    tag = "Posts",
    request_body = ConfirmDealRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Answer recorded", body = DealConfirmation),
        (status = 403, description = "Contact never viewed"),
        (status = 422, description = "Already answered")
    )
)]
pub async fn confirm_deal(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConfirmDealRequest>,
) -> ApiResult<DealConfirmation> {
    let confirmation =
        posts::confirm_deal(&state.db, &user.user_id, &req.post_id, req.confirmed, Utc::now())
            .map_err(ApiError::op("CONFIRM_DEAL_FAILED"))?;
    audit_log!(&state.files, AuditEventType::DealConfirmed, &user, "post", &req.post_id);
    ok(confirmation)
}
