// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Points endpoints: ledger, recharges and invitations.

use axum::{extract::State, http::HeaderMap};
use chrono::Utc;

use crate::{
    audit_log,
    auth::Auth,
    error::{ok, ApiError, ApiJson, ApiResult},
    market::{
        ledger,
        recharge::{self, NewRecharge},
        referrals::{self, InvitationInfo},
    },
    models::{BindInviteRequest, ListTransactionsRequest, RechargeRequestBody, TransactionPage},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository, StoredInvitation, StoredRechargeRequest},
};

const DEFAULT_LEDGER_PAGE: usize = 20;

#[utoipa::path(
    post,
    path = "/api/list-transactions",
    tag = "Points",
    request_body = ListTransactionsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Newest-first ledger page", body = TransactionPage)
    )
)]
pub async fn list_transactions(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ListTransactionsRequest>,
) -> ApiResult<TransactionPage> {
    let page = ledger::list_transactions(
        &state.db,
        &user.user_id,
        req.cursor.as_deref(),
        req.limit.unwrap_or(DEFAULT_LEDGER_PAGE),
    )
    .map_err(ApiError::op("LIST_TRANSACTIONS_FAILED"))?;
    ok(TransactionPage {
        transactions: page.transactions,
        next_cursor: page.next_cursor,
    })
}

/// Submit a recharge with its payment screenshot for admin review.
#[utoipa::path(
    post,
    path = "/api/recharge-request",
    tag = "Points",
    request_body = RechargeRequestBody,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending request created", body = StoredRechargeRequest),
        (status = 400, description = "Invalid amount or screenshot")
    )
)]
pub async fn recharge_request(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RechargeRequestBody>,
) -> ApiResult<StoredRechargeRequest> {
    let request = recharge::recharge_request(
        &state.db,
        &state.files,
        &state.public_base_url,
        &user.user_id,
        NewRecharge {
            amount: req.amount,
            is_custom: req.is_custom,
            screenshot_data: req.screenshot_data,
        },
        Utc::now(),
    )
    .map_err(ApiError::op("RECHARGE_REQUEST_FAILED"))?;

    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::RechargeRequested)
            .with_user(&user.user_id)
            .with_resource("recharge_request", &request.id)
            .with_details(serde_json::json!({ "amount": request.amount, "points": request.points })),
    );
    ok(request)
}

#[utoipa::path(
    post,
    path = "/api/my-recharge-requests",
    tag = "Points",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's recharge requests", body = [StoredRechargeRequest])
    )
)]
pub async fn my_recharge_requests(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> ApiResult<Vec<StoredRechargeRequest>> {
    ok(recharge::my_recharge_requests(&state.db, &user.user_id)
        .map_err(ApiError::op("GET_RECHARGES_FAILED"))?)
}

/// Invite code, shareable link and referral statistics.
///
/// The link uses the request `Origin` when the client sends one.
#[utoipa::path(
    post,
    path = "/api/get-invitation-info",
    tag = "Points",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Invitation details", body = InvitationInfo)
    )
)]
pub async fn invitation_info(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<InvitationInfo> {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| url::Url::parse(o).is_ok())
        .unwrap_or(&*state.public_base_url);
    ok(referrals::invitation_info(&state.db, &user.user_id, origin)
        .map_err(ApiError::op("INVITATION_ERROR"))?)
}

/// Attach an inviter to the caller's account before their first post.
#[utoipa::path(
    post,
    path = "/api/process-referral-reward",
    tag = "Points",
    request_body = BindInviteRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Invitation recorded, reward pending", body = StoredInvitation),
        (status = 404, description = "Unknown invite code"),
        (status = 409, description = "Caller already posted"),
        (status = 422, description = "Invitation already processed")
    )
)]
pub async fn bind_invite_code(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BindInviteRequest>,
) -> ApiResult<StoredInvitation> {
    let invitation = referrals::bind_invite_code(&state.db, &user.user_id, &req.invite_code, Utc::now())
        .map_err(ApiError::op("REFERRAL_PROCESSING_ERROR"))?;
    audit_log!(&state.files, AuditEventType::ReferralBound, &user, "user", &invitation.inviter_id);
    ok(invitation)
}
