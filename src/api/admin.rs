// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Recharge review
//! - Expiry and data-repair jobs
//! - Payment QR code maintenance
//! - Statistics, account moderation and audit log queries

use axum::extract::{Query, State};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::{ok, ApiError, ApiJson, ApiResult},
    market::{
        admin::{self, MarketStats},
        cleanup::{self, CleanupReport, ExpiryReport},
        payments,
        recharge::{self, ReviewOutcome},
        MarketError,
    },
    models::{
        ApproveRechargeRequest, ListRechargesRequest, SaveQrCodeRequest, SetUserStatusRequest,
        UserProfile,
    },
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditFilter, AuditRepository, RechargeStatus, StoredQrCode,
        StoredRechargeRequest,
    },
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: MarketStats,
    pub uptime_seconds: i64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserProfile>,
    pub total: usize,
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Start date (YYYY-MM-DD format).
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD format).
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    /// Wire name such as `post_published`.
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    /// Total count before limit/offset.
    pub total: usize,
    pub has_more: bool,
}

const MAX_AUDIT_RANGE_DAYS: i64 = 92;

// ============================================================================
// Recharge review
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/admin-list-recharges",
    tag = "Admin",
    request_body = ListRechargesRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recharge requests, newest first", body = [StoredRechargeRequest]),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_recharges(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ListRechargesRequest>,
) -> ApiResult<Vec<StoredRechargeRequest>> {
    let status = req
        .status
        .map(RechargeStatus::try_from)
        .transpose()
        .map_err(|e| ApiError::bad_request("GET_RECHARGES_FAILED", e))?;
    let requests =
        recharge::admin_list_recharges(&state.db, status).map_err(ApiError::op("GET_RECHARGES_FAILED"))?;
    audit_log!(&state.files, AuditEventType::AdminAccess, &user);
    ok(requests)
}

/// Approve (crediting points) or reject a pending recharge.
#[utoipa::path(
    post,
    path = "/api/admin-approve-recharge",
    tag = "Admin",
    request_body = ApproveRechargeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Review recorded", body = ReviewOutcome),
        (status = 404, description = "Request not found"),
        (status = 422, description = "Request already processed")
    )
)]
pub async fn approve_recharge(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ApproveRechargeRequest>,
) -> ApiResult<ReviewOutcome> {
    let outcome = recharge::admin_approve_recharge(
        &state.db,
        &user.user_id,
        &req.request_id,
        req.approved,
        req.admin_note,
        Utc::now(),
    )
    .map_err(ApiError::op("APPROVE_RECHARGE_FAILED"))?;

    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::RechargeReviewed)
            .with_user(&user.user_id)
            .with_resource("recharge_request", &req.request_id)
            .with_details(serde_json::json!({
                "approved": req.approved,
                "points": outcome.request.points,
                "owner": outcome.request.user_id,
            })),
    );
    ok(outcome)
}

// ============================================================================
// Maintenance jobs
// ============================================================================

fn record_job(state: &AppState, event_type: AuditEventType, admin_id: &str, details: serde_json::Value) {
    AuditRepository::new(&state.files).record(
        AuditEvent::new(event_type)
            .with_user(admin_id)
            .with_details(details),
    );
}

#[utoipa::path(
    post,
    path = "/api/auto-expire-posts",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Expired posts delisted", body = ExpiryReport)
    )
)]
pub async fn auto_expire_posts(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<ExpiryReport> {
    let report = cleanup::auto_expire_posts(&state.db, Utc::now()).map_err(ApiError::op("AUTO_EXPIRE_FAILED"))?;
    record_job(
        &state,
        AuditEventType::PostsExpired,
        &user.user_id,
        serde_json::json!({ "job": "auto_expire", "count": report.count }),
    );
    ok(report)
}

#[utoipa::path(
    post,
    path = "/api/manual-expire-fix",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Posts older than 72 h delisted", body = ExpiryReport)
    )
)]
pub async fn manual_expire_fix(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<ExpiryReport> {
    let report = cleanup::manual_expire_fix(&state.db, Utc::now()).map_err(ApiError::op("MANUAL_EXPIRE_FAILED"))?;
    record_job(
        &state,
        AuditEventType::PostsExpired,
        &user.user_id,
        serde_json::json!({ "job": "manual_fix", "count": report.count }),
    );
    ok(report)
}

/// Delist posts over their view limit, then expire stale posts.
#[utoipa::path(
    post,
    path = "/api/emergency-data-cleanup",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cleanup summary and per-post details", body = CleanupReport)
    )
)]
pub async fn emergency_data_cleanup(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<CleanupReport> {
    let report = cleanup::emergency_data_cleanup(&state.db, Utc::now())
        .map_err(ApiError::op("EMERGENCY_CLEANUP_FAILED"))?;
    record_job(
        &state,
        AuditEventType::EmergencyCleanup,
        &user.user_id,
        serde_json::json!({
            "violating": report.summary.violating_count,
            "expired": report.summary.expired_count,
            "refunded": report.summary.total_refunded_points,
        }),
    );
    ok(report)
}

// ============================================================================
// Payment QR codes
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/save-payment-qrcode",
    tag = "Admin",
    request_body = SaveQrCodeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "QR code saved", body = StoredQrCode),
        (status = 400, description = "Unknown payment type or bad URL")
    )
)]
pub async fn save_payment_qrcode(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SaveQrCodeRequest>,
) -> ApiResult<StoredQrCode> {
    let code = payments::save_payment_qrcode(&state.db, &req.payment_type, &req.qr_code_url, Utc::now())
        .map_err(ApiError::op("SAVE_QRCODE_FAILED"))?;
    audit_log!(&state.files, AuditEventType::QrCodeSaved, &user, "payment_qrcode", code.payment_type.as_str());
    ok(code)
}

// ============================================================================
// Statistics, users, audit
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Marketplace statistics", body = StatsResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn get_stats(AdminOnly(user): AdminOnly, State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let now = Utc::now();
    let stats = admin::stats(&state.db, now).map_err(ApiError::op("GET_STATS_FAILED"))?;
    audit_log!(&state.files, AuditEventType::AdminAccess, &user);
    ok(StatsResponse {
        stats,
        uptime_seconds: state.uptime_secs(now),
        timestamp: now.to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All accounts, newest first", body = UserListResponse)
    )
)]
pub async fn list_users(AdminOnly(user): AdminOnly, State(state): State<AppState>) -> ApiResult<UserListResponse> {
    let users: Vec<UserProfile> = admin::list_users(&state.db)
        .map_err(ApiError::op("LIST_USERS_FAILED"))?
        .into_iter()
        .map(UserProfile::from)
        .collect();
    audit_log!(&state.files, AuditEventType::AdminAccess, &user);
    let total = users.len();
    ok(UserListResponse { users, total })
}

#[utoipa::path(
    post,
    path = "/api/admin/set-user-status",
    tag = "Admin",
    request_body = SetUserStatusRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_user_status(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SetUserStatusRequest>,
) -> ApiResult<UserProfile> {
    let updated = admin::set_user_status(&state.db, &user.user_id, &req.user_id, req.active, Utc::now())
        .map_err(ApiError::op("SET_USER_STATUS_FAILED"))?;
    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::UserStatusChanged)
            .with_user(&user.user_id)
            .with_resource("user", &req.user_id)
            .with_details(serde_json::json!({ "active": req.active })),
    );
    ok(updated.into())
}

/// Search audit events. Defaults to today; ranges are capped at 92 days.
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn query_audit_logs(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<AuditLogResponse> {
    const CODE: &str = "AUDIT_QUERY_FAILED";
    let today = Utc::now().date_naive();
    let parse = |raw: Option<&str>, name: &str| -> Result<NaiveDate, ApiError> {
        match raw {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request(CODE, format!("Invalid {name} format. Use YYYY-MM-DD."))),
            None => Ok(today),
        }
    };
    let start = parse(params.start_date.as_deref(), "start_date")?;
    let end = parse(params.end_date.as_deref(), "end_date")?;
    if start > end {
        return Err(ApiError::bad_request(CODE, "start_date must not be after end_date"));
    }
    if (end - start).num_days() > MAX_AUDIT_RANGE_DAYS {
        return Err(ApiError::bad_request(
            CODE,
            format!("Date range is limited to {MAX_AUDIT_RANGE_DAYS} days"),
        ));
    }

    let filter = AuditFilter {
        user_id: params.user_id.as_deref(),
        event_type: params.event_type.as_deref(),
        resource_type: params.resource_type.as_deref(),
        resource_id: params.resource_id.as_deref(),
    };
    let events = AuditRepository::new(&state.files)
        .query(start, end, &filter)
        .map_err(|e| ApiError::from_market(CODE, MarketError::from(e)))?;

    let total = events.len();
    let limit = params.limit.unwrap_or(100).min(1000);
    let offset = params.offset.unwrap_or(0);
    let has_more = offset + limit < total;
    let events: Vec<AuditEvent> = events.into_iter().skip(offset).take(limit).collect();

    audit_log!(&state.files, AuditEventType::AdminAccess, &user);
    ok(AuditLogResponse {
        events,
        total,
        has_more,
    })
}
