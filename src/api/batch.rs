// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Two-step batch listing: parse pasted text, then publish the drafts.

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::{ok, ApiError, ApiJson, ApiResult},
    market::{
        batch::{self, BatchPublishReport, ParsedDrafts},
        MarketError,
    },
    models::{BatchPublishRequest, BatchStep},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository},
};

const CODE: &str = "AI_BATCH_PUBLISH_FAILED";

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum BatchResponse {
    Parsed(ParsedDrafts),
    Published(BatchPublishReport),
}

#[utoipa::path(
    post,
    path = "/api/ai-batch-publish-v2",
    tag = "Posts",
    request_body = BatchPublishRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Parsed drafts or publish report", body = BatchResponse),
        (status = 400, description = "Missing text or drafts"),
        (status = 502, description = "AI parsing failed and the rule parser found nothing")
    )
)]
pub async fn batch_publish(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BatchPublishRequest>,
) -> ApiResult<BatchResponse> {
    match req.step {
        BatchStep::Parse => {
            let text = req
                .text_input
                .ok_or_else(|| ApiError::from_market(CODE, MarketError::validation("text_input is required")))?;
            let parsed = batch::parse_drafts(state.ai.as_deref(), &text, req.trade_type)
                .await
                .map_err(ApiError::op(CODE))?;
            tracing::info!(user_id = %user.user_id, count = parsed.count, source = ?parsed.source, "Batch text parsed");
            ok(BatchResponse::Parsed(parsed))
        }
        BatchStep::Publish => {
            let drafts = req
                .drafts
                .ok_or_else(|| ApiError::from_market(CODE, MarketError::validation("drafts are required")))?;
            let report = batch::publish_drafts(&state.db, &user.user_id, drafts, req.trade_type, Utc::now())
                .map_err(ApiError::op(CODE))?;
            AuditRepository::new(&state.files).record(
                AuditEvent::new(AuditEventType::BatchPublished)
                    .with_user(&user.user_id)
                    .with_details(serde_json::json!({
                        "success_count": report.success_count,
                        "total_count": report.total_count,
                    })),
            );
            ok(BatchResponse::Published(report))
        }
    }
}
