// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upload and download of stored files, plus the public payment QR codes.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::{
    audit_log,
    auth::Auth,
    error::{ok, ApiError, ApiJson, ApiResult},
    market::{
        files::{self, UploadRequest, UploadedFile},
        payments,
    },
    models::UploadFileRequest,
    state::AppState,
    storage::{AuditEventType, StoredQrCode},
};

#[utoipa::path(
    post,
    path = "/api/upload-file",
    tag = "Files",
    request_body = UploadFileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stored file and its public URL", body = UploadedFile),
        (status = 400, description = "Bad payload, name or size"),
        (status = 409, description = "File name already taken")
    )
)]
pub async fn upload_file(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UploadFileRequest>,
) -> ApiResult<UploadedFile> {
    let uploaded = files::upload_file(
        &state.files,
        &state.public_base_url,
        &user.user_id,
        UploadRequest {
            file_data: req.file_data,
            file_name: req.file_name,
            bucket: req.bucket,
        },
        Utc::now(),
    )
    .map_err(ApiError::op("UPLOAD_FAILED"))?;
    audit_log!(&state.files, AuditEventType::FileUploaded, &user, "file", &uploaded.url);
    ok(uploaded)
}

/// Serve a stored file with its content type.
#[utoipa::path(
    get,
    path = "/files/{bucket}/{name}",
    tag = "Files",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("name" = String, Path, description = "File name")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "No such file")
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let file = files::get_file(&state.files, &bucket, &name).map_err(ApiError::op("GET_FILE_FAILED"))?;
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        file.bytes,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/get-payment-qrcodes",
    tag = "Files",
    responses(
        (status = 200, description = "Active payment QR codes", body = [StoredQrCode])
    )
)]
pub async fn get_payment_qrcodes(State(state): State<AppState>) -> ApiResult<Vec<StoredQrCode>> {
    ok(payments::get_payment_qrcodes(&state.db).map_err(ApiError::op("GET_QRCODES_FAILED"))?)
}
