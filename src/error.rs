// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error and success envelopes.
//!
//! Success bodies are `{"data": ...}`; failures are
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::market::MarketError;
use crate::storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Success wrapper.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope { data }))
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    /// Map a domain error under an operation's error code.
    ///
    /// ```rust,ignore
    /// publish_post(..).map_err(ApiError::op("PUBLISH_FAILED"))?;
    /// ```
    pub fn op(code: &'static str) -> impl FnOnce(MarketError) -> ApiError {
        move |err| ApiError::from_market(code, err)
    }

    pub fn from_market(code: &'static str, err: MarketError) -> Self {
        let status = match &err {
            MarketError::Validation(_) => StatusCode::BAD_REQUEST,
            MarketError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Conflict(_) => StatusCode::CONFLICT,
            MarketError::InsufficientPoints { .. } | MarketError::AlreadyProcessed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MarketError::Upstream(_) => StatusCode::BAD_GATEWAY,
            MarketError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            MarketError::Storage(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
            MarketError::Storage(StorageError::InvalidName(_) | StorageError::TooLarge { .. }) => {
                StatusCode::BAD_REQUEST
            }
            MarketError::Internal(_) | MarketError::Database(_) | MarketError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code, error = %err, "Request failed");
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody::new(self.code, self.message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("INVALID_REQUEST", rejection.body_text())
    }
}

/// `Json` extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
