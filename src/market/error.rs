// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain errors raised by marketplace operations.

use crate::auth::AuthError;
use crate::storage::{DbError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// The request is malformed or breaks a business rule.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i64, available: i64 },

    /// The resource already reached a terminal state.
    #[error("{0}")]
    AlreadyProcessed(String),

    /// An upstream service failed and there was no usable fallback.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl MarketError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<AuthError> for MarketError {
    fn from(e: AuthError) -> Self {
        MarketError::Internal(e.to_string())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
