// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request bodies and response payloads of the JSON endpoints. Responses
//! are wrapped in `{"data": ...}` by the handlers.
//!
//! ## Model Categories
//!
//! - **Accounts**: registration, login, profile
//! - **Posts**: publishing, browsing, status and deals
//! - **Points**: ledger pages, recharges, invitations
//! - **Admin**: reviews, QR codes, moderation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::market::batch::Draft;
use crate::market::posts::NewPost;
use crate::storage::{StoredPointTransaction, StoredUser, UserStatus};

// =============================================================================
// Accounts
// =============================================================================

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wechat_id: Option<String>,
    pub invite_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
    pub points: i64,
    pub total_posts: u32,
    pub total_invites: u32,
    pub is_admin: bool,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserProfile {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            phone: user.phone,
            wechat_id: user.wechat_id,
            invite_code: user.invite_code,
            invited_by: user.invited_by,
            points: user.points,
            total_posts: user.total_posts,
            total_invites: user.total_invites,
            is_admin: user.is_admin,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub wechat_id: Option<String>,
    #[serde(default)]
    pub invite_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

/// Account plus a fresh session token.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckUserRequest {
    pub phone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckUserResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// Empty or absent clears the contact.
    #[serde(default)]
    pub wechat_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Posts
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishPostRequest {
    pub title: String,
    pub keywords: String,
    pub price: f64,
    pub trade_type: u8,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_days: Option<u32>,
    #[serde(default)]
    pub extra_info: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    /// Paid contact views; defaults to 10.
    #[serde(default)]
    pub view_limit: Option<u32>,
}

impl From<PublishPostRequest> for NewPost {
    fn from(req: PublishPostRequest) -> Self {
        NewPost {
            title: req.title,
            keywords: req.keywords,
            price: req.price,
            trade_type: req.trade_type,
            delivery_date: req.delivery_date,
            delivery_days: req.delivery_days,
            extra_info: req.extra_info,
            category_id: req.category_id,
            view_limit: req.view_limit,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GetPostsRequest {
    /// `0` or absent: any trade type.
    #[serde(default)]
    pub trade_type: Option<u8>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostIdRequest {
    pub post_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmDealRequest {
    pub post_id: String,
    pub confirmed: bool,
}

// =============================================================================
// Points
// =============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ListTransactionsRequest {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionPage {
    pub transactions: Vec<StoredPointTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RechargeRequestBody {
    pub amount: f64,
    #[serde(default)]
    pub is_custom: bool,
    /// Payment screenshot as a data URL or bare base64.
    pub screenshot_data: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ListRechargesRequest {
    /// `0` pending, `1` approved, `2` rejected; absent lists all.
    #[serde(default)]
    pub status: Option<u8>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveRechargeRequest {
    pub request_id: String,
    pub approved: bool,
    #[serde(default)]
    pub admin_note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BindInviteRequest {
    pub invite_code: String,
}

// =============================================================================
// Batch, files, payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStep {
    Parse,
    Publish,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchPublishRequest {
    pub step: BatchStep,
    #[serde(default)]
    pub text_input: Option<String>,
    #[serde(default)]
    pub trade_type: Option<u8>,
    #[serde(default)]
    pub drafts: Option<Vec<Draft>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadFileRequest {
    pub file_data: String,
    #[serde(default)]
    pub file_name: Option<String>,
    pub bucket: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveQrCodeRequest {
    pub payment_type: String,
    pub qr_code_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetUserStatusRequest {
    pub user_id: String,
    pub active: bool,
}
