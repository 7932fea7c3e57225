// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login and profile endpoints.

use axum::extract::State;
use chrono::Utc;

use crate::{
    audit_log,
    auth::{Auth, Role},
    error::{ok, ApiError, ApiJson, ApiResult},
    market::{accounts, MarketError},
    models::{
        ChangePasswordRequest, CheckUserRequest, CheckUserResponse, LoginRequest,
        MessageResponse, RegisterRequest, SessionResponse, UpdateProfileRequest, UserProfile,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository, StoredUser},
};

fn session(state: &AppState, user: StoredUser, code: &'static str) -> Result<SessionResponse, ApiError> {
    let issued = state
        .tokens
        .issue(&user.id, Role::for_admin_flag(user.is_admin), Utc::now())
        .map_err(|e| ApiError::from_market(code, MarketError::from(e)))?;
    Ok(SessionResponse {
        user: user.into(),
        token: issued.token,
        expires_at: issued.expires_at,
    })
}

/// Create an account with the 100-point bonus and return a session.
#[utoipa::path(
    post,
    path = "/api/register-with-password",
    tag = "Accounts",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid phone, password or WeChat ID"),
        (status = 409, description = "Phone already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<SessionResponse> {
    let user = accounts::register(
        &state.db,
        &state.rng,
        accounts::NewAccount {
            phone: req.phone,
            password: req.password,
            wechat_id: req.wechat_id,
            invite_code: req.invite_code,
        },
        Utc::now(),
    )
    .map_err(ApiError::op("REGISTER_FAILED"))?;

    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::UserRegistered)
            .with_user(&user.id)
            .with_details(serde_json::json!({ "invited": user.invited_by.is_some() })),
    );
    ok(session(&state, user, "REGISTER_FAILED")?)
}

#[utoipa::path(
    post,
    path = "/api/login-with-password",
    tag = "Accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 401, description = "Wrong phone or password"),
        (status = 403, description = "Account disabled")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<SessionResponse> {
    let audit = AuditRepository::new(&state.files);
    let user = match accounts::login(&state.db, &req.phone, &req.password) {
        Ok(user) => user,
        Err(e) => {
            audit.record(
                AuditEvent::new(AuditEventType::LoginFailed)
                    .with_details(serde_json::json!({ "phone": req.phone.trim() }))
                    .failed(e.to_string()),
            );
            return Err(ApiError::from_market("LOGIN_FAILED", e));
        }
    };

    audit.record(AuditEvent::new(AuditEventType::LoginSucceeded).with_user(&user.id));
    ok(session(&state, user, "LOGIN_FAILED")?)
}

#[utoipa::path(
    post,
    path = "/api/check-user-exists",
    tag = "Accounts",
    request_body = CheckUserRequest,
    responses(
        (status = 200, description = "Whether the phone is registered", body = CheckUserResponse),
        (status = 400, description = "Malformed phone number")
    )
)]
pub async fn check_user_exists(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckUserRequest>,
) -> ApiResult<CheckUserResponse> {
    let exists = accounts::check_user_exists(&state.db, &req.phone)
        .map_err(ApiError::op("CHECK_USER_FAILED"))?;
    ok(CheckUserResponse { exists })
}

#[utoipa::path(
    post,
    path = "/api/change-password",
    tag = "Accounts",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password breaks the rules"),
        (status = 401, description = "Current password incorrect")
    )
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<MessageResponse> {
    accounts::change_password(
        &state.db,
        &state.rng,
        &user.user_id,
        &req.old_password,
        &req.new_password,
        Utc::now(),
    )
    .map_err(ApiError::op("CHANGE_PASSWORD_FAILED"))?;

    audit_log!(&state.files, AuditEventType::PasswordChanged, &user);
    ok(MessageResponse::new("Password changed"))
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current account", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(Auth(user): Auth, State(state): State<AppState>) -> ApiResult<UserProfile> {
    let stored = accounts::load_user(&state.db, &user.user_id).map_err(ApiError::op("GET_PROFILE_FAILED"))?;
    ok(stored.into())
}

#[utoipa::path(
    post,
    path = "/api/update-profile",
    tag = "Accounts",
    request_body = UpdateProfileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = UserProfile),
        (status = 400, description = "Invalid WeChat ID")
    )
)]
pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<UserProfile> {
    let stored = accounts::update_profile(&state.db, &user.user_id, req.wechat_id.as_deref(), Utc::now())
        .map_err(ApiError::op("UPDATE_PROFILE_FAILED"))?;
    audit_log!(&state.files, AuditEventType::ProfileUpdated, &user);
    ok(stored.into())
}
