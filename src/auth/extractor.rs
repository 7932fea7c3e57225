// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthenticatedUser, AuthError, Role};
use crate::state::AppState;
use crate::storage::UserReads;

/// Extractor for authenticated users.
///
/// Verifies the bearer session token, then loads the account: deleted
/// accounts are rejected with 401, disabled ones with 403, and the role
/// always comes from the stored account.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(token)?;

        let account = state
            .db
            .read(|t| t.user(&claims.sub))
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .ok_or(AuthError::UnknownUser)?;
        if !account.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        let user = AuthenticatedUser::from_claims(claims, Role::for_admin_flag(account.is_admin));
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{register_user, test_state};
    use crate::storage::UserStatus;
    use axum::http::Request;
    use chrono::Utc;

    fn parts_with_token(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts_with_token(None);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_session_token() {
        let (state, _temp_dir) = test_state();
        let (user, token) = register_user(&state, "13800000001");
        let mut parts = parts_with_token(Some(&token));

        let Auth(authed) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(authed.user_id, user.id);
        assert_eq!(authed.role, Role::User);
    }

    #[tokio::test]
    async fn disabled_account_is_rejected() {
        let (state, _temp_dir) = test_state();
        let (mut user, token) = register_user(&state, "13800000002");
        user.status = UserStatus::Disabled;
        state
            .db
            .write(|t| t.update_user(&user))
            .unwrap();

        let mut parts = parts_with_token(Some(&token));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn unknown_account_is_rejected() {
        let (state, _temp_dir) = test_state();
        let issued = state.tokens.issue("ghost", Role::Admin, Utc::now()).unwrap();
        let mut parts = parts_with_token(Some(&issued.token));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::UnknownUser)));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts_with_token(None);
        parts.extensions.insert(AuthenticatedUser {
            user_id: "user_from_extensions".to_string(),
            role: Role::Admin,
            session_id: None,
            expires_at: 0,
        });

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_from_extensions");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _temp_dir) = test_state();
        let (_user, token) = register_user(&state, "13800000003");
        let mut parts = parts_with_token(Some(&token));
        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let (state, _temp_dir) = test_state();
        let mut parts = parts_with_token(Some("garbage"));
        assert!(Auth::from_request_parts(&mut parts, &state).await.is_err());
    }
}
