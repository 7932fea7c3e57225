// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ErrorBody, ErrorDetail},
    market::{
        admin::MarketStats,
        batch::{BatchPublishReport, Draft, DraftFailure, DraftSource, ParsedDrafts},
        cleanup::{CleanupReport, CleanupSummary, ExpiredPost, ExpiryReport, ViolationDetail},
        contacts::ContactReveal,
        files::UploadedFile,
        posts::{DealConfirmation, PostPage, PublishedPost, ToggleOutcome},
        recharge::ReviewOutcome,
        referrals::{InvitationInfo, InvitationStatistics, ReferralReward},
    },
    models::{
        ApproveRechargeRequest, BatchPublishRequest, BatchStep, BindInviteRequest,
        ChangePasswordRequest, CheckUserRequest, CheckUserResponse, ConfirmDealRequest,
        GetPostsRequest, ListRechargesRequest, ListTransactionsRequest, LoginRequest,
        MessageResponse, PostIdRequest, PublishPostRequest, RechargeRequestBody, RegisterRequest,
        SaveQrCodeRequest, SessionResponse, SetUserStatusRequest, TransactionPage,
        UpdateProfileRequest, UploadFileRequest, UserProfile,
    },
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, ChangeType, PaymentType, PostStatus, RechargeStatus,
        StoredInvitation, StoredPointTransaction, StoredPost, StoredQrCode,
        StoredRechargeRequest, TradeType,
    },
};

pub mod accounts;
pub mod admin;
pub mod batch;
pub mod files;
pub mod health;
pub mod points;
pub mod posts;

/// Base64 bodies carry up to 5 MiB of decoded bytes.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Accounts
        .route("/register-with-password", post(accounts::register))
        .route("/login-with-password", post(accounts::login))
        .route("/check-user-exists", post(accounts::check_user_exists))
        .route("/change-password", post(accounts::change_password))
        .route("/me", get(accounts::me))
        .route("/update-profile", post(accounts::update_profile))
        // Posts
        .route("/get-posts", post(posts::get_posts))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/publish-post", post(posts::publish_post))
        .route("/my-posts", post(posts::my_posts))
        .route("/toggle-post-status", post(posts::toggle_post_status))
        .route("/view-contact", post(posts::view_contact))
        .route("/confirm-deal", post(posts::confirm_deal))
        .route("/ai-batch-publish-v2", post(batch::batch_publish))
        // Points
        .route("/list-transactions", post(points::list_transactions))
        .route("/recharge-request", post(points::recharge_request))
        .route("/my-recharge-requests", post(points::my_recharge_requests))
        .route("/get-invitation-info", post(points::invitation_info))
        .route("/process-referral-reward", post(points::bind_invite_code))
        // Files
        .route("/upload-file", post(files::upload_file))
        .route("/get-payment-qrcodes", get(files::get_payment_qrcodes))
        // Admin
        .route("/admin-list-recharges", post(admin::list_recharges))
        .route("/admin-approve-recharge", post(admin::approve_recharge))
        .route("/auto-expire-posts", post(admin::auto_expire_posts))
        .route("/manual-expire-fix", post(admin::manual_expire_fix))
        .route("/emergency-data-cleanup", post(admin::emergency_data_cleanup))
        .route("/save-payment-qrcode", post(admin::save_payment_qrcode))
        .route("/admin/stats", get(admin::get_stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/set-user-status", post(admin::set_user_status))
        .route("/admin/audit", get(admin::query_audit_logs));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/api", api_routes)
        .route("/files/{bucket}/{name}", get(files::get_file))
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
}

/// Browser clients call from any origin with a bearer token.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
        .max_age(Duration::from_secs(86_400))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        accounts::register,
        accounts::login,
        accounts::check_user_exists,
        accounts::change_password,
        accounts::me,
        accounts::update_profile,
        posts::get_posts,
        posts::get_post,
        posts::publish_post,
        posts::my_posts,
        posts::toggle_post_status,
        posts::view_contact,
        posts::confirm_deal,
        batch::batch_publish,
        points::list_transactions,
        points::recharge_request,
        points::my_recharge_requests,
        points::invitation_info,
        points::bind_invite_code,
        files::upload_file,
        files::get_file,
        files::get_payment_qrcodes,
        admin::list_recharges,
        admin::approve_recharge,
        admin::auto_expire_posts,
        admin::manual_expire_fix,
        admin::emergency_data_cleanup,
        admin::save_payment_qrcode,
        admin::get_stats,
        admin::list_users,
        admin::set_user_status,
        admin::query_audit_logs,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ErrorBody,
            ErrorDetail,
            UserProfile,
            RegisterRequest,
            LoginRequest,
            SessionResponse,
            CheckUserRequest,
            CheckUserResponse,
            ChangePasswordRequest,
            UpdateProfileRequest,
            MessageResponse,
            PublishPostRequest,
            GetPostsRequest,
            PostIdRequest,
            ConfirmDealRequest,
            PostPage,
            PublishedPost,
            ToggleOutcome,
            DealConfirmation,
            ContactReveal,
            StoredPost,
            PostStatus,
            TradeType,
            BatchPublishRequest,
            BatchStep,
            Draft,
            DraftSource,
            DraftFailure,
            ParsedDrafts,
            BatchPublishReport,
            batch::BatchResponse,
            ListTransactionsRequest,
            TransactionPage,
            StoredPointTransaction,
            ChangeType,
            RechargeRequestBody,
            StoredRechargeRequest,
            RechargeStatus,
            ListRechargesRequest,
            ApproveRechargeRequest,
            ReviewOutcome,
            BindInviteRequest,
            StoredInvitation,
            InvitationInfo,
            InvitationStatistics,
            ReferralReward,
            UploadFileRequest,
            UploadedFile,
            SaveQrCodeRequest,
            StoredQrCode,
            PaymentType,
            ExpiryReport,
            ExpiredPost,
            CleanupReport,
            CleanupSummary,
            ViolationDetail,
            MarketStats,
            SetUserStatusRequest,
            admin::StatsResponse,
            admin::UserListResponse,
            admin::AuditLogResponse,
            AuditEvent,
            AuditEventType,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Accounts", description = "Registration, login and profile"),
        (name = "Posts", description = "Listings, contact views and deals"),
        (name = "Points", description = "Ledger, recharges and invitations"),
        (name = "Files", description = "Uploads and payment QR codes"),
        (name = "Admin", description = "Review, maintenance and moderation"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{register_admin, register_user, test_state, TEST_PASSWORD};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let _ = router(state).into_make_service();
    }

    #[tokio::test]
    async fn register_publish_and_view_contact() {
        let (state, _dir) = test_state();
        let app = router(state);

        let response = send(
            &app,
            "POST",
            "/api/register-with-password",
            None,
            Some(json!({ "phone": "13800000001", "password": TEST_PASSWORD, "wechat_id": "seller_wx" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let seller = json_body(response).await;
        let seller_token = seller["data"]["token"].as_str().unwrap().to_string();

        let response = send(
            &app,
            "POST",
            "/api/publish-post",
            Some(&seller_token),
            Some(json!({ "title": "茅台", "keywords": "白酒", "price": 2499.0, "trade_type": 2 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let published = json_body(response).await;
        let post_id = published["data"]["post"]["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            "POST",
            "/api/register-with-password",
            None,
            Some(json!({ "phone": "13800000002", "password": TEST_PASSWORD })),
        )
        .await;
        let buyer_token = json_body(response).await["data"]["token"].as_str().unwrap().to_string();

        let response = send(
            &app,
            "POST",
            "/api/view-contact",
            Some(&buyer_token),
            Some(json!({ "post_id": post_id })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let reveal = json_body(response).await;
        assert_eq!(reveal["data"]["wechat_id"], "seller_wx");
        assert_eq!(reveal["data"]["already_viewed"], false);

        let response = send(&app, "GET", "/api/me", Some(&buyer_token), None).await;
        let me = json_body(response).await;
        assert_eq!(me["data"]["points"], 99);
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let (state, _dir) = test_state();
        let app = router(state);
        let request = Request::builder()
            .method("POST")
            .uri("/api/login-with-password")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (state, _dir) = test_state();
        register_user(&state, "13800000003");
        let app = router(state);
        let response = send(
            &app,
            "POST",
            "/api/login-with-password",
            None,
            Some(json!({ "phone": "13800000003", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "LOGIN_FAILED");
    }

    #[tokio::test]
    async fn admin_routes_reject_regular_users() {
        let (state, _dir) = test_state();
        let (_, user_token) = register_user(&state, "13800000004");
        let (_, admin_token) = register_admin(&state, "13800000005");
        let app = router(state);

        let response = send(&app, "GET", "/api/admin/stats", Some(&user_token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&app, "GET", "/api/admin/stats", Some(&admin_token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stats = json_body(response).await;
        assert_eq!(stats["data"]["user_count"], 2);
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let (state, _dir) = test_state();
        let app = router(state);
        let response = send(&app, "POST", "/api/my-posts", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "MISSING_AUTH_HEADER");
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (state, _dir) = test_state();
        let app = router(state);
        let response = send(&app, "GET", "/health/live", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
