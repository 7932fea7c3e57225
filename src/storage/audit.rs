// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for points-moving and administrative operations.
//!
//! Events are appended to `audit/{date}/events.jsonl`, one JSON object per
//! line. Audit write failures are logged and never fail the request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStore, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    UserRegistered,
    LoginSucceeded,
    LoginFailed,
    PasswordChanged,
    ProfileUpdated,

    // Post events
    PostPublished,
    PostStatusToggled,
    ContactViewed,
    DealConfirmed,
    BatchPublished,

    // Points events
    RechargeRequested,
    RechargeReviewed,
    ReferralBound,
    ReferralRewarded,

    // Maintenance events
    PostsExpired,
    EmergencyCleanup,

    // Admin events
    QrCodeSaved,
    UserStatusChanged,
    FileUploaded,
    AdminAccess,
}

impl AuditEventType {
    /// Wire name (`post_published`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserRegistered => "user_registered",
            Self::LoginSucceeded => "login_succeeded",
            Self::LoginFailed => "login_failed",
            Self::PasswordChanged => "password_changed",
            Self::ProfileUpdated => "profile_updated",
            Self::PostPublished => "post_published",
            Self::PostStatusToggled => "post_status_toggled",
            Self::ContactViewed => "contact_viewed",
            Self::DealConfirmed => "deal_confirmed",
            Self::BatchPublished => "batch_published",
            Self::RechargeRequested => "recharge_requested",
            Self::RechargeReviewed => "recharge_reviewed",
            Self::ReferralBound => "referral_bound",
            Self::ReferralRewarded => "referral_rewarded",
            Self::PostsExpired => "posts_expired",
            Self::EmergencyCleanup => "emergency_cleanup",
            Self::QrCodeSaved => "qr_code_saved",
            Self::UserStatusChanged => "user_status_changed",
            Self::FileUploaded => "file_uploaded",
            Self::AdminAccess => "admin_access",
        }
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (post_id, recharge request id, ...).
    pub resource_id: Option<String>,
    /// Resource type (post, recharge_request, ...).
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Filters for [`AuditRepository::query`].
#[derive(Debug, Default)]
pub struct AuditFilter<'a> {
    pub user_id: Option<&'a str>,
    pub event_type: Option<&'a str>,
    pub resource_type: Option<&'a str>,
    pub resource_id: Option<&'a str>,
}

impl AuditFilter<'_> {
    fn matches(&self, event: &AuditEvent) -> bool {
        self.user_id.is_none_or(|u| event.user_id.as_deref() == Some(u))
            && self
                .event_type
                .is_none_or(|t| event.event_type.as_str() == t)
            && self
                .resource_type
                .is_none_or(|t| event.resource_type.as_deref() == Some(t))
            && self
                .resource_id
                .is_none_or(|id| event.resource_id.as_deref() == Some(id))
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Append an event to its day's log.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);
        let line = serde_json::to_string(event)?;
        self.storage.append_line(&path, &line)
    }

    /// Log an event, downgrading failures to a warning.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                error = %e,
                event_type = %event.event_type.as_str(),
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date. A day without events is empty.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = match self.storage.read_raw(&path) {
            Ok(content) => content,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let content = String::from_utf8_lossy(&content);
        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }

    /// Read events for an inclusive date range.
    pub fn read_events_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut all_events = Vec::new();
        let mut current = start;
        while current <= end {
            all_events.extend(self.read_events(&current.format("%Y-%m-%d").to_string())?);
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(all_events)
    }

    /// Filtered events over a date range, oldest first.
    pub fn query(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: &AuditFilter<'_>,
    ) -> StorageResult<Vec<AuditEvent>> {
        Ok(self
            .read_events_range(start, end)?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }
}

/// Helper macro for logging audit events.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $user:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        repo.record($crate::storage::AuditEvent::new($event_type).with_user(&$user.user_id));
    }};
    ($storage:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        repo.record(
            $crate::storage::AuditEvent::new($event_type)
                .with_user(&$user.user_id)
                .with_resource($resource_type, $resource_id),
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    const ALL_EVENT_TYPES: [AuditEventType; 20] = [
        AuditEventType::UserRegistered,
        AuditEventType::LoginSucceeded,
        AuditEventType::LoginFailed,
        AuditEventType::PasswordChanged,
        AuditEventType::ProfileUpdated,
        AuditEventType::PostPublished,
        AuditEventType::PostStatusToggled,
        AuditEventType::ContactViewed,
        AuditEventType::DealConfirmed,
        AuditEventType::BatchPublished,
        AuditEventType::RechargeRequested,
        AuditEventType::RechargeReviewed,
        AuditEventType::ReferralBound,
        AuditEventType::ReferralRewarded,
        AuditEventType::PostsExpired,
        AuditEventType::EmergencyCleanup,
        AuditEventType::QrCodeSaved,
        AuditEventType::UserStatusChanged,
        AuditEventType::FileUploaded,
        AuditEventType::AdminAccess,
    ];

    #[test]
    fn event_type_names_match_serde() {
        for event_type in ALL_EVENT_TYPES {
            assert_eq!(
                serde_json::to_value(event_type).unwrap(),
                serde_json::Value::from(event_type.as_str()),
                "{event_type:?}"
            );
        }
        let parsed: AuditEventType = serde_json::from_str("\"qr_code_saved\"").unwrap();
        assert_eq!(parsed, AuditEventType::QrCodeSaved);
    }

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::PostPublished)
            .with_user("user_123")
            .with_resource("post", "post_abc")
            .with_details(serde_json::json!({ "cost": 10 }));

        assert_eq!(event.event_type, AuditEventType::PostPublished);
        assert_eq!(event.user_id.as_deref(), Some("user_123"));
        assert_eq!(event.resource_id.as_deref(), Some("post_abc"));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::LoginFailed).failed("bad password");
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("bad password"));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(&AuditEvent::new(AuditEventType::UserRegistered).with_user("u1"))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::ContactViewed).with_user("u2"))
            .unwrap();

        let events = repo.read_events(&today().format("%Y-%m-%d").to_string()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::UserRegistered);
        assert_eq!(events[1].event_type, AuditEventType::ContactViewed);
    }

    #[test]
    fn missing_day_reads_empty() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        assert!(repo.read_events("1999-01-01").unwrap().is_empty());
    }

    #[test]
    fn query_applies_filters() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        repo.record(
            AuditEvent::new(AuditEventType::PostPublished)
                .with_user("target")
                .with_resource("post", "p1"),
        );
        repo.record(AuditEvent::new(AuditEventType::PostPublished).with_user("other"));
        repo.record(AuditEvent::new(AuditEventType::RechargeRequested).with_user("target"));

        let filter = AuditFilter {
            user_id: Some("target"),
            event_type: Some("post_published"),
            ..Default::default()
        };
        let events = repo.query(today(), today(), &filter).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource_id.as_deref(), Some("p1"));
    }
}
