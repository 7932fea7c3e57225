// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recharge requests and their admin review.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::files::{upload_file, UploadRequest, SCREENSHOT_BUCKET};
use super::ledger::{apply_points, PointsChange};
use super::rules::recharge_points;
use super::{MarketError, MarketResult};
use crate::storage::{
    ChangeType, FileStore, MarketDb, RechargeReads, RechargeStatus, StoredRechargeRequest,
    UserReads,
};

#[derive(Debug, Clone)]
pub struct NewRecharge {
    pub amount: f64,
    pub is_custom: bool,
    /// Payment screenshot as a data URL.
    pub screenshot_data: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewOutcome {
    pub request: StoredRechargeRequest,
    /// Balance after crediting, present for approvals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    pub message: String,
}

/// Submit a recharge for review. Points are derived from the amount.
pub fn recharge_request(
    db: &MarketDb,
    files: &FileStore,
    base_url: &str,
    user_id: &str,
    input: NewRecharge,
    now: DateTime<Utc>,
) -> MarketResult<StoredRechargeRequest> {
    let (points, package_name) = recharge_points(input.amount, input.is_custom)?;
    if input.screenshot_data.trim().is_empty() {
        return Err(MarketError::validation("A payment screenshot is required"));
    }
    if db.read(|t| Ok::<_, MarketError>(t.user(user_id)?))?.is_none() {
        return Err(MarketError::not_found("User not found"));
    }

    let screenshot = upload_file(
        files,
        base_url,
        user_id,
        UploadRequest {
            file_data: input.screenshot_data,
            file_name: None,
            bucket: SCREENSHOT_BUCKET.to_string(),
        },
        now,
    )?;

    let request = StoredRechargeRequest {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        amount: input.amount,
        points,
        package_name,
        is_custom: input.is_custom,
        screenshot_url: Some(screenshot.url),
        status: RechargeStatus::Pending,
        admin_id: None,
        admin_note: None,
        created_at: now,
        processed_at: None,
    };
    db.write(|t| Ok::<_, MarketError>(t.put_recharge_request(&request)?))?;

    tracing::info!(
        user_id = %user_id,
        request_id = %request.id,
        amount = request.amount,
        points = request.points,
        "Recharge requested"
    );
    Ok(request)
}

pub fn my_recharge_requests(db: &MarketDb, user_id: &str) -> MarketResult<Vec<StoredRechargeRequest>> {
    db.read(|t| Ok(t.recharge_requests(Some(user_id), None)?))
}

pub fn admin_list_recharges(
    db: &MarketDb,
    status: Option<RechargeStatus>,
) -> MarketResult<Vec<StoredRechargeRequest>> {
    db.read(|t| Ok(t.recharge_requests(None, status)?))
}

/// Approve or reject a pending request.
///
/// Approval credits the points fixed at request time. Both outcomes are
/// terminal: a processed request cannot be reviewed again.
pub fn admin_approve_recharge(
    db: &MarketDb,
    admin_id: &str,
    request_id: &str,
    approved: bool,
    admin_note: Option<String>,
    now: DateTime<Utc>,
) -> MarketResult<ReviewOutcome> {
    let outcome = db.write(|t| {
        let mut request = t
            .recharge_request(request_id)?
            .ok_or_else(|| MarketError::not_found("Recharge request not found"))?;
        if request.status != RechargeStatus::Pending {
            return Err(MarketError::AlreadyProcessed(
                "Recharge request already processed".to_string(),
            ));
        }

        let balance = if approved {
            let mut user = t
                .user(&request.user_id)?
                .ok_or_else(|| MarketError::not_found("User not found"))?;
            apply_points(
                t,
                &mut user,
                PointsChange::new(
                    ChangeType::Recharge,
                    request.points,
                    format!("Recharge of {} yuan ({})", request.amount, request.package_name),
                )
                .related_to(request.id.clone()),
                now,
            )?;
            Some(user.points)
        } else {
            None
        };

        request.status = if approved {
            RechargeStatus::Approved
        } else {
            RechargeStatus::Rejected
        };
        request.admin_id = Some(admin_id.to_string());
        request.admin_note = admin_note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        request.processed_at = Some(now);
        t.put_recharge_request(&request)?;

        let message = if approved {
            "Recharge approved, points credited".to_string()
        } else {
            "Recharge rejected".to_string()
        };
        Ok(ReviewOutcome {
            request,
            balance,
            message,
        })
    })?;

    tracing::info!(
        admin_id = %admin_id,
        request_id = %request_id,
        approved,
        "Recharge reviewed"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::{seed_user, temp_db};
    use crate::storage::{LedgerReads, StoragePaths};
    use tempfile::TempDir;

    const SCREENSHOT: &str = "data:image/png;base64,aGVsbG8=";

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let mut files = FileStore::new(StoragePaths::new(dir.path()));
        files.initialize().unwrap();
        (dir, files)
    }

    fn recharge(amount: f64, is_custom: bool) -> NewRecharge {
        NewRecharge {
            amount,
            is_custom,
            screenshot_data: SCREENSHOT.to_string(),
        }
    }

    #[test]
    fn request_stores_screenshot_and_derives_points() {
        let (db, _db_dir) = temp_db();
        let (_files_dir, files) = store();
        let user = seed_user(&db, "13800000001", 0);

        let request =
            recharge_request(&db, &files, "http://x", &user.id, recharge(100.0, false), Utc::now())
                .unwrap();
        assert_eq!(request.points, 115);
        assert_eq!(request.package_name, "充值套餐B");
        assert_eq!(request.status, RechargeStatus::Pending);

        let url = request.screenshot_url.unwrap();
        let name = url.rsplit('/').next().unwrap();
        assert!(files.read_upload(SCREENSHOT_BUCKET, name).is_ok());
        assert_eq!(my_recharge_requests(&db, &user.id).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_requests_do_not_share_a_screenshot() {
        let (db, _db_dir) = temp_db();
        let (_files_dir, files) = store();
        let user = seed_user(&db, "13800000003", 0);
        let now = Utc::now();

        let mut other = recharge(300.0, false);
        other.screenshot_data = "data:image/png;base64,d29ybGQ=".to_string();
        let first =
            recharge_request(&db, &files, "http://x", &user.id, recharge(100.0, false), now).unwrap();
        let second = recharge_request(&db, &files, "http://x", &user.id, other, now).unwrap();

        let first_url = first.screenshot_url.unwrap();
        let second_url = second.screenshot_url.unwrap();
        assert_ne!(first_url, second_url);
        let bytes = |url: &str| {
            let name = url.rsplit('/').next().unwrap();
            files.read_upload(SCREENSHOT_BUCKET, name).unwrap().bytes
        };
        assert_eq!(bytes(&first_url), b"hello");
        assert_eq!(bytes(&second_url), b"world");
    }

    #[test]
    fn request_requires_screenshot_and_valid_amount() {
        let (db, _db_dir) = temp_db();
        let (_files_dir, files) = store();
        let user = seed_user(&db, "13800000002", 0);

        let mut missing = recharge(50.0, false);
        missing.screenshot_data = String::new();
        assert!(recharge_request(&db, &files, "http://x", &user.id, missing, Utc::now()).is_err());
        assert!(
            recharge_request(&db, &files, "http://x", &user.id, recharge(77.0, false), Utc::now())
                .is_err()
        );
        assert!(admin_list_recharges(&db, None).unwrap().is_empty());
    }

    #[test]
    fn approval_credits_once() {
        let (db, _db_dir) = temp_db();
        let (_files_dir, files) = store();
        let user = seed_user(&db, "13800000003", 10);
        let request =
            recharge_request(&db, &files, "http://x", &user.id, recharge(66.6, true), Utc::now())
                .unwrap();
        assert_eq!(request.points, 66);

        let outcome =
            admin_approve_recharge(&db, "admin", &request.id, true, Some("ok".into()), Utc::now())
                .unwrap();
        assert_eq!(outcome.balance, Some(76));
        assert_eq!(outcome.request.status, RechargeStatus::Approved);

        let err = admin_approve_recharge(&db, "admin", &request.id, true, None, Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::AlreadyProcessed(_)));

        let rows = db.read(|t| t.ledger_for_user(&user.id)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].change_type, ChangeType::Recharge);
        assert_eq!(rows[0].related_id.as_deref(), Some(request.id.as_str()));
    }

    #[test]
    fn rejection_only_updates_status() {
        let (db, _db_dir) = temp_db();
        let (_files_dir, files) = store();
        let user = seed_user(&db, "13800000004", 10);
        let request =
            recharge_request(&db, &files, "http://x", &user.id, recharge(500.0, false), Utc::now())
                .unwrap();

        let outcome = admin_approve_recharge(&db, "admin", &request.id, false, None, Utc::now()).unwrap();
        assert_eq!(outcome.request.status, RechargeStatus::Rejected);
        assert!(outcome.balance.is_none());
        assert_eq!(db.read(|t| t.user(&user.id)).unwrap().unwrap().points, 10);

        let pending = admin_list_recharges(&db, Some(RechargeStatus::Pending)).unwrap();
        assert!(pending.is_empty());
        assert!(matches!(
            admin_approve_recharge(&db, "admin", "missing", true, None, Utc::now()),
            Err(MarketError::NotFound(_))
        ));
    }
}
