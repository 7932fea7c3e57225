// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Expiry and data-repair jobs.
//!
//! Every post is handled in its own transaction and re-checked inside it,
//! so one failing post never blocks the rest and a post changed since the
//! scan is left alone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::posts::delist_with_refund;
use super::rules::post_ttl;
use super::MarketResult;
use crate::storage::{ChangeType, MarketDb, PostReads, StoredPost};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpiredPost {
    pub post_id: String,
    pub title: String,
    pub refunded_points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpiryReport {
    pub message: String,
    /// Posts delisted successfully.
    pub count: usize,
    pub refunded_points: i64,
    pub results: Vec<ExpiredPost>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CleanupSummary {
    pub violating_count: usize,
    pub expired_count: usize,
    pub total_refunded_points: i64,
    pub total_processed: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViolationDetail {
    pub post_id: String,
    pub title: String,
    pub view_count: u32,
    pub view_limit: u32,
    pub excess_views: i64,
    pub refunded_points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CleanupReport {
    pub message: String,
    pub summary: CleanupSummary,
    pub violating_details: Vec<ViolationDetail>,
    pub expired_details: Vec<ExpiredPost>,
    pub timestamp: DateTime<Utc>,
}

/// Delist active posts past their `expire_at`, refunding unused views.
pub fn auto_expire_posts(db: &MarketDb, now: DateTime<Utc>) -> MarketResult<ExpiryReport> {
    let report = expire_matching(db, now, |post| post.expire_at < now)?;
    if report.count > 0 {
        tracing::info!(count = report.count, refunded = report.refunded_points, "Expired posts delisted");
    }
    Ok(report)
}

/// Delist active posts created more than one TTL ago, whatever their
/// stored `expire_at` says.
pub fn manual_expire_fix(db: &MarketDb, now: DateTime<Utc>) -> MarketResult<ExpiryReport> {
    let cutoff = now - post_ttl();
    let report = expire_matching(db, now, |post| post.created_at < cutoff)?;
    tracing::info!(count = report.count, "Manual expiry fix finished");
    Ok(report)
}

fn expire_matching<F>(db: &MarketDb, now: DateTime<Utc>, selects: F) -> MarketResult<ExpiryReport>
where
    F: Fn(&StoredPost) -> bool,
{
    let candidates: Vec<StoredPost> = db
        .read(|t| t.active_posts())?
        .into_iter()
        .filter(|p| selects(p))
        .collect();

    let mut results = Vec::with_capacity(candidates.len());
    let mut count = 0;
    let mut refunded_points = 0;
    for candidate in candidates {
        let outcome = db.write(|t| {
            let Some(mut post) = t.post(&candidate.id)? else {
                return Ok(None);
            };
            if !post.is_active() || !selects(&post) {
                return Ok(None);
            }
            delist_with_refund(t, &mut post, ChangeType::Refund, "Expired post, unused views refunded", now)
                .map(Some)
        });

        match outcome {
            Ok(Some(refund)) => {
                count += 1;
                refunded_points += refund;
                results.push(ExpiredPost {
                    post_id: candidate.id,
                    title: candidate.title,
                    refunded_points: refund,
                    error: None,
                });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(post_id = %candidate.id, error = %e, "Failed to expire post");
                results.push(ExpiredPost {
                    post_id: candidate.id,
                    title: candidate.title,
                    refunded_points: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let message = if count == 0 {
        "No expired posts found".to_string()
    } else {
        format!("Delisted {count} expired posts")
    };
    Ok(ExpiryReport {
        message,
        count,
        refunded_points,
        results,
    })
}

/// Repair posts that broke the view-limit rule, then expire stale posts.
///
/// Step one delists every active post with `view_count >= view_limit`,
/// refunding `max(0, view_limit - view_count)` as a cleanup refund. Step
/// two is [`auto_expire_posts`].
pub fn emergency_data_cleanup(db: &MarketDb, now: DateTime<Utc>) -> MarketResult<CleanupReport> {
    let violating: Vec<StoredPost> = db
        .read(|t| t.active_posts())?
        .into_iter()
        .filter(StoredPost::is_exhausted)
        .collect();

    let mut summary = CleanupSummary::default();
    let mut violating_details = Vec::with_capacity(violating.len());
    for candidate in violating {
        let excess_views = i64::from(candidate.view_count) - i64::from(candidate.view_limit);
        tracing::warn!(
            post_id = %candidate.id,
            view_count = candidate.view_count,
            view_limit = candidate.view_limit,
            "Active post over its view limit"
        );

        let outcome = db.write(|t| {
            let Some(mut post) = t.post(&candidate.id)? else {
                return Ok(None);
            };
            if !post.is_active() || !post.is_exhausted() {
                return Ok(None);
            }
            delist_with_refund(
                t,
                &mut post,
                ChangeType::CleanupRefund,
                "Data cleanup refund",
                now,
            )
            .map(Some)
        });

        let (refunded_points, error) = match outcome {
            Ok(Some(refund)) => {
                summary.violating_count += 1;
                summary.total_refunded_points += refund;
                (refund, None)
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(post_id = %candidate.id, error = %e, "Cleanup of post failed");
                (0, Some(e.to_string()))
            }
        };
        violating_details.push(ViolationDetail {
            post_id: candidate.id,
            title: candidate.title,
            view_count: candidate.view_count,
            view_limit: candidate.view_limit,
            excess_views,
            refunded_points,
            error,
        });
    }

    let expired = auto_expire_posts(db, now)?;
    summary.expired_count = expired.count;
    summary.total_refunded_points += expired.refunded_points;
    summary.total_processed = summary.violating_count + summary.expired_count;

    let message = if summary.total_processed == 0 {
        "No violating or expired posts found".to_string()
    } else {
        "Data cleanup finished".to_string()
    };
    tracing::info!(
        violating = summary.violating_count,
        expired = summary.expired_count,
        refunded = summary.total_refunded_points,
        "Emergency data cleanup finished"
    );
    Ok(CleanupReport {
        message,
        summary,
        violating_details,
        expired_details: expired.results,
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::posts::{get_post, publish_post, NewPost};
    use crate::market::testing::{seed_user, temp_db};
    use crate::storage::{LedgerReads, PostStatus, UserReads};
    use chrono::Duration;

    fn publish(db: &MarketDb, user_id: &str, view_limit: u32, at: DateTime<Utc>) -> StoredPost {
        let input = NewPost {
            title: "Shanghai Liang Jingru 699".to_string(),
            keywords: "liang jingru".to_string(),
            price: 1000.0,
            trade_type: 2,
            view_limit: Some(view_limit),
            ..Default::default()
        };
        publish_post(db, user_id, input, at).unwrap().post
    }

    fn points(db: &MarketDb, user_id: &str) -> i64 {
        db.read(|t| t.user(user_id)).unwrap().unwrap().points
    }

    #[test]
    fn expired_posts_are_delisted_with_refund() {
        let (db, _dir) = temp_db();
        let user = seed_user(&db, "13800000001", 100);
        let old = publish(&db, &user.id, 10, Utc::now() - Duration::hours(80));
        let fresh = publish(&db, &user.id, 10, Utc::now());
        assert_eq!(points(&db, &user.id), 80);

        let report = auto_expire_posts(&db, Utc::now()).unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.refunded_points, 10);
        assert_eq!(report.results[0].post_id, old.id);
        assert_eq!(points(&db, &user.id), 90);
        assert_eq!(get_post(&db, &old.id).unwrap().status, PostStatus::Delisted);
        assert_eq!(get_post(&db, &fresh.id).unwrap().status, PostStatus::Active);

        let again = auto_expire_posts(&db, Utc::now()).unwrap();
        assert_eq!(again.count, 0);
    }

    #[test]
    fn manual_fix_uses_creation_time() {
        let (db, _dir) = temp_db();
        let user = seed_user(&db, "13800000002", 100);
        let mut stale = publish(&db, &user.id, 10, Utc::now() - Duration::hours(100));
        // A stale post whose expire_at was pushed into the future.
        stale.expire_at = Utc::now() + Duration::hours(10);
        db.write(|t| t.put_post(&stale)).unwrap();

        assert_eq!(auto_expire_posts(&db, Utc::now()).unwrap().count, 0);
        let report = manual_expire_fix(&db, Utc::now()).unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(points(&db, &user.id), 100);
    }

    #[test]
    fn emergency_cleanup_delists_exhausted_posts() {
        let (db, _dir) = temp_db();
        let user = seed_user(&db, "13800000003", 100);
        let mut broken = publish(&db, &user.id, 5, Utc::now());
        broken.view_count = 7;
        db.write(|t| t.put_post(&broken)).unwrap();
        publish(&db, &user.id, 10, Utc::now() - Duration::hours(90));
        let healthy = publish(&db, &user.id, 10, Utc::now());

        let report = emergency_data_cleanup(&db, Utc::now()).unwrap();
        assert_eq!(report.summary.violating_count, 1);
        assert_eq!(report.summary.expired_count, 1);
        assert_eq!(report.summary.total_processed, 2);
        assert_eq!(report.summary.total_refunded_points, 10);
        assert_eq!(report.violating_details[0].excess_views, 2);
        assert_eq!(report.violating_details[0].refunded_points, 0);

        let stored = get_post(&db, &broken.id).unwrap();
        assert_eq!(stored.status, PostStatus::Delisted);
        assert_eq!(get_post(&db, &healthy.id).unwrap().status, PostStatus::Active);

        let rows = db.read(|t| t.ledger_for_user(&user.id)).unwrap();
        assert!(rows.iter().all(|r| r.change_type != ChangeType::CleanupRefund));
    }

    #[test]
    fn nothing_to_clean_reports_zero() {
        let (db, _dir) = temp_db();
        let report = emergency_data_cleanup(&db, Utc::now()).unwrap();
        assert_eq!(report.summary.total_processed, 0);
        assert!(report.violating_details.is_empty());
    }

    #[test]
    fn failures_are_reported_per_post() {
        let (db, _dir) = temp_db();
        let user = seed_user(&db, "13800000004", 100);
        let mut orphan = publish(&db, &user.id, 10, Utc::now() - Duration::hours(80));
        orphan.user_id = "deleted-user".to_string();
        db.write(|t| t.put_post(&orphan)).unwrap();
        publish(&db, &user.id, 10, Utc::now() - Duration::hours(80));

        let report = auto_expire_posts(&db, Utc::now()).unwrap();
        assert_eq!(report.count, 1);
        let failed: Vec<_> = report.results.iter().filter(|r| r.error.is_some()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].post_id, orphan.id);
        assert_eq!(get_post(&db, &orphan.id).unwrap().status, PostStatus::Active);
    }
}
