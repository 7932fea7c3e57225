// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Post Expiry Sweeper
//!
//! Background task that delists posts past their `expire_at` so expiry
//! does not depend on an admin calling `/api/auto-expire-posts`.
//!
//! Every `sweep_interval` (default 300 s) the sweeper runs the same
//! operation as that endpoint: each expired active post is delisted and the
//! owner refunded for unused views. Posts that fail are retried on the next
//! sweep.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, cancelled by `main` on
//! ctrl-c or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::market::cleanup;
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, FileStore, MarketDb};

pub struct ExpirySweeper {
    db: Arc<MarketDb>,
    files: Arc<FileStore>,
    sweep_interval: Duration,
}

impl ExpirySweeper {
    pub fn new(db: Arc<MarketDb>, files: Arc<FileStore>, sweep_interval: Duration) -> Self {
        Self {
            db,
            files,
            sweep_interval,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Post expiry sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Post expiry sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Post expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep. Returns the number of posts delisted.
    fn sweep_step(&self) -> usize {
        match cleanup::auto_expire_posts(&self.db, Utc::now()) {
            Ok(report) => {
                if report.count > 0 {
                    info!(
                        count = report.count,
                        refunded_points = report.refunded_points,
                        "Expiry sweeper: delisted expired posts"
                    );
                    AuditRepository::new(&self.files).record(
                        AuditEvent::new(AuditEventType::PostsExpired).with_details(serde_json::json!({
                            "job": "sweeper",
                            "count": report.count,
                        })),
                    );
                }
                report.count
            }
            Err(e) => {
                warn!(error = %e, "Expiry sweeper: sweep failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::posts::{publish_post, NewPost};
    use crate::state::test_support::{register_user, test_state};
    use crate::storage::{PostReads, PostStatus};

    #[tokio::test]
    async fn sweep_delists_expired_posts() {
        let (state, _dir) = test_state();
        let (seller, _) = register_user(&state, "13800000010");
        let published_at = Utc::now() - chrono::Duration::days(10);
        let published = publish_post(
            &state.db,
            &seller.id,
            NewPost {
                title: "飞天".to_string(),
                keywords: "白酒".to_string(),
                price: 2400.0,
                trade_type: 2,
                delivery_date: None,
                delivery_days: None,
                extra_info: None,
                category_id: None,
                view_limit: None,
            },
            published_at,
        )
        .unwrap();

        let sweeper = ExpirySweeper::new(state.db.clone(), state.files.clone(), Duration::from_secs(60));
        assert_eq!(sweeper.sweep_step(), 1);
        assert_eq!(sweeper.sweep_step(), 0);

        let post = state.db.read(|t| t.post(&published.post.id)).unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Delisted);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (state, _dir) = test_state();
        let sweeper = ExpirySweeper::new(state.db.clone(), state.files.clone(), Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
