// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Back-office queries and account moderation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{MarketError, MarketResult};
use crate::storage::{
    MarketDb, PostReads, RechargeReads, RechargeStatus, StoredUser, UserReads, UserStatus,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MarketStats {
    pub user_count: usize,
    pub disabled_user_count: usize,
    pub post_count: usize,
    pub active_post_count: usize,
    pub pending_recharge_count: usize,
    /// Sum of all user balances.
    pub points_in_circulation: i64,
}

pub fn stats(db: &MarketDb, now: DateTime<Utc>) -> MarketResult<MarketStats> {
    db.read(|t| {
        let users = t.all_users()?;
        let post_count = t.post_count()?;
        let live_posts = t.find_active_posts(0, usize::MAX, |p| p.expire_at > now)?;
        let pending = t.recharge_requests(None, Some(RechargeStatus::Pending))?;
        Ok(MarketStats {
            user_count: users.len(),
            disabled_user_count: users.iter().filter(|u| !u.is_active()).count(),
            post_count: usize::try_from(post_count).unwrap_or(usize::MAX),
            active_post_count: live_posts.len(),
            pending_recharge_count: pending.len(),
            points_in_circulation: users.iter().map(|u| u.points).sum(),
        })
    })
}

pub fn list_users(db: &MarketDb) -> MarketResult<Vec<StoredUser>> {
    db.read(|t| Ok(t.all_users()?))
}

/// Enable or disable an account. Admins cannot disable themselves.
pub fn set_user_status(
    db: &MarketDb,
    admin_id: &str,
    user_id: &str,
    active: bool,
    now: DateTime<Utc>,
) -> MarketResult<StoredUser> {
    if admin_id == user_id && !active {
        return Err(MarketError::validation("You cannot disable your own account"));
    }
    let status = if active {
        UserStatus::Active
    } else {
        UserStatus::Disabled
    };

    let user = db.write(|t| {
        let mut user = t
            .user(user_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        if user.status != status {
            user.status = status;
            user.updated_at = now;
            t.update_user(&user)?;
        }
        Ok::<_, MarketError>(user)
    })?;
    tracing::info!(admin_id = %admin_id, user_id = %user_id, active, "User status set");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::posts::{publish_post, NewPost};
    use crate::market::testing::{seed_user, temp_db};

    #[test]
    fn stats_count_users_posts_and_points() {
        let (db, _dir) = temp_db();
        let seller = seed_user(&db, "13800000001", 100);
        seed_user(&db, "13800000002", 40);
        let input = NewPost {
            title: "成都周深399".into(),
            keywords: "周深".into(),
            price: 900.0,
            trade_type: 2,
            ..Default::default()
        };
        publish_post(&db, &seller.id, input, Utc::now()).unwrap();

        let stats = stats(&db, Utc::now()).unwrap();
        assert_eq!(stats.user_count, 2);
        assert_eq!(stats.post_count, 1);
        assert_eq!(stats.active_post_count, 1);
        assert_eq!(stats.points_in_circulation, 130);
    }

    #[test]
    fn status_toggle_and_self_guard() {
        let (db, _dir) = temp_db();
        let admin = seed_user(&db, "13800000003", 0);
        let user = seed_user(&db, "13800000004", 0);

        let disabled = set_user_status(&db, &admin.id, &user.id, false, Utc::now()).unwrap();
        assert_eq!(disabled.status, UserStatus::Disabled);
        assert_eq!(stats(&db, Utc::now()).unwrap().disabled_user_count, 1);

        let enabled = set_user_status(&db, &admin.id, &user.id, true, Utc::now()).unwrap();
        assert!(enabled.is_active());

        assert!(set_user_status(&db, &admin.id, &admin.id, false, Utc::now()).is_err());
        assert!(matches!(
            set_user_status(&db, &admin.id, "ghost", true, Utc::now()),
            Err(MarketError::NotFound(_))
        ));
    }
}
