// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade posts (listings).
//!
//! `status` and `trade_type` are stored and exchanged as small integers,
//! matching the values clients already send.
//!
//! ## Storage Layout
//!
//! - `posts`: post_id → StoredPost
//! - `active_post_index`: `!created_millis|post_id` → post_id (active only)
//! - `user_post_index`: `user_id|!created_millis|post_id` → post_id
//!
//! Both index keys derive from the immutable `created_at` and `id`, so
//! [`WriteTables::put_post`] can maintain them without reading the old row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    descending_key, millis_ordinal, newest_first_key, owner_prefix_bounds, DbError, DbResult,
    IndexTable, RecordTable, TableAccess, WriteTables,
};

/// Listing status: `1` active, `0` delisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum PostStatus {
    Delisted = 0,
    Active = 1,
}

impl From<PostStatus> for u8 {
    fn from(status: PostStatus) -> Self {
        match status {
            PostStatus::Delisted => 0,
            PostStatus::Active => 1,
        }
    }
}

impl TryFrom<u8> for PostStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Delisted),
            1 => Ok(Self::Active),
            other => Err(format!("invalid post status {other}")),
        }
    }
}

/// Kind of trade a post offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TradeType {
    /// 1: looking to buy
    WantToBuy = 1,
    /// 2: offering for sale
    Sell = 2,
    /// 3: long position, needs a delivery date
    Long = 3,
    /// 4: short position, needs a delivery date
    Short = 4,
}

impl TradeType {
    pub fn requires_delivery(self) -> bool {
        matches!(self, Self::Long | Self::Short)
    }
}

impl From<TradeType> for u8 {
    fn from(kind: TradeType) -> Self {
        match kind {
            TradeType::WantToBuy => 1,
            TradeType::Sell => 2,
            TradeType::Long => 3,
            TradeType::Short => 4,
        }
    }
}

impl TryFrom<u8> for TradeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::WantToBuy),
            2 => Ok(Self::Sell),
            3 => Ok(Self::Long),
            4 => Ok(Self::Short),
            other => Err(format!("invalid trade type {other}, expected 1-4")),
        }
    }
}

/// Stored post record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredPost {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub keywords: String,
    pub price: f64,
    pub trade_type: TradeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Number of contact views paid for.
    pub view_limit: u32,
    pub view_count: u32,
    pub deal_count: u32,
    pub status: PostStatus,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredPost {
    pub fn is_active(&self) -> bool {
        self.status == PostStatus::Active
    }

    /// Paid views not yet consumed.
    pub fn remaining_views(&self) -> u32 {
        self.view_limit.saturating_sub(self.view_count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.view_count >= self.view_limit
    }

    fn feed_key(&self) -> String {
        newest_first_key(millis_ordinal(self.created_at), &self.id)
    }

    fn owner_key(&self) -> String {
        descending_key(&self.user_id, millis_ordinal(self.created_at), &self.id)
    }
}

pub trait PostReads: TableAccess {
    fn post(&self, post_id: &str) -> DbResult<Option<StoredPost>> {
        self.get_record(RecordTable::Posts, post_id)
    }

    fn post_count(&self) -> DbResult<u64> {
        self.count_records(RecordTable::Posts)
    }

    /// Every active post, newest first.
    fn active_posts(&self) -> DbResult<Vec<StoredPost>> {
        self.find_active_posts(0, usize::MAX, |_| true)
    }

    /// Page through active posts newest first, keeping those `matches`
    /// accepts. Reading stops once `take` posts have been collected.
    fn find_active_posts<F>(&self, skip: usize, take: usize, mut matches: F) -> DbResult<Vec<StoredPost>>
    where
        F: FnMut(&StoredPost) -> bool,
    {
        let mut out = Vec::new();
        if take == 0 {
            return Ok(out);
        }
        let mut skipped = 0;
        self.visit_index(IndexTable::ActivePosts, None, |_, post_id| {
            let post = indexed_post(self, post_id)?;
            if !matches(&post) {
                return Ok(true);
            }
            if skipped < skip {
                skipped += 1;
                return Ok(true);
            }
            out.push(post);
            Ok(out.len() < take)
        })?;
        Ok(out)
    }

    /// A user's posts in any status, newest first.
    fn posts_by_user(&self, user_id: &str) -> DbResult<Vec<StoredPost>> {
        let (start, end) = owner_prefix_bounds(user_id);
        self.index_range(IndexTable::UserPosts, &start, &end, usize::MAX)?
            .iter()
            .map(|(_, post_id)| indexed_post(self, post_id))
            .collect()
    }

    fn has_posts(&self, user_id: &str) -> DbResult<bool> {
        let (start, end) = owner_prefix_bounds(user_id);
        Ok(!self
            .index_range(IndexTable::UserPosts, &start, &end, 1)?
            .is_empty())
    }
}

impl<T: TableAccess> PostReads for T {}

fn indexed_post<T: TableAccess + ?Sized>(tables: &T, post_id: &str) -> DbResult<StoredPost> {
    tables
        .get_record(RecordTable::Posts, post_id)?
        .ok_or_else(|| DbError::DanglingIndex(format!("post {post_id}")))
}

impl WriteTables<'_> {
    /// Insert or replace a post, keeping both post indexes in step.
    pub fn put_post(&mut self, post: &StoredPost) -> DbResult<()> {
        self.put_record(RecordTable::Posts, &post.id, post)?;
        self.put_index(IndexTable::UserPosts, &post.owner_key(), &post.id)?;
        if post.is_active() {
            self.put_index(IndexTable::ActivePosts, &post.feed_key(), &post.id)
        } else {
            self.remove_index(IndexTable::ActivePosts, &post.feed_key())
                .map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::{DbError, MarketDb};
    use chrono::Duration;

    fn sample_post(user_id: &str, created_at: DateTime<Utc>) -> StoredPost {
        StoredPost {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: "周杰伦 内场".to_string(),
            keywords: "周杰伦".to_string(),
            price: 880.0,
            trade_type: TradeType::Sell,
            delivery_date: None,
            extra_info: None,
            category_id: None,
            view_limit: 10,
            view_count: 0,
            deal_count: 0,
            status: PostStatus::Active,
            expire_at: created_at + Duration::hours(72),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn status_and_trade_type_serialize_as_numbers() {
        let post = sample_post("u1", Utc::now());
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["status"], 1);
        assert_eq!(json["trade_type"], 2);
    }

    #[test]
    fn invalid_trade_type_is_rejected() {
        let err = serde_json::from_str::<TradeType>("7").unwrap_err();
        assert!(err.to_string().contains("invalid trade type"));
        assert!(TradeType::try_from(3).unwrap().requires_delivery());
        assert!(!TradeType::try_from(1).unwrap().requires_delivery());
    }

    #[test]
    fn remaining_views_never_underflow() {
        let mut post = sample_post("u1", Utc::now());
        post.view_count = 12;
        assert_eq!(post.remaining_views(), 0);
        assert!(post.is_exhausted());
    }

    #[test]
    fn listings_filter_by_owner_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("test.redb")).unwrap();
        let now = Utc::now();
        let a = sample_post("u1", now - Duration::minutes(5));
        let mut b = sample_post("u2", now);
        b.status = PostStatus::Delisted;
        let c = sample_post("u1", now - Duration::minutes(1));
        db.write(|t| {
            t.put_post(&a)?;
            t.put_post(&b)?;
            t.put_post(&c)?;
            Ok::<_, DbError>(())
        })
        .unwrap();

        let active = db.read(|t| t.active_posts()).unwrap();
        assert_eq!(active.iter().map(|p| &p.id).collect::<Vec<_>>(), vec![&c.id, &a.id]);
        let mine = db.read(|t| t.posts_by_user("u2")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, PostStatus::Delisted);
        let theirs = db.read(|t| t.posts_by_user("u1")).unwrap();
        assert_eq!(theirs.iter().map(|p| &p.id).collect::<Vec<_>>(), vec![&c.id, &a.id]);
        assert!(db.read(|t| t.has_posts("u1")).unwrap());
        assert!(!db.read(|t| t.has_posts("u3")).unwrap());
        assert_eq!(db.read(|t| t.post_count()).unwrap(), 3);
    }

    #[test]
    fn active_index_follows_delist_and_relist() {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("test.redb")).unwrap();
        let mut post = sample_post("u1", Utc::now());
        db.write(|t| t.put_post(&post)).unwrap();
        assert_eq!(db.read(|t| t.active_posts()).unwrap().len(), 1);

        post.status = PostStatus::Delisted;
        db.write(|t| t.put_post(&post)).unwrap();
        assert!(db.read(|t| t.active_posts()).unwrap().is_empty());
        // Writing an already delisted post again is a no-op on the index.
        db.write(|t| t.put_post(&post)).unwrap();

        post.status = PostStatus::Active;
        post.view_count = 3;
        db.write(|t| t.put_post(&post)).unwrap();
        let active = db.read(|t| t.active_posts()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].view_count, 3);
        assert_eq!(db.read(|t| t.posts_by_user("u1")).unwrap().len(), 1);
    }

    #[test]
    fn find_active_posts_skips_filters_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("test.redb")).unwrap();
        let now = Utc::now();
        let posts: Vec<StoredPost> = (0..6)
            .map(|i| {
                let mut post = sample_post("u1", now - Duration::minutes(i));
                post.price = i as f64;
                post
            })
            .collect();
        db.write(|t| {
            for post in &posts {
                t.put_post(post)?;
            }
            Ok::<_, DbError>(())
        })
        .unwrap();

        let mut inspected = 0;
        let page = db
            .read(|t| {
                t.find_active_posts(1, 2, |p| {
                    inspected += 1;
                    p.price as i64 % 2 == 0
                })
            })
            .unwrap();
        let prices: Vec<f64> = page.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![2.0, 4.0]);
        // Price 5 (the oldest) is never read.
        assert_eq!(inspected, 5);
        assert!(db.read(|t| t.find_active_posts(0, 0, |_| true)).unwrap().is_empty());
    }

    #[test]
    fn enum_schemas_are_integers() {
        use utoipa::PartialSchema;

        let status = serde_json::to_value(PostStatus::schema()).unwrap();
        assert_eq!(status["type"], "integer");
        assert_eq!(status["enum"], serde_json::json!([0, 1]));
        let trade = serde_json::to_value(TradeType::schema()).unwrap();
        assert_eq!(trade["type"], "integer");
        assert_eq!(trade["enum"], serde_json::json!([1, 2, 3, 4]));
    }
}
