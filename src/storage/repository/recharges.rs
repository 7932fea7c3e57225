// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recharge (top-up) requests awaiting admin review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{DbResult, RecordTable, TableAccess, WriteTables};

/// Review state: `0` pending, `1` approved, `2` rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum RechargeStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl From<RechargeStatus> for u8 {
    fn from(status: RechargeStatus) -> Self {
        match status {
            RechargeStatus::Pending => 0,
            RechargeStatus::Approved => 1,
            RechargeStatus::Rejected => 2,
        }
    }
}

impl TryFrom<u8> for RechargeStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Approved),
            2 => Ok(Self::Rejected),
            other => Err(format!("invalid recharge status {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredRechargeRequest {
    pub id: String,
    pub user_id: String,
    /// Paid amount in yuan.
    pub amount: f64,
    /// Points credited on approval, fixed at request time.
    pub points: i64,
    pub package_name: String,
    pub is_custom: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    pub status: RechargeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

pub trait RechargeReads: TableAccess {
    fn recharge_request(&self, id: &str) -> DbResult<Option<StoredRechargeRequest>> {
        self.get_record(RecordTable::RechargeRequests, id)
    }

    /// Requests filtered by owner and/or status, newest first.
    fn recharge_requests(
        &self,
        user_id: Option<&str>,
        status: Option<RechargeStatus>,
    ) -> DbResult<Vec<StoredRechargeRequest>> {
        let mut rows: Vec<StoredRechargeRequest> = self
            .scan_records::<StoredRechargeRequest>(RecordTable::RechargeRequests)?
            .into_iter()
            .filter(|r| user_id.is_none_or(|uid| r.user_id == uid))
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

impl<T: TableAccess> RechargeReads for T {}

impl WriteTables<'_> {
    pub fn put_recharge_request(&mut self, request: &StoredRechargeRequest) -> DbResult<()> {
        self.put_record(RecordTable::RechargeRequests, &request.id, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::{DbError, MarketDb};

    fn request(user_id: &str, status: RechargeStatus) -> StoredRechargeRequest {
        StoredRechargeRequest {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: 100.0,
            points: 115,
            package_name: "充值套餐B".to_string(),
            is_custom: false,
            screenshot_url: None,
            status,
            admin_id: None,
            admin_note: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn filters_by_user_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("test.redb")).unwrap();
        db.write(|t| {
            t.put_recharge_request(&request("u1", RechargeStatus::Pending))?;
            t.put_recharge_request(&request("u1", RechargeStatus::Approved))?;
            t.put_recharge_request(&request("u2", RechargeStatus::Pending))?;
            Ok::<_, DbError>(())
        })
        .unwrap();

        let pending = db
            .read(|t| t.recharge_requests(None, Some(RechargeStatus::Pending)))
            .unwrap();
        assert_eq!(pending.len(), 2);
        let mine = db.read(|t| t.recharge_requests(Some("u1"), None)).unwrap();
        assert_eq!(mine.len(), 2);
    }

    #[test]
    fn status_serializes_as_number() {
        assert_eq!(serde_json::to_string(&RechargeStatus::Rejected).unwrap(), "2");
        assert!(serde_json::from_str::<RechargeStatus>("5").is_err());
    }

    #[test]
    fn status_schema_is_an_integer_enum() {
        use utoipa::PartialSchema;

        let schema = serde_json::to_value(RechargeStatus::schema()).unwrap();
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["enum"], serde_json::json!([0, 1, 2]));
    }
}
