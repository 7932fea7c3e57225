// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixtures shared by the service-layer tests.

use chrono::Utc;
use tempfile::TempDir;

use crate::storage::{MarketDb, StoredUser};

pub fn temp_db() -> (MarketDb, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = MarketDb::open(&dir.path().join("market.redb")).unwrap();
    (db, dir)
}

/// Insert a user directly with the given balance (no ledger row).
pub fn seed_user(db: &MarketDb, phone: &str, points: i64) -> StoredUser {
    let code = format!("T{}", &phone[phone.len() - 5..]);
    let mut user = StoredUser::new(
        phone.to_string(),
        "unused".to_string(),
        Some(format!("wx_{}", &phone[phone.len() - 4..])),
        code,
        None,
        Utc::now(),
    );
    user.points = points;
    db.write(|t| t.insert_user(&user)).unwrap();
    user
}
