// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contact view history: one row per (viewer, post).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::database::{view_key, DbResult, RecordTable, TableAccess, WriteTables};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredView {
    pub user_id: String,
    pub post_id: String,
    pub viewed_at: DateTime<Utc>,
    /// `None` until the viewer answers the deal confirmation.
    #[serde(default)]
    pub is_deal_confirmed: Option<bool>,
}

pub trait ViewReads: TableAccess {
    fn view(&self, user_id: &str, post_id: &str) -> DbResult<Option<StoredView>> {
        self.get_record(RecordTable::ViewHistory, &view_key(user_id, post_id))
    }
}

impl<T: TableAccess> ViewReads for T {}

impl WriteTables<'_> {
    pub fn put_view(&mut self, view: &StoredView) -> DbResult<()> {
        self.put_record(
            RecordTable::ViewHistory,
            &view_key(&view.user_id, &view.post_id),
            view,
        )
    }
}
