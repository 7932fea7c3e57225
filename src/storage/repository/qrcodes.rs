// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment QR codes shown on the recharge page, one per payment type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{DbResult, RecordTable, TableAccess, WriteTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Wechat,
    Alipay,
}

impl PaymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wechat => "wechat",
            Self::Alipay => "alipay",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wechat" => Ok(Self::Wechat),
            "alipay" => Ok(Self::Alipay),
            other => Err(format!("unsupported payment type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredQrCode {
    pub payment_type: PaymentType,
    pub qr_code_url: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

pub trait QrCodeReads: TableAccess {
    fn active_qrcodes(&self) -> DbResult<Vec<StoredQrCode>> {
        Ok(self
            .scan_records::<StoredQrCode>(RecordTable::PaymentQrCodes)?
            .into_iter()
            .filter(|q| q.is_active)
            .collect())
    }
}

impl<T: TableAccess> QrCodeReads for T {}

impl WriteTables<'_> {
    pub fn put_qrcode(&mut self, code: &StoredQrCode) -> DbResult<()> {
        self.put_record(RecordTable::PaymentQrCodes, code.payment_type.as_str(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_type_parses_known_values_only() {
        assert_eq!("wechat".parse::<PaymentType>().unwrap(), PaymentType::Wechat);
        assert_eq!("alipay".parse::<PaymentType>().unwrap(), PaymentType::Alipay);
        assert!("paypal".parse::<PaymentType>().is_err());
    }
}
