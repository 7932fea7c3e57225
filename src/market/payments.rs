// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment QR codes shown to users before they recharge.

use chrono::{DateTime, Utc};

use super::{MarketError, MarketResult};
use crate::storage::{MarketDb, PaymentType, QrCodeReads, StoredQrCode};

pub fn get_payment_qrcodes(db: &MarketDb) -> MarketResult<Vec<StoredQrCode>> {
    db.read(|t| Ok(t.active_qrcodes()?))
}

/// Create or replace the code for `payment_type` (`wechat` or `alipay`).
pub fn save_payment_qrcode(
    db: &MarketDb,
    payment_type: &str,
    qr_code_url: &str,
    now: DateTime<Utc>,
) -> MarketResult<StoredQrCode> {
    let payment_type: PaymentType = payment_type
        .trim()
        .parse()
        .map_err(|_| MarketError::validation("payment_type must be wechat or alipay"))?;
    let qr_code_url = qr_code_url.trim();
    if qr_code_url.is_empty() {
        return Err(MarketError::validation("qr_code_url is required"));
    }
    let parsed = url::Url::parse(qr_code_url)
        .map_err(|e| MarketError::validation(format!("qr_code_url is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MarketError::validation("qr_code_url must be http or https"));
    }

    let code = StoredQrCode {
        payment_type,
        qr_code_url: parsed.to_string(),
        is_active: true,
        updated_at: now,
    };
    db.write(|t| Ok::<_, MarketError>(t.put_qrcode(&code)?))?;
    tracing::info!(payment_type = %payment_type, "Payment QR code saved");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::temp_db;

    #[test]
    fn save_replaces_existing_code() {
        let (db, _dir) = temp_db();
        save_payment_qrcode(&db, "wechat", "https://cdn.example/wx-1.png", Utc::now()).unwrap();
        save_payment_qrcode(&db, "wechat", "https://cdn.example/wx-2.png", Utc::now()).unwrap();
        save_payment_qrcode(&db, "alipay", "https://cdn.example/ali.png", Utc::now()).unwrap();

        let codes = get_payment_qrcodes(&db).unwrap();
        assert_eq!(codes.len(), 2);
        let wechat = codes.iter().find(|c| c.payment_type == PaymentType::Wechat).unwrap();
        assert_eq!(wechat.qr_code_url, "https://cdn.example/wx-2.png");
    }

    #[test]
    fn save_validates_input() {
        let (db, _dir) = temp_db();
        for (kind, url) in [
            ("paypal", "https://cdn.example/a.png"),
            ("wechat", ""),
            ("wechat", "not a url"),
            ("alipay", "ftp://cdn.example/a.png"),
        ] {
            assert!(matches!(
                save_payment_qrcode(&db, kind, url, Utc::now()),
                Err(MarketError::Validation(_))
            ));
        }
        assert!(get_payment_qrcodes(&db).unwrap().is_empty());
    }
}
