// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Business constants and input validation.

use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};
use unicode_normalization::UnicodeNormalization;

use super::{MarketError, MarketResult};

/// Points credited to every new account.
pub const REGISTRATION_BONUS: i64 = 100;

/// Views bought when no `view_limit` is given; one view costs one point.
pub const DEFAULT_VIEW_LIMIT: u32 = 10;
pub const MAX_VIEW_LIMIT: u32 = 1000;

pub const VIEW_CONTACT_COST: i64 = 1;

/// Cost of relisting a delisted post, which buys [`RELIST_VIEWS`] views.
pub const RELIST_COST: i64 = 10;
pub const RELIST_VIEWS: u32 = 10;

pub const INVITER_REWARD: i64 = 10;
pub const INVITEE_REWARD: i64 = 30;

pub const MIN_RECHARGE_AMOUNT: f64 = 1.0;
pub const MAX_RECHARGE_AMOUNT: f64 = 100_000.0;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_KEYWORDS_CHARS: usize = 200;
pub const MAX_EXTRA_INFO_CHARS: usize = 2000;
pub const MAX_DELIVERY_DAYS: u32 = 3650;

const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const INVITE_CODE_LEN: usize = 6;

/// Lifetime of a published (or relisted) post.
pub fn post_ttl() -> Duration {
    Duration::hours(72)
}

/// A fixed recharge package.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RechargePackage {
    pub name: &'static str,
    pub amount: f64,
    pub points: i64,
}

pub const RECHARGE_PACKAGES: [RechargePackage; 4] = [
    RechargePackage { name: "充值套餐A", amount: 50.0, points: 55 },
    RechargePackage { name: "充值套餐B", amount: 100.0, points: 115 },
    RechargePackage { name: "充值套餐C", amount: 300.0, points: 370 },
    RechargePackage { name: "充值套餐D", amount: 500.0, points: 650 },
];

/// Points and package name a recharge of `amount` yuan is worth.
pub fn recharge_points(amount: f64, is_custom: bool) -> MarketResult<(i64, String)> {
    if !amount.is_finite() || !(MIN_RECHARGE_AMOUNT..=MAX_RECHARGE_AMOUNT).contains(&amount) {
        return Err(MarketError::validation(format!(
            "Recharge amount must be between {MIN_RECHARGE_AMOUNT} and {MAX_RECHARGE_AMOUNT}"
        )));
    }

    if is_custom {
        // 1 yuan = 1 point
        return Ok((amount.floor() as i64, format!("自定义充值{amount}元")));
    }

    RECHARGE_PACKAGES
        .iter()
        .find(|p| (p.amount - amount).abs() < f64::EPSILON)
        .map(|p| (p.points, p.name.to_string()))
        .ok_or_else(|| MarketError::validation(format!("No recharge package for amount {amount}")))
}

/// Mainland mobile number: 11 digits, `1[3-9]` prefix.
pub fn validate_phone(phone: &str) -> MarketResult<()> {
    let bytes = phone.as_bytes();
    let valid = bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_digit);
    if valid {
        Ok(())
    } else {
        Err(MarketError::validation("Invalid phone number format"))
    }
}

/// At least 6 characters with one digit and one ASCII letter.
pub fn validate_password(password: &str) -> MarketResult<()> {
    if password.chars().count() < 6 {
        return Err(MarketError::validation("Password must be at least 6 characters"));
    }
    if password.len() > 128 {
        return Err(MarketError::validation("Password is too long"));
    }
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    if !(has_digit && has_letter) {
        return Err(MarketError::validation(
            "Password must contain both letters and digits",
        ));
    }
    Ok(())
}

/// WeChat IDs: 5-30 characters of `[A-Za-z0-9_-]`.
pub fn validate_wechat_id(wechat_id: &str) -> MarketResult<()> {
    let len = wechat_id.chars().count();
    let valid = (5..=30).contains(&len)
        && wechat_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(MarketError::validation(
            "WeChat ID must be 5-30 letters, digits, '_' or '-'",
        ))
    }
}

/// Trimmed, non-empty text of bounded length.
pub fn required_text(field: &str, value: &str, max_chars: usize) -> MarketResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MarketError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(MarketError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}

/// Canonical form used for keyword matching: NFKC, lowercase, trimmed.
///
/// Folds full-width letters and digits into their ASCII forms.
pub fn normalize_search_text(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase().trim().to_string()
}

/// Random invite code from the unambiguous alphabet.
pub fn generate_invite_code(rng: &SystemRandom) -> MarketResult<String> {
    let mut bytes = [0u8; INVITE_CODE_LEN];
    rng.fill(&mut bytes)
        .map_err(|_| MarketError::Internal("random source unavailable".to_string()))?;
    Ok(bytes
        .iter()
        .map(|b| INVITE_CODE_ALPHABET[*b as usize % INVITE_CODE_ALPHABET.len()] as char)
        .collect())
}

/// Upper-cased, trimmed invite code, or `None` when blank.
pub fn normalize_invite_code(code: Option<&str>) -> Option<String> {
    code.map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
}
