// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account registration, password login and profile maintenance.

use chrono::{DateTime, Utc};
use ring::rand::SystemRandom;

use super::ledger::{apply_points, PointsChange};
use super::referrals::attach_inviter;
use super::rules::{
    generate_invite_code, normalize_invite_code, validate_password, validate_phone,
    validate_wechat_id, REGISTRATION_BONUS,
};
use super::{MarketError, MarketResult};
use crate::auth::{hash_password, verify_password, verify_unknown_account};
use crate::storage::{ChangeType, MarketDb, StoredUser, UserReads, WriteTables};

const INVITE_CODE_ATTEMPTS: usize = 16;
const BAD_CREDENTIALS: &str = "Invalid phone number or password";

/// Registration input.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub phone: String,
    pub password: String,
    pub wechat_id: Option<String>,
    pub invite_code: Option<String>,
}

/// Create an account with the registration bonus.
///
/// An invite code that resolves to an existing user records a pending
/// invitation; unknown codes are ignored.
pub fn register(
    db: &MarketDb,
    rng: &SystemRandom,
    account: NewAccount,
    now: DateTime<Utc>,
) -> MarketResult<StoredUser> {
    let phone = account.phone.trim().to_string();
    validate_phone(&phone)?;
    validate_password(&account.password)?;
    let wechat_id = clean_wechat_id(account.wechat_id.as_deref())?;
    let invite_code = normalize_invite_code(account.invite_code.as_deref());

    // Hash outside the write transaction.
    let password_hash = hash_password(&account.password, rng)?;

    db.write(|t| {
        if t.phone_taken(&phone)? {
            return Err(MarketError::conflict("Phone number is already registered"));
        }

        let own_code = unique_invite_code(t, rng)?;
        let mut user = StoredUser::new(phone.clone(), password_hash, wechat_id, own_code, None, now);
        t.insert_user(&user)?;

        apply_points(
            t,
            &mut user,
            PointsChange::new(ChangeType::RegistrationBonus, REGISTRATION_BONUS, "Registration bonus"),
            now,
        )?;

        if let Some(code) = &invite_code {
            match t.user_by_invite_code(code)? {
                Some(inviter) => {
                    attach_inviter(t, &mut user, &inviter, now)?;
                }
                None => {
                    tracing::info!(invite_code = %code, "Ignoring unknown invite code at registration");
                }
            }
        }

        tracing::info!(user_id = %user.id, invited = user.invited_by.is_some(), "User registered");
        Ok(user)
    })
}

/// Verify phone + password; the stored hash comparison is constant-time.
pub fn login(db: &MarketDb, phone: &str, password: &str) -> MarketResult<StoredUser> {
    let phone = phone.trim();
    if phone.is_empty() || password.is_empty() {
        return Err(MarketError::validation("Phone number and password are required"));
    }

    let Some(user) = db.read(|t| Ok::<_, MarketError>(t.user_by_phone(phone)?))? else {
        // Unknown phones pay the same hashing cost as a wrong password.
        verify_unknown_account(password);
        return Err(MarketError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    if !verify_password(password, &user.password_hash) {
        return Err(MarketError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    if !user.is_active() {
        return Err(MarketError::forbidden(
            "Account is disabled, please contact an administrator",
        ));
    }
    Ok(user)
}

pub fn change_password(
    db: &MarketDb,
    rng: &SystemRandom,
    user_id: &str,
    old_password: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> MarketResult<()> {
    validate_password(new_password)?;
    if old_password == new_password {
        return Err(MarketError::validation(
            "New password must differ from the current one",
        ));
    }

    let current = load_user(db, user_id)?;
    if !verify_password(old_password, &current.password_hash) {
        return Err(MarketError::Unauthorized("Current password is incorrect".to_string()));
    }
    let new_hash = hash_password(new_password, rng)?;

    db.write(|t| {
        // Re-read so a concurrent balance change is not overwritten.
        let mut user = t
            .user(user_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        if user.password_hash != current.password_hash {
            return Err(MarketError::conflict("Password was changed concurrently, please retry"));
        }
        user.password_hash = new_hash;
        user.updated_at = now;
        t.update_user(&user)?;
        Ok(())
    })?;

    tracing::info!(user_id = %user_id, "Password changed");
    Ok(())
}

/// Whether an account exists for a (well-formed) phone number.
pub fn check_user_exists(db: &MarketDb, phone: &str) -> MarketResult<bool> {
    let phone = phone.trim();
    validate_phone(phone)?;
    db.read(|t| Ok(t.phone_taken(phone)?))
}

pub fn load_user(db: &MarketDb, user_id: &str) -> MarketResult<StoredUser> {
    db.read(|t| Ok::<_, MarketError>(t.user(user_id)?))?
        .ok_or_else(|| MarketError::not_found("User not found"))
}

/// Update the contact WeChat ID shown to buyers.
pub fn update_profile(
    db: &MarketDb,
    user_id: &str,
    wechat_id: Option<&str>,
    now: DateTime<Utc>,
) -> MarketResult<StoredUser> {
    let wechat_id = clean_wechat_id(wechat_id)?;
    db.write(|t| {
        let mut user = t
            .user(user_id)?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        user.wechat_id = wechat_id;
        user.updated_at = now;
        t.update_user(&user)?;
        Ok(user)
    })
}

/// Create the bootstrap admin, or promote an existing account with that
/// phone. Returns `true` when an account was created.
pub fn ensure_admin(
    db: &MarketDb,
    rng: &SystemRandom,
    phone: &str,
    password: &str,
    now: DateTime<Utc>,
) -> MarketResult<bool> {
    validate_phone(phone)?;
    validate_password(password)?;

    if let Some(mut existing) = db.read(|t| Ok::<_, MarketError>(t.user_by_phone(phone)?))? {
        if !existing.is_admin {
            existing.is_admin = true;
            existing.updated_at = now;
            db.write(|t| Ok::<_, MarketError>(t.update_user(&existing)?))?;
            tracing::info!(user_id = %existing.id, "Promoted existing account to admin");
        }
        return Ok(false);
    }

    let password_hash = hash_password(password, rng)?;
    db.write(|t| {
        if t.phone_taken(phone)? {
            return Ok(false);
        }
        let code = unique_invite_code(t, rng)?;
        let mut admin = StoredUser::new(phone.to_string(), password_hash, None, code, None, now);
        admin.is_admin = true;
        t.insert_user(&admin)?;
        tracing::info!(user_id = %admin.id, "Seeded admin account");
        Ok(true)
    })
}

fn unique_invite_code(t: &WriteTables<'_>, rng: &SystemRandom) -> MarketResult<String> {
    for _ in 0..INVITE_CODE_ATTEMPTS {
        let code = generate_invite_code(rng)?;
        if !t.invite_code_taken(&code)? {
            return Ok(code);
        }
    }
    Err(MarketError::Internal("could not allocate a unique invite code".to_string()))
}

fn clean_wechat_id(wechat_id: Option<&str>) -> MarketResult<Option<String>> {
    match wechat_id.map(str::trim).filter(|w| !w.is_empty()) {
        Some(w) => {
            validate_wechat_id(w)?;
            Ok(Some(w.to_string()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::temp_db;
    use crate::storage::{InvitationReads, LedgerReads, UserStatus};

    fn account(phone: &str, invite: Option<&str>) -> NewAccount {
        NewAccount {
            phone: phone.to_string(),
            password: "abc123".to_string(),
            wechat_id: Some("wx_seller".to_string()),
            invite_code: invite.map(str::to_string),
        }
    }

    #[test]
    fn register_grants_bonus_with_ledger_row() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        let user = register(&db, &rng, account("13800000001", None), Utc::now()).unwrap();

        assert_eq!(user.points, REGISTRATION_BONUS);
        let rows = db.read(|t| t.ledger_for_user(&user.id)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].change_type, ChangeType::RegistrationBonus);
        assert_eq!(rows[0].balance_after, REGISTRATION_BONUS);
    }

    #[test]
    fn duplicate_phone_is_conflict() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        register(&db, &rng, account("13800000002", None), Utc::now()).unwrap();
        let err = register(&db, &rng, account("13800000002", None), Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[test]
    fn invite_code_records_pending_invitation_without_reward() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        let inviter = register(&db, &rng, account("13800000003", None), Utc::now()).unwrap();
        let invitee = register(
            &db,
            &rng,
            account("13800000004", Some(&inviter.invite_code.to_lowercase())),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(invitee.invited_by.as_deref(), Some(inviter.invite_code.as_str()));
        assert_eq!(invitee.points, REGISTRATION_BONUS);
        let invitation = db
            .read(|t| t.invitation_for_invitee(&invitee.id))
            .unwrap()
            .unwrap();
        assert_eq!(invitation.inviter_id, inviter.id);
        assert!(!invitation.reward_sent);

        let inviter_now = load_user(&db, &inviter.id).unwrap();
        assert_eq!(inviter_now.points, REGISTRATION_BONUS);
    }

    #[test]
    fn unknown_invite_code_is_ignored() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        let user = register(&db, &rng, account("13800000005", Some("ZZZZZZ")), Utc::now()).unwrap();
        assert!(user.invited_by.is_none());
    }

    #[test]
    fn login_checks_password_and_status() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        let user = register(&db, &rng, account("13800000006", None), Utc::now()).unwrap();

        assert_eq!(login(&db, "13800000006", "abc123").unwrap().id, user.id);
        assert!(matches!(
            login(&db, "13800000006", "wrong1"),
            Err(MarketError::Unauthorized(_))
        ));
        assert!(matches!(
            login(&db, "13899999999", "abc123"),
            Err(MarketError::Unauthorized(_))
        ));

        let mut disabled = load_user(&db, &user.id).unwrap();
        disabled.status = UserStatus::Disabled;
        db.write(|t| t.update_user(&disabled)).unwrap();
        assert!(matches!(
            login(&db, "13800000006", "abc123"),
            Err(MarketError::Forbidden(_))
        ));
    }

    #[test]
    fn unknown_phone_and_wrong_password_look_the_same() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        register(&db, &rng, account("13800000016", None), Utc::now()).unwrap();

        let wrong = login(&db, "13800000016", "wrong1").unwrap_err();
        let unknown = login(&db, "13800000017", "wrong1").unwrap_err();
        assert!(matches!(unknown, MarketError::Unauthorized(_)));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(unknown.to_string(), BAD_CREDENTIALS);
    }

    #[test]
    fn change_password_requires_old_password() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        let user = register(&db, &rng, account("13800000007", None), Utc::now()).unwrap();

        let err = change_password(&db, &rng, &user.id, "nope12", "newpass9", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Unauthorized(_)));

        change_password(&db, &rng, &user.id, "abc123", "newpass9", Utc::now()).unwrap();
        assert!(login(&db, "13800000007", "newpass9").is_ok());
        assert!(login(&db, "13800000007", "abc123").is_err());
    }

    #[test]
    fn check_user_exists_and_profile_update() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        let user = register(&db, &rng, account("13800000008", None), Utc::now()).unwrap();

        assert!(check_user_exists(&db, "13800000008").unwrap());
        assert!(!check_user_exists(&db, "13800000009").unwrap());
        assert!(check_user_exists(&db, "123").is_err());

        let updated = update_profile(&db, &user.id, Some("new_wechat"), Utc::now()).unwrap();
        assert_eq!(updated.wechat_id.as_deref(), Some("new_wechat"));
        assert!(update_profile(&db, &user.id, Some("bad id"), Utc::now()).is_err());
    }

    #[test]
    fn ensure_admin_creates_then_is_idempotent() {
        let (db, _dir) = temp_db();
        let rng = SystemRandom::new();
        assert!(ensure_admin(&db, &rng, "13900000000", "admin123", Utc::now()).unwrap());
        assert!(!ensure_admin(&db, &rng, "13900000000", "admin123", Utc::now()).unwrap());
        let admin = login(&db, "13900000000", "admin123").unwrap();
        assert!(admin.is_admin);
    }
}
