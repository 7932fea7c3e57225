// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing with PBKDF2-HMAC-SHA256.
//!
//! Stored format: `pbkdf2-sha256${iterations}${salt_b64}${hash_b64}`.

use std::num::NonZeroU32;

use base64ct::{Base64, Encoding};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use super::AuthError;

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Well-formed hash no password matches. Verifying against it costs the
/// same PBKDF2 work as a real account.
const DUMMY_HASH: &str = "pbkdf2-sha256$100000$AAAAAAAAAAAAAAAAAAAAAA==$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str, rng: &SystemRandom) -> Result<String, AuthError> {
    let iterations = NonZeroU32::new(ITERATIONS)
        .ok_or_else(|| AuthError::InternalError("invalid iteration count".to_string()))?;

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| AuthError::InternalError("random source unavailable".to_string()))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(ALGORITHM, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{SCHEME}${ITERATIONS}${}${}",
        Base64::encode_string(&salt),
        Base64::encode_string(&hash)
    ))
}

/// Constant-time check of `password` against a stored hash.
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<NonZeroU32>() else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (Base64::decode_vec(salt), Base64::decode_vec(hash)) else {
        return false;
    };

    pbkdf2::verify(ALGORITHM, iterations, &salt, password.as_bytes(), &hash).is_ok()
}

/// Run a full verification that always fails, for login attempts on
/// unknown accounts.
pub fn verify_unknown_account(password: &str) -> bool {
    verify_password(password, DUMMY_HASH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_hash_is_well_formed_and_never_matches() {
        assert!(DUMMY_HASH.starts_with(&format!("{SCHEME}${ITERATIONS}$")));
        let parts: Vec<&str> = DUMMY_HASH.split('$').collect();
        assert_eq!(Base64::decode_vec(parts[2]).unwrap().len(), SALT_LEN);
        assert_eq!(Base64::decode_vec(parts[3]).unwrap().len(), HASH_LEN);
        assert!(!verify_unknown_account(""));
        assert!(!verify_unknown_account("abc123"));
    }

    #[test]
    fn hash_then_verify() {
        let rng = SystemRandom::new();
        let stored = hash_password("abc123", &rng).unwrap();
        assert!(stored.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password("abc123", &stored));
        assert!(!verify_password("abc124", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let rng = SystemRandom::new();
        let a = hash_password("same-pass1", &rng).unwrap();
        let b = hash_password("same-pass1", &rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for stored in ["", "plain", "md5$1$a$b", "pbkdf2-sha256$0$AAAA$AAAA", "pbkdf2-sha256$10$!!$AAAA"] {
            assert!(!verify_password("x", stored), "{stored}");
        }
    }
}
