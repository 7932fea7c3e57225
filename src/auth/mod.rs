// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Phone + password accounts with server-issued session tokens.
//!
//! ## Auth Flow
//!
//! 1. Client registers or logs in with phone and password
//! 2. Server verifies the PBKDF2 hash and returns an HS256 session token
//! 3. Client sends `Authorization: Bearer <token>`
//! 4. Extractors verify signature, issuer and expiry (60 s leeway), then
//!    load the account to pick up its current role and status
//!
//! Acting-user identity always comes from the token, never from a
//! request body.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod tokens;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use password::{hash_password, verify_password, verify_unknown_account};
pub use roles::Role;
pub use tokens::{IssuedToken, TokenIssuer};
