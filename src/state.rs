// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state handed to every handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::providers::{ChatCompletionsClient, ChatError};
use crate::storage::{DbError, FileStore, MarketDb, StorageError, StoragePaths};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("database: {0}")]
    Database(#[from] DbError),

    #[error("chat client: {0}")]
    Chat(#[from] ChatError),

    #[error("random source unavailable")]
    Random,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<MarketDb>,
    pub files: Arc<FileStore>,
    pub tokens: Arc<TokenIssuer>,
    pub rng: SystemRandom,
    /// Batch parsing client; `None` when no endpoint is configured.
    pub ai: Option<Arc<ChatCompletionsClient>>,
    pub public_base_url: Arc<str>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Open the data directory and database described by `config`.
    pub fn open(config: &AppConfig) -> Result<Self, StartupError> {
        let rng = SystemRandom::new();
        let paths = StoragePaths::new(&config.data_dir);
        let mut files = FileStore::new(paths.clone());
        files.initialize()?;
        let db = MarketDb::open(&paths.database_file())?;

        let secret = match &config.jwt_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!("JWT_SECRET not set, sessions will not survive a restart");
                let mut secret = vec![0u8; 32];
                rng.fill(&mut secret).map_err(|_| StartupError::Random)?;
                secret
            }
        };
        let ttl = chrono::Duration::from_std(config.token_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(7));

        let ai = match &config.ai {
            Some(settings) => {
                tracing::info!(model = %settings.model, "Batch parser uses chat completions");
                Some(Arc::new(ChatCompletionsClient::new(settings.clone())?))
            }
            None => None,
        };

        Ok(Self {
            db: Arc::new(db),
            files: Arc::new(files),
            tokens: Arc::new(TokenIssuer::new(&secret, ttl)),
            rng,
            ai,
            public_base_url: Arc::from(config.public_base_url.as_str()),
            started_at: Utc::now(),
        })
    }

    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::auth::Role;
    use crate::market::accounts::{register, NewAccount};
    use crate::storage::StoredUser;
    use tempfile::TempDir;

    pub const TEST_PASSWORD: &str = "secret123";

    pub fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_lookup(|name| match name {
            "DATA_DIR" => Some(dir.path().to_string_lossy().into_owned()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            "PUBLIC_BASE_URL" => Some("http://market.test".to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::open(&config).unwrap();
        (state, dir)
    }

    /// Register an account through the normal flow and sign a token for it.
    pub fn register_user(state: &AppState, phone: &str) -> (StoredUser, String) {
        let user = register(
            &state.db,
            &state.rng,
            NewAccount {
                phone: phone.to_string(),
                password: TEST_PASSWORD.to_string(),
                wechat_id: Some(format!("wx_{}", &phone[phone.len() - 4..])),
                invite_code: None,
            },
            Utc::now(),
        )
        .unwrap();
        let token = state.tokens.issue(&user.id, Role::User, Utc::now()).unwrap().token;
        (user, token)
    }

    /// Register an account and promote it to admin.
    pub fn register_admin(state: &AppState, phone: &str) -> (StoredUser, String) {
        let (mut user, _) = register_user(state, phone);
        user.is_admin = true;
        state.db.write(|t| t.update_user(&user)).unwrap();
        let token = state.tokens.issue(&user.id, Role::Admin, Utc::now()).unwrap().token;
        (user, token)
    }
}
