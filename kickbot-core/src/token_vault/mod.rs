// File: kickbot-core/src/token_vault/mod.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::ChannelToken;
use kickbot_common::traits::TokenRepository;

use crate::crypto::Encryptor;

/// Skew window inside which a stored access token is treated as expired and
/// proactively refreshed (spec §4.B).
const REFRESH_SKEW: Duration = Duration::minutes(5);

/// Per-platform OAuth client credentials and token endpoint, following the
/// `{grant_type, client_id, client_secret, code, redirect_uri, code_verifier}`
/// exchange contract (spec §6 "Platform APIs").
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Mints valid access tokens on demand, refreshing transparently and
/// coordinating concurrent refreshes for the same channel into a single
/// in-flight request (spec §4.B, testable scenario S6).
///
/// Follows the teacher's `DashMap<Key, _>`-per-entity coordination style
/// (`auth::user_manager::DefaultUserManager`), specialised here to a
/// single-flight mutex per channel rather than a read cache.
pub struct TokenVault<R: TokenRepository> {
    repo: R,
    http: reqwest::Client,
    encryptor: Encryptor,
    config: OAuthClientConfig,
    refresh_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<R: TokenRepository> TokenVault<R> {
    pub fn new(repo: R, http: reqwest::Client, encryptor: Encryptor, config: OAuthClientConfig) -> Self {
        Self {
            repo,
            http,
            encryptor,
            config,
            refresh_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, channel_id: Uuid) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Returns a valid (unexpired) access token for `channel_id`, refreshing
    /// it first if the stored `expires_at` falls inside the skew window.
    pub async fn get_valid(&self, channel_id: Uuid) -> Result<String, Error> {
        let stored = self
            .repo
            .get_token(channel_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no token for channel {channel_id}")))?;

        if stored.expires_at - Utc::now() > REFRESH_SKEW {
            return self.encryptor.decrypt(&stored.encrypted_access);
        }

        let lock = self.lock_for(channel_id);
        let _guard = lock.lock().await;

        // Re-read: another caller may have already refreshed while we waited
        // for the lock (single-flight per spec §4.B).
        let stored = self
            .repo
            .get_token(channel_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no token for channel {channel_id}")))?;

        if stored.expires_at - Utc::now() > REFRESH_SKEW {
            return self.encryptor.decrypt(&stored.encrypted_access);
        }

        self.refresh(channel_id, &stored).await
    }

    async fn refresh(&self, channel_id: Uuid, stored: &ChannelToken) -> Result<String, Error> {
        let refresh_token = self.encryptor.decrypt(&stored.encrypted_refresh)?;

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::TokenRefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(channel_id = %channel_id, %status, %body, "token refresh rejected");
            return Err(Error::TokenRefreshFailed(format!(
                "refresh endpoint returned {status}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenRefreshFailed(e.to_string()))?;

        let new_expires_at = Utc::now() + Duration::seconds(parsed.expires_in);
        let new_refresh = parsed.refresh_token.unwrap_or(refresh_token);

        let new_token = ChannelToken {
            channel_id,
            encrypted_access: self.encryptor.encrypt(&parsed.access_token)?,
            encrypted_refresh: self.encryptor.encrypt(&new_refresh)?,
            expires_at: new_expires_at,
        };
        self.repo.upsert_token(&new_token).await?;

        info!(channel_id = %channel_id, expires_at = %new_expires_at, "refreshed channel token");
        Ok(parsed.access_token)
    }

    /// Used by the onboarding flow once an authorization code has been
    /// exchanged out-of-band; stores the resulting credential pair.
    pub async fn store_initial_token(
        &self,
        channel_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let token = ChannelToken {
            channel_id,
            encrypted_access: self.encryptor.encrypt(access_token)?,
            encrypted_refresh: self.encryptor.encrypt(refresh_token)?,
            expires_at,
        };
        self.repo.upsert_token(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    struct FakeTokenRepo {
        stored: RwLock<Option<ChannelToken>>,
    }

    #[async_trait]
    impl TokenRepository for FakeTokenRepo {
        async fn get_token(&self, _channel_id: Uuid) -> Result<Option<ChannelToken>, Error> {
            Ok(self.stored.read().await.clone())
        }

        async fn upsert_token(&self, token: &ChannelToken) -> Result<(), Error> {
            *self.stored.write().await = Some(token.clone());
            Ok(())
        }
    }

    fn test_encryptor() -> Encryptor {
        Encryptor::new(&[7u8; 32]).unwrap()
    }

    #[tokio::test]
    async fn returns_decrypted_access_token_when_not_expired() {
        let enc = test_encryptor();
        let channel_id = Uuid::new_v4();
        let token = ChannelToken {
            channel_id,
            encrypted_access: enc.encrypt("tok-abc").unwrap(),
            encrypted_refresh: enc.encrypt("refresh-abc").unwrap(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        let repo = FakeTokenRepo {
            stored: RwLock::new(Some(token)),
        };
        let vault = TokenVault::new(
            repo,
            reqwest::Client::new(),
            enc,
            OAuthClientConfig {
                token_endpoint: "http://unused.invalid".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );

        let access = vault.get_valid(channel_id).await.unwrap();
        assert_eq!(access, "tok-abc");
    }

    #[tokio::test]
    async fn missing_token_is_not_found() {
        let enc = test_encryptor();
        let repo = FakeTokenRepo {
            stored: RwLock::new(None),
        };
        let vault = TokenVault::new(
            repo,
            reqwest::Client::new(),
            enc,
            OAuthClientConfig {
                token_endpoint: "http://unused.invalid".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );

        let err = vault.get_valid(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn lock_for_returns_same_mutex_for_same_channel() {
        let enc = test_encryptor();
        let repo = FakeTokenRepo {
            stored: RwLock::new(None),
        };
        let vault = TokenVault::new(
            repo,
            reqwest::Client::new(),
            enc,
            OAuthClientConfig {
                token_endpoint: "http://unused.invalid".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );
        let channel_id = Uuid::new_v4();
        let a = vault.lock_for(channel_id);
        let b = vault.lock_for(channel_id);
        assert!(Arc::ptr_eq(&a, &b));
        let _ = AtomicUsize::new(0);
    }
}
