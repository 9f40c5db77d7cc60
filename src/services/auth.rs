use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use super::ServiceError;
use crate::models::users::AuthUser;
use crate::repositories::supabase::SupabaseAuthApi;

/// Resolves a bearer token to the user it was issued for.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError>;
}

/// Verified tokens, keyed by their SHA-256 digest.
pub struct TokenCache {
    ttl: Duration,
    entries: DashMap<[u8; 32], (AuthUser, Instant)>,
}

fn token_key(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        TokenCache {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, token: &str, now: Instant) -> Option<AuthUser> {
        let key = token_key(token);
        let expired = match self.entries.get(&key) {
            Some(entry) if now.duration_since(entry.1) < self.ttl => return Some(entry.0.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(&key);
        }
        None
    }

    /// Stores a verified token and drops every entry that has outlived the TTL.
    pub fn insert(&self, token: &str, user: AuthUser, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries
            .retain(|_, (_, verified_at)| now.duration_since(*verified_at) < self.ttl);
        self.entries.insert(token_key(token), (user, now));
    }
}

pub struct SupabaseAuthenticator {
    api: SupabaseAuthApi,
    cache: TokenCache,
}

impl SupabaseAuthenticator {
    pub fn new(api: SupabaseAuthApi, token_cache_secs: u64) -> Self {
        SupabaseAuthenticator {
            api,
            cache: TokenCache::new(Duration::from_secs(token_cache_secs)),
        }
    }
}

#[async_trait]
impl Authenticator for SupabaseAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        if let Some(user) = self.cache.get(token, Instant::now()) {
            return Ok(user);
        }

        let user = self
            .api
            .get_user(token)
            .await
            .map_err(|e| {
                ServiceError::ExternalService(
                    "Authenticator".to_string(),
                    "Supabase".to_string(),
                    e.to_string(),
                )
            })?
            .ok_or(ServiceError::Unauthorized)?;

        self.cache.insert(token, user.clone(), Instant::now());
        Ok(user)
    }
}

/// Fixed token table for exercising the HTTP layer without Supabase.
#[cfg(test)]
pub struct StaticAuthenticator {
    users: std::collections::HashMap<String, AuthUser>,
}

#[cfg(test)]
impl StaticAuthenticator {
    pub fn new(users: impl IntoIterator<Item = (String, AuthUser)>) -> Self {
        StaticAuthenticator {
            users: users.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        self.users.get(token).cloned().ok_or(ServiceError::Unauthorized)
    }
}
