//! Client-credentials access token cache

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Tokens are treated as expired this long before Spotify says so
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        Instant::now() + EXPIRY_SKEW >= self.expires_at
    }
}

/// Shared access-token cache
///
/// Cloning shares the underlying slot, so one cache can be handed to every
/// client built for the same credentials.
///
/// Refresh is not coordinated. Two requests that both find the token expired
/// will both fetch a new one and the last `store` wins. Spotify issues
/// independent valid tokens to concurrent requests, so the only cost is one
/// redundant token request.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    slot: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached token if it is still valid
    pub async fn get(&self) -> Option<String> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|token| !token.is_expired())
            .map(|token| token.access_token.clone())
    }

    /// Store a freshly issued token
    pub async fn store(&self, access_token: impl Into<String>, expires_in: Duration) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedToken {
            access_token: access_token.into(),
            expires_at: Instant::now() + expires_in,
        });
    }

    /// Drop the cached token (e.g. after a 401)
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}
