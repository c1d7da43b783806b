//! OAuth token cache for Firestore requests.
//!
//! Tokens are refreshed ahead of expiry under a write lock so concurrent
//! callers trigger at most one refresh. If a refresh fails while the cached
//! token has not yet expired, the cached token keeps being served.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Assumed lifetime when the provider reports an unusable expiry.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for the Firestore REST API.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }

    fn usable(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Converts the provider's wall-clock expiry into a monotonic deadline.
fn deadline_for(token: &gcp_auth::Token) -> Instant {
    let now = Utc::now();
    let expires = token.expires_at();
    if expires <= now {
        return Instant::now();
    }
    let ttl = (expires - now).to_std().unwrap_or(FALLBACK_TTL);
    Instant::now() + ttl
}

/// Shared access-token cache.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            slot: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Return a token valid for at least the refresh margin.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(cached) = self.slot.read().await.as_ref() {
            if cached.fresh(Instant::now()) {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.slot.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fresh(Instant::now()) {
                return Ok(cached.value.clone());
            }
        }

        match self.provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let cached = CachedToken {
                    value: token.as_str().to_string(),
                    expires_at: deadline_for(&token),
                };
                debug!("Refreshed Firestore access token");
                let value = cached.value.clone();
                *slot = Some(cached);
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(cached) if cached.usable(Instant::now()) => {
                    warn!(error = %e, "Token refresh failed, serving cached token");
                    Ok(cached.value.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness_window() {
        let now = Instant::now();
        let token = CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::from_secs(30),
        };
        assert!(!token.fresh(now));
        assert!(token.usable(now));

        let long_lived = CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::from_secs(600),
        };
        assert!(long_lived.fresh(now));
    }

    #[test]
    fn test_scope_targets_datastore() {
        assert!(FIRESTORE_SCOPE.ends_with("/datastore"));
    }
}
