//! Session and token management.
//!
//! The storefront backend issues an access/refresh token pair at login. The
//! pair lives in a [`SessionContext`] shared by every outbound call, and is
//! mutated only through the explicit entry points here: [`SessionContext::login`],
//! [`SessionContext::apply_refresh`], and [`SessionContext::clear`]. A reader
//! that observes no token mid-refresh treats the session as unauthenticated
//! rather than erroring.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Access/refresh token pair as issued by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Shared, mutable session state for the API client.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    tokens: Arc<RwLock<Option<TokenPair>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly issued token pair (login or registration).
    pub async fn login(&self, tokens: TokenPair) {
        *self.tokens.write().await = Some(tokens);
        debug!("session tokens stored");
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
    }

    /// Store the outcome of a token refresh. The refresh token rotates only
    /// when the backend returned a new one; otherwise the stored one is kept.
    pub async fn apply_refresh(&self, access_token: String, refresh_token: Option<String>) {
        let mut guard = self.tokens.write().await;
        let retained = refresh_token.or_else(|| guard.as_ref().map(|pair| pair.refresh_token.clone()));
        *guard = retained.map(|refresh_token| TokenPair {
            access_token,
            refresh_token,
        });
        debug!("session tokens refreshed");
    }

    /// Drop all stored tokens (logout or unrecoverable auth failure).
    pub async fn clear(&self) {
        *self.tokens.write().await = None;
        debug!("session tokens cleared");
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }
}
