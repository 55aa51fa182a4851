use crate::core::CredentialRefresher;
use crate::utils::error::{ReserverError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument, Span};

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<f64>,
}

/// 讀取 JWT 的 `exp`，不驗證簽章（我們沒有服務端的金鑰）
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ReserverError::MissingCredential {
            reason: "token is empty".to_string(),
        });
    }

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ReserverError::MissingCredential {
            reason: "token is not a JWT".to_string(),
        })?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ReserverError::MissingCredential {
            reason: format!("payload is not base64url: {}", e),
        })?;

    let claims: ExpiryClaim =
        serde_json::from_slice(&bytes).map_err(|e| ReserverError::MissingCredential {
            reason: format!("payload is not JSON: {}", e),
        })?;

    let exp = claims.exp.ok_or_else(|| ReserverError::MissingCredential {
        reason: "token has no exp claim".to_string(),
    })?;

    DateTime::from_timestamp(exp as i64, 0).ok_or_else(|| ReserverError::MissingCredential {
        reason: format!("exp claim out of range: {}", exp),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn parse(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let expires_at = decode_expiry(&token)?;
        Ok(Self { token, expires_at })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Still usable, but inside the lookahead window before expiry.
    pub fn is_stale_at(&self, now: DateTime<Utc>, lookahead: Duration) -> bool {
        let lookahead = chrono::Duration::from_std(lookahead).unwrap_or(chrono::Duration::MAX);
        match self.expires_at.checked_sub_signed(lookahead) {
            Some(refresh_from) => now > refresh_from,
            None => true,
        }
    }
}

/// Owns the session credential. Refresh happens lazily on the calling path
/// and at most one refresh request is in flight at a time.
pub struct CredentialManager {
    token: RwLock<String>,
    refresh_gate: Mutex<()>,
    refresher: Arc<dyn CredentialRefresher>,
    lookahead: Duration,
    span: Span,
}

impl CredentialManager {
    pub fn new(
        token: impl Into<String>,
        refresher: Arc<dyn CredentialRefresher>,
        lookahead: Duration,
        span: Span,
    ) -> Self {
        Self {
            token: RwLock::new(token.into()),
            refresh_gate: Mutex::new(()),
            refresher,
            lookahead,
            span,
        }
    }

    pub async fn current_token(&self) -> String {
        self.token.read().await.clone()
    }

    /// Returns a token that is safe to send right now, refreshing it first
    /// when it is about to expire.
    pub async fn ensure_valid(&self) -> Result<String> {
        self.check_and_refresh().instrument(self.span.clone()).await
    }

    async fn check_and_refresh(&self) -> Result<String> {
        let observed = self.current_token().await;
        let credential = Credential::parse(observed.as_str())?;
        let now = Utc::now();

        if credential.is_expired_at(now) {
            tracing::warn!("⛔ Credential expired at {}", credential.expires_at());
            return Err(ReserverError::Expired {
                expired_at: credential.expires_at(),
            });
        }

        if !credential.is_stale_at(now, self.lookahead) {
            return Ok(observed);
        }

        tracing::info!(
            "🔑 Credential expires at {}, time to refresh...",
            credential.expires_at()
        );
        self.refresh_from(observed).await
    }

    async fn refresh_from(&self, observed: String) -> Result<String> {
        let _gate = self.refresh_gate.lock().await;

        {
            let current = self.token.read().await;
            if *current != observed {
                tracing::debug!("Credential already refreshed by a concurrent caller");
                return Ok(current.clone());
            }
        }

        match self.refresher.refresh_credential(&observed).await {
            Ok(fresh) => {
                let fresh = fresh.trim().to_string();
                *self.token.write().await = fresh.clone();
                tracing::info!("🔑 Credential refreshed");
                Ok(fresh)
            }
            Err(e) => {
                tracing::warn!("❌ Failed to refresh credential: {}", e);
                Err(match e {
                    ReserverError::RefreshFailed { .. } => e,
                    other => ReserverError::RefreshFailed {
                        reason: other.to_string(),
                    },
                })
            }
        }
    }
}
