use crate::core::credential::{decode_expiry, CredentialManager};
use crate::core::reserver::Reserver;
use crate::core::{CredentialRefresher, EngineSettings, Notifier, ReservationApi};
use crate::utils::error::Result;
use std::sync::Arc;

/// Builds a [`Reserver`] for one session, validating (and if needed
/// refreshing) the starting credential first.
pub struct SessionBootstrap {
    api: Arc<dyn ReservationApi>,
    refresher: Arc<dyn CredentialRefresher>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
    label: String,
}

impl SessionBootstrap {
    pub fn new(
        api: Arc<dyn ReservationApi>,
        refresher: Arc<dyn CredentialRefresher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            refresher,
            notifier,
            settings: EngineSettings::default(),
            label: "default".to_string(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 日誌 span 上顯示的名稱，通常是排隊隊列 id
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub async fn start(self, token: impl Into<String>) -> Result<Reserver> {
        let span = tracing::info_span!("session", queue = %self.label);
        let credentials = Arc::new(CredentialManager::new(
            token,
            self.refresher,
            self.settings.refresh_lookahead,
            span.clone(),
        ));

        let valid = credentials.ensure_valid().await?;
        if let Ok(expires_at) = decode_expiry(&valid) {
            tracing::info!(
                parent: &span,
                "🔐 Session ready, credential valid until {}",
                expires_at
            );
        }

        Ok(Reserver::new(
            self.api,
            credentials,
            self.notifier,
            self.settings,
            span,
        ))
    }
}
