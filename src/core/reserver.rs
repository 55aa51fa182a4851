use crate::core::committer::ReservationCommitter;
use crate::core::credential::CredentialManager;
use crate::core::prober::SlotProber;
use crate::core::{EngineSettings, Notifier, ReservationApi, ReservationOutcome, Strategy};
use crate::utils::error::{ReserverError, Result};
use chrono::{Days, Local, NaiveDate};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// The slot-acquisition engine for one session.
pub struct Reserver {
    pub(crate) api: Arc<dyn ReservationApi>,
    pub(crate) credentials: Arc<CredentialManager>,
    pub(crate) prober: Arc<SlotProber>,
    pub(crate) committer: ReservationCommitter,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) settings: EngineSettings,
    pub(crate) span: Span,
}

impl Reserver {
    pub fn new(
        api: Arc<dyn ReservationApi>,
        credentials: Arc<CredentialManager>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
        span: Span,
    ) -> Self {
        let prober = Arc::new(SlotProber::new(api.clone(), credentials.clone(), span.clone()));
        let committer = ReservationCommitter::new(api.clone(), credentials.clone(), span.clone());
        Self {
            api,
            credentials,
            prober,
            committer,
            notifier,
            settings,
            span,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Re-validates the credential, refreshing it when it is about to expire.
    pub async fn refresh_session(&self) -> Result<()> {
        self.credentials.ensure_valid().await.map(|_| ())
    }

    /// 只取得 2FA token（`mfa` 指令）
    pub async fn two_factor_token(&self) -> Result<String> {
        async {
            let token = self.credentials.ensure_valid().await?;
            self.api.fetch_two_factor_token(&token).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// The single date the retry and bounded-race strategies aim at.
    pub fn target_date(&self, today: NaiveDate) -> Result<NaiveDate> {
        today
            .checked_add_days(Days::new(self.settings.target_offset_days))
            .ok_or_else(|| ReserverError::InputContractViolation {
                message: format!(
                    "{} + {} days is out of range",
                    today, self.settings.target_offset_days
                ),
            })
    }

    /// Runs `strategy` starting from today's local date.
    ///
    /// `Ok(None)` means the run ended without any commit attempt (shutdown,
    /// or no date had slots).
    pub async fn run(
        &self,
        strategy: Strategy,
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        self.run_from(strategy, Local::now().date_naive(), shutdown)
            .await
    }

    pub async fn run_from(
        &self,
        strategy: Strategy,
        today: NaiveDate,
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        tracing::info!(parent: &self.span, "🚀 Starting strategy {}", strategy.name());
        match strategy {
            Strategy::RetrySingleDate => self.retry_single_date(today, shutdown).await,
            Strategy::BoundedRace { limit } => self.bounded_race(today, limit, shutdown).await,
            Strategy::FixedWindow => self.fixed_window_race(shutdown).await,
            Strategy::Watch { interval } => self.watch(today, interval, shutdown).await,
        }
    }
}
