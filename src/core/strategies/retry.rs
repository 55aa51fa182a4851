use super::pause;
use crate::core::reserver::Reserver;
use crate::core::ReservationOutcome;
use crate::utils::error::{ReserverError, Result};
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

impl Reserver {
    /// Polls the target date until it has slots, then commits once.
    ///
    /// Empty answers are retried after `empty_probe_delay`; a probe error ends
    /// the run.
    pub async fn retry_single_date(
        &self,
        today: NaiveDate,
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        let date = self.target_date(today)?;

        async {
            tracing::info!("🔁 Polling {} until slots appear", date);

            let mut attempts: u64 = 0;
            let slots = loop {
                attempts += 1;
                let slots = match self.prober.probe(date, shutdown).await {
                    Ok(slots) => slots,
                    Err(ReserverError::Cancelled) => return Ok(None),
                    Err(e) => {
                        tracing::error!("❌ Probe {} for {} failed: {}", attempts, date, e);
                        return Err(e);
                    }
                };

                if !slots.is_empty() {
                    tracing::info!("Found {} slots after {} probes", slots.len(), attempts);
                    break slots;
                }
                if !pause(self.settings.empty_probe_delay, shutdown).await {
                    return Ok(None);
                }
            };

            let outcome = self.committer.commit(&slots).await?;
            Ok(Some(outcome))
        }
        .instrument(self.span.clone())
        .await
    }
}
