use super::pause;
use crate::core::reserver::Reserver;
use crate::core::ReservationOutcome;
use crate::utils::error::{ReserverError, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Monday to Friday dates among `start + 1 ..= start + horizon_days`.
pub fn business_days_after(start: NaiveDate, horizon_days: u64) -> Vec<NaiveDate> {
    (1..=horizon_days)
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

impl Reserver {
    /// Scans the coming business days forever, one date at a time, until a
    /// commit succeeds or `shutdown` fires.
    pub async fn watch(
        &self,
        today: NaiveDate,
        interval: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        let dates = business_days_after(today, self.settings.watch_horizon_days);

        async {
            tracing::info!("👀 Watching {} business days: {:?}", dates.len(), dates);

            let mut cycle: u64 = 0;
            loop {
                cycle += 1;
                if let Some(outcome) = self.watch_cycle(&dates, shutdown).await? {
                    if outcome.committed {
                        return Ok::<_, ReserverError>(Some(outcome));
                    }
                }

                tracing::info!("---------------------------");
                tracing::debug!("Watch cycle {} finished, sleeping {:?}", cycle, interval);
                if !pause(interval, shutdown).await {
                    tracing::info!("🛑 Watch stopped after {} cycles", cycle);
                    return Ok(None);
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// One pass over `dates`; stops at the first date that has slots, whatever
    /// the commit result.
    async fn watch_cycle(
        &self,
        dates: &[NaiveDate],
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        for &date in dates {
            let slots = match self.prober.probe(date, shutdown).await {
                Ok(slots) => slots,
                Err(ReserverError::Cancelled) => return Ok(None),
                Err(e) if e.ends_session() => return Err(e),
                Err(e) => {
                    tracing::warn!("⚠️ Probe for {} failed: {}", date, e);
                    continue;
                }
            };
            if slots.is_empty() {
                continue;
            }

            let message = format!("Found slots for date {}", date);
            if let Err(e) = self.notifier.notify(&message).await {
                tracing::warn!("📨 Notification failed: {}", e);
            }

            let outcome = self.committer.commit(&slots).await?;
            return Ok(Some(outcome));
        }
        Ok(None)
    }
}
