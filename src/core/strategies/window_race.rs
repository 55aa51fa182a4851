use super::{race_probe, record_probe, settle, RaceGate, RaceProbe};
use crate::core::reserver::Reserver;
use crate::core::ReservationOutcome;
use crate::utils::error::{ReserverError, Result};
use chrono::NaiveDate;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Takes the first `size` dates reported by the service, date portion only.
///
/// Fewer than `size` dates is a contract violation rather than a shorter race.
pub fn window_dates(reported: &[String], size: usize) -> Result<Vec<NaiveDate>> {
    if reported.len() < size {
        return Err(ReserverError::InputContractViolation {
            message: format!(
                "expected at least {} dates, service reported {}",
                size,
                reported.len()
            ),
        });
    }

    reported
        .iter()
        .take(size)
        .map(|raw| {
            raw.get(..10)
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
                .ok_or_else(|| ReserverError::InputContractViolation {
                    message: format!("unparseable date from service: {:?}", raw),
                })
        })
        .collect()
}

impl Reserver {
    /// Probes every date of the service's first window concurrently and
    /// commits on the first one that has slots.
    pub async fn fixed_window_race(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        async {
            let token = self.credentials.ensure_valid().await?;
            let reported = self.api.list_dates(&token).await?;
            tracing::debug!("Service reported dates: {:?}", reported);

            let dates = window_dates(&reported, self.settings.window_size)?;
            tracing::info!("🏁 Racing {} dates: {:?}", dates.len(), dates);

            let (gate, mut winner) = RaceGate::new(shutdown.child_token());
            let mut probes: JoinSet<Result<RaceProbe>> = JoinSet::new();
            for date in dates {
                let prober = self.prober.clone();
                let gate = gate.clone();
                probes.spawn(
                    async move { race_probe(&prober, &gate, date).await }.in_current_span(),
                );
            }

            // 等到有人勝出（或出錯被取消），或全部 probe 都結束
            let mut first_error = None;
            loop {
                tokio::select! {
                    biased;
                    _ = gate.cancelled() => break,
                    joined = probes.join_next() => match joined {
                        Some(joined) => record_probe(&mut first_error, joined),
                        None => break,
                    },
                }
            }

            let mut outcome = match winner.try_recv() {
                Ok(slots) => Some(self.committer.commit(&slots).await?),
                Err(_) => None,
            };

            while let Some(joined) = probes.join_next().await {
                record_probe(&mut first_error, joined);
            }

            // 出錯取消後，還在路上的 probe 仍可能認領到時段
            if outcome.is_none() {
                if let Ok(slots) = winner.try_recv() {
                    tracing::info!("🏆 Slots found after the race was aborted, committing");
                    outcome = Some(self.committer.commit(&slots).await?);
                }
            }

            if outcome.is_none() && first_error.is_none() {
                tracing::info!("No slots in the current window");
            }
            settle(outcome, first_error)
        }
        .instrument(self.span.clone())
        .await
    }
}
