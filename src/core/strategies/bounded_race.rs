use super::{pause, race_probe, record_probe, settle, RaceGate, RaceProbe};
use crate::core::reserver::Reserver;
use crate::core::ReservationOutcome;
use crate::utils::error::{ReserverError, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

impl Reserver {
    /// Keeps at most `limit` probes of the target date in flight until one of
    /// them sees slots, then commits exactly once.
    pub async fn bounded_race(
        &self,
        today: NaiveDate,
        limit: usize,
        shutdown: &CancellationToken,
    ) -> Result<Option<ReservationOutcome>> {
        if limit == 0 {
            return Err(ReserverError::InputContractViolation {
                message: "race limit must be at least 1".to_string(),
            });
        }
        let date = self.target_date(today)?;

        async {
            tracing::info!("🏁 Racing probes for {} (limit {})", date, limit);

            let (gate, mut winner) = RaceGate::new(shutdown.child_token());
            let permits = Arc::new(Semaphore::new(limit));
            let mut probes: JoinSet<Result<RaceProbe>> = JoinSet::new();
            let mut first_error = None;
            let mut launched: u64 = 0;

            loop {
                let permit = tokio::select! {
                    biased;
                    _ = gate.cancelled() => break,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                while let Some(joined) = probes.try_join_next() {
                    record_probe(&mut first_error, joined);
                }

                launched += 1;
                let prober = self.prober.clone();
                let gate = gate.clone();
                let delay = self.settings.empty_probe_delay;
                probes.spawn(
                    async move {
                        let _permit = permit;
                        let verdict = race_probe(&prober, &gate, date).await?;
                        if verdict == RaceProbe::Empty {
                            // 釋放名額前先等一下，避免空轉
                            pause(delay, gate.token()).await;
                        }
                        Ok::<_, ReserverError>(verdict)
                    }
                    .in_current_span(),
                );
            }

            // 勝出的 probe 先送出時段再取消，這裡一定拿得到
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

            tracing::debug!("Race finished after {} probes", launched);

            settle(outcome, first_error)
        }
        .instrument(self.span.clone())
        .await
    }
}
