//! Acquisition strategies built on the prober and the committer.
//!
//! The two race strategies share [`RaceGate`]: probes run as tokio tasks under
//! one cancellation token, and the first probe to see slots wins an atomic
//! check-and-set, hands its slots over a single-slot channel and cancels the
//! others. The strategy then commits once, outside the cancelled scope.

mod bounded_race;
mod retry;
mod watch;
mod window_race;

pub use watch::business_days_after;
pub use window_race::window_dates;

use crate::core::prober::SlotProber;
use crate::core::{ReservationOutcome, Slot};
use crate::utils::error::{ReserverError, Result};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

pub(crate) struct RaceGate {
    claimed: AtomicBool,
    cancel: CancellationToken,
    winner: mpsc::Sender<Vec<Slot>>,
}

impl RaceGate {
    pub(crate) fn new(cancel: CancellationToken) -> (Arc<Self>, mpsc::Receiver<Vec<Slot>>) {
        let (winner, rx) = mpsc::channel(1);
        let gate = Arc::new(Self {
            claimed: AtomicBool::new(false),
            cancel,
            winner,
        });
        (gate, rx)
    }

    /// First caller wins; everyone after that gets `false`.
    pub(crate) fn claim(&self, slots: Vec<Slot>) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // capacity 1 and a single claimant, so this never sees a full channel
        let _ = self.winner.try_send(slots);
        self.cancel.cancel();
        true
    }

    /// Cancels the race without a winner (a probe failed).
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RaceProbe {
    Won,
    Lost,
    Empty,
    Cancelled,
}

/// One probe inside a race. Errors abort the whole race, like an error group.
pub(crate) async fn race_probe(
    prober: &SlotProber,
    gate: &RaceGate,
    date: NaiveDate,
) -> Result<RaceProbe> {
    let slots = match prober.probe(date, gate.token()).await {
        Ok(slots) => slots,
        Err(ReserverError::Cancelled) => return Ok(RaceProbe::Cancelled),
        Err(e) => {
            tracing::warn!("⚠️ Probe for {} failed, stopping race: {}", date, e);
            gate.abort();
            return Err(e);
        }
    };

    if slots.is_empty() {
        return Ok(RaceProbe::Empty);
    }
    if gate.claim(slots) {
        tracing::info!("🏆 Probe for {} won the race", date);
        Ok(RaceProbe::Won)
    } else {
        tracing::debug!("Probe for {} found slots but lost the race", date);
        Ok(RaceProbe::Lost)
    }
}

/// Sleeps for `delay` unless `cancel` fires first. Returns `false` when cancelled.
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Keeps the first error reported by a finished probe task.
pub(crate) fn record_probe(
    first_error: &mut Option<ReserverError>,
    joined: std::result::Result<Result<RaceProbe>, JoinError>,
) {
    let error = match joined {
        Ok(Ok(_)) => return,
        Ok(Err(e)) => e,
        Err(join_error) => ReserverError::TaskJoin(join_error),
    };
    if first_error.is_none() {
        *first_error = Some(error);
    }
}

/// A committed outcome always wins; otherwise the first probe error, if any.
pub(crate) fn settle(
    outcome: Option<ReservationOutcome>,
    first_error: Option<ReserverError>,
) -> Result<Option<ReservationOutcome>> {
    match (outcome, first_error) {
        (Some(outcome), _) if outcome.committed => Ok(Some(outcome)),
        (_, Some(e)) => Err(e),
        (outcome, None) => Ok(outcome),
    }
}
