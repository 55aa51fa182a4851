use crate::core::credential::CredentialManager;
use crate::core::{ReservationApi, ReservationOutcome, Slot};
use crate::utils::error::{ReserverError, Result};
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Index of the slot with the most remaining places; ties go to the last one.
pub fn select_slot(slots: &[Slot]) -> Option<usize> {
    slots
        .iter()
        .enumerate()
        .fold(None, |best, (index, candidate)| match best {
            Some(b) if slots[b].count > candidate.count => Some(b),
            _ => Some(index),
        })
}

/// Attempt order: the selected slot first, then every other slot in input order.
fn attempt_order(len: usize, selected: usize) -> impl Iterator<Item = usize> {
    std::iter::once(selected).chain((0..len).filter(move |&i| i != selected))
}

pub struct ReservationCommitter {
    api: Arc<dyn ReservationApi>,
    credentials: Arc<CredentialManager>,
    span: Span,
}

impl ReservationCommitter {
    pub fn new(
        api: Arc<dyn ReservationApi>,
        credentials: Arc<CredentialManager>,
        span: Span,
    ) -> Self {
        Self {
            api,
            credentials,
            span,
        }
    }

    /// 送出預約；被拒絕時依原始順序改試其他時段
    pub async fn commit(&self, slots: &[Slot]) -> Result<ReservationOutcome> {
        self.commit_in_order(slots)
            .instrument(self.span.clone())
            .await
    }

    async fn commit_in_order(&self, slots: &[Slot]) -> Result<ReservationOutcome> {
        let selected = select_slot(slots).ok_or_else(|| ReserverError::InputContractViolation {
            message: "commit requires at least one slot".to_string(),
        })?;

        let mut last_attempted = &slots[selected];
        for (attempt, index) in attempt_order(slots.len(), selected).enumerate() {
            let slot = &slots[index];
            last_attempted = slot;

            if attempt == 0 {
                tracing::info!(
                    "🎯 Reserving slot {} on {} ({} left)",
                    slot.id,
                    slot.date,
                    slot.count
                );
            } else {
                tracing::info!("↪️ Falling back to slot {} on {}", slot.id, slot.date);
            }

            if self.try_submit(slot).await? {
                tracing::info!("✅ Reservation done: slot {} on {}", slot.id, slot.date);
                return Ok(ReservationOutcome {
                    committed: true,
                    slot: slot.clone(),
                });
            }
        }

        tracing::warn!("❌ Reservation failed for all {} candidate slots", slots.len());
        Ok(ReservationOutcome {
            committed: false,
            slot: last_attempted.clone(),
        })
    }

    /// `Ok(false)` for a failed attempt; only session-ending credential
    /// errors escape.
    async fn try_submit(&self, slot: &Slot) -> Result<bool> {
        let token = match self.credentials.ensure_valid().await {
            Ok(token) => token,
            Err(e) if e.ends_session() => {
                tracing::error!("⛔ Cannot submit slot {}: {}", slot.id, e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("⚠️ Cannot submit slot {}: {}", slot.id, e);
                return Ok(false);
            }
        };

        match self.api.submit_reservation(&token, slot).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::warn!("Slot {} rejected", slot.id);
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("⚠️ Submitting slot {} failed: {}", slot.id, e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{
        fresh_jwt, jwt_expiring_in, slot, CountingRefresher, ScriptedApi, SubmitScript,
    };
    use std::time::Duration;

    fn committer_with(
        api: Arc<ScriptedApi>,
        token: String,
        refresher: CountingRefresher,
    ) -> ReservationCommitter {
        let credentials = Arc::new(CredentialManager::new(
            token,
            Arc::new(refresher),
            Duration::from_secs(120),
            Span::none(),
        ));
        ReservationCommitter::new(api, credentials, Span::none())
    }

    fn committer(api: Arc<ScriptedApi>) -> ReservationCommitter {
        committer_with(api, fresh_jwt(), CountingRefresher::succeeding())
    }

    #[test]
    fn test_select_slot_prefers_max_count_last_on_ties() {
        let slots = vec![slot(1, 3), slot(2, 5), slot(3, 5)];
        assert_eq!(select_slot(&slots), Some(2));

        let slots = vec![slot(1, 9), slot(2, 5), slot(3, 5)];
        assert_eq!(select_slot(&slots), Some(0));

        let slots = vec![slot(1, 0), slot(2, 0)];
        assert_eq!(select_slot(&slots), Some(1));

        assert_eq!(select_slot(&[]), None);
    }

    #[test]
    fn test_attempt_order_skips_selected() {
        let order: Vec<usize> = attempt_order(4, 2).collect();
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[tokio::test]
    async fn test_commit_selected_slot_first() {
        let api = Arc::new(ScriptedApi::new().accepting(3).accepting(1));
        let committer = committer(api.clone());

        let outcome = committer
            .commit(&[slot(1, 3), slot(2, 5), slot(3, 5)])
            .await
            .unwrap();

        assert!(outcome.committed);
        assert_eq!(outcome.slot.id, 3);
        assert_eq!(api.submissions(), vec![3]);
    }

    #[tokio::test]
    async fn test_commit_falls_back_in_input_order() {
        // A 失敗、B（最多名額）失敗、C 成功
        let api = Arc::new(ScriptedApi::new().accepting(3));
        let committer = committer(api.clone());

        let outcome = committer
            .commit(&[slot(1, 1), slot(2, 4), slot(3, 2)])
            .await
            .unwrap();

        assert!(outcome.committed);
        assert_eq!(outcome.slot.id, 3);
        assert_eq!(api.submissions(), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_transport_errors_are_swallowed_during_fallback() {
        let api = Arc::new(
            ScriptedApi::new()
                .with_submit_sequence(2, vec![SubmitScript::Fail])
                .with_submit_sequence(1, vec![SubmitScript::Accept]),
        );
        let committer = committer(api.clone());

        let outcome = committer.commit(&[slot(1, 1), slot(2, 4)]).await.unwrap();

        assert!(outcome.committed);
        assert_eq!(outcome.slot.id, 1);
        assert_eq!(api.submissions(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_exhausted_candidates_report_not_committed() {
        let api = Arc::new(ScriptedApi::new().with_submit_sequence(1, vec![SubmitScript::Reject]));
        let committer = committer(api.clone());

        let outcome = committer
            .commit(&[slot(1, 1), slot(2, 4), slot(3, 2)])
            .await
            .unwrap();

        assert!(!outcome.committed);
        assert_eq!(outcome.slot.id, 3);
        assert_eq!(api.submissions(), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_missing_credential_escapes_commit() {
        let api = Arc::new(ScriptedApi::new().accepting(1));
        let committer = committer_with(api.clone(), String::new(), CountingRefresher::succeeding());

        let result = committer.commit(&[slot(1, 1), slot(2, 4)]).await;

        assert!(matches!(
            result,
            Err(ReserverError::MissingCredential { .. })
        ));
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_expired_credential_escapes_commit() {
        let api = Arc::new(ScriptedApi::new().accepting(1));
        let expired = jwt_expiring_in(chrono::Duration::seconds(-10));
        let committer = committer_with(api.clone(), expired, CountingRefresher::succeeding());

        let result = committer.commit(&[slot(1, 1)]).await;

        assert!(matches!(result, Err(ReserverError::Expired { .. })));
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_counts_as_failed_attempt() {
        let api = Arc::new(ScriptedApi::new().accepting(1));
        let stale = jwt_expiring_in(chrono::Duration::seconds(30));
        let committer = committer_with(api.clone(), stale, CountingRefresher::failing());

        let outcome = committer.commit(&[slot(1, 1), slot(2, 4)]).await.unwrap();

        assert!(!outcome.committed);
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_empty_input() {
        let api = Arc::new(ScriptedApi::new());
        let committer = committer(api.clone());

        let result = committer.commit(&[]).await;
        assert!(matches!(
            result,
            Err(ReserverError::InputContractViolation { .. })
        ));
        assert!(api.submissions().is_empty());
    }
}
