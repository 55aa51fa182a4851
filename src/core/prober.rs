use crate::core::credential::CredentialManager;
use crate::core::{ReservationApi, Slot};
use crate::utils::error::{ReserverError, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Asks the service which slots are open on a date.
///
/// An empty list means "not yet available" and is not an error. Cancellation
/// is checked before every suspension point; an in-flight request is allowed
/// to finish.
pub struct SlotProber {
    api: Arc<dyn ReservationApi>,
    credentials: Arc<CredentialManager>,
    span: Span,
}

impl SlotProber {
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

    pub async fn probe(&self, date: NaiveDate, cancel: &CancellationToken) -> Result<Vec<Slot>> {
        async {
            if cancel.is_cancelled() {
                return Err(ReserverError::Cancelled);
            }
            let token = self.credentials.ensure_valid().await?;

            if cancel.is_cancelled() {
                return Err(ReserverError::Cancelled);
            }
            let slots = self.api.list_slots(&token, date).await?;

            if slots.is_empty() {
                tracing::debug!("No slots for {}", date);
            } else {
                tracing::info!("📅 Found {} slots for {}", slots.len(), date);
            }
            Ok(slots)
        }
        .instrument(self.span.clone())
        .await
    }
}
