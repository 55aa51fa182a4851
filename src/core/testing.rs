//! Scripted in-memory collaborators for engine tests.

use crate::core::{CredentialRefresher, Notifier, ReservationApi, Slot};
use crate::utils::error::{ReserverError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "sub": "12345ABC-DF67-890D-9CB5-ABC34D56E798",
            "aud": "inpol-direct",
            "exp": exp,
        })
        .to_string(),
    );
    format!("{}.{}.signature", header, payload)
}

pub(crate) fn jwt_expiring_in(delta: chrono::Duration) -> String {
    jwt_with_exp((Utc::now() + delta).timestamp())
}

pub(crate) fn fresh_jwt() -> String {
    jwt_expiring_in(chrono::Duration::minutes(10))
}

pub(crate) fn slot(id: i64, count: u32) -> Slot {
    Slot {
        id,
        date: "2025-03-03T00:00:00".to_string(),
        count,
    }
}

pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[derive(Debug, Clone)]
pub(crate) enum ProbeScript {
    Slots(Vec<Slot>),
    Fail,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SubmitScript {
    Accept,
    Reject,
    Fail,
}

/// Reservation service double. Probe answers are consumed from a per-date
/// queue, then fall back to a sticky per-date answer, then to "no slots".
#[derive(Default)]
pub(crate) struct ScriptedApi {
    dates: Vec<String>,
    probe_queues: Mutex<HashMap<NaiveDate, VecDeque<ProbeScript>>>,
    sticky_slots: HashMap<NaiveDate, Vec<Slot>>,
    submit_queues: Mutex<HashMap<i64, VecDeque<SubmitScript>>>,
    accepted: Vec<i64>,
    probe_delay: Duration,
    date_delays: HashMap<NaiveDate, Duration>,
    probe_log: Mutex<Vec<NaiveDate>>,
    submit_log: Mutex<Vec<i64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_dates(mut self, dates: &[&str]) -> Self {
        self.dates = dates.iter().map(|d| d.to_string()).collect();
        self
    }

    pub(crate) fn with_slots(mut self, date: NaiveDate, slots: Vec<Slot>) -> Self {
        self.sticky_slots.insert(date, slots);
        self
    }

    pub(crate) fn with_probe_sequence(self, date: NaiveDate, script: Vec<ProbeScript>) -> Self {
        self.probe_queues
            .lock()
            .unwrap()
            .insert(date, script.into_iter().collect());
        self
    }

    pub(crate) fn accepting(mut self, slot_id: i64) -> Self {
        self.accepted.push(slot_id);
        self
    }

    pub(crate) fn with_submit_sequence(self, slot_id: i64, script: Vec<SubmitScript>) -> Self {
        self.submit_queues
            .lock()
            .unwrap()
            .insert(slot_id, script.into_iter().collect());
        self
    }

    pub(crate) fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Overrides the probe delay for one date.
    pub(crate) fn with_date_delay(mut self, date: NaiveDate, delay: Duration) -> Self {
        self.date_delays.insert(date, delay);
        self
    }

    pub(crate) fn probes(&self) -> Vec<NaiveDate> {
        self.probe_log.lock().unwrap().clone()
    }

    pub(crate) fn submissions(&self) -> Vec<i64> {
        self.submit_log.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReservationApi for ScriptedApi {
    async fn list_dates(&self, _token: &str) -> Result<Vec<String>> {
        Ok(self.dates.clone())
    }

    async fn list_slots(&self, _token: &str, date: NaiveDate) -> Result<Vec<Slot>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.probe_log.lock().unwrap().push(date);

        let delay = self.date_delays.get(&date).copied().unwrap_or(self.probe_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .probe_queues
            .lock()
            .unwrap()
            .get_mut(&date)
            .and_then(|queue| queue.pop_front());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match scripted {
            Some(ProbeScript::Slots(slots)) => Ok(slots),
            Some(ProbeScript::Fail) => Err(ReserverError::UnexpectedStatus {
                endpoint: format!("{}/slots", date),
                status: 500,
            }),
            None => Ok(self.sticky_slots.get(&date).cloned().unwrap_or_default()),
        }
    }

    async fn submit_reservation(&self, _token: &str, slot: &Slot) -> Result<bool> {
        self.submit_log.lock().unwrap().push(slot.id);

        let scripted = self
            .submit_queues
            .lock()
            .unwrap()
            .get_mut(&slot.id)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(SubmitScript::Accept) => Ok(true),
            Some(SubmitScript::Reject) => Ok(false),
            Some(SubmitScript::Fail) => Err(ReserverError::UnexpectedStatus {
                endpoint: "reserve".to_string(),
                status: 502,
            }),
            None => Ok(self.accepted.contains(&slot.id)),
        }
    }

    async fn fetch_two_factor_token(&self, _token: &str) -> Result<String> {
        Ok("two-factor-token".to_string())
    }
}

/// Counts refresh calls; answers with a fresh token or a failure.
pub(crate) struct CountingRefresher {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl CountingRefresher {
    pub(crate) fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh_credential(&self, _current: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ReserverError::RefreshFailed {
                reason: "status 401".to_string(),
            });
        }
        Ok(format!("{}\n", fresh_jwt()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(ReserverError::NotificationError {
                message: "chat unreachable".to_string(),
            });
        }
        Ok(())
    }
}
