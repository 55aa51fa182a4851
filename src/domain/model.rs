use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 某一天可預約的時段，`count` 為剩餘名額
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    pub date: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationOutcome {
    pub committed: bool,
    /// The slot that was committed, or the last one attempted.
    pub slot: Slot,
}

/// 四種搶號策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Poll one fixed future date until slots appear.
    RetrySingleDate,
    /// Race repeated probes of the fixed date, at most `limit` in flight.
    BoundedRace { limit: usize },
    /// Race one probe per date over the service's first seven dates.
    FixedWindow,
    /// Scan the coming business days forever, sleeping `interval` between cycles.
    Watch { interval: Duration },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::RetrySingleDate => "retry-single-date",
            Strategy::BoundedRace { .. } => "bounded-race",
            Strategy::FixedWindow => "fixed-window",
            Strategy::Watch { .. } => "watch",
        }
    }
}

/// Timing and sizing knobs of the acquisition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub empty_probe_delay: Duration,
    pub refresh_lookahead: Duration,
    pub target_offset_days: u64,
    pub window_size: usize,
    pub watch_horizon_days: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            empty_probe_delay: Duration::from_millis(100),
            refresh_lookahead: Duration::from_secs(120),
            target_offset_days: 6,
            window_size: 7,
            watch_horizon_days: 7,
        }
    }
}
