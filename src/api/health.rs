//! Liveness view for the /health endpoint, derived from the published
//! refresh state.

use serde::Serialize;

use crate::types::{RefreshState, Trigger};

const NS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No cycle has completed yet.
    Starting,
    Ok,
    /// Auto-refresh is on but the last update is older than two periods.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub auto_refresh_enabled: bool,
    pub in_flight: bool,
    pub cycles_completed: u64,
    pub last_trigger: Option<Trigger>,
    pub seconds_since_update: Option<u64>,
}

impl HealthReport {
    pub fn from_state(state: &RefreshState, now_ns: u64, refresh_interval_secs: u64) -> Self {
        let seconds_since_update = state
            .last_updated_ns
            .map(|ns| now_ns.saturating_sub(ns) / NS_PER_SEC);

        let status = match seconds_since_update {
            None => HealthStatus::Starting,
            Some(age)
                if state.auto_refresh_enabled
                    && age > refresh_interval_secs.saturating_mul(2) =>
            {
                HealthStatus::Stale
            }
            Some(_) => HealthStatus::Ok,
        };

        Self {
            status,
            auto_refresh_enabled: state.auto_refresh_enabled,
            in_flight: state.in_flight,
            cycles_completed: state.cycles_completed,
            last_trigger: state.last_trigger,
            seconds_since_update,
        }
    }
}
