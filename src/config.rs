use std::time::Duration;

use crate::error::{AppError, Result};

pub const API_BASE: &str = "http://localhost:8080/analytics";

/// Default auto-refresh period in seconds (16 minutes).
pub const REFRESH_INTERVAL_SECS: u64 = 960;

/// Default per-request timeout (seconds). `REQUEST_TIMEOUT_SECS=0` disables it.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Channel capacity for orchestrator commands.
pub const CHANNEL_CAPACITY: usize = 64;

/// Rendered in place of any KPI that has no data or a zero denominator.
pub const PLACEHOLDER: &str = "-";

/// Rule-frequency records kept after sorting by count.
pub const RULE_FREQUENCY_TOP_N: usize = 10;

/// Rows of the latency payload charted as a preview series.
pub const LATENCY_PREVIEW_ROWS: usize = 15;

/// Recent orders kept per currency.
pub const RECENT_ORDERS_LIMIT: usize = 10;

/// How bucket percents are produced by the risk and 3DS processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PercentPolicy {
    /// Derive every percent from the conserved bucket counts.
    #[default]
    Recompute,
    /// Sum the backend-supplied percents of the rows in each bucket.
    Backend,
}

impl std::str::FromStr for PercentPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recompute" => Ok(PercentPolicy::Recompute),
            "backend" => Ok(PercentPolicy::Backend),
            other => Err(AppError::Config(format!(
                "PERCENT_POLICY must be 'recompute' or 'backend', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base path all analytics endpoints live under (ANALYTICS_API_BASE).
    pub api_base: String,
    pub subscriber_id: u64,
    pub exclude_dev: bool,
    pub refresh_interval: Duration,
    /// Whether the timer starts enabled (AUTO_REFRESH).
    pub auto_refresh: bool,
    /// Call /refresh-view before the initial load as well (REFRESH_VIEW_ON_LOAD).
    pub refresh_view_on_load: bool,
    pub request_timeout: Option<Duration>,
    pub percent_policy: PercentPolicy,
    pub log_level: String,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            subscriber_id: 1,
            exclude_dev: false,
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECS),
            auto_refresh: true,
            refresh_view_on_load: false,
            request_timeout: Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            percent_policy: PercentPolicy::Recompute,
            log_level: "info".to_string(),
            api_port: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_base = get("ANALYTICS_API_BASE")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.api_base);

        let subscriber_id = match get("SUBSCRIBER_ID") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                AppError::Config("SUBSCRIBER_ID must be a non-negative integer".to_string())
            })?,
            None => defaults.subscriber_id,
        };

        let refresh_secs = match get("REFRESH_INTERVAL_SECS") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                AppError::Config("REFRESH_INTERVAL_SECS must be an integer".to_string())
            })?,
            None => REFRESH_INTERVAL_SECS,
        };
        if refresh_secs == 0 {
            return Err(AppError::Config(
                "REFRESH_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => match v.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    return Err(AppError::Config(
                        "REQUEST_TIMEOUT_SECS must be an integer".to_string(),
                    ))
                }
            },
            None => defaults.request_timeout,
        };

        let percent_policy = match get("PERCENT_POLICY") {
            Some(v) => v.parse()?,
            None => defaults.percent_policy,
        };

        Ok(Self {
            api_base,
            subscriber_id,
            exclude_dev: get("EXCLUDE_DEV").map_or(defaults.exclude_dev, |v| parse_flag(&v)),
            refresh_interval: Duration::from_secs(refresh_secs),
            auto_refresh: get("AUTO_REFRESH").map_or(defaults.auto_refresh, |v| parse_flag(&v)),
            refresh_view_on_load: get("REFRESH_VIEW_ON_LOAD")
                .map_or(defaults.refresh_view_on_load, |v| parse_flag(&v)),
            request_timeout,
            percent_policy,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            api_port: get("API_PORT")
                .unwrap_or_else(|| defaults.api_port.to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
