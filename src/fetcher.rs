use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};

/// The analytics endpoints polled every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Vamp,
    Orders,
    Latency,
    RiskSummary,
    ThreeDsSummary,
    BinDistribution,
    RuleFrequency,
    TimingTotalStats,
    TimingEvaluateStats,
}

impl Endpoint {
    pub const ALL: [Endpoint; 9] = [
        Endpoint::Vamp,
        Endpoint::Orders,
        Endpoint::Latency,
        Endpoint::RiskSummary,
        Endpoint::ThreeDsSummary,
        Endpoint::BinDistribution,
        Endpoint::RuleFrequency,
        Endpoint::TimingTotalStats,
        Endpoint::TimingEvaluateStats,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Vamp => "vamp",
            Endpoint::Orders => "orders",
            Endpoint::Latency => "latency",
            Endpoint::RiskSummary => "case-risk-summary",
            Endpoint::ThreeDsSummary => "3ds-summary",
            Endpoint::BinDistribution => "bin-distribution",
            Endpoint::RuleFrequency => "rule-frequency",
            Endpoint::TimingTotalStats => "timing-total-stats",
            Endpoint::TimingEvaluateStats => "timing-evaluate-stats",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// Path of the materialized-view refresh trigger.
pub const REFRESH_VIEW_PATH: &str = "refresh-view";

/// One cycle's raw payloads. `None` means "no data" for that endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBundle {
    pub vamp: Option<Value>,
    pub orders: Option<Value>,
    pub latency: Option<Value>,
    pub risk_summary: Option<Value>,
    pub three_ds: Option<Value>,
    pub bin_distribution: Option<Value>,
    pub rule_frequency: Option<Value>,
    pub timing_total: Option<Value>,
    pub timing_evaluate: Option<Value>,
}

impl RawBundle {
    /// Number of endpoints that produced a payload.
    pub fn present(&self) -> usize {
        [
            &self.vamp,
            &self.orders,
            &self.latency,
            &self.risk_summary,
            &self.three_ds,
            &self.bin_distribution,
            &self.rule_frequency,
            &self.timing_total,
            &self.timing_evaluate,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

/// Where the orchestrator gets its data. Implementations never fail: every
/// transport or parse problem is logged and reported as `None` / `false`.
#[async_trait]
pub trait AnalyticsSource: Send + Sync + 'static {
    async fn fetch(&self, endpoint: Endpoint) -> Option<Value>;

    /// Ask the backend to recompute its materialized view. `true` on success.
    async fn refresh_view(&self) -> bool;
}

/// Fire every endpoint fetch at once and wait for all of them to settle.
pub async fn fetch_all<S: AnalyticsSource + ?Sized>(source: &S) -> RawBundle {
    let (
        vamp,
        orders,
        latency,
        risk_summary,
        three_ds,
        bin_distribution,
        rule_frequency,
        timing_total,
        timing_evaluate,
    ) = tokio::join!(
        source.fetch(Endpoint::Vamp),
        source.fetch(Endpoint::Orders),
        source.fetch(Endpoint::Latency),
        source.fetch(Endpoint::RiskSummary),
        source.fetch(Endpoint::ThreeDsSummary),
        source.fetch(Endpoint::BinDistribution),
        source.fetch(Endpoint::RuleFrequency),
        source.fetch(Endpoint::TimingTotalStats),
        source.fetch(Endpoint::TimingEvaluateStats),
    );

    RawBundle {
        vamp,
        orders,
        latency,
        risk_summary,
        three_ds,
        bin_distribution,
        rule_frequency,
        timing_total,
        timing_evaluate,
    }
}

// ---------------------------------------------------------------------------
// HttpSource
// ---------------------------------------------------------------------------

pub struct HttpSource {
    client: reqwest::Client,
    api_base: String,
    subscriber_id: u64,
    exclude_dev: bool,
}

impl HttpSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            subscriber_id: cfg.subscriber_id,
            exclude_dev: cfg.exclude_dev,
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!(
            "{}/{}?subscriber_id={}&exclude_dev={}",
            self.api_base,
            endpoint.path(),
            self.subscriber_id,
            self.exclude_dev
        )
    }

    pub fn refresh_view_url(&self) -> String {
        format!("{}/{}", self.api_base, REFRESH_VIEW_PATH)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Status(status));
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl AnalyticsSource for HttpSource {
    async fn fetch(&self, endpoint: Endpoint) -> Option<Value> {
        let url = self.endpoint_url(endpoint);
        let started = Instant::now();
        match self.get_json(&url).await {
            Ok(v) => {
                debug!(
                    endpoint = %endpoint,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "fetched analytics payload"
                );
                Some(v)
            }
            Err(e) => {
                warn!(endpoint = %endpoint, url = %url, "Fetch failed: {e}");
                None
            }
        }
    }

    async fn refresh_view(&self) -> bool {
        let url = self.refresh_view_url();
        match self.client.get(&url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_client_error() || status.is_server_error() {
                    warn!(status = status.as_u16(), "Refresh view failed: {status}");
                    false
                } else {
                    info!(status = status.as_u16(), "Materialized view refresh accepted");
                    true
                }
            }
            Err(e) => {
                warn!("Refresh view request failed: {e}");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/analytics")
    }

    fn source(api_base: String) -> HttpSource {
        let cfg = Config {
            api_base,
            subscriber_id: 7,
            exclude_dev: true,
            ..Config::default()
        };
        HttpSource::new(&cfg).unwrap()
    }

    #[test]
    fn urls_carry_query_params() {
        let src = source("http://backend/analytics/".to_string());
        assert_eq!(
            src.endpoint_url(Endpoint::ThreeDsSummary),
            "http://backend/analytics/3ds-summary?subscriber_id=7&exclude_dev=true"
        );
        assert_eq!(src.refresh_view_url(), "http://backend/analytics/refresh-view");
    }

    #[tokio::test]
    async fn fetch_returns_json_or_none() {
        let app = Router::new()
            .route(
                "/analytics/case-risk-summary",
                get(|| async { Json(json!({"data": [{"risk_level": "HIGH", "count": 1}]})) }),
            )
            .route("/analytics/vamp", get(|| async { "definitely not json" }))
            .route(
                "/analytics/orders",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"data": []}))) }),
            );
        let src = source(serve(app).await);

        let risk = src.fetch(Endpoint::RiskSummary).await;
        assert_eq!(risk.unwrap()["data"][0]["count"], 1);
        assert!(src.fetch(Endpoint::Vamp).await.is_none());
        assert!(src.fetch(Endpoint::Orders).await.is_none());
        assert!(src.fetch(Endpoint::Latency).await.is_none());
    }

    #[tokio::test]
    async fn refresh_view_success_is_any_non_error_status() {
        let ok = Router::new().route("/analytics/refresh-view", get(|| async { StatusCode::NO_CONTENT }));
        assert!(source(serve(ok).await).refresh_view().await);

        let failing = Router::new().route(
            "/analytics/refresh-view",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        assert!(!source(serve(failing).await).refresh_view().await);
    }

    #[tokio::test]
    async fn unreachable_backend_is_no_data() {
        let src = source("http://127.0.0.1:9/analytics".to_string());
        let bundle = fetch_all(&src).await;
        assert_eq!(bundle, RawBundle::default());
        assert_eq!(bundle.present(), 0);
        assert!(!src.refresh_view().await);
    }
}
