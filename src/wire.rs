//! JSON documents exchanged with the metrics server.

use crate::aggregator::{Anomaly, MinuteBucket};
use crate::error::FetchError;
use crate::snapshot::{CounterSnapshot, IpCount, LatencySummary, RouteCount, StatusCounts};
use serde::{Deserialize, Serialize};

/// Body of `GET /metrics-summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub by_status: StatusCounts,
    #[serde(default)]
    pub latency: LatencySummary,
    #[serde(default)]
    pub routes_top: Vec<RouteCount>,
    #[serde(default)]
    pub ips_top: Vec<IpCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_latency: Option<serde_json::Value>,
}

impl MetricsSummary {
    /// Converts the payload into a snapshot stamped with `captured_at`.
    /// A payload without `ok: true` counts as a failed fetch.
    pub fn into_snapshot(self, captured_at: u64) -> Result<CounterSnapshot, FetchError> {
        if self.ok != Some(true) {
            return Err(FetchError::NotOk);
        }
        Ok(CounterSnapshot {
            captured_at,
            total_requests: self.total_requests,
            by_status: self.by_status,
            latency: self.latency,
            top_routes: self.routes_top,
            top_ips: self.ips_top,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    pub id: String,
    pub count: u64,
}

/// Body of `GET /analytics/dashboard`, also what [`crate::Aggregator`]
/// publishes to its readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub minutes: usize,
    #[serde(default)]
    pub series: Vec<MinuteBucket>,
    #[serde(default)]
    pub top_routes: Vec<RouteCount>,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    #[serde(default)]
    pub out_of_hours_top: Vec<HourCount>,
    #[serde(default)]
    pub users_top: Vec<UserCount>,
    #[serde(default)]
    pub ips_top: Vec<IpCount>,
    #[serde(default)]
    pub generated_at: u64,
}

/// Request and response body of the allowlist endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    #[serde(default, skip_serializing)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub allowlist: Vec<String>,
}

impl Allowlist {
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ok: None,
            allowlist: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// An empty allowlist admits everything.
    pub fn admits(&self, value: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.iter().any(|entry| entry == value)
    }
}
