use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cumulative response counts split by status class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(rename = "2xx", default)]
    pub c2xx: u64,
    #[serde(rename = "3xx", default)]
    pub c3xx: u64,
    #[serde(rename = "4xx", default)]
    pub c4xx: u64,
    #[serde(rename = "5xx", default)]
    pub c5xx: u64,
    #[serde(default)]
    pub other: u64,
}

impl StatusCounts {
    #[inline(always)]
    pub fn errors(&self) -> u64 {
        self.c4xx.saturating_add(self.c5xx)
    }

    pub fn record(&mut self, status: u16) {
        match status {
            200..=299 => self.c2xx += 1,
            300..=399 => self.c3xx += 1,
            400..=499 => self.c4xx += 1,
            500..=599 => self.c5xx += 1,
            _ => self.other += 1,
        }
    }
}

/// Latency figures reported by the server; any of them may be absent before
/// the first request has been served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub avg_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCount {
    pub route: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
    #[serde(default)]
    pub last_seen: u64,
}

/// Immutable reading of the server's cumulative counters at `captured_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterSnapshot {
    pub captured_at: u64,
    pub total_requests: u64,
    pub by_status: StatusCounts,
    pub latency: LatencySummary,
    pub top_routes: Vec<RouteCount>,
    pub top_ips: Vec<IpCount>,
}

impl CounterSnapshot {
    /// A bare counter reading, mostly useful for tests and synthetic sources.
    pub fn at(captured_at: u64, total_requests: u64) -> Self {
        Self {
            captured_at,
            total_requests,
            ..Default::default()
        }
    }

    pub fn with_errors(mut self, c4xx: u64, c5xx: u64) -> Self {
        self.by_status.c4xx = c4xx;
        self.by_status.c5xx = c5xx;
        self
    }
}

/// Anything able to produce the current cumulative counters.
///
/// Implementations block for the duration of the fetch; the scheduler runs
/// them off its timer thread.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> Result<CounterSnapshot, FetchError>;
}

impl<F> SnapshotSource for F
where
    F: Fn() -> Result<CounterSnapshot, FetchError> + Send + Sync + 'static,
{
    fn fetch(&self) -> Result<CounterSnapshot, FetchError> {
        (self)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let mut counts = StatusCounts::default();
        for status in [200, 204, 301, 404, 429, 500, 503, 101] {
            counts.record(status);
        }
        assert_eq!(counts.c2xx, 2);
        assert_eq!(counts.c3xx, 1);
        assert_eq!(counts.c4xx, 2);
        assert_eq!(counts.c5xx, 2);
        assert_eq!(counts.other, 1);
        assert_eq!(counts.errors(), 4);
    }
}
