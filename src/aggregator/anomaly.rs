use crate::correlation::{RecordKind, TelemetryRecord};
use crate::snapshot::RouteCount;
use serde::{Deserialize, Serialize};

/// A bucket whose total deviates from its trailing baseline by at least the
/// configured number of standard deviations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub minute_ts: u64,
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub z: f64,
    #[serde(default)]
    pub routes_top: Vec<RouteCount>,
}

impl Anomaly {
    pub fn id(&self) -> String {
        format!("anomaly-{}", self.minute_ts)
    }

    pub fn is_lull(&self) -> bool {
        self.z < 0.0
    }

    pub fn to_record(&self) -> TelemetryRecord {
        let direction = if self.is_lull() { "lull" } else { "spike" };
        TelemetryRecord {
            id: self.id(),
            kind: RecordKind::Anomaly,
            at_ms: self.minute_ts,
            correlation_key: None,
            summary: format!(
                "traffic {} of {} requests (mean {:.1}, z {:.2})",
                direction, self.count, self.mean, self.z
            ),
        }
    }
}

/// Population mean and standard deviation of `values`.
pub fn mean_std(values: impl IntoIterator<Item = u64>) -> Option<(f64, f64)> {
    let mut n = 0u64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for v in values {
        let v = v as f64;
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
    Some((mean, variance.sqrt()))
}

/// `(value - mean) / max(std, epsilon)`.
#[inline(always)]
pub fn z_score(value: u64, mean: f64, std: f64, epsilon: f64) -> f64 {
    (value as f64 - mean) / std.max(epsilon)
}
