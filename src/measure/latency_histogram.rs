use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Latency percentiles of one bucket, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStats {
    /// Total number of samples.
    pub count: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

// Range: 1us to 1h, in microseconds.
const LOWEST_US: u64 = 1;
const HIGHEST_US: u64 = 3_600_000_000;
const SIGFIG: u8 = 3;

/// Streaming latency percentiles backed by HdrHistogram.
///
/// With three significant figures every reported quantile is within 0.1% of
/// the exact value for samples inside the tracked range; samples outside it
/// are clamped to the bounds.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            histogram: new_histogram(),
        }
    }

    pub fn record_ms(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }
        let micros = ((latency_ms * 1000.0).round() as u64).clamp(LOWEST_US, HIGHEST_US);
        // the value is clamped into the configured range, so recording cannot fail
        let _ = self.histogram.record(micros);
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
    }

    pub fn quantile_ms(&self, quantile: f64) -> Option<f64> {
        if self.histogram.len() == 0 {
            return None;
        }
        Some(to_ms(self.histogram.value_at_quantile(quantile) as f64))
    }

    pub fn get_stats(&self) -> LatencyStats {
        let count = self.histogram.len();
        if count == 0 {
            return LatencyStats::default();
        }

        LatencyStats {
            count,
            min_ms: to_ms(self.histogram.min() as f64),
            max_ms: to_ms(self.histogram.max() as f64),
            avg_ms: to_ms(self.histogram.mean()),
            p50_ms: to_ms(self.histogram.value_at_quantile(0.5) as f64),
            p95_ms: to_ms(self.histogram.value_at_quantile(0.95) as f64),
            p99_ms: to_ms(self.histogram.value_at_quantile(0.99) as f64),
        }
    }

    pub fn format_stats(&self) -> String {
        let stats = self.get_stats();
        if stats.count == 0 {
            return "No stats collected yet".into();
        }

        format!(
            "\tmin={},\tmax={},\tavg={},\tp50={},\tp95={},\tp99={}",
            format_duration_ms(stats.min_ms),
            format_duration_ms(stats.max_ms),
            format_duration_ms(stats.avg_ms),
            format_duration_ms(stats.p50_ms),
            format_duration_ms(stats.p95_ms),
            format_duration_ms(stats.p99_ms),
        )
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(LOWEST_US, HIGHEST_US, SIGFIG)
        .expect("constant histogram bounds are valid")
}

#[inline(always)]
fn to_ms(micros: f64) -> f64 {
    micros / 1000.0
}

pub fn format_duration_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.1}us", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles_within_bound() {
        let mut hist = LatencyHistogram::new();
        for i in 1..=10_000 {
            hist.record_ms(i as f64 / 10.0);
        }
        let stats = hist.get_stats();
        assert_eq!(stats.count, 10_000);

        for (got, exact) in [(stats.p50_ms, 500.0), (stats.p95_ms, 950.0), (stats.p99_ms, 990.0)] {
            let rel = (got - exact).abs() / exact;
            assert!(rel <= 0.01, "got {got}, exact {exact}");
        }
    }

    #[test]
    fn test_empty_and_invalid_samples() {
        let mut hist = LatencyHistogram::new();
        assert_eq!(hist.quantile_ms(0.5), None);
        hist.record_ms(f64::NAN);
        hist.record_ms(-3.0);
        assert!(hist.is_empty());
        assert_eq!(hist.format_stats(), "No stats collected yet");

        hist.record_ms(0.0);
        assert_eq!(hist.len(), 1);
        assert_eq!(hist.get_stats().min_ms, 0.001);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(0.25), "250.0us");
        assert_eq!(format_duration_ms(12.0), "12.0ms");
        assert_eq!(format_duration_ms(2500.0), "2.50s");
    }
}
