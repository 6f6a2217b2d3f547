use crate::snapshot::CounterSnapshot;
use serde::{Deserialize, Serialize};
use spdlog::warn;

/// Instantaneous rates derived from two adjacent snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSample {
    pub t: u64,
    pub rps: f64,
    pub error_rate_pct: f64,
}

/// Outcome of comparing a snapshot with the current baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    /// No baseline yet; `curr` becomes the baseline.
    Baseline,
    /// The cumulative counter went backwards (server restart); `curr` becomes
    /// the new baseline and no rate is produced.
    Reset { prev_total: u64, curr_total: u64 },
    Sample(RateSample),
}

/// Shortest interval a delta is divided by. Retry storms can deliver two
/// snapshots milliseconds apart.
pub const MIN_DT_SECS: f64 = 1.0;

/// Compares `curr` against `prev` without touching either.
pub fn classify(prev: Option<&CounterSnapshot>, curr: &CounterSnapshot) -> Delta {
    let Some(prev) = prev else {
        return Delta::Baseline;
    };

    if curr.total_requests < prev.total_requests {
        return Delta::Reset {
            prev_total: prev.total_requests,
            curr_total: curr.total_requests,
        };
    }

    let dt = (curr.captured_at.saturating_sub(prev.captured_at) as f64 / 1000.0).max(MIN_DT_SECS);
    let d_req = curr.total_requests - prev.total_requests;
    let d_err = curr.by_status.errors().saturating_sub(prev.by_status.errors());
    let error_rate_pct = if d_req > 0 {
        100.0 * d_err as f64 / d_req as f64
    } else {
        0.0
    };

    Delta::Sample(RateSample {
        t: curr.captured_at,
        rps: d_req as f64 / dt,
        error_rate_pct,
    })
}

/// Rate between two snapshots, or `None` when there is no usable baseline.
///
/// Updating the baseline is left to the caller: after any call, `curr` is the
/// snapshot the next call should be compared against.
pub fn estimate(prev: Option<&CounterSnapshot>, curr: &CounterSnapshot) -> Option<RateSample> {
    match classify(prev, curr) {
        Delta::Sample(sample) => Some(sample),
        Delta::Reset {
            prev_total,
            curr_total,
        } => {
            warn!(
                "counter reset detected ({} -> {}), re-baselining at {}",
                prev_total, curr_total, curr.captured_at
            );
            None
        }
        Delta::Baseline => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_two_snapshots() {
        let prev = CounterSnapshot::at(0, 100).with_errors(1, 1);
        let curr = CounterSnapshot::at(5_000, 150).with_errors(4, 3);

        let sample = estimate(Some(&prev), &curr).unwrap();
        assert_eq!(sample.t, 5_000);
        assert_eq!(sample.rps, 10.0);
        // 5 new errors out of 50 new requests
        assert_eq!(sample.error_rate_pct, 10.0);
    }

    #[test]
    fn test_dt_is_clamped() {
        let prev = CounterSnapshot::at(1_000, 0);
        let curr = CounterSnapshot::at(1_010, 40);
        assert_eq!(estimate(Some(&prev), &curr).unwrap().rps, 40.0);

        // same timestamp
        let curr = CounterSnapshot::at(1_000, 40);
        assert_eq!(estimate(Some(&prev), &curr).unwrap().rps, 40.0);
    }

    #[test]
    fn test_idle_interval_has_zero_error_rate() {
        let prev = CounterSnapshot::at(0, 10).with_errors(2, 0);
        let curr = CounterSnapshot::at(2_000, 10).with_errors(2, 0);
        let sample = estimate(Some(&prev), &curr).unwrap();
        assert_eq!(sample.rps, 0.0);
        assert_eq!(sample.error_rate_pct, 0.0);
    }

    #[test]
    fn test_error_counter_decrease_is_not_negative() {
        let prev = CounterSnapshot::at(0, 10).with_errors(5, 5);
        let curr = CounterSnapshot::at(1_000, 20).with_errors(0, 0);
        assert_eq!(estimate(Some(&prev), &curr).unwrap().error_rate_pct, 0.0);
    }

    #[test]
    fn test_classify_variants() {
        let a = CounterSnapshot::at(0, 100);
        let b = CounterSnapshot::at(1_000, 90);
        assert_eq!(classify(None, &a), Delta::Baseline);
        assert_eq!(
            classify(Some(&a), &b),
            Delta::Reset {
                prev_total: 100,
                curr_total: 90
            }
        );
        assert!(matches!(classify(Some(&b), &a), Delta::Sample(_)));
    }
}
