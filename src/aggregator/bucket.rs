use crate::event::RequestEvent;
use crate::measure::{LatencyHistogram, LatencyStats};
use crate::topk::TopK;
use serde::{Deserialize, Serialize};

/// A closed time bucket. `errors` and `latency` ride along for the dashboard;
/// `minuteTs`/`total` are the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinuteBucket {
    pub minute_ts: u64,
    pub total: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
}

impl MinuteBucket {
    pub fn empty(minute_ts: u64) -> Self {
        Self {
            minute_ts,
            total: 0,
            errors: 0,
            latency: None,
        }
    }
}

/// The bucket currently receiving events.
pub(crate) struct OpenBucket {
    pub minute_ts: u64,
    pub total: u64,
    pub errors: u64,
    pub latency: LatencyHistogram,
    pub routes: TopK,
}

impl OpenBucket {
    pub fn new(minute_ts: u64, route_capacity: usize) -> Self {
        Self {
            minute_ts,
            total: 0,
            errors: 0,
            latency: LatencyHistogram::new(),
            routes: TopK::new(route_capacity),
        }
    }

    #[inline(always)]
    pub fn record(&mut self, event: &RequestEvent) {
        self.total += 1;
        if event.is_error() {
            self.errors += 1;
        }
        if event.latency_ms > 0.0 {
            self.latency.record_ms(event.latency_ms);
        }
        self.routes.increment(&event.route, 1);
    }

    pub fn finish(&self) -> MinuteBucket {
        MinuteBucket {
            minute_ts: self.minute_ts,
            total: self.total,
            errors: self.errors,
            latency: (!self.latency.is_empty()).then(|| self.latency.get_stats()),
        }
    }
}
