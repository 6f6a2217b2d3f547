pub mod latency_histogram;

pub use latency_histogram::{LatencyHistogram, LatencyStats};
