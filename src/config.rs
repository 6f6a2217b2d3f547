use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;

/// Live poller settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollConfig {
    pub interval_ms: u64,
    /// Wall-clock span covered by the sparkline ring buffer.
    pub window_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            window_seconds: 120,
        }
    }
}

impl PollConfig {
    pub fn ring_capacity(&self) -> usize {
        crate::ring::capacity_for(self.window_seconds, self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "poll.intervalMs",
            });
        }
        if self.window_seconds == 0 {
            return Err(ConfigError::Zero {
                field: "poll.windowSeconds",
            });
        }
        Ok(())
    }
}

/// Minute-bucket aggregation settings. None of the statistical knobs are fixed
/// by the server contract, so all of them are configurable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregatorConfig {
    pub bucket_ms: u64,
    /// Number of prior closed buckets forming the anomaly baseline (W).
    pub baseline_window: usize,
    /// Fewer prior buckets than this and no anomaly is emitted.
    pub min_baseline_buckets: usize,
    pub z_threshold: f64,
    /// Floor applied to the standard deviation before dividing.
    pub std_epsilon: f64,
    pub retention_buckets: usize,
    pub max_anomalies: usize,
    pub top_k_capacity: usize,
    pub routes_per_anomaly: usize,
    pub summary_top_n: usize,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub utc_offset_minutes: i32,
    /// Events this far ahead of the newest bucket are dropped; 0 accepts any.
    pub max_future_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bucket_ms: 60_000,
            baseline_window: 30,
            min_baseline_buckets: 5,
            z_threshold: 3.0,
            std_epsilon: 1.0,
            retention_buckets: 1_440,
            max_anomalies: 500,
            top_k_capacity: 1_024,
            routes_per_anomaly: 5,
            summary_top_n: 10,
            business_start_hour: 8,
            business_end_hour: 18,
            utc_offset_minutes: 0,
            max_future_ms: 7 * 24 * 3_600_000,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("aggregator.bucketMs", self.bucket_ms as usize),
            ("aggregator.baselineWindow", self.baseline_window),
            ("aggregator.retentionBuckets", self.retention_buckets),
            ("aggregator.topKCapacity", self.top_k_capacity),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        for (field, value) in [
            ("aggregator.zThreshold", self.z_threshold),
            ("aggregator.stdEpsilon", self.std_epsilon),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [
            ("aggregator.businessStartHour", self.business_start_hour),
            ("aggregator.businessEndHour", self.business_end_hour),
        ] {
            if value > 23 {
                return Err(ConfigError::Hour { field, value });
            }
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::UtcOffset(self.utc_offset_minutes));
        }
        if self.min_baseline_buckets > self.baseline_window {
            return Err(ConfigError::BaselineTooShort {
                min: self.min_baseline_buckets,
                window: self.baseline_window,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PulseConfig {
    pub poll: PollConfig,
    pub aggregator: AggregatorConfig,
    /// Proximity window used by the correlation surface.
    pub correlation_window_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            aggregator: AggregatorConfig::default(),
            correlation_window_ms: 60_000,
        }
    }
}

impl PulseConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: PulseConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll.validate()?;
        self.aggregator.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            PulseConfig::from_json_str(r#"{"poll":{"intervalMs":500},"aggregator":{"zThreshold":2.5}}"#)
                .unwrap();
        assert_eq!(config.poll.interval_ms, 500);
        assert_eq!(config.poll.window_seconds, 120);
        assert_eq!(config.aggregator.z_threshold, 2.5);
        assert_eq!(config.aggregator.baseline_window, 30);
        assert_eq!(config.poll.ring_capacity(), 240);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PulseConfig::default();
        config.poll.interval_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "poll.intervalMs"
            })
        );

        let mut config = PulseConfig::default();
        config.aggregator.business_end_hour = 24;
        assert!(matches!(config.validate(), Err(ConfigError::Hour { .. })));

        let mut config = PulseConfig::default();
        config.aggregator.z_threshold = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { .. })
        ));
    }

    #[test]
    fn test_min_baseline_beyond_window_rejected() {
        let mut config = AggregatorConfig {
            baseline_window: 10,
            min_baseline_buckets: 11,
            ..AggregatorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BaselineTooShort { min: 11, window: 10 })
        );

        config.min_baseline_buckets = 10;
        assert_eq!(config.validate(), Ok(()));

        let raw = r#"{"aggregator":{"baselineWindow":4}}"#;
        assert!(PulseConfig::from_json_str(raw).is_err());
    }
}
