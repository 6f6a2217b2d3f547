pub mod aggregator;
pub mod config;
pub mod correlation;
pub mod error;
pub mod estimator;
mod event;
pub mod gate;
pub mod http;
mod macros;
pub mod measure;
mod pipe;
pub mod ring;
mod scheduler;
mod snapshot;
mod stage;
pub mod topk;
pub mod wire;

pub use crate::aggregator::{Aggregator, AggregatorStats, Anomaly, MinuteBucket, SummaryReader};
pub use crate::config::{AggregatorConfig, PollConfig, PulseConfig};
pub use crate::correlation::{
    AuditCorrelationKey, AuditEntry, CorrelationSurface, MatchReason, RecordKind, Related,
    RelatedRecord, TelemetryRecord,
};
pub use crate::error::{ApiError, ConfigError, FetchError, PulseError};
pub use crate::estimator::{Delta, RateSample, classify, estimate};
pub use crate::event::RequestEvent;
pub use crate::gate::{AccessGate, PasswordGate};
pub use crate::pipe::*;
pub use crate::ring::RingBuffer;
pub use crate::scheduler::{Scheduler, SchedulerStats, Tick};
pub use crate::snapshot::{
    CounterSnapshot, IpCount, LatencySummary, RouteCount, SnapshotSource, StatusCounts, now_ms,
};
pub use crate::stage::{OutputCollector, Pipeline, Stage, StageExt};
pub use crate::topk::{TopK, TopKEntry};
