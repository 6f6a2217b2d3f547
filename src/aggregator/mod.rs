//! Minute-bucket aggregation of raw request events.
//!
//! Events are folded into the currently open bucket. When an event (or a call
//! to [`Aggregator::advance_to`]) crosses the bucket boundary, the open bucket
//! is closed: its total is compared against the trailing baseline of prior
//! closed buckets, an [`Anomaly`] is emitted when `|z|` reaches the threshold,
//! the bucket is tallied into the out-of-hours profile, appended to the
//! retained series, and a fresh [`DashboardSummary`] is published to readers.
//!
//! Minutes without traffic are closed as zero buckets so that lulls count
//! toward the baseline and can themselves be flagged.

mod anomaly;
mod bucket;
mod hours;
mod summary;

pub use anomaly::{Anomaly, mean_std, z_score};
pub use bucket::MinuteBucket;
pub use hours::{BusinessHours, OutOfHoursProfile};
pub use summary::SummaryReader;

use crate::config::AggregatorConfig;
use crate::error::ConfigError;
use crate::event::RequestEvent;
use crate::pipe::windowed;
use crate::snapshot::{IpCount, RouteCount, now_ms};
use crate::stage::{OutputCollector, Stage};
use crate::topk::TopK;
use crate::wire::{DashboardSummary, HourCount, UserCount};
use bucket::OpenBucket;
use fxhash::FxHashMap;
use spdlog::{debug, info};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub events: u64,
    /// Events older than the open bucket, dropped.
    pub late_events: u64,
    /// Events beyond `max_future_ms` of the newest bucket, dropped.
    pub future_events: u64,
    pub buckets_closed: u64,
    /// Buckets closed without a single event.
    pub gap_buckets: u64,
    pub anomalies: u64,
}

/// Single-writer aggregation engine. Readers go through [`Aggregator::reader`].
pub struct Aggregator {
    config: AggregatorConfig,
    hours: BusinessHours,
    open: Option<OpenBucket>,
    last_closed: Option<u64>,
    series: VecDeque<MinuteBucket>,
    anomalies: VecDeque<Anomaly>,
    routes: TopK,
    ips: TopK,
    users: TopK,
    ip_last_seen: FxHashMap<String, u64>,
    out_of_hours: OutOfHoursProfile,
    stats: AggregatorStats,
    reader: SummaryReader,
    dirty: bool,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cap = config.top_k_capacity;
        Ok(Self {
            hours: BusinessHours::new(
                config.business_start_hour,
                config.business_end_hour,
                config.utc_offset_minutes,
            ),
            open: None,
            last_closed: None,
            series: VecDeque::with_capacity(config.retention_buckets.min(4096)),
            anomalies: VecDeque::new(),
            routes: TopK::new(cap),
            ips: TopK::new(cap),
            users: TopK::new(cap),
            ip_last_seen: FxHashMap::default(),
            out_of_hours: OutOfHoursProfile::default(),
            stats: AggregatorStats::default(),
            reader: SummaryReader::new(),
            dirty: false,
            config,
        })
    }

    pub fn reader(&self) -> SummaryReader {
        self.reader.clone()
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Folds one event in and returns the anomalies of any buckets it closed.
    pub fn ingest(&mut self, event: RequestEvent) -> Vec<Anomaly> {
        let mut out = Vec::new();
        self.ingest_into(event, &mut |a: Anomaly| out.push(a));
        out
    }

    fn ingest_into<C: OutputCollector<Anomaly>>(&mut self, event: RequestEvent, out: &mut C) {
        let ts = windowed(event.t, self.config.bucket_ms);
        if self.too_far_ahead(ts) {
            self.stats.future_events += 1;
            debug!("dropping event at {} from too far in the future", event.t);
            return;
        }
        if !self.ensure_open(ts, out) {
            self.stats.late_events += 1;
            debug!(
                "dropping late event at {} for closed bucket {}",
                event.t, ts
            );
            return;
        }
        self.stats.events += 1;

        if let Some(bucket) = self.open.as_mut() {
            bucket.record(&event);
        }
        self.routes.increment(&event.route, 1);
        if !event.ip.is_empty() {
            self.ips.increment(&event.ip, 1);
            self.touch_ip(&event.ip, event.t);
        }
        if let Some(user) = &event.user_id {
            self.users.increment(user, 1);
        }
        self.publish_if_dirty();
    }

    fn too_far_ahead(&self, ts: u64) -> bool {
        let horizon = self.config.max_future_ms;
        let newest = self.open.as_ref().map(|o| o.minute_ts).or(self.last_closed);
        horizon > 0 && newest.is_some_and(|newest| ts > newest.saturating_add(horizon))
    }

    /// Closes every bucket that ended before `now_ms`, including empty ones.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<Anomaly> {
        let mut out = Vec::new();
        let ts = windowed(now_ms, self.config.bucket_ms);
        let behind = match (&self.open, self.last_closed) {
            (Some(open), _) => open.minute_ts < ts,
            (None, Some(last)) => last + self.config.bucket_ms < ts,
            (None, None) => false,
        };
        if behind {
            self.ensure_open(ts, &mut |a: Anomaly| out.push(a));
        }
        self.publish_if_dirty();
        out
    }

    /// Closes the open bucket even though its minute has not ended yet.
    pub fn flush(&mut self) -> Vec<Anomaly> {
        let mut out = Vec::new();
        if let Some(open) = self.open.take() {
            self.close(open, &mut |a: Anomaly| out.push(a));
        }
        self.publish_if_dirty();
        out
    }

    /// Makes sure the open bucket is the one starting at `ts`, closing and
    /// gap-filling whatever lies before it. Returns false for a bucket that is
    /// already closed.
    fn ensure_open<C: OutputCollector<Anomaly>>(&mut self, ts: u64, out: &mut C) -> bool {
        let open_ts = self.open.as_ref().map(|o| o.minute_ts);
        match open_ts {
            Some(open_ts) if ts == open_ts => return true,
            Some(open_ts) if ts < open_ts => return false,
            Some(_) => {
                if let Some(open) = self.open.take() {
                    self.close(open, out);
                }
            }
            None => {
                if self.last_closed.is_some_and(|last| ts <= last) {
                    return false;
                }
            }
        }

        if let Some(last) = self.last_closed {
            self.fill_gaps(last, ts, out);
        }
        self.open = Some(OpenBucket::new(ts, self.config.top_k_capacity));
        true
    }

    fn fill_gaps<C: OutputCollector<Anomaly>>(&mut self, last: u64, next: u64, out: &mut C) {
        let step = self.config.bucket_ms;
        let first = last + step;
        if next <= first {
            return;
        }
        let missing = (next - first) / step;
        self.stats.gap_buckets += missing;

        // After `baseline_window` zero buckets the baseline is all zeros and
        // every further zero bucket scores z = 0, so only the first ones are
        // evaluated and only the last `retention_buckets` are stored.
        let scored = missing.min(self.config.baseline_window as u64);
        for i in 0..scored {
            self.close(OpenBucket::new(first + i * step, 1), out);
        }
        let kept_from = scored.max(missing.saturating_sub(self.config.retention_buckets as u64));
        self.stats.buckets_closed += missing - scored;
        for i in kept_from..missing {
            self.retain(MinuteBucket::empty(first + i * step));
        }
        self.last_closed = Some(next - step);
    }

    fn close<C: OutputCollector<Anomaly>>(&mut self, bucket: OpenBucket, out: &mut C) {
        let closed = bucket.finish();

        if let Some(anomaly) = self.evaluate(&bucket) {
            info!(
                "anomaly at {}: count={} mean={:.2} std={:.2} z={:.2}",
                anomaly.minute_ts, anomaly.count, anomaly.mean, anomaly.std, anomaly.z
            );
            self.stats.anomalies += 1;
            self.anomalies.push_back(anomaly.clone());
            while self.anomalies.len() > self.config.max_anomalies {
                self.anomalies.pop_front();
            }
            out.push(anomaly);
        }

        if let Some(hour) = self.hours.is_out_of_hours(closed.minute_ts) {
            self.out_of_hours.add(hour, closed.total);
        }

        self.stats.buckets_closed += 1;
        self.retain(closed);
    }

    fn evaluate(&self, bucket: &OpenBucket) -> Option<Anomaly> {
        let prior = self.series.len().min(self.config.baseline_window);
        if prior < self.config.min_baseline_buckets.max(1) {
            return None;
        }
        let baseline = self.series.iter().rev().take(prior).map(|b| b.total);
        let (mean, std) = mean_std(baseline)?;
        let z = z_score(bucket.total, mean, std, self.config.std_epsilon);
        if z.abs() < self.config.z_threshold {
            return None;
        }

        Some(Anomaly {
            minute_ts: bucket.minute_ts,
            count: bucket.total,
            mean,
            std,
            z,
            routes_top: to_route_counts(&bucket.routes, self.config.routes_per_anomaly),
        })
    }

    fn retain(&mut self, bucket: MinuteBucket) {
        self.last_closed = Some(bucket.minute_ts);
        self.series.push_back(bucket);
        while self.series.len() > self.config.retention_buckets {
            self.series.pop_front();
        }
        self.dirty = true;
    }

    fn touch_ip(&mut self, ip: &str, t: u64) {
        let seen = self.ip_last_seen.entry(ip.to_string()).or_insert(t);
        *seen = (*seen).max(t);
        if self.ip_last_seen.len() > self.config.top_k_capacity * 2 {
            let ips = &self.ips;
            self.ip_last_seen.retain(|ip, _| ips.get(ip).is_some());
        }
    }

    fn publish_if_dirty(&mut self) {
        if self.dirty {
            self.dirty = false;
            self.reader.publish(self.summary());
        }
    }

    /// Builds a summary from the current state without publishing it.
    pub fn summary(&self) -> DashboardSummary {
        let n = self.config.summary_top_n;
        DashboardSummary {
            ok: true,
            minutes: self.series.len(),
            series: self.series.iter().cloned().collect(),
            top_routes: to_route_counts(&self.routes, n),
            anomalies: self.anomalies.iter().cloned().collect(),
            out_of_hours_top: self.out_of_hours.ranking(),
            users_top: self.top_users(n),
            ips_top: self.top_ips(n),
            generated_at: now_ms(),
        }
    }

    pub fn series(&self) -> impl Iterator<Item = &MinuteBucket> {
        self.series.iter()
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &Anomaly> {
        self.anomalies.iter()
    }

    pub fn open_bucket(&self) -> Option<(u64, u64)> {
        self.open.as_ref().map(|o| (o.minute_ts, o.total))
    }

    pub fn top_routes(&self, n: usize) -> Vec<RouteCount> {
        to_route_counts(&self.routes, n)
    }

    pub fn top_users(&self, n: usize) -> Vec<UserCount> {
        self.users
            .top_n(n)
            .into_iter()
            .map(|e| UserCount {
                id: e.key,
                count: e.count,
            })
            .collect()
    }

    pub fn top_ips(&self, n: usize) -> Vec<IpCount> {
        self.ips
            .top_n(n)
            .into_iter()
            .map(|e| IpCount {
                last_seen: self.ip_last_seen.get(&e.key).copied().unwrap_or(0),
                ip: e.key,
                count: e.count,
            })
            .collect()
    }

    pub fn out_of_hours_top(&self) -> Vec<HourCount> {
        self.out_of_hours.ranking()
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }
}

impl Stage<RequestEvent, Anomaly> for Aggregator {
    #[inline(always)]
    fn process<C>(&mut self, data: RequestEvent, collector: &mut C)
    where
        C: OutputCollector<Anomaly>,
    {
        self.ingest_into(data, collector);
    }
}

fn to_route_counts(top: &TopK, n: usize) -> Vec<RouteCount> {
    top.top_n(n)
        .into_iter()
        .map(|e| RouteCount {
            route: e.key,
            count: e.count,
        })
        .collect()
}
