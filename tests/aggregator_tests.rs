use roda_pulse::wire::HourCount;
use roda_pulse::{Aggregator, AggregatorConfig, Anomaly, RequestEvent, Stage};

const MINUTE: u64 = 60_000;
// 1970-01-01T10:00Z, inside the default business hours
const DAY_START: u64 = 10 * 3_600_000;

fn config() -> AggregatorConfig {
    AggregatorConfig {
        baseline_window: 10,
        min_baseline_buckets: 5,
        ..Default::default()
    }
}

fn fill_minute(agg: &mut Aggregator, minute: u64, count: u64) -> Vec<Anomaly> {
    let start = DAY_START + minute * MINUTE;
    let mut out = Vec::new();
    for i in 0..count {
        let event = RequestEvent::new(start + i, "/api/requests", 200).from_ip("10.0.0.1");
        out.extend(agg.ingest(event));
    }
    out
}

/// Ten closed buckets alternating 90 and 110: mean 100, population std 10.
fn with_baseline() -> Aggregator {
    let mut agg = Aggregator::new(config()).unwrap();
    for minute in 0..10 {
        let count = if minute % 2 == 0 { 90 } else { 110 };
        assert!(fill_minute(&mut agg, minute, count).is_empty());
    }
    agg
}

#[test]
fn test_spike_is_flagged_on_close() {
    let mut agg = with_baseline();
    assert!(fill_minute(&mut agg, 10, 140).is_empty());

    let anomalies = agg.advance_to(DAY_START + 11 * MINUTE);
    assert_eq!(anomalies.len(), 1);
    let anomaly = &anomalies[0];
    assert_eq!(anomaly.minute_ts, DAY_START + 10 * MINUTE);
    assert_eq!(anomaly.count, 140);
    assert_eq!(anomaly.mean, 100.0);
    assert!((anomaly.std - 10.0).abs() < 1e-9);
    assert!((anomaly.z - 4.0).abs() < 1e-9);
    assert_eq!(anomaly.routes_top[0].route, "/api/requests");
    assert_eq!(anomaly.routes_top[0].count, 140);
}

#[test]
fn test_within_threshold_is_not_flagged() {
    let mut agg = with_baseline();
    fill_minute(&mut agg, 10, 110);
    assert!(fill_minute(&mut agg, 11, 1).is_empty());
    assert_eq!(agg.stats().anomalies, 0);
}

#[test]
fn test_no_anomaly_without_enough_baseline() {
    let mut agg = Aggregator::new(config()).unwrap();
    fill_minute(&mut agg, 0, 1);
    fill_minute(&mut agg, 1, 1);
    // a huge bucket after only two prior buckets
    fill_minute(&mut agg, 2, 5_000);
    assert!(agg.flush().is_empty());
}

#[test]
fn test_gap_minute_is_a_lull() {
    let mut agg = with_baseline();
    // minute 10 has no traffic at all
    let anomalies = fill_minute(&mut agg, 11, 100);

    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].count, 0);
    assert_eq!(anomalies[0].minute_ts, DAY_START + 10 * MINUTE);
    assert!(anomalies[0].is_lull());
    assert_eq!(agg.stats().gap_buckets, 1);
}

#[test]
fn test_long_gap_is_bounded_by_retention() {
    let mut agg = Aggregator::new(AggregatorConfig {
        retention_buckets: 20,
        ..config()
    })
    .unwrap();
    fill_minute(&mut agg, 0, 5);
    // three days of silence
    fill_minute(&mut agg, 3 * 1_440, 5);
    agg.flush();

    let series: Vec<_> = agg.series().collect();
    assert_eq!(series.len(), 20);
    assert!(series.windows(2).all(|w| w[1].minute_ts == w[0].minute_ts + MINUTE));
    assert_eq!(series.last().map(|b| b.total), Some(5));
    assert_eq!(agg.stats().gap_buckets, 3 * 1_440 - 1);
    assert_eq!(agg.stats().buckets_closed, 3 * 1_440 + 1);
}

#[test]
fn test_huge_gap_fills_in_constant_work() {
    let mut agg = Aggregator::new(AggregatorConfig {
        retention_buckets: 20,
        max_future_ms: 0,
        ..config()
    })
    .unwrap();
    let gap = 1_000_000_000;
    fill_minute(&mut agg, 0, 5);
    fill_minute(&mut agg, gap, 5);

    let series: Vec<_> = agg.series().collect();
    assert_eq!(series.len(), 20);
    assert_eq!(
        series.last().map(|b| (b.minute_ts, b.total)),
        Some((DAY_START + (gap - 1) * MINUTE, 0))
    );
    assert_eq!(agg.stats().gap_buckets, gap - 1);
    assert_eq!(agg.stats().buckets_closed, gap);
    assert_eq!(agg.open_bucket(), Some((DAY_START + gap * MINUTE, 5)));
}

#[test]
fn test_far_future_event_is_dropped() {
    let mut agg = Aggregator::new(config()).unwrap();
    fill_minute(&mut agg, 0, 3);
    // microseconds where milliseconds were expected
    agg.ingest(RequestEvent::new(DAY_START * 1_000, "/api/requests", 200));
    fill_minute(&mut agg, 1, 2);

    let stats = agg.stats();
    assert_eq!(stats.future_events, 1);
    assert_eq!(stats.late_events, 0);
    assert_eq!(stats.events, 5);
    assert_eq!(agg.open_bucket(), Some((DAY_START + MINUTE, 2)));
}

#[test]
fn test_late_events_are_dropped() {
    let mut agg = Aggregator::new(config()).unwrap();
    fill_minute(&mut agg, 0, 3);
    fill_minute(&mut agg, 1, 2);
    fill_minute(&mut agg, 0, 4);

    assert_eq!(agg.stats().late_events, 4);
    assert_eq!(agg.open_bucket(), Some((DAY_START + MINUTE, 2)));
    assert_eq!(agg.series().map(|b| b.total).collect::<Vec<_>>(), vec![3]);
}

#[test]
fn test_summary_published_on_close() {
    let mut agg = Aggregator::new(config()).unwrap();
    let reader = agg.reader();
    assert!(reader.load().ok);
    assert_eq!(reader.load().minutes, 0);

    fill_minute(&mut agg, 0, 3);
    // still open, nothing published yet
    assert_eq!(reader.load().minutes, 0);

    fill_minute(&mut agg, 1, 1);
    let summary = reader.load();
    assert_eq!(summary.minutes, 1);
    assert_eq!(summary.series[0].total, 3);
    assert_eq!(summary.top_routes[0].count, 4);
    assert_eq!(summary.ips_top[0].ip, "10.0.0.1");
    assert_eq!(summary.ips_top[0].last_seen, DAY_START + MINUTE);
    assert_eq!(reader.with(|s| s.series.len()), 1);
}

#[test]
fn test_out_of_hours_profile() {
    let mut agg = Aggregator::new(config()).unwrap();
    // 02:00 and 23:00 UTC are outside 08-18
    for (t, n) in [(2 * 3_600_000, 3), (DAY_START, 7), (23 * 3_600_000, 5)] {
        for i in 0..n {
            agg.ingest(RequestEvent::new(t + i, "/", 200).by_user("u1"));
        }
    }
    agg.flush();

    assert_eq!(
        agg.out_of_hours_top(),
        vec![
            HourCount { hour: 23, count: 5 },
            HourCount { hour: 2, count: 3 },
        ]
    );
    assert_eq!(agg.top_users(1)[0].count, 15);
}

#[test]
fn test_runs_as_a_pipeline_stage() {
    let mut agg = with_baseline();
    fill_minute(&mut agg, 10, 140);

    let mut seen = Vec::new();
    agg.process(
        RequestEvent::new(DAY_START + 11 * MINUTE, "/api/requests", 500),
        &mut |a: Anomaly| seen.push(a.count),
    );
    assert_eq!(seen, vec![140]);
    assert_eq!(agg.anomalies().count(), 1);
}

#[test]
fn test_bucket_latency_and_errors() {
    let mut agg = Aggregator::new(config()).unwrap();
    for (status, latency) in [(200, 10.0), (404, 20.0), (503, 30.0)] {
        agg.ingest(RequestEvent::new(DAY_START, "/x", status).with_latency(latency));
    }
    agg.flush();

    let bucket = agg.series().next().unwrap();
    assert_eq!(bucket.total, 3);
    assert_eq!(bucket.errors, 2);
    let latency = bucket.latency.unwrap();
    assert_eq!(latency.count, 3);
    assert!((latency.max_ms - 30.0).abs() < 0.1);
}

#[test]
fn test_invalid_config_rejected() {
    let err = Aggregator::new(AggregatorConfig {
        bucket_ms: 0,
        ..Default::default()
    });
    assert!(err.is_err());
}
