use roda_pulse::{CounterSnapshot, Delta, RateSample, classify, estimate};

/// Feeds snapshots through the estimator the way the poller does: every
/// snapshot becomes the next baseline regardless of the outcome.
fn run(snapshots: &[CounterSnapshot]) -> Vec<Option<RateSample>> {
    let mut baseline: Option<CounterSnapshot> = None;
    snapshots
        .iter()
        .map(|curr| {
            let sample = estimate(baseline.as_ref(), curr);
            baseline = Some(curr.clone());
            sample
        })
        .collect()
}

#[test]
fn test_restart_scenario() {
    let samples = run(&[
        CounterSnapshot::at(0, 100),
        CounterSnapshot::at(5_000, 150),
        CounterSnapshot::at(10_000, 120),
        CounterSnapshot::at(15_000, 170),
    ]);

    assert_eq!(samples[0], None);
    assert_eq!(samples[1].map(|s| s.rps), Some(10.0));
    // counter went backwards: no sample, 120 becomes the baseline
    assert_eq!(samples[2], None);
    assert_eq!(samples[3].map(|s| s.rps), Some(10.0));
    assert_eq!(samples[3].map(|s| s.t), Some(15_000));
}

#[test]
fn test_rates_are_never_negative() {
    let samples = run(&[
        CounterSnapshot::at(0, 500).with_errors(40, 10),
        CounterSnapshot::at(2_000, 3).with_errors(0, 0),
        CounterSnapshot::at(4_000, 3).with_errors(0, 0),
        CounterSnapshot::at(6_000, 9).with_errors(1, 2),
    ]);

    for sample in samples.into_iter().flatten() {
        assert!(sample.rps >= 0.0);
        assert!((0.0..=100.0).contains(&sample.error_rate_pct));
    }
}

#[test]
fn test_error_rate_uses_deltas_only() {
    let prev = CounterSnapshot::at(10_000, 1_000).with_errors(90, 10);
    let curr = CounterSnapshot::at(12_000, 1_040).with_errors(92, 12);

    let Delta::Sample(sample) = classify(Some(&prev), &curr) else {
        panic!("expected a sample");
    };
    assert_eq!(sample.rps, 20.0);
    // 4 new errors out of 40 new requests, not 104/1040
    assert_eq!(sample.error_rate_pct, 10.0);
}

#[test]
fn test_burst_within_a_second_is_not_amplified() {
    let prev = CounterSnapshot::at(50_000, 0);
    let curr = CounterSnapshot::at(50_001, 5);
    assert_eq!(estimate(Some(&prev), &curr).map(|s| s.rps), Some(5.0));
}

#[test]
fn test_classify_does_not_touch_inputs() {
    let prev = CounterSnapshot::at(0, 10);
    let curr = CounterSnapshot::at(1_000, 20);
    let (prev_copy, curr_copy) = (prev.clone(), curr.clone());

    let _ = classify(Some(&prev), &curr);
    assert_eq!(prev, prev_copy);
    assert_eq!(curr, curr_copy);
}
