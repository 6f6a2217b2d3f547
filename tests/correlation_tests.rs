use roda_pulse::{
    Anomaly, AuditCorrelationKey, AuditEntry, CorrelationSurface, MatchReason, RecordKind,
    Related, TelemetryRecord,
};

fn record(id: &str, kind: RecordKind, at_ms: u64, key: Option<&str>) -> TelemetryRecord {
    TelemetryRecord {
        id: id.to_string(),
        kind,
        at_ms,
        correlation_key: key.map(AuditCorrelationKey::new),
        summary: String::new(),
    }
}

fn audit(id: &str, at_ms: u64, key: Option<&str>) -> AuditEntry {
    AuditEntry {
        id: id.to_string(),
        at_ms,
        correlation_key: key.map(AuditCorrelationKey::new),
        actor: "ops".to_string(),
        action: "deploy".to_string(),
    }
}

fn audit_ids<'a>(related: &[roda_pulse::RelatedRecord<'a>]) -> Vec<&'a str> {
    related
        .iter()
        .map(|r| match r.record {
            Related::Audit(a) => a.id.as_str(),
            Related::Telemetry(t) => t.id.as_str(),
        })
        .collect()
}

fn fixture() -> (Vec<TelemetryRecord>, Vec<AuditEntry>) {
    let records = vec![
        record("err-1", RecordKind::Error, 100_000, Some("req-42")),
        record("csp-1", RecordKind::CspViolation, 500_000, None),
    ];
    let entries = vec![
        audit("a-far-key", 900_000, Some("req-42")),
        audit("a-near", 110_000, None),
        audit("a-nearer", 95_000, None),
        audit("a-outside", 300_000, None),
        audit("a-other-key", 100_500, Some("req-7")),
    ];
    (records, entries)
}

#[test]
fn test_key_matches_come_first_then_nearest() {
    let (records, entries) = fixture();
    let surface = CorrelationSurface::new(&records, &entries, 60_000);

    let related = surface.find_related("err-1");
    assert_eq!(
        audit_ids(&related),
        vec!["a-far-key", "a-other-key", "a-nearer", "a-near"]
    );
    assert_eq!(related[0].reason, MatchReason::SameKey);
    assert_eq!(related[1].reason, MatchReason::Proximity { delta_ms: 500 });
    assert_eq!(related[2].reason, MatchReason::Proximity { delta_ms: 5_000 });
}

#[test]
fn test_lookup_by_audit_id() {
    let (records, entries) = fixture();
    let surface = CorrelationSurface::new(&records, &entries, 60_000);

    assert_eq!(audit_ids(&surface.find_related("a-far-key")), vec!["err-1"]);
    assert!(surface.find_related("a-outside").is_empty());
}

#[test]
fn test_unknown_id_is_empty() {
    let (records, entries) = fixture();
    let surface = CorrelationSurface::new(&records, &entries, 60_000);
    assert!(surface.find_related("nope").is_empty());
}

#[test]
fn test_lookups_leave_inputs_untouched() {
    let (records, entries) = fixture();
    let (records_copy, entries_copy) = (records.clone(), entries.clone());
    {
        let surface = CorrelationSurface::new(&records, &entries, 1_000_000);
        surface.find_related("err-1");
        surface.find_related("csp-1");
    }
    assert_eq!(records, records_copy);
    assert_eq!(entries, entries_copy);
}

#[test]
fn test_anomaly_joins_by_proximity() {
    let anomaly = Anomaly {
        minute_ts: 3_600_000,
        count: 900,
        mean: 100.0,
        std: 20.0,
        z: 40.0,
        routes_top: vec![],
    };
    let records = vec![anomaly.to_record()];
    let entries = vec![audit("deploy-9", 3_590_000, None)];
    let surface = CorrelationSurface::new(&records, &entries, 60_000);

    let related = surface.find_related(&anomaly.id());
    assert_eq!(audit_ids(&related), vec!["deploy-9"]);
}

#[test]
fn test_records_decode_from_json() {
    let raw = r#"[{"id":"csp-2","kind":"csp-violation","atMs":10,"correlationKey":"k"}]"#;
    let records: Vec<TelemetryRecord> = serde_json::from_str(raw).unwrap();
    assert_eq!(records[0].kind, RecordKind::CspViolation);
    assert_eq!(records[0].correlation_key, Some(AuditCorrelationKey::new("k")));
}
