//! Read-only drill-down joins between telemetry records and the audit log.

use serde::{Deserialize, Serialize};

/// Opaque identifier shared by a telemetry record and the audit entries it
/// relates to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditCorrelationKey(pub String);

impl AuditCorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Anomaly,
    Error,
    CspViolation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub id: String,
    pub kind: RecordKind,
    pub at_ms: u64,
    #[serde(default)]
    pub correlation_key: Option<AuditCorrelationKey>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub at_ms: u64,
    #[serde(default)]
    pub correlation_key: Option<AuditCorrelationKey>,
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    SameKey,
    /// Within the proximity window, `delta_ms` apart.
    Proximity { delta_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Related<'a> {
    Audit(&'a AuditEntry),
    Telemetry(&'a TelemetryRecord),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelatedRecord<'a> {
    pub record: Related<'a>,
    pub reason: MatchReason,
}

/// Borrowed view over both collections. Lookups never modify either side and
/// an unknown id simply yields no matches.
pub struct CorrelationSurface<'a> {
    records: &'a [TelemetryRecord],
    audit: &'a [AuditEntry],
    window_ms: u64,
}

impl<'a> CorrelationSurface<'a> {
    pub fn new(records: &'a [TelemetryRecord], audit: &'a [AuditEntry], window_ms: u64) -> Self {
        Self {
            records,
            audit,
            window_ms,
        }
    }

    /// Records related to `id`: key matches first, then proximity matches
    /// nearest first. `id` may name a telemetry record or an audit entry.
    pub fn find_related(&self, id: &str) -> Vec<RelatedRecord<'a>> {
        if let Some(record) = self.records.iter().find(|r| r.id == id) {
            let candidates = self
                .audit
                .iter()
                .map(|a| (Related::Audit(a), a.at_ms, a.correlation_key.as_ref()));
            return self.join(record.at_ms, record.correlation_key.as_ref(), candidates);
        }
        if let Some(entry) = self.audit.iter().find(|a| a.id == id) {
            let candidates = self
                .records
                .iter()
                .map(|r| (Related::Telemetry(r), r.at_ms, r.correlation_key.as_ref()));
            return self.join(entry.at_ms, entry.correlation_key.as_ref(), candidates);
        }
        Vec::new()
    }

    fn join(
        &self,
        at_ms: u64,
        key: Option<&AuditCorrelationKey>,
        candidates: impl Iterator<Item = (Related<'a>, u64, Option<&'a AuditCorrelationKey>)>,
    ) -> Vec<RelatedRecord<'a>> {
        let mut by_key = Vec::new();
        let mut nearby = Vec::new();
        for (record, candidate_at, candidate_key) in candidates {
            if key.is_some() && key == candidate_key {
                by_key.push(RelatedRecord {
                    record,
                    reason: MatchReason::SameKey,
                });
                continue;
            }
            let delta_ms = at_ms.abs_diff(candidate_at);
            if delta_ms <= self.window_ms {
                nearby.push(RelatedRecord {
                    record,
                    reason: MatchReason::Proximity { delta_ms },
                });
            }
        }
        nearby.sort_by_key(|r| match r.reason {
            MatchReason::Proximity { delta_ms } => delta_ms,
            MatchReason::SameKey => 0,
        });
        by_key.extend(nearby);
        by_key
    }
}
