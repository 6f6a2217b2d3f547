use serde::{Deserialize, Serialize};

/// One served request as seen by the aggregation side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    pub t: u64,
    pub route: String,
    pub status: u16,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl RequestEvent {
    pub fn new(t: u64, route: impl Into<String>, status: u16) -> Self {
        Self {
            t,
            route: route.into(),
            status,
            latency_ms: 0.0,
            ip: String::new(),
            user_id: None,
        }
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn from_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[inline(always)]
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}
