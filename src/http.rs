use crate::error::{ApiError, FetchError};
use crate::snapshot::{CounterSnapshot, SnapshotSource, now_ms};
use crate::wire::{Allowlist, DashboardSummary, MetricsSummary};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";

fn client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Polls `GET {base}/metrics-summary`, optionally narrowed to a route or IP.
pub struct HttpSnapshotSource {
    http: Client,
    base_url: String,
    route: Option<String>,
    ip: Option<String>,
}

impl HttpSnapshotSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            route: None,
            ip: None,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn url(&self) -> String {
        format!("{}/metrics-summary", self.base_url)
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch(&self) -> Result<CounterSnapshot, FetchError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(route) = &self.route {
            query.push(("route", route.as_str()));
        }
        if let Some(ip) = &self.ip {
            query.push(("ip", ip.as_str()));
        }

        let response = self.http.get(self.url()).query(&query).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let captured_at = now_ms();
        let summary: MetricsSummary = response.json()?;
        summary.into_snapshot(captured_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistKind {
    Route,
    Ip,
}

impl AllowlistKind {
    fn path(self) -> &'static str {
        match self {
            AllowlistKind::Route => "route-allowlist",
            AllowlistKind::Ip => "ip-allowlist",
        }
    }
}

/// Client for the dashboard and the admin allowlist endpoints.
pub struct AdminClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AdminClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http: client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn dashboard(&self) -> Result<DashboardSummary, ApiError> {
        let response = self
            .http
            .get(format!("{}/analytics/dashboard", self.base_url))
            .send()?;
        let summary: DashboardSummary = check(response)?.json()?;
        if !summary.ok {
            return Err(ApiError::NotOk);
        }
        Ok(summary)
    }

    pub fn allowlist(&self, kind: AllowlistKind) -> Result<Allowlist, ApiError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, kind.path()))
            .send()?;
        Ok(check(response)?.json()?)
    }

    /// Replaces the allowlist. Refused locally when no api key is configured.
    pub fn set_allowlist(
        &self,
        kind: AllowlistKind,
        entries: &[String],
    ) -> Result<Allowlist, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::MissingApiKey)?;
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, kind.path()))
            .header(API_KEY_HEADER, api_key)
            .json(&Allowlist::new(entries.iter().cloned()))
            .send()?;
        let saved: Allowlist = check(response)?.json()?;
        if saved.ok == Some(false) {
            return Err(ApiError::NotOk);
        }
        Ok(saved)
    }
}

fn check(response: Response) -> Result<Response, ApiError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized {
            status: response.status().as_u16(),
        }),
        status if !status.is_success() => Err(ApiError::Status(status.as_u16())),
        _ => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_without_key_is_refused_locally() {
        // nothing listens on this port; the key check fires before any I/O
        let admin = AdminClient::new("http://127.0.0.1:9", Some("  ".into()), Duration::from_millis(50));
        let err = admin
            .set_allowlist(AllowlistKind::Route, &["/api".to_string()])
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingApiKey));
    }

    #[test]
    fn test_urls() {
        let source = HttpSnapshotSource::new("http://metrics.local:8080/", Duration::from_secs(1))
            .with_route("/api/requests");
        assert_eq!(source.url(), "http://metrics.local:8080/metrics-summary");
        assert_eq!(AllowlistKind::Ip.path(), "ip-allowlist");
    }

    #[test]
    fn test_unreachable_endpoint_is_a_fetch_error() {
        let source = HttpSnapshotSource::new("http://127.0.0.1:9", Duration::from_millis(200));
        assert!(source.fetch().is_err());
    }
}
