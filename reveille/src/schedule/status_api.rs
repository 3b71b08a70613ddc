//! Direct query of the scheduler's wake-up status endpoint.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;

use super::normalize::resolve_time_of_day;
use crate::error::Result;

const STATUS_PATH: &str = "/api/scheduler/wake-up/status";

/// Connection attempts give up sooner than the whole request so a dead
/// host fails fast.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    data: Option<WakeUpStatus>,
}

#[derive(Debug, Deserialize)]
struct WakeUpStatus {
    #[serde(default)]
    enabled: bool,
    time: Option<String>,
}

/// Client for one scheduler instance.
#[derive(Debug, Clone)]
pub struct StatusClient {
    client: reqwest::Client,
    base_url: String,
}

impl StatusClient {
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Next wake instant according to the scheduler, `None` if it reports
    /// no enabled alarm.
    pub async fn fetch(&self, now: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        let body = self
            .client
            .get(format!("{}{STATUS_PATH}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        parse_status(&body, now)
    }
}

/// The endpoint reports a local time of day; the absolute timestamps it
/// also carries are not trustworthy about their zone and are ignored.
fn parse_status(body: &[u8], now: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
    let response: StatusResponse = serde_json::from_slice(body)?;
    let Some(status) = response.data.filter(|d| response.success && d.enabled) else {
        return Ok(None);
    };

    match status.time.as_deref() {
        Some(time) if !time.is_empty() => resolve_time_of_day(time, now).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    /// Serve `body` as a JSON 200 to every connection. Returns the base URL.
    pub(crate) async fn serve_json(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn enabled_alarm_resolves_time_of_day() {
        let body = br#"{"success": true, "data": {"enabled": true, "time": "07:00", "nextWakeUp": "2026-03-14T07:00:00Z"}}"#;
        assert_eq!(parse_status(body, at(6, 0)).unwrap(), Some(at(7, 0)));
    }

    #[test]
    fn disabled_alarm_is_none() {
        let body = br#"{"success": true, "data": {"enabled": false, "message": "expired"}}"#;
        assert_eq!(parse_status(body, at(6, 0)).unwrap(), None);
    }

    #[test]
    fn unsuccessful_response_is_none() {
        let body = br#"{"success": false, "message": "No alarm time set"}"#;
        assert_eq!(parse_status(body, at(6, 0)).unwrap(), None);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_status(b"<html>", at(6, 0)).is_err());
    }

    #[tokio::test]
    async fn fetches_over_http() {
        let url = serve_json(r#"{"success": true, "data": {"enabled": true, "time": "23:59"}}"#).await;
        let client = StatusClient::with_base_url(url, Duration::from_secs(2)).unwrap();

        let wake = client.fetch(at(6, 0)).await.unwrap();
        assert_eq!(wake, Some(at(23, 59)));
    }

    #[tokio::test]
    async fn hung_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let client =
            StatusClient::with_base_url(format!("http://{addr}"), Duration::from_millis(300))
                .unwrap();
        let started = std::time::Instant::now();
        assert!(client.fetch(at(6, 0)).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
