// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use memstats_collector::metric::MetricRecord;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_PUSH_URL: &str = "http://127.0.0.1:1988/v1/push";
/// Bound on a whole push: connect, send and response body.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("no metrics to push")]
    EmptyBatch,

    #[error("failed to serialize metrics: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to push metrics to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read push response body: {0}")]
    ResponseRead(#[source] reqwest::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// What the collector answered. Neither field drives any retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct PusherConfig {
    pub push_url: String,
    pub timeout: Duration,
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            push_url: DEFAULT_PUSH_URL.to_string(),
            timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

/// Hands a batch of metrics over for delivery. Implementations swallow and
/// log every failure; the caller never learns whether the batch arrived.
#[async_trait]
pub trait Deliver {
    async fn deliver(&self, batch: &[MetricRecord]);
}

/// Pushes metric batches to the falcon agent with a single POST per batch.
#[derive(Debug, Clone)]
pub struct Pusher {
    client: reqwest::Client,
    push_url: String,
}

impl Pusher {
    pub fn new(config: PusherConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PushError::Client)?;
        Ok(Self {
            client,
            push_url: config.push_url,
        })
    }

    /// Makes exactly one delivery attempt and returns the collector's answer.
    pub async fn push(&self, batch: &[MetricRecord]) -> Result<PushResponse, PushError> {
        if batch.is_empty() {
            return Err(PushError::EmptyBatch);
        }

        let body = serde_json::to_vec(batch)?;

        let resp = self
            .client
            .post(&self.push_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| PushError::Transport {
                url: self.push_url.clone(),
                source,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(PushError::ResponseRead)?;
        Ok(PushResponse { status, body })
    }
}

#[async_trait]
impl Deliver for Pusher {
    async fn deliver(&self, batch: &[MetricRecord]) {
        let n_metrics = batch.len();
        match self.push(batch).await {
            Ok(resp) => info!(
                "Pushed {n_metrics} metrics to {}, response is: {} {}",
                self.push_url, resp.status, resp.body
            ),
            Err(PushError::EmptyBatch) => info!("No metrics given, skipping push"),
            Err(e @ PushError::ResponseRead(_)) => {
                warn!("Pushed {n_metrics} metrics to {} but {e}", self.push_url)
            }
            Err(e) => error!("Dropping {n_metrics} metrics: {e}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use memstats_collector::metric::MetricValue;
    use mockito::{Matcher, Server};
    use std::net::SocketAddr;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    fn batch() -> Vec<MetricRecord> {
        vec![
            MetricRecord::gauge("web-01", "Mem.Alloc", 1024_u64, 1_700_000_000),
            MetricRecord::gauge(
                "web-01",
                "Mem.HeapFraction",
                MetricValue::float(0.5),
                1_700_000_000,
            ),
        ]
    }

    fn pusher(push_url: String, timeout: Duration) -> Pusher {
        Pusher::new(PusherConfig { push_url, timeout }).unwrap()
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        addr
    }

    /// Reads one full request, writes `response` verbatim and closes.
    async fn serve_once(response: &'static [u8]) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(headers_end) = find_headers_end(&request) {
                    let headers = String::from_utf8_lossy(&request[..headers_end]).to_lowercase();
                    let content_length: usize = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .map(|v| v.trim().parse().unwrap())
                        .unwrap_or(0);
                    if request.len() >= headers_end + 4 + content_length {
                        break;
                    }
                }
            }
            stream.write_all(response).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        addr
    }

    fn find_headers_end(request: &[u8]) -> Option<usize> {
        request.windows(4).position(|w| w == b"\r\n\r\n")
    }

    #[tokio::test]
    async fn test_push_posts_json_batch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/push")
            .match_header("Content-Type", "application/json")
            .match_body(Matcher::Json(serde_json::json!([
                {
                    "endpoint": "web-01",
                    "metric": "Mem.Alloc",
                    "value": 1024,
                    "step": 60,
                    "counterType": "GUAGE",
                    "tags": "",
                    "timestamp": 1_700_000_000
                },
                {
                    "endpoint": "web-01",
                    "metric": "Mem.HeapFraction",
                    "value": 0.5,
                    "step": 60,
                    "counterType": "GUAGE",
                    "tags": "",
                    "timestamp": 1_700_000_000
                }
            ])))
            .with_status(200)
            .with_body("success")
            .expect(1)
            .create_async()
            .await;

        let pusher = pusher(format!("{}/v1/push", server.url()), DEFAULT_PUSH_TIMEOUT);
        let resp = pusher.push(&batch()).await.unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, "success");
        mock.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_empty_batch_makes_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/push")
            .expect(0)
            .create_async()
            .await;

        let pusher = pusher(format!("{}/v1/push", server.url()), DEFAULT_PUSH_TIMEOUT);
        assert!(matches!(pusher.push(&[]).await, Err(PushError::EmptyBatch)));
        pusher.deliver(&[]).await;

        mock.assert_async().await;
        logs_assert(|lines: &[&str]| match lines.len() {
            1 if lines[0].contains("No metrics given") => Ok(()),
            n => Err(format!("expected a single log line, got {n}: {lines:?}")),
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_logs_response_body_regardless_of_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/push")
            .with_status(500)
            .with_body("collector unavailable")
            .expect(1)
            .create_async()
            .await;

        let pusher = pusher(format!("{}/v1/push", server.url()), DEFAULT_PUSH_TIMEOUT);
        pusher.deliver(&batch()).await;

        // One attempt only, even on a server error.
        mock.assert_async().await;
        assert!(logs_contain("500"));
        assert!(logs_contain("collector unavailable"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_connection_refused_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pusher = pusher(format!("http://{addr}/v1/push"), DEFAULT_PUSH_TIMEOUT);
        let result = pusher.push(&batch()).await;
        assert!(matches!(result, Err(PushError::Transport { .. })));

        pusher.deliver(&batch()).await;
        assert!(logs_contain("Dropping 2 metrics"));
    }

    #[tokio::test]
    async fn test_unresponsive_collector_times_out() {
        let addr = silent_server().await;
        let pusher = pusher(format!("http://{addr}/v1/push"), Duration::from_millis(300));

        let start = Instant::now();
        let result = pusher.push(&batch()).await;
        let elapsed = start.elapsed();

        match result {
            Err(PushError::Transport { source, .. }) => assert!(source.is_timeout()),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_deliver_returns_within_default_timeout() {
        let addr = silent_server().await;
        let pusher = pusher(format!("http://{addr}/v1/push"), DEFAULT_PUSH_TIMEOUT);

        let start = Instant::now();
        pusher.deliver(&batch()).await;

        assert!(start.elapsed() < DEFAULT_PUSH_TIMEOUT + Duration::from_millis(500));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_truncated_body_is_a_response_read_error() {
        let addr = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort").await;
        let pusher = pusher(format!("http://{addr}/v1/push"), DEFAULT_PUSH_TIMEOUT);

        pusher.deliver(&batch()).await;

        assert!(logs_contain("failed to read push response body"));
    }
}
