use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::PoolClientError;
use crate::events::{parse_pool_event, PoolEvent};
use crate::models::{Page, Pool};
use crate::sse::SseDecoder;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i32,
    message: String,
}

/// HTTP/SSE client for the pool manager's `/api/v1/pools` surface.
///
/// The `reqwest::Client` is tuned the way a long-lived service-to-service
/// client should be: a bounded idle pool and TCP keepalive instead of
/// reqwest's defaults, so a quiet pool manager doesn't leave dead
/// connections open indefinitely.
pub struct PoolManagerClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl PoolManagerClient {
    pub fn new(base_url: &str) -> Result<Self, PoolClientError> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: reqwest::Url::parse(base_url).map_err(|e| {
                PoolClientError::Server { code: -1, message: format!("invalid base url: {e}") }
            })?,
        })
    }

    fn pools_url(&self) -> reqwest::Url {
        self.base_url.join("api/v1/pools").expect("static path always joins")
    }

    async fn fetch_page<T: DeserializeOwned>(&self, pg_num: i64) -> Result<Page<T>, PoolClientError> {
        let response = self
            .http
            .get(self.pools_url())
            .query(&[("pg_num", pg_num)])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_value(body)?;
            return Err(PoolClientError::Server { code: envelope.error.code, message: envelope.error.message });
        }

        Ok(serde_json::from_value(body)?)
    }

    /// Streams every pool across as many pages as the server has, stopping
    /// at the first short (or empty) page.
    pub fn list_pools(&self) -> Pin<Box<dyn Stream<Item = Result<Pool, PoolClientError>> + Send + '_>> {
        Box::pin(async_stream::try_stream! {
            let mut pg_num = 0i64;
            loop {
                let page = self.fetch_page::<Pool>(pg_num).await?;
                let is_last = page.is_last();
                for item in page.items {
                    yield item;
                }
                if is_last {
                    break;
                }
                pg_num += 1;
            }
        })
    }

    /// Connects to the pool-manager's event stream and yields decoded
    /// [`PoolEvent`]s, silently dropping `ping` keepalive frames.
    pub fn pool_event_stream(&self) -> Pin<Box<dyn Stream<Item = Result<PoolEvent, PoolClientError>> + Send + '_>> {
        let url = self.base_url.join("api/v1/pools/event-stream").expect("static path always joins");

        Box::pin(async_stream::try_stream! {
            let response = self
                .http
                .get(url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await?;

            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for frame in decoder.push(&chunk) {
                    if let Some(event) = parse_pool_event(&frame.event, &frame.data)? {
                        yield event;
                    }
                }
            }
        })
    }
}
