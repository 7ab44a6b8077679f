use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::Result,
    models::{ApiResponse, EventKind, EventPayload},
};

const USER_AGENT: &str = concat!("channel-probe/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
    pub success: bool,
    pub elapsed: Duration,
}

impl ResponseRecord {
    pub fn new(url: impl Into<String>, status: u16, body: String, elapsed: Duration) -> Self {
        let json = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&body).ok()
        };
        Self {
            url: url.into(),
            status,
            body,
            json,
            success: is_success(status),
            elapsed,
        }
    }

    pub fn api(&self) -> Option<ApiResponse> {
        let json = self.json.as_ref().filter(|value| value.is_object())?;
        serde_json::from_value(json.clone()).ok()
    }

    pub fn message(&self) -> Option<String> {
        self.api().and_then(|api| api.message)
    }
}

// Only a plain 200 counts; other 2xx codes are failures too.
pub fn is_success(status: u16) -> bool {
    status == 200
}

#[derive(Clone)]
pub struct Invoker {
    client: Client,
    base_url: String,
}

impl Invoker {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, kind: EventKind) -> String {
        format!("{}{}", self.base_url, kind.path())
    }

    pub async fn send(&self, payload: &EventPayload, timeout: Duration) -> Result<ResponseRecord> {
        let url = self.endpoint(payload.kind);
        self.post_json(&url, payload, timeout).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<ResponseRecord> {
        let started = Instant::now();
        let result = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url, error = %err, "request failed");
                return Err(err.into());
            }
        };

        let status = response.status().as_u16();
        // Drain the body so the connection goes back to the pool.
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(url, status, error = %err, "reading response body failed");
                return Err(err.into());
            }
        };
        let elapsed = started.elapsed();
        tracing::info!(
            url,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "stats request completed"
        );
        Ok(ResponseRecord::new(url, status, text, elapsed))
    }
}
