//! HTTP seam for chat completions, model listing and reachability.
//!
//! Transport failures never surface as `Err`: they become a literal
//! `Error: <reason>` string that flows through normal reply parsing and
//! is shown as assistant content.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for chat calls (vision replies can be slow)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub trait Transport: Send + Sync + 'static {
    /// POST a JSON body; returns the response body or an `Error: …` string.
    fn post_json(&self, url: String, body: String, api_key: String) -> impl Future<Output = String> + Send;

    /// GET a URL; returns the response body or an `Error: …` string.
    fn get(&self, url: String, api_key: String) -> impl Future<Output = String> + Send;

    /// Whether anything answers at `url`. Any HTTP response counts.
    fn probe(&self, url: String, api_key: String) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    probe_client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let user_agent = concat!("padchat/", env!("CARGO_PKG_VERSION"));
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let probe_client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .connect_timeout(PROBE_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            probe_client,
        }
    }

    fn with_auth(builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        if api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(api_key)
        }
    }

    /// Body of a response regardless of status; error statuses keep
    /// their body so the caller can display it.
    async fn read_body(result: reqwest::Result<reqwest::Response>) -> String {
        let response = match result {
            Ok(r) => r,
            Err(e) => return map_reqwest_error(&e),
        };
        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {} from {}", status, response.url());
        }
        match response.text().await {
            Ok(body) if body.is_empty() => "Error: No data received".to_string(),
            Ok(body) => body,
            Err(e) => format!("Error: Failed to read response: {e}"),
        }
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> String {
    let reason = if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Could not connect: {e}")
    } else if e.is_builder() {
        format!("Invalid request: {e}")
    } else {
        format!("Request failed: {e}")
    };
    warn!("Transport error: {}", reason);
    format!("Error: {reason}")
}

impl Transport for HttpTransport {
    fn post_json(&self, url: String, body: String, api_key: String) -> impl Future<Output = String> + Send {
        let client = self.client.clone();
        async move {
            debug!("POST {} ({} bytes)", url, body.len());
            let builder = client
                .post(&url)
                .header("Content-Type", "application/json")
                .body(body);
            Self::read_body(Self::with_auth(builder, &api_key).send().await).await
        }
    }

    fn get(&self, url: String, api_key: String) -> impl Future<Output = String> + Send {
        let client = self.client.clone();
        async move {
            debug!("GET {}", url);
            Self::read_body(Self::with_auth(client.get(&url), &api_key).send().await).await
        }
    }

    fn probe(&self, url: String, api_key: String) -> impl Future<Output = bool> + Send {
        let client = self.probe_client.clone();
        async move {
            match Self::with_auth(client.get(&url), &api_key).send().await {
                Ok(response) => {
                    debug!("Probe {} answered {}", url, response.status());
                    true
                }
                Err(e) => {
                    warn!("Probe {} failed: {}", url, e);
                    false
                }
            }
        }
    }
}
