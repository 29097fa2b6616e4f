use std::time::Duration;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use reqwest::{Client, ClientBuilder, Response, StatusCode};

/// Desktop and mobile User-Agents rotated across client instances.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Android 14; Mobile; rv:123.0) Gecko/123.0 Firefox/123.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Linux; Android 13) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
];

static PTR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]+").unwrap());

/// Strip pointer-like tokens (`0xdeadbeef`) from an error string before it
/// reaches a log line or a stored record.
pub fn sanitize_error(msg: &str) -> String {
    PTR_TOKEN.replace_all(msg, "<ptr>").into_owned()
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Seconds advertised by a 429's Retry-After header, defaulting to 60.
pub fn retry_after_secs(resp: &Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(60)
}

/// Shared core for the intelligence-source clients.
///
/// Behavior common to all four sources: exponential backoff on transport
/// failures and error statuses (base delay 1.5s, factor 2, 3 retries),
/// Retry-After honored on 429 without consuming a retry slot, randomized
/// User-Agent, pointer tokens redacted from logged errors. Clients running
/// their own status policy use the single-attempt path instead.
#[derive(Clone)]
pub struct SourceHttpClient {
    client: Client,
    max_retries: u32,
    retry_delay: f64,
}

impl SourceHttpClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_retries(timeout_secs, 3, 1.5)
    }

    pub fn with_retries(timeout_secs: u64, max_retries: u32, retry_delay: f64) -> Self {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(random_user_agent())
            .build()
            .unwrap_or_default();
        Self { client, max_retries, retry_delay }
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.retry_delay * 2f64.powi(attempt as i32))
    }

    /// One attempt, no retries; transport errors come back sanitized.
    /// For callers that run their own retry policy around raw statuses.
    pub async fn get_once(&self, url: &str, headers: &[(&str, &str)]) -> anyhow::Result<Response> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        match req.send().await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let msg = sanitize_error(&e.to_string());
                Err(anyhow::anyhow!("request to {} failed: {}", url, msg))
            }
        }
    }

    /// GET with the shared retry loop. 429 sleeps out the advertised
    /// Retry-After without consuming a retry slot; transport errors and
    /// error statuses back off exponentially up to the cap. When retries
    /// are exhausted on an error status the last response is still
    /// returned so the caller can inspect it.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> anyhow::Result<Response> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_once(url, headers).await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = retry_after_secs(&resp);
                    tracing::warn!(url = %url, wait, "rate limited, honoring Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    // deliberately does not count against max_retries
                }
                Ok(resp) if resp.status().as_u16() >= 400 => {
                    let status = resp.status().as_u16();
                    tracing::debug!(url = %url, attempt, status, "request returned error status");
                    if attempt >= self.max_retries {
                        return Ok(resp);
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    tracing::warn!(url = %url, attempt, error = %e, "request failed");
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// GET expecting a JSON body; an error status that survives the retry
    /// loop becomes an error here.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<serde_json::Value> {
        let resp = self.get(url, headers).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("{} returned status {}", url, status));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_pointer_tokens() {
        let raw = "connection error <HTTPSConnection at 0x7f3a9c04d2e0>: refused";
        let clean = sanitize_error(raw);
        assert!(!clean.contains("0x"));
        assert!(clean.contains("<ptr>"));
    }

    #[test]
    fn sanitize_leaves_plain_messages() {
        assert_eq!(sanitize_error("connection refused"), "connection refused");
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let c = SourceHttpClient::with_retries(5, 3, 1.5);
        assert_eq!(c.backoff_delay(0), Duration::from_secs_f64(1.5));
        assert_eq!(c.backoff_delay(1), Duration::from_secs_f64(3.0));
        assert_eq!(c.backoff_delay(2), Duration::from_secs_f64(6.0));
    }

    #[test]
    fn user_agent_pool_is_populated() {
        assert!(!USER_AGENTS.is_empty());
        assert!(USER_AGENTS.contains(&random_user_agent()));
    }
}
