use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::Serialize;

use crate::config::Config;
use crate::http_client::{random_user_agent, retry_after_secs, sanitize_error};

/// Non-default ports worth knocking on, secure ports first.
pub const DEFAULT_PORTS: &[u16] = &[8443, 8080, 8000, 3000];

#[derive(Debug, Clone)]
pub struct ProberSettings {
    pub timeout_secs: u64,
    pub verify_tls: bool,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub ports: Vec<u16>,
}

impl Default for ProberSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            verify_tls: true,
            max_retries: 1,
            retry_delay_secs: 1.0,
            ports: DEFAULT_PORTS.to_vec(),
        }
    }
}

impl ProberSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timeout_secs: cfg.prober_timeout_secs,
            verify_tls: cfg.prober_verify_tls,
            max_retries: cfg.prober_max_retries,
            retry_delay_secs: cfg.prober_retry_delay_secs,
            ports: DEFAULT_PORTS.to_vec(),
        }
    }
}

/// Result of probing one host across the scheme/port matrix.
///
/// `reachable` means *any* HTTP status came back, 4xx and 5xx included;
/// only transport-level failures leave it false.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub subdomain: String,
    pub reachable: bool,
    pub probed_at: NaiveDateTime,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

pub struct Prober {
    client: Client,
    settings: ProberSettings,
}

impl Prober {
    pub fn new(settings: ProberSettings) -> Self {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .use_rustls_tls()
            .user_agent(random_user_agent())
            .build()
            .unwrap_or_default();
        Self { client, settings }
    }

    /// The URL matrix in probe order: default https, default http, then
    /// each extra port with https before http.
    pub fn candidate_urls(host: &str, ports: &[u16]) -> Vec<String> {
        let mut urls = vec![format!("https://{host}/"), format!("http://{host}/")];
        for port in ports {
            urls.push(format!("https://{host}:{port}/"));
            urls.push(format!("http://{host}:{port}/"));
        }
        urls
    }

    pub async fn probe(&self, host: &str) -> ProbeOutcome {
        let probed_at = Local::now().naive_local();
        let mut last_error: Option<String> = None;

        for url in Self::candidate_urls(host, &self.settings.ports) {
            match self.try_url(&url).await {
                Ok(status) => {
                    tracing::debug!(host = %host, url = %url, status, "probe reachable");
                    return ProbeOutcome {
                        subdomain: host.to_string(),
                        reachable: true,
                        probed_at,
                        status_code: Some(status),
                        error: None,
                    };
                }
                Err(err) => {
                    tracing::debug!(host = %host, url = %url, error = %err, "probe attempt failed");
                    last_error = Some(err);
                }
            }
        }

        ProbeOutcome {
            subdomain: host.to_string(),
            reachable: false,
            probed_at,
            status_code: None,
            error: last_error,
        }
    }

    /// One URL attempt: HEAD first, falling back to GET on 405 or when HEAD
    /// yields no status at all. Err means the network layer failed.
    async fn try_url(&self, url: &str) -> Result<u16, String> {
        match self.request_with_retry(Method::HEAD, url).await {
            Ok(status) if status == StatusCode::METHOD_NOT_ALLOWED.as_u16() => {
                self.request_with_retry(Method::GET, url).await
            }
            Ok(status) => Ok(status),
            Err(_) => self.request_with_retry(Method::GET, url).await,
        }
    }

    async fn request_with_retry(&self, method: Method, url: &str) -> Result<u16, String> {
        let mut attempt: u32 = 0;
        loop {
            match self.client.request(method.clone(), url).send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = retry_after_secs(&resp);
                    tracing::warn!(url = %url, wait, "probe rate limited, honoring Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                Ok(resp) => return Ok(resp.status().as_u16()),
                Err(e) => {
                    let msg = sanitize_error(&e.to_string());
                    if attempt >= self.settings.max_retries {
                        return Err(msg);
                    }
                    let delay = self.settings.retry_delay_secs * 2f64.powi(attempt as i32);
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_matrix_order_is_normative() {
        let urls = Prober::candidate_urls("a.example.com", DEFAULT_PORTS);
        assert_eq!(
            urls,
            vec![
                "https://a.example.com/",
                "http://a.example.com/",
                "https://a.example.com:8443/",
                "http://a.example.com:8443/",
                "https://a.example.com:8080/",
                "http://a.example.com:8080/",
                "https://a.example.com:8000/",
                "http://a.example.com:8000/",
                "https://a.example.com:3000/",
                "http://a.example.com:3000/",
            ]
        );
    }

    #[test]
    fn empty_port_list_probes_defaults_only() {
        let urls = Prober::candidate_urls("a.example.com", &[]);
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_host_reports_sanitized_error() {
        let prober = Prober::new(ProberSettings {
            timeout_secs: 1,
            verify_tls: true,
            max_retries: 0,
            retry_delay_secs: 0.0,
            ports: vec![],
        });
        // reserved TLD, guaranteed to fail at the network layer
        let outcome = prober.probe("host.invalid").await;
        assert!(!outcome.reachable);
        assert!(outcome.status_code.is_none());
        let err = outcome.error.expect("error string");
        assert!(!err.contains("0x"));
    }
}
