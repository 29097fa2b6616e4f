use std::time::Duration;

use serde::Deserialize;

use crate::http_client::SourceHttpClient;

const TIMEOUT_SECS: u64 = 45;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECS: f64 = 1.5;

/// One certificate entry from crt.sh. `name_value` packs several names
/// separated by newlines.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateRecord {
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub name_value: Option<String>,
    #[serde(default)]
    pub not_before: Option<String>,
    #[serde(default)]
    pub not_after: Option<String>,
}

impl CertificateRecord {
    /// Every name mentioned by this certificate, newline-split and trimmed.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(nv) = &self.name_value {
            for n in nv.split('\n') {
                let n = n.trim();
                if !n.is_empty() && !out.iter().any(|s| s == n) {
                    out.push(n.to_string());
                }
            }
        }
        if let Some(cn) = &self.common_name {
            let cn = cn.split('\n').next().unwrap_or("").trim();
            if !cn.is_empty() && !out.iter().any(|s| s == cn) {
                out.push(cn.to_string());
            }
        }
        out
    }
}

pub struct CrtshClient {
    http: SourceHttpClient,
}

impl CrtshClient {
    pub fn new() -> Self {
        Self { http: SourceHttpClient::with_retries(TIMEOUT_SECS, MAX_RETRIES, RETRY_DELAY_SECS) }
    }

    /// Search certificates for `domain`.
    ///
    /// Runs its own retry policy over single-attempt requests: HTTP 502 and
    /// transport failures are retried up to the cap before yielding empty.
    /// Any other status >= 400 and any JSON decode failure also yield empty
    /// so a flaky crt.sh never aborts an ingest.
    pub async fn search(&self, domain: &str) -> Vec<CertificateRecord> {
        let url = format!("https://crt.sh/?q={}&output=json", urlencoding::encode(domain));

        for attempt in 1..=MAX_RETRIES {
            let resp = match self.http.get_once(&url, &[]).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(domain = %domain, attempt, error = %e, "crtsh request failed");
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(Duration::from_secs_f64(RETRY_DELAY_SECS)).await;
                        continue;
                    }
                    return Vec::new();
                }
            };

            let status = resp.status().as_u16();
            if status == 502 {
                tracing::warn!(domain = %domain, attempt, "crtsh returned 502, retrying");
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(Duration::from_secs_f64(RETRY_DELAY_SECS)).await;
                    continue;
                }
                tracing::error!(domain = %domain, "crtsh: exhausted retries on 502");
                return Vec::new();
            }
            if status >= 400 {
                tracing::error!(domain = %domain, status, "crtsh returned error status");
                return Vec::new();
            }

            return match resp.json::<Vec<CertificateRecord>>().await {
                Ok(records) => records,
                Err(_) => {
                    tracing::error!(domain = %domain, "crtsh: failed to decode JSON");
                    Vec::new()
                }
            };
        }
        Vec::new()
    }
}

impl Default for CrtshClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_splits_name_value_and_appends_common_name() {
        let rec = CertificateRecord {
            common_name: Some("c.example.com".into()),
            name_value: Some("a.example.com\nb.example.com\n\n a.example.com ".into()),
            not_before: Some("2024-01-01".into()),
            not_after: Some("2025-01-01".into()),
        };
        assert_eq!(rec.names(), vec!["a.example.com", "b.example.com", "c.example.com"]);
    }

    #[test]
    fn names_handles_missing_fields() {
        let rec = CertificateRecord {
            common_name: None,
            name_value: None,
            not_before: None,
            not_after: None,
        };
        assert!(rec.names().is_empty());
    }

    #[test]
    fn record_decodes_from_crtsh_json() {
        let raw = r#"{"issuer_ca_id":1,"name_value":"a.example.com\nb.example.com","not_before":"2024-01-01","not_after":"2025-01-01"}"#;
        let rec: CertificateRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.names().len(), 2);
        assert_eq!(rec.not_before.as_deref(), Some("2024-01-01"));
    }
}
