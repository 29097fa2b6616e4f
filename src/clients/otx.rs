use serde::Deserialize;

use crate::http_client::SourceHttpClient;

/// One passive-DNS record: the observed hostname and the address it
/// resolved to at observation time.
#[derive(Debug, Clone, Deserialize)]
pub struct PassiveDnsRecord {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub address: String,
}

pub struct OtxClient {
    http: SourceHttpClient,
    api_key: String,
}

impl OtxClient {
    pub fn new(api_key: String) -> Self {
        Self { http: SourceHttpClient::new(45), api_key }
    }

    /// Passive-DNS records for `domain`. Any failure yields empty.
    pub async fn subdomains(&self, domain: &str) -> Vec<PassiveDnsRecord> {
        let url = format!(
            "https://otx.alienvault.com/api/v1/indicators/domain/{}/passive_dns",
            domain
        );
        match self.http.get_json(&url, &[("X-OTX-API-KEY", self.api_key.as_str())]).await {
            Ok(body) => body
                .get("passive_dns")
                .cloned()
                .map(|v| serde_json::from_value(v).unwrap_or_default())
                .unwrap_or_default(),
            Err(e) => {
                tracing::error!(domain = %domain, error = %e, "otx request failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passive_dns_decodes_with_missing_fields() {
        let raw = r#"[{"hostname":"a.example.com","address":"1.2.3.4"},{"hostname":"b.example.com"}]"#;
        let records: Vec<PassiveDnsRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "1.2.3.4");
        assert_eq!(records[1].address, "");
    }
}
