use crate::http_client::SourceHttpClient;

pub struct ShodanClient {
    http: SourceHttpClient,
    api_key: String,
}

impl ShodanClient {
    pub fn new(api_key: String) -> Self {
        Self { http: SourceHttpClient::new(30), api_key }
    }

    /// Left-hand labels known under `domain` (Shodan returns `www`, not
    /// `www.example.com`); the caller reconstructs the full name. Any
    /// failure yields empty.
    pub async fn subdomains(&self, domain: &str) -> Vec<String> {
        let url = format!(
            "https://api.shodan.io/dns/domain/{}?key={}",
            domain,
            urlencoding::encode(&self.api_key)
        );
        match self.http.get_json(&url, &[]).await {
            Ok(body) => body
                .get("subdomains")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|s| s.as_str())
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                tracing::error!(domain = %domain, error = %e, "shodan request failed");
                Vec::new()
            }
        }
    }
}
