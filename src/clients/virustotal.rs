use crate::http_client::SourceHttpClient;

/// VirusTotal serves 40 subdomains per relationship page.
pub const PAGE_SIZE: u64 = 40;

/// Absolute page cap derived from the collection count VirusTotal publishes
/// on the first page.
pub fn page_cap(total: u64) -> u64 {
    total.div_ceil(PAGE_SIZE)
}

/// One page of the subdomains relationship: the domain ids on this page,
/// the opaque next-page URL when more pages exist, and the total count
/// published by the service.
#[derive(Debug, Clone, Default)]
pub struct SubdomainPage {
    pub items: Vec<String>,
    pub next: Option<String>,
    pub total: Option<u64>,
}

pub struct VirusTotalClient {
    http: SourceHttpClient,
    api_key: String,
}

impl VirusTotalClient {
    pub fn new(api_key: String) -> Self {
        Self { http: SourceHttpClient::new(30), api_key }
    }

    /// Fetch one page. The first call uses the fixed page size; follow-up
    /// calls pass the opaque `links.next` URL back in as `cursor`.
    pub async fn page(&self, domain: &str, cursor: Option<&str>) -> anyhow::Result<SubdomainPage> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => format!(
                "https://www.virustotal.com/api/v3/domains/{}/relationships/subdomains?limit={}",
                domain, PAGE_SIZE
            ),
        };
        let headers = [("x-apikey", self.api_key.as_str()), ("accept", "application/json")];
        let body = self.http.get_json(&url, &headers).await?;

        let items = body
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("domain"))
                    .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
                    .map(|id| id.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let next = body
            .get("links")
            .and_then(|l| l.get("next"))
            .and_then(|n| n.as_str())
            .map(|n| n.to_string());

        let total = body
            .get("meta")
            .and_then(|m| m.get("count"))
            .and_then(|c| c.as_u64());

        Ok(SubdomainPage { items, next, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_cap_rounds_up() {
        assert_eq!(page_cap(0), 0);
        assert_eq!(page_cap(1), 1);
        assert_eq!(page_cap(40), 1);
        assert_eq!(page_cap(41), 2);
        assert_eq!(page_cap(400), 10);
    }
}
