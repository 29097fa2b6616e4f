use async_trait::async_trait;

use crate::clients::ShodanClient;
use crate::db::repository::{Finding, InventoryRepository, SourceFields, SourceTag};
use crate::services::SourceService;
use crate::validate::is_valid_subdomain;

/// Shodan DNS ingest. The API returns only left-hand labels; the full name
/// is reconstructed as `label.apex` here. Disabled when no API key is
/// configured.
pub struct ShodanService {
    client: Option<ShodanClient>,
}

impl ShodanService {
    pub fn new(api_key: Option<String>) -> Self {
        match api_key {
            Some(key) => Self { client: Some(ShodanClient::new(key)) },
            None => {
                tracing::info!("shodan service disabled: no SHODAN_API_KEY configured");
                Self { client: None }
            }
        }
    }
}

#[async_trait]
impl SourceService for ShodanService {
    fn name(&self) -> &'static str {
        "shodan"
    }

    async fn ingest(&self, apex: &str, repo: &InventoryRepository) {
        let Some(client) = &self.client else {
            tracing::debug!(apex = %apex, "shodan skipped: no API key");
            return;
        };

        let labels = client.subdomains(apex).await;
        tracing::info!(apex = %apex, count = labels.len(), "shodan fetched labels");

        for label in labels {
            if label.contains('*') {
                continue;
            }
            let full = format!("{}.{}", label.trim().to_lowercase(), apex);
            if !is_valid_subdomain(&full, apex) {
                continue;
            }
            let finding = Finding {
                subdomain: full,
                source: SourceTag::Shodan,
                first_seen: None,
                fields: SourceFields::Plain,
            };
            repo.record(&finding).await;
        }
    }
}
