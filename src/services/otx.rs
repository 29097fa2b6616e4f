use async_trait::async_trait;

use crate::clients::OtxClient;
use crate::db::repository::{Finding, InventoryRepository, SourceFields, SourceTag};
use crate::services::SourceService;
use crate::validate::{is_valid_subdomain, normalize_candidate};

/// AlienVault OTX passive-DNS ingest. Disabled when no API key is
/// configured.
pub struct OtxService {
    client: Option<OtxClient>,
}

impl OtxService {
    pub fn new(api_key: Option<String>) -> Self {
        match api_key {
            Some(key) => Self { client: Some(OtxClient::new(key)) },
            None => {
                tracing::info!("otx service disabled: no OTX_API_KEY configured");
                Self { client: None }
            }
        }
    }
}

#[async_trait]
impl SourceService for OtxService {
    fn name(&self) -> &'static str {
        "otx"
    }

    async fn ingest(&self, apex: &str, repo: &InventoryRepository) {
        let Some(client) = &self.client else {
            tracing::debug!(apex = %apex, "otx skipped: no API key");
            return;
        };

        let records = client.subdomains(apex).await;
        tracing::info!(apex = %apex, count = records.len(), "otx fetched passive-dns records");

        for record in records {
            if !is_valid_subdomain(&record.hostname, apex) {
                continue;
            }
            let finding = Finding {
                subdomain: normalize_candidate(&record.hostname),
                source: SourceTag::Otx,
                first_seen: None,
                fields: SourceFields::PassiveDns { address: record.address },
            };
            repo.record(&finding).await;
        }
    }
}
