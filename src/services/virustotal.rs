use std::time::Duration;

use async_trait::async_trait;

use crate::clients::virustotal::{page_cap, VirusTotalClient};
use crate::db::repository::{Finding, InventoryRepository, SourceFields, SourceTag};
use crate::services::SourceService;
use crate::validate::{is_valid_subdomain, normalize_candidate};

const PAGE_DELAY: Duration = Duration::from_secs(1);

/// VirusTotal subdomain-relationship ingest, paged. The first page's
/// `meta.count` fixes the absolute page cap; follow-up pages walk the
/// opaque `links.next` cursor. Disabled when no API key is configured.
pub struct VirusTotalService {
    client: Option<VirusTotalClient>,
}

impl VirusTotalService {
    pub fn new(api_key: Option<String>) -> Self {
        match api_key {
            Some(key) => Self { client: Some(VirusTotalClient::new(key)) },
            None => {
                tracing::info!("virustotal service disabled: no VIRUS_TOTAL_API_KEY configured");
                Self { client: None }
            }
        }
    }
}

#[async_trait]
impl SourceService for VirusTotalService {
    fn name(&self) -> &'static str {
        "virustotal"
    }

    async fn ingest(&self, apex: &str, repo: &InventoryRepository) {
        let Some(client) = &self.client else {
            tracing::debug!(apex = %apex, "virustotal skipped: no API key");
            return;
        };

        let mut cursor: Option<String> = None;
        let mut pages: u64 = 0;
        let mut cap: Option<u64> = None;

        loop {
            let page = match client.page(apex, cursor.as_deref()).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(apex = %apex, page = pages, error = %e, "virustotal page fetch failed");
                    break;
                }
            };

            if cap.is_none() {
                if let Some(total) = page.total {
                    cap = Some(page_cap(total));
                }
            }

            let mut stored = 0usize;
            for id in &page.items {
                if !is_valid_subdomain(id, apex) {
                    continue;
                }
                let finding = Finding {
                    subdomain: normalize_candidate(id),
                    source: SourceTag::VirusTotal,
                    first_seen: None,
                    fields: SourceFields::Plain,
                };
                repo.record(&finding).await;
                stored += 1;
            }
            pages += 1;
            tracing::info!(apex = %apex, page = pages, stored, "virustotal page processed");

            let next = match page.next {
                Some(n) => n,
                None => break,
            };
            if let Some(cap) = cap {
                if pages >= cap {
                    tracing::warn!(apex = %apex, cap, "virustotal page cap reached");
                    break;
                }
            }
            cursor = Some(next);
            tokio::time::sleep(PAGE_DELAY).await;
        }
    }
}
