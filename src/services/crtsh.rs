use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use crate::clients::CrtshClient;
use crate::db::repository::{Finding, InventoryRepository, SourceFields, SourceTag};
use crate::services::SourceService;
use crate::validate::{is_valid_subdomain, normalize_candidate};

const DEFAULT_MAX_DEPTH: usize = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_WORKERS: usize = 2;

/// Certificate-transparency ingest via crt.sh.
///
/// crt.sh matches the queried string as a substring of certificate SANs, so
/// searching a discovered subdomain can unearth siblings that never appear
/// under the apex lexically. The ingest therefore walks discoveries
/// breadth-first: every accepted name is queried in turn, with a bounded
/// worker pool per level and a depth cap.
pub struct CrtshService {
    client: CrtshClient,
    max_depth: usize,
    delay: Duration,
    max_workers: usize,
}

/// Visited/accumulated names for one ingest call. Never shared across
/// apexes; constructed fresh per call.
#[derive(Default)]
struct SearchState {
    processed: HashSet<String>,
    found: HashSet<String>,
}

fn parse_cert_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl CrtshService {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_DEPTH, DEFAULT_DELAY, DEFAULT_MAX_WORKERS)
    }

    pub fn with_limits(max_depth: usize, delay: Duration, max_workers: usize) -> Self {
        Self {
            client: CrtshClient::new(),
            max_depth,
            delay,
            max_workers: max_workers.max(1),
        }
    }

    /// Query one domain, store accepted names, and return the ones not yet
    /// queried themselves.
    async fn search_one(
        &self,
        domain: String,
        repo: &InventoryRepository,
        state: &Mutex<SearchState>,
        depth: usize,
    ) -> Vec<String> {
        {
            let mut st = state.lock();
            if !st.processed.insert(domain.clone()) {
                return Vec::new();
            }
        }

        tracing::info!(domain = %domain, depth, "crtsh searching");
        let certificates = self.client.search(&domain).await;
        // polite delay between queries so crt.sh stays friendly
        tokio::time::sleep(self.delay).await;
        if certificates.is_empty() {
            return Vec::new();
        }

        let mut accepted: Vec<String> = Vec::new();
        for cert in &certificates {
            let first_seen = cert.not_before.as_deref().and_then(parse_cert_timestamp);
            for raw in cert.names() {
                if !is_valid_subdomain(&raw, &domain) {
                    continue;
                }
                let name = normalize_candidate(&raw);
                if !accepted.contains(&name) {
                    accepted.push(name.clone());
                }
                let finding = Finding {
                    subdomain: name,
                    source: SourceTag::Crtsh,
                    first_seen,
                    fields: SourceFields::Certificate {
                        registered_on: cert.not_before.clone(),
                        expires_on: cert.not_after.clone(),
                    },
                };
                repo.record(&finding).await;
            }
        }

        let fresh: Vec<String> = {
            let mut st = state.lock();
            let mut fresh = Vec::new();
            for name in &accepted {
                st.found.insert(name.clone());
                if !st.processed.contains(name) {
                    fresh.push(name.clone());
                }
            }
            fresh
        };
        tracing::info!(
            domain = %domain,
            depth,
            accepted = accepted.len(),
            fresh = fresh.len(),
            "crtsh results"
        );
        fresh
    }
}

impl Default for CrtshService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceService for CrtshService {
    fn name(&self) -> &'static str {
        "crtsh"
    }

    async fn ingest(&self, apex: &str, repo: &InventoryRepository) {
        let state = Mutex::new(SearchState::default());
        let mut frontier = vec![apex.trim().to_lowercase()];
        let mut depth = 0usize;

        loop {
            let results: Vec<Vec<String>> = stream::iter(frontier.into_iter())
                .map(|domain| self.search_one(domain, repo, &state, depth))
                .buffer_unordered(self.max_workers)
                .collect()
                .await;

            let mut next: Vec<String> = Vec::new();
            for batch in results {
                for name in batch {
                    if !next.contains(&name) {
                        next.push(name);
                    }
                }
            }

            depth += 1;
            if next.is_empty() || depth > self.max_depth {
                break;
            }
            frontier = next;
        }

        let total = state.lock().found.len();
        tracing::info!(apex = %apex, total, "crtsh ingest finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_timestamps_parse_common_shapes() {
        assert!(parse_cert_timestamp("2024-01-01T12:30:45").is_some());
        assert!(parse_cert_timestamp("2024-01-01T12:30:45.123456").is_some());
        assert!(parse_cert_timestamp("2024-01-01").is_some());
        assert!(parse_cert_timestamp("not a date").is_none());
    }

    #[test]
    fn date_only_parses_to_midnight() {
        let ts = parse_cert_timestamp("2024-06-15").unwrap();
        assert_eq!(ts.format("%H:%M:%S").to_string(), "00:00:00");
    }
}
