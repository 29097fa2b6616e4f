use chrono::NaiveDateTime;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::http_client::sanitize_error;

/// Provenance tag recorded in the master inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Crtsh,
    Otx,
    Shodan,
    VirusTotal,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Crtsh => "crtsh",
            SourceTag::Otx => "otx",
            SourceTag::Shodan => "shodan",
            SourceTag::VirusTotal => "virustotal",
        }
    }
}

/// Source-specific columns carried alongside a finding.
#[derive(Debug, Clone)]
pub enum SourceFields {
    Certificate { registered_on: Option<String>, expires_on: Option<String> },
    PassiveDns { address: String },
    Plain,
}

/// One observation of a subdomain by one source.
#[derive(Debug, Clone)]
pub struct Finding {
    pub subdomain: String,
    pub source: SourceTag,
    pub first_seen: Option<NaiveDateTime>,
    pub fields: SourceFields,
}

/// Sole writer to the per-source tables and the master inventory.
///
/// Each `record` call runs in its own transaction on a freshly acquired
/// connection; a failed write rolls back and logs without disturbing
/// sibling findings.
#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upsert `finding` into its per-source table and merge its provenance
    /// into the master inventory. Errors are contained here: logged, rolled
    /// back, and never allowed to abort the ingest of sibling names.
    pub async fn record(&self, finding: &Finding) {
        if let Err(e) = self.try_record(finding).await {
            tracing::error!(
                subdomain = %finding.subdomain,
                source = finding.source.as_str(),
                error = %sanitize_error(&e.to_string()),
                "failed to record finding"
            );
        }
    }

    async fn try_record(&self, finding: &Finding) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_source_row(&mut tx, finding).await?;
        merge_master(&mut tx, finding).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_source_row(
    tx: &mut Transaction<'_, Postgres>,
    finding: &Finding,
) -> anyhow::Result<()> {
    match (&finding.source, &finding.fields) {
        (SourceTag::Crtsh, SourceFields::Certificate { registered_on, expires_on }) => {
            sqlx::query(
                "INSERT INTO crtsh_subdomain (subdomain, registered_on, expires_on) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (subdomain) DO UPDATE \
                 SET registered_on = EXCLUDED.registered_on, expires_on = EXCLUDED.expires_on",
            )
            .bind(&finding.subdomain)
            .bind(registered_on)
            .bind(expires_on)
            .execute(&mut **tx)
            .await?;
        }
        (SourceTag::Otx, SourceFields::PassiveDns { address }) => {
            sqlx::query(
                "INSERT INTO otx_subdomains (subdomain, address) VALUES ($1, $2) \
                 ON CONFLICT (subdomain) DO UPDATE SET address = EXCLUDED.address",
            )
            .bind(&finding.subdomain)
            .bind(address)
            .execute(&mut **tx)
            .await?;
        }
        (SourceTag::Shodan, _) => {
            sqlx::query(
                "INSERT INTO shodan_subdomain (subdomain) VALUES ($1) \
                 ON CONFLICT (subdomain) DO NOTHING",
            )
            .bind(&finding.subdomain)
            .execute(&mut **tx)
            .await?;
        }
        (SourceTag::VirusTotal, _) => {
            sqlx::query(
                "INSERT INTO virus_total_subdomain (subdomain) VALUES ($1) \
                 ON CONFLICT (subdomain) DO NOTHING",
            )
            .bind(&finding.subdomain)
            .execute(&mut **tx)
            .await?;
        }
        // tag/fields mismatch still records provenance through the master merge
        _ => {}
    }
    Ok(())
}

/// Merge the finding's source tag and first-seen timestamp into the master
/// row. The idempotent insert guarantees the row exists, then `FOR UPDATE`
/// serializes the read-modify-write so two sources racing on the same name
/// still end up with the union of both tags.
async fn merge_master(
    tx: &mut Transaction<'_, Postgres>,
    finding: &Finding,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO subdomains_master (subdomain, sources) VALUES ($1, '[]'::jsonb) \
         ON CONFLICT (subdomain) DO NOTHING",
    )
    .bind(&finding.subdomain)
    .execute(&mut **tx)
    .await?;

    let (Json(mut sources), existing_first): (Json<Vec<String>>, Option<NaiveDateTime>) =
        sqlx::query_as(
            "SELECT sources, first_seen FROM subdomains_master WHERE subdomain = $1 FOR UPDATE",
        )
        .bind(&finding.subdomain)
        .fetch_one(&mut **tx)
        .await?;

    let tag = finding.source.as_str();
    if !sources.iter().any(|s| s == tag) {
        sources.push(tag.to_string());
    }

    let first_seen = match (existing_first, finding.first_seen) {
        (Some(old), Some(new)) => Some(old.min(new)),
        (Some(old), None) => Some(old),
        (None, new) => new,
    };

    sqlx::query("UPDATE subdomains_master SET sources = $2, first_seen = $3 WHERE subdomain = $1")
        .bind(&finding.subdomain)
        .bind(Json(sources))
        .bind(first_seen)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_are_stable() {
        assert_eq!(SourceTag::Crtsh.as_str(), "crtsh");
        assert_eq!(SourceTag::Otx.as_str(), "otx");
        assert_eq!(SourceTag::Shodan.as_str(), "shodan");
        assert_eq!(SourceTag::VirusTotal.as_str(), "virustotal");
    }
}
