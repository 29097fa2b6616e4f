use sqlx::PgPool;

use crate::db::models::{AliveSubdomain, MasterSubdomain};

fn like_pattern(domain: &str) -> String {
    format!("%.{domain}")
}

/// Master inventory rows under `domain`, newest first, one page.
pub async fn list_master_subdomains(
    pool: &PgPool,
    domain: &str,
    page: i64,
    per_page: i64,
) -> anyhow::Result<Vec<MasterSubdomain>> {
    let rows = sqlx::query_as::<_, MasterSubdomain>(
        "SELECT id, subdomain, sources, first_seen, last_alive, created_at \
         FROM subdomains_master \
         WHERE subdomain ILIKE $1 OR subdomain = $2 \
         ORDER BY created_at DESC \
         OFFSET $3 LIMIT $4",
    )
    .bind(like_pattern(domain))
    .bind(domain)
    .bind(page * per_page)
    .bind(per_page)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_master_subdomains(pool: &PgPool, domain: &str) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM subdomains_master WHERE subdomain ILIKE $1 OR subdomain = $2",
    )
    .bind(like_pattern(domain))
    .bind(domain)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Reachable rows under `domain`, most recently probed first, one page.
pub async fn list_alive_subdomains(
    pool: &PgPool,
    domain: &str,
    page: i64,
    per_page: i64,
) -> anyhow::Result<Vec<AliveSubdomain>> {
    let rows = sqlx::query_as::<_, AliveSubdomain>(
        "SELECT id, subdomain, probed_at, last_alive, status_code, notes \
         FROM alive_subdomains \
         WHERE subdomain ILIKE $1 OR subdomain = $2 \
         ORDER BY probed_at DESC \
         OFFSET $3 LIMIT $4",
    )
    .bind(like_pattern(domain))
    .bind(domain)
    .bind(page * per_page)
    .bind(per_page)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_alive_subdomains(pool: &PgPool, domain: &str) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM alive_subdomains WHERE subdomain ILIKE $1 OR subdomain = $2",
    )
    .bind(like_pattern(domain))
    .bind(domain)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Snapshot of every known subdomain name, optionally capped, for the
/// probe sweep. The connection is returned to the pool before workers run.
pub async fn snapshot_master_names(
    pool: &PgPool,
    limit: Option<i64>,
) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = match limit {
        Some(n) => {
            sqlx::query_as("SELECT subdomain FROM subdomains_master ORDER BY id LIMIT $1")
                .bind(n)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT subdomain FROM subdomains_master ORDER BY id")
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_children_not_lookalikes() {
        assert_eq!(like_pattern("example.com"), "%.example.com");
    }
}
