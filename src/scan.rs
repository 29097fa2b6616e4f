use std::sync::Arc;

use chrono::NaiveDateTime;
use sqlx::PgPool;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::context::AppContext;
use crate::db::models::DomainRequest;
use crate::scheduler::Scheduler;
use crate::services::{
    CrtshService, OtxService, ShodanService, SourceService, VirusTotalService,
};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan already scheduled until {0}")]
    InProgress(NaiveDateTime),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// The four source services, freshly constructed so the recursive search
/// state never leaks between scans.
pub fn build_services(cfg: &Config) -> Vec<Arc<dyn SourceService>> {
    vec![
        Arc::new(CrtshService::new()),
        Arc::new(OtxService::new(cfg.otx_api_key.clone())),
        Arc::new(ShodanService::new(cfg.shodan_api_key.clone())),
        Arc::new(VirusTotalService::new(cfg.virus_total_api_key.clone())),
    ]
}

/// Reserve `apex` and fan the source services out in parallel.
///
/// A manual request (`scheduled = false`) is rejected while a live
/// reservation exists; the scheduler's own runs refresh their reservation
/// instead. Returns once dispatch is complete; source work continues on the
/// spawned tasks.
pub async fn start_scan(
    ctx: Arc<AppContext>,
    scheduler: &Scheduler,
    apex: &str,
    scheduled: bool,
) -> Result<Vec<JoinHandle<()>>, ScanError> {
    if scheduled {
        ensure_scheduled_reservation(&ctx.pool, apex).await?;
    } else {
        cleanup_expired(&ctx.pool).await;
        if let Some(existing) = active_reservation(&ctx.pool, apex).await? {
            return Err(ScanError::InProgress(existing.expires_at));
        }
        create_reservation(&ctx.pool, apex, None).await?;
    }

    if let Err(e) = scheduler.schedule_scan(apex).await {
        tracing::error!(apex = %apex, error = %e, "failed to register daily scan job");
    }

    Ok(dispatch_sources(ctx, apex.to_string()))
}

/// Launch one task per source. Each task owns its service instance and
/// acquires database handles on its own; a failing source never cancels a
/// sibling.
pub fn dispatch_sources(ctx: Arc<AppContext>, apex: String) -> Vec<JoinHandle<()>> {
    build_services(&ctx.config)
        .into_iter()
        .map(|svc| {
            let ctx = ctx.clone();
            let apex = apex.clone();
            tokio::spawn(async move {
                tracing::info!(source = svc.name(), apex = %apex, "source ingest start");
                svc.ingest(&apex, &ctx.repo).await;
                tracing::info!(source = svc.name(), apex = %apex, "source ingest finished");
            })
        })
        .collect()
}

async fn cleanup_expired(pool: &PgPool) {
    if let Err(e) = sqlx::query("DELETE FROM domain_requested WHERE expires_at <= LOCALTIMESTAMP")
        .execute(pool)
        .await
    {
        tracing::debug!(error = %e, "failed to clean up expired reservations");
    }
}

/// The newest live reservation for `apex`, if one exists.
pub async fn active_reservation(
    pool: &PgPool,
    apex: &str,
) -> Result<Option<DomainRequest>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, domain, requested_at, expires_at, scheduled, requested_by \
         FROM domain_requested \
         WHERE domain = $1 AND expires_at > LOCALTIMESTAMP \
         ORDER BY expires_at DESC LIMIT 1",
    )
    .bind(apex)
    .fetch_optional(pool)
    .await
}

async fn create_reservation(
    pool: &PgPool,
    apex: &str,
    requested_by: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO domain_requested (domain, scheduled, requested_by) VALUES ($1, TRUE, $2)",
    )
    .bind(apex)
    .bind(requested_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// A scheduler-driven run keeps its claim marked without resetting the
/// manual-request expiry window.
async fn ensure_scheduled_reservation(pool: &PgPool, apex: &str) -> Result<(), sqlx::Error> {
    let updated = sqlx::query("UPDATE domain_requested SET scheduled = TRUE WHERE domain = $1")
        .bind(apex)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        sqlx::query("INSERT INTO domain_requested (domain, scheduled) VALUES ($1, TRUE)")
            .bind(apex)
            .execute(pool)
            .await?;
    }
    Ok(())
}
