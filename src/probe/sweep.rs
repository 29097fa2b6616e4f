use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::context::AppContext;
use crate::db::read::snapshot_master_names;
use crate::http_client::sanitize_error;
use crate::notify::NewAlive;
use crate::probe::{ProbeOutcome, Prober, ProberSettings};

/// Probe every known subdomain and persist the results.
///
/// The name list is snapshotted before dispatch; rows added to the master
/// table while the sweep runs are picked up by the next one. Workers are
/// bounded by a semaphore and each persists its own result on a freshly
/// acquired handle, never the snapshot's.
pub async fn probe_all(ctx: &Arc<AppContext>, limit: Option<i64>) -> anyhow::Result<Vec<ProbeOutcome>> {
    let names = snapshot_master_names(&ctx.pool, limit).await?;
    if names.is_empty() {
        tracing::info!("probe sweep: no subdomains to probe");
        return Ok(Vec::new());
    }

    let workers = ctx.config.prober_max_workers.max(1);
    tracing::info!(total = names.len(), workers, "probe sweep starting");

    let prober = Arc::new(Prober::new(ProberSettings::from_config(&ctx.config)));
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut futures = FuturesUnordered::new();

    for name in names {
        let permit = semaphore.clone().acquire_owned().await?;
        let prober = prober.clone();
        let pool = ctx.pool.clone();
        futures.push(tokio::spawn(async move {
            let outcome = prober.probe(&name).await;
            let newly = persist_outcome(&pool, &outcome).await;
            drop(permit);
            (outcome, newly)
        }));
    }

    let mut results = Vec::new();
    let mut new_alives: Vec<NewAlive> = Vec::new();
    let mut worker_errors = 0usize;

    while let Some(joined) = futures.next().await {
        match joined {
            Ok((outcome, newly)) => {
                if let Some(alive) = newly {
                    new_alives.push(alive);
                }
                results.push(outcome);
            }
            Err(e) => {
                worker_errors += 1;
                tracing::error!(error = %e, "probe worker panicked");
            }
        }
    }

    tracing::info!(
        total = results.len(),
        new_alives = new_alives.len(),
        worker_errors,
        "probe sweep finished"
    );

    if !new_alives.is_empty() {
        ctx.notifier.notify_new_alives(&new_alives).await;
    }

    Ok(results)
}

async fn persist_outcome(pool: &PgPool, outcome: &ProbeOutcome) -> Option<NewAlive> {
    match try_persist(pool, outcome).await {
        Ok(newly) => newly,
        Err(e) => {
            tracing::error!(
                subdomain = %outcome.subdomain,
                error = %sanitize_error(&e.to_string()),
                "failed to persist probe result"
            );
            None
        }
    }
}

/// Update the master row's reachability timestamp and upsert the alive
/// table. Returns the delta entry when this probe is the host's first
/// observed reachability.
async fn try_persist(pool: &PgPool, outcome: &ProbeOutcome) -> anyhow::Result<Option<NewAlive>> {
    let mut tx = pool.begin().await?;

    let master: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM subdomains_master WHERE subdomain = $1")
            .bind(&outcome.subdomain)
            .fetch_optional(&mut *tx)
            .await?;

    match master {
        None => {
            // a probe never creates inventory; this row was removed mid-sweep
            tracing::warn!(subdomain = %outcome.subdomain, "probed host missing from master");
        }
        Some(_) if outcome.reachable => {
            sqlx::query("UPDATE subdomains_master SET last_alive = $2 WHERE subdomain = $1")
                .bind(&outcome.subdomain)
                .bind(outcome.probed_at)
                .execute(&mut *tx)
                .await?;
        }
        Some(_) => {}
    }

    let mut newly = None;
    if outcome.reachable {
        let status = outcome.status_code.map(|s| s as i32);
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM alive_subdomains WHERE subdomain = $1")
                .bind(&outcome.subdomain)
                .fetch_optional(&mut *tx)
                .await?;

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO alive_subdomains (subdomain, probed_at, last_alive, status_code) \
                     VALUES ($1, $2, $2, $3)",
                )
                .bind(&outcome.subdomain)
                .bind(outcome.probed_at)
                .bind(status)
                .execute(&mut *tx)
                .await?;
                newly = Some(NewAlive {
                    subdomain: outcome.subdomain.clone(),
                    status_code: status,
                    probed_at: outcome.probed_at,
                });
            }
            Some(_) => {
                sqlx::query(
                    "UPDATE alive_subdomains \
                     SET probed_at = $2, last_alive = $2, status_code = $3 \
                     WHERE subdomain = $1",
                )
                .bind(&outcome.subdomain)
                .bind(outcome.probed_at)
                .bind(status)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(newly)
}
