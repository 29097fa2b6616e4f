use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::db::models::ScheduledJob;
use crate::probe::sweep;
use crate::scan;

/// One day, the cadence for both recurring job kinds.
pub const DAILY_INTERVAL_SECS: i64 = 86_400;
const TICK_SECS: u64 = 30;

pub const PROBE_JOB_ID: &str = "probe_master_daily";

/// Persistent time-based job registry.
///
/// Jobs live in the `scheduled_jobs` table keyed by stable ids, so a
/// restart resumes them on their original cadence. A polling loop
/// dispatches rows whose `next_run_at` has passed and advances them by
/// their interval.
pub struct Scheduler {
    ctx: Arc<AppContext>,
    cancel: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(ctx: Arc<AppContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            cancel: Mutex::new(None),
            handle: Mutex::new(None),
        })
    }

    pub fn scan_job_id(apex: &str) -> String {
        format!("scan_{}", apex.replace('.', "_"))
    }

    /// Idempotent: a second call while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut cancel = self.cancel.lock();
        if cancel.is_some() {
            tracing::debug!("scheduler already running");
            return;
        }
        let token = CancellationToken::new();
        *cancel = Some(token.clone());

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_loop(token).await });
        *self.handle.lock() = Some(handle);
        tracing::info!("scheduler started");
    }

    /// Idempotent: stopping a stopped scheduler is a no-op.
    pub async fn stop(&self) {
        let token = self.cancel.lock().take();
        let Some(token) = token else {
            return;
        };
        token.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("scheduler stopped");
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        let mut tick = tokio::time::interval(Duration::from_secs(TICK_SECS));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => {
                    if let Err(e) = Self::dispatch_due(&self).await {
                        tracing::error!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }

    async fn dispatch_due(this: &Arc<Self>) -> anyhow::Result<()> {
        let now = Local::now().naive_local();
        let due: Vec<ScheduledJob> = sqlx::query_as(
            "SELECT job_id, kind, domain, interval_secs, next_run_at, created_at \
             FROM scheduled_jobs WHERE next_run_at <= $1",
        )
        .bind(now)
        .fetch_all(&this.ctx.pool)
        .await?;

        for job in due {
            let next = now + chrono::Duration::seconds(job.interval_secs.max(1));
            sqlx::query("UPDATE scheduled_jobs SET next_run_at = $2 WHERE job_id = $1")
                .bind(&job.job_id)
                .bind(next)
                .execute(&this.ctx.pool)
                .await?;

            tracing::info!(job_id = %job.job_id, kind = %job.kind, "dispatching scheduled job");
            match job.kind.as_str() {
                "scan" => {
                    let Some(domain) = job.domain.clone() else {
                        tracing::warn!(job_id = %job.job_id, "scan job without a domain");
                        continue;
                    };
                    let this = Arc::clone(this);
                    tokio::spawn(async move {
                        if let Err(e) =
                            scan::start_scan(this.ctx.clone(), &this, &domain, true).await
                        {
                            tracing::error!(domain = %domain, error = %e, "scheduled scan failed");
                        }
                    });
                }
                "probe" => {
                    let ctx = this.ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = sweep::probe_all(&ctx, None).await {
                            tracing::error!(error = %e, "scheduled probe sweep failed");
                        }
                    });
                }
                other => {
                    tracing::warn!(job_id = %job.job_id, kind = %other, "unknown job kind");
                }
            }
        }
        Ok(())
    }

    /// Register the daily scan job for `apex`. No-op when it already exists.
    pub async fn schedule_scan(&self, apex: &str) -> anyhow::Result<()> {
        let job_id = Self::scan_job_id(apex);
        let next = Local::now().naive_local() + chrono::Duration::seconds(DAILY_INTERVAL_SECS);
        let inserted = sqlx::query(
            "INSERT INTO scheduled_jobs (job_id, kind, domain, interval_secs, next_run_at) \
             VALUES ($1, 'scan', $2, $3, $4) ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(&job_id)
        .bind(apex)
        .bind(DAILY_INTERVAL_SECS)
        .bind(next)
        .execute(&self.ctx.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::debug!(job_id = %job_id, "scan job already exists");
        } else {
            tracing::info!(job_id = %job_id, apex = %apex, "added daily scan job");
        }
        Ok(())
    }

    /// Register the singleton daily probe sweep. No-op when present.
    pub async fn schedule_probe(&self) -> anyhow::Result<()> {
        let next = Local::now().naive_local() + chrono::Duration::seconds(DAILY_INTERVAL_SECS);
        let inserted = sqlx::query(
            "INSERT INTO scheduled_jobs (job_id, kind, interval_secs, next_run_at) \
             VALUES ($1, 'probe', $2, $3) ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(PROBE_JOB_ID)
        .bind(DAILY_INTERVAL_SECS)
        .bind(next)
        .execute(&self.ctx.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::debug!(job_id = PROBE_JOB_ID, "probe job already exists");
        } else {
            tracing::info!(job_id = PROBE_JOB_ID, "added daily probe job");
        }
        Ok(())
    }

    /// Remove a job by id; removing a missing job is not an error.
    pub async fn remove(&self, job_id: &str) -> anyhow::Result<()> {
        let removed = sqlx::query("DELETE FROM scheduled_jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.ctx.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            tracing::info!(job_id = %job_id, "removed scheduled job");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_job_ids_escape_dots() {
        assert_eq!(Scheduler::scan_job_id("example.com"), "scan_example_com");
        assert_eq!(Scheduler::scan_job_id("example.co.uk"), "scan_example_co_uk");
    }
}
