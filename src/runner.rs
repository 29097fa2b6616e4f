use std::sync::Arc;

use crate::cli::{Cli, Commands};
use subsentry::api::{self, AppState};
use subsentry::config::Config;
use subsentry::context::AppContext;
use subsentry::db;
use subsentry::probe::sweep;
use subsentry::scan;
use subsentry::scheduler::Scheduler;
use subsentry::validate;

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Configure logging based on global flags.
    // Keep external crates (reqwest/hyper/sqlx) quieter than our own so a
    // debug run doesn't drown in connection chatter.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter_str = format!(
        "subsentry={crate},reqwest=info,hyper=info,h2=info,sqlx=warn",
        crate = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();

    let config = Config::from_env();
    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Scan { domain } => run_scan_once(config, domain).await,
        Commands::Probe { limit } => run_probe_once(config, limit).await,
    }
}

async fn serve(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let addr = bind.unwrap_or_else(|| config.bind_addr.clone());

    let pool = db::connect(&config).await?;
    db::init_schema(&pool).await?;

    let ctx = Arc::new(AppContext::new(config, pool));
    let scheduler = Scheduler::new(ctx.clone());
    scheduler.start();
    if let Err(e) = scheduler.schedule_probe().await {
        tracing::error!(error = %e, "failed to register daily probe job, continuing without it");
    }

    let app = api::router(AppState { ctx, scheduler: scheduler.clone() });
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn run_scan_once(config: Config, domain: String) -> anyhow::Result<()> {
    if !validate::is_valid_apex(&domain) {
        anyhow::bail!("invalid domain: {domain}");
    }
    let apex = domain.trim().to_lowercase();

    let pool = db::connect(&config).await?;
    db::init_schema(&pool).await?;

    let ctx = Arc::new(AppContext::new(config, pool));
    let scheduler = Scheduler::new(ctx.clone());
    let handles = scan::start_scan(ctx, &scheduler, &apex, false).await?;
    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!(apex = %apex, "scan finished");
    Ok(())
}

async fn run_probe_once(config: Config, limit: Option<i64>) -> anyhow::Result<()> {
    let pool = db::connect(&config).await?;
    db::init_schema(&pool).await?;

    let ctx = Arc::new(AppContext::new(config, pool));
    let results = sweep::probe_all(&ctx, limit).await?;
    let reachable = results.iter().filter(|r| r.reachable).count();
    println!("probed {} subdomains, {} reachable", results.len(), reachable);
    Ok(())
}
