use sqlx::PgPool;

use crate::config::Config;
use crate::db::repository::InventoryRepository;
use crate::notify::Notifier;

/// Process-wide wiring shared by the coordinators, the scheduler, and the
/// HTTP handlers. The pool is the only thing shared between tasks; each
/// task checks out its own connection.
pub struct AppContext {
    pub config: Config,
    pub pool: PgPool,
    pub repo: InventoryRepository,
    pub notifier: Notifier,
}

impl AppContext {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let repo = InventoryRepository::new(pool.clone());
        let notifier = Notifier::from_config(&config);
        Self { config, pool, repo, notifier }
    }
}
