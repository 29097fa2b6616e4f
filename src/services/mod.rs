pub mod crtsh;
pub mod otx;
pub mod shodan;
pub mod virustotal;

use async_trait::async_trait;

use crate::db::repository::InventoryRepository;

pub use crtsh::CrtshService;
pub use otx::OtxService;
pub use shodan::ShodanService;
pub use virustotal::VirusTotalService;

/// One intelligence source feeding the inventory.
///
/// An implementation fetches everything it knows about `apex`, validates
/// each candidate name, and hands accepted findings to the repository.
/// Failures stay inside the implementation: ingest never propagates them,
/// so one source can never abort its siblings.
#[async_trait]
pub trait SourceService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ingest(&self, apex: &str, repo: &InventoryRepository);
}
