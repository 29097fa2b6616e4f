use chrono::NaiveDateTime;
use sqlx::types::Json;
use sqlx::FromRow;

/// Authoritative inventory row. `sources` is stored as an ordered JSON
/// array but treated set-semantically: the union of every source that has
/// ever observed this name.
#[derive(Debug, Clone, FromRow)]
pub struct MasterSubdomain {
    pub id: i64,
    pub subdomain: String,
    pub sources: Json<Vec<String>>,
    pub first_seen: Option<NaiveDateTime>,
    pub last_alive: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// One row per subdomain ever observed reachable. Kept when the host later
/// goes down; `probed_at` carries the last probe time.
#[derive(Debug, Clone, FromRow)]
pub struct AliveSubdomain {
    pub id: i64,
    pub subdomain: String,
    pub probed_at: Option<NaiveDateTime>,
    pub last_alive: Option<NaiveDateTime>,
    pub status_code: Option<i32>,
    pub notes: Option<String>,
}

/// Time-bounded claim on an apex preventing concurrent scans.
#[derive(Debug, Clone, FromRow)]
pub struct DomainRequest {
    pub id: i64,
    pub domain: String,
    pub requested_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub scheduled: bool,
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduledJob {
    pub job_id: String,
    pub kind: String,
    pub domain: Option<String>,
    pub interval_secs: i64,
    pub next_run_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}
