pub mod data;
pub mod probe;
pub mod search;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    pub scheduler: Arc<Scheduler>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(search::subdomain_search))
        .route("/probe", post(probe::probe_now))
        .route("/domains/data", get(data::domain_data))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
