mod boards;
mod settings;
mod state;

pub use state::AdminState;

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    routing::get,
};
use serde::Serialize;

use crate::store::ConfigWrite;

use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/config",
            get(settings::admin_global_config).put(settings::admin_global_update),
        )
        .route(
            "/admin/boards/{id}",
            get(boards::admin_board_config)
                .put(boards::admin_board_update)
                .delete(boards::admin_board_delete),
        )
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Body returned by configuration writes.
#[derive(Debug, Serialize)]
struct WriteOutcome {
    changed: bool,
    fingerprint: String,
}

fn write_outcome(write: ConfigWrite) -> Json<WriteOutcome> {
    Json(WriteOutcome {
        changed: write.changed,
        fingerprint: write.fingerprint,
    })
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
