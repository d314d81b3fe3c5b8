use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    application::error::HttpError, domain::boards::BoardConfig,
    infra::http::credentials_from_cookies,
};

use super::{AdminState, write_outcome};

const SOURCE: &str = "infra::http::admin_boards";

pub(super) async fn admin_board_config(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    jar: CookieJar,
) -> Response {
    let credentials = credentials_from_cookies(&jar);
    match state.config.read_board(&credentials, &id).await {
        Ok(config) => Json(config).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Create or replace a board. The path id wins over any id in the body.
pub(super) async fn admin_board_update(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    jar: CookieJar,
    Json(mut config): Json<BoardConfig>,
) -> Response {
    if !config.id.is_empty() && config.id != id {
        return HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid configuration",
            format!("body id `{}` does not match path id `{id}`", config.id),
        )
        .into_response();
    }
    config.id = id.clone();

    let credentials = credentials_from_cookies(&jar);
    match state.config.update_board(&credentials, config).await {
        Ok(write) => write_outcome(write).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn admin_board_delete(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    jar: CookieJar,
) -> Response {
    let credentials = credentials_from_cookies(&jar);
    match state.config.remove_board(&credentials, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
