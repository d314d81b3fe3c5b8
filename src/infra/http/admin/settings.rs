use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    application::error::HttpError, domain::global::GlobalConfig,
    infra::http::credentials_from_cookies,
};

use super::{AdminState, write_outcome};

pub(super) async fn admin_global_config(
    State(state): State<AdminState>,
    jar: CookieJar,
) -> Response {
    let credentials = credentials_from_cookies(&jar);
    match state.config.read_global(&credentials).await {
        Ok(config) => Json(config).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn admin_global_update(
    State(state): State<AdminState>,
    jar: CookieJar,
    Json(config): Json<GlobalConfig>,
) -> Response {
    let credentials = credentials_from_cookies(&jar);
    match state.config.update_global(&credentials, config).await {
        Ok(write) => write_outcome(write).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
