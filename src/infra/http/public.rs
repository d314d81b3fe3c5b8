use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde::Deserialize;

use crate::{
    application::{
        boards::BoardDirectory,
        delivery::{
            Delivery, DeliveryCoordinator, DeliveryRequest, fingerprint_validator,
            matches_validator, parse_last_n,
        },
        error::HttpError,
        render::render_owned_boards,
    },
    cache::ContentKey,
    store::{ConfigStore, fingerprint},
};

use super::{
    credentials_from_cookies,
    middleware::{log_responses, set_request_context},
};

const THEME_COOKIE: &str = "theme";
const REVALIDATE: &str = "max-age=0, must-revalidate";

#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<ConfigStore>,
    pub delivery: Arc<DeliveryCoordinator>,
    pub boards: BoardDirectory,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/json/config", get(global_config))
        .route("/json/board-config/{board}", get(board_config))
        .route("/json/board-list", get(board_list))
        .route("/html/owned-boards/{user}", get(owned_boards))
        .route("/_health", get(health))
        .route("/{board}/", get(board_page))
        .route("/{board}/catalog", get(board_catalog))
        .route("/{board}/{thread}", get(thread_page))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BoardQuery {
    page: Option<String>,
    minimal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThreadQuery {
    last: Option<String>,
    minimal: Option<String>,
}

async fn board_page(
    State(state): State<HttpState>,
    Path(board): Path<String>,
    Query(query): Query<BoardQuery>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    let page = match query.page.as_deref().map(str::parse::<u32>) {
        None => 0,
        Some(Ok(page)) => page,
        Some(Err(err)) => {
            return HttpError::new(
                "infra::http::public::board_page",
                StatusCode::BAD_REQUEST,
                "Invalid page number",
                format!("page query parameter: {err}"),
            )
            .into_response();
        }
    };

    let key = ContentKey::board_page(board.clone(), page);
    deliver(&state, board, key, is_minimal(query.minimal.as_deref()), &jar, &headers).await
}

async fn board_catalog(
    State(state): State<HttpState>,
    Path(board): Path<String>,
    Query(query): Query<BoardQuery>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    let key = ContentKey::catalog(board.clone());
    deliver(&state, board, key, is_minimal(query.minimal.as_deref()), &jar, &headers).await
}

async fn thread_page(
    State(state): State<HttpState>,
    Path((board, thread)): Path<(String, String)>,
    Query(query): Query<ThreadQuery>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    let Ok(id) = thread.parse::<u64>() else {
        return not_found("infra::http::public::thread_page", format!("`{thread}` is not a thread id"));
    };

    let key = ContentKey::thread(id, parse_last_n(query.last.as_deref()));
    deliver(&state, board, key, is_minimal(query.minimal.as_deref()), &jar, &headers).await
}

async fn deliver(
    state: &HttpState,
    board: String,
    key: ContentKey,
    minimal: bool,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Response {
    let request = DeliveryRequest {
        board,
        key,
        credentials: credentials_from_cookies(jar),
        if_none_match: if_none_match(headers),
        theme: jar.get(THEME_COOKIE).map(|cookie| cookie.value().to_string()),
        minimal,
    };

    match state.delivery.deliver(request).await {
        Ok(Delivery::NotModified { validator }) => not_modified(&validator),
        Ok(Delivery::Rendered { validator, body }) => {
            validated_response(body, "text/html; charset=utf-8", &validator)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn global_config(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let (json, hash) = state.store.global_public();
    conditional_json(json, &hash, &headers)
}

async fn board_config(
    State(state): State<HttpState>,
    Path(board): Path<String>,
    headers: HeaderMap,
) -> Response {
    match state.store.board(&board) {
        Some(container) => conditional_json(container.json, &container.hash, &headers),
        None => not_found(
            "infra::http::public::board_config",
            format!("board `{board}` does not exist"),
        ),
    }
}

async fn board_list(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    match serde_json::to_vec(&state.boards.titles()) {
        Ok(json) => {
            let hash = fingerprint(&json);
            conditional_json(Bytes::from(json), &hash, &headers)
        }
        Err(err) => HttpError::from_error(
            "infra::http::public::board_list",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

async fn owned_boards(State(state): State<HttpState>, Path(user): Path<String>) -> Response {
    let titles = match state.boards.owned_titles(&user).await {
        Ok(titles) => titles,
        Err(err) => return HttpError::from(err).into_response(),
    };
    match render_owned_boards(&titles) {
        Ok(html) => {
            let mut response = html_response(html);
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(err) => HttpError::from_error(
            "infra::http::public::owned_boards",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn conditional_json(json: Bytes, hash: &str, headers: &HeaderMap) -> Response {
    let validator = fingerprint_validator(hash);
    if matches_validator(if_none_match(headers).as_deref(), &validator) {
        return not_modified(&validator);
    }
    validated_response(json, "application/json", &validator)
}

fn if_none_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_minimal(raw: Option<&str>) -> bool {
    matches!(raw, Some("true") | Some("1"))
}

fn not_modified(validator: &str) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    set_validator(&mut response, validator);
    response
}

fn validated_response(body: Bytes, content_type: &'static str, validator: &str) -> Response {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    set_validator(&mut response, validator);
    response
}

fn set_validator(response: &mut Response, validator: &str) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(validator) {
        headers.insert(ETAG, value);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(REVALIDATE));
}

fn html_response(body: Bytes) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn not_found(source: &'static str, detail: String) -> Response {
    HttpError::new(source, StatusCode::NOT_FOUND, "Not found", detail).into_response()
}
