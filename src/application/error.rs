//! Error reporting at the process and HTTP boundaries.
//!
//! Handlers turn service errors into [`HttpError`]: a short public message
//! for the client plus an [`ErrorReport`] carried in the response extensions,
//! which the response logging middleware consumes.

use std::{error::Error as StdError, iter};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{auth::AuthError, delivery::DeliveryError, settings::ConfigServiceError},
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
    store::StoreError,
};

/// Diagnostic chain of a failed request, outermost error first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Module path of the code that produced the error.
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        error: &(dyn StdError + 'static),
    ) -> Self {
        let messages = iter::successors(Some(error), |&current| current.source())
            .map(ToString::to_string)
            .collect();
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }
}

/// An error response with its internal report attached.
#[derive(Debug)]
pub struct HttpError {
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    /// Error with a free-form detail instead of an error value.
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            public_message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &(dyn StdError + 'static),
    ) -> Self {
        Self {
            public_message,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.report.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.report.status, self.public_message).into_response();
        response.extensions_mut().insert(self.report);
        response
    }
}

impl From<DeliveryError> for HttpError {
    fn from(error: DeliveryError) -> Self {
        let (status, message) = if error.is_not_found() {
            (StatusCode::NOT_FOUND, "Not found")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        };
        HttpError::from_error("application::delivery", status, message, &error)
    }
}

impl From<AuthError> for HttpError {
    fn from(error: AuthError) -> Self {
        HttpError::from_error(
            "application::auth",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &error,
        )
    }
}

impl From<ConfigServiceError> for HttpError {
    fn from(error: ConfigServiceError) -> Self {
        let (status, message) = match &error {
            ConfigServiceError::Forbidden { .. } => (StatusCode::FORBIDDEN, "Forbidden"),
            ConfigServiceError::UnknownBoard(_) => (StatusCode::NOT_FOUND, "Not found"),
            ConfigServiceError::Domain(DomainError::Validation { .. })
            | ConfigServiceError::Store(StoreError::ReservedBoard(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid configuration")
            }
            ConfigServiceError::Store(StoreError::Serialization(_))
            | ConfigServiceError::Auth(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        HttpError::from_error("application::settings", status, message, &error)
    }
}

/// Failure that ends the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentKey;

    #[test]
    fn delivery_errors_map_to_status() {
        let not_found: HttpError = DeliveryError::UnknownBoard("x".to_string()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let overflow: HttpError = DeliveryError::PageOverflow {
            key: ContentKey::board_page("g", 3),
            page: 3,
            total_pages: 1,
        }
        .into();
        assert_eq!(overflow.status(), StatusCode::NOT_FOUND);

        let auth: HttpError = DeliveryError::Auth(AuthError::Backend("down".to_string())).into();
        assert_eq!(auth.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn config_errors_map_to_status() {
        let forbidden: HttpError = ConfigServiceError::Forbidden {
            target: "g".to_string(),
        }
        .into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let invalid: HttpError =
            ConfigServiceError::Domain(DomainError::validation("bad title")).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let reserved: HttpError =
            ConfigServiceError::Store(StoreError::ReservedBoard("all".to_string())).into();
        assert_eq!(reserved.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn report_collects_error_chain() {
        let error = DeliveryError::Auth(AuthError::Backend("db down".to_string()));
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[1].contains("db down"));
    }

    #[test]
    fn report_travels_in_response_extensions() {
        let response = HttpError::new(
            "test",
            StatusCode::BAD_REQUEST,
            "Invalid page number",
            "page query parameter",
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, ["page query parameter"]);
    }
}
