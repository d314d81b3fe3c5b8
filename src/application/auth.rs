//! Requester position lookup.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::auth::{Credentials, ModerationLevel};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("credential backend failure: {0}")]
    Backend(String),
}

/// Session and staff position backend.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Whether `credentials` belong to a live session.
    ///
    /// Malformed or unknown credentials may be reported either as `Ok(false)`
    /// or as [`AuthError::InvalidCredentials`].
    async fn is_logged_in(&self, credentials: &Credentials) -> Result<bool, AuthError>;

    /// Position of a logged-in user on `board`.
    async fn position(&self, board: &str, user_id: &str) -> Result<ModerationLevel, AuthError>;
}

/// Board ownership backend.
#[async_trait]
pub trait OwnershipRepo: Send + Sync {
    async fn owned_boards(&self, user_id: &str) -> Result<Vec<String>, AuthError>;
}

/// Resolve the position of the requester on `board`.
///
/// Missing and invalid credentials resolve to [`ModerationLevel::Anonymous`];
/// only backend failures are errors.
pub async fn resolve_level(
    resolver: &dyn CredentialResolver,
    credentials: &Credentials,
    board: &str,
) -> Result<ModerationLevel, AuthError> {
    if credentials.is_empty() {
        return Ok(ModerationLevel::Anonymous);
    }

    match resolver.is_logged_in(credentials).await {
        Ok(true) => resolver.position(board, &credentials.user_id).await,
        Ok(false) | Err(AuthError::InvalidCredentials) => Ok(ModerationLevel::Anonymous),
        Err(err) => Err(err),
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::FixedResolver;
    use super::*;

    #[tokio::test]
    async fn no_credentials_skip_backend() {
        let resolver = FixedResolver::new(Ok(true), ModerationLevel::Admin);
        let level = resolve_level(&resolver, &Credentials::default(), "g")
            .await
            .expect("level");
        assert_eq!(level, ModerationLevel::Anonymous);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_credentials_are_anonymous() {
        let resolver = FixedResolver::new(Err("invalid"), ModerationLevel::Admin);
        let level = resolve_level(&resolver, &Credentials::new("u", "bad"), "g")
            .await
            .expect("level");
        assert_eq!(level, ModerationLevel::Anonymous);
    }

    #[tokio::test]
    async fn expired_session_is_anonymous() {
        let resolver = FixedResolver::new(Ok(false), ModerationLevel::Admin);
        let level = resolve_level(&resolver, &Credentials::new("u", "old"), "g")
            .await
            .expect("level");
        assert_eq!(level, ModerationLevel::Anonymous);
    }

    #[tokio::test]
    async fn logged_in_user_gets_position() {
        let resolver = FixedResolver::new(Ok(true), ModerationLevel::Moderator);
        let level = resolve_level(&resolver, &Credentials::new("u", "s"), "g")
            .await
            .expect("level");
        assert_eq!(level, ModerationLevel::Moderator);
    }

    #[tokio::test]
    async fn backend_failure_is_an_error() {
        let resolver = FixedResolver::new(Err("db down"), ModerationLevel::Admin);
        let err = resolve_level(&resolver, &Credentials::new("u", "s"), "g")
            .await
            .expect_err("backend failure");
        assert!(matches!(err, AuthError::Backend(message) if message == "db down"));
    }
}
