//! Authorized configuration reads and writes.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    application::{
        auth::{AuthError, CredentialResolver, resolve_level},
        events::{EventKind, EventQueue},
    },
    domain::{
        auth::{Credentials, ModerationLevel},
        boards::{ALL_BOARD_ID, BoardConfig, is_pseudo_board},
        error::DomainError,
        global::GlobalConfig,
    },
    store::{ConfigStore, ConfigWrite, StoreError},
};

#[derive(Debug, Error)]
pub enum ConfigServiceError {
    #[error("requester may not access `{target}`")]
    Forbidden { target: String },
    #[error("board `{0}` does not exist")]
    UnknownBoard(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Privileged access to the configuration store.
///
/// Global writes need an administrator. Board writes need the board owner or
/// an administrator, and only administrators create boards. Events are
/// published only when stored state actually changed.
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<ConfigStore>,
    credentials: Arc<dyn CredentialResolver>,
    events: Arc<EventQueue>,
}

impl ConfigService {
    pub fn new(
        store: Arc<ConfigStore>,
        credentials: Arc<dyn CredentialResolver>,
        events: Arc<EventQueue>,
    ) -> Self {
        Self {
            store,
            credentials,
            events,
        }
    }

    /// Full global configuration, secrets included. Administrators only.
    pub async fn read_global(
        &self,
        credentials: &Credentials,
    ) -> Result<GlobalConfig, ConfigServiceError> {
        self.require(credentials, ALL_BOARD_ID, ModerationLevel::Admin, "global configuration")
            .await?;
        Ok(self.store.global())
    }

    /// Full configuration of board `id`. Board owners and administrators only.
    pub async fn read_board(
        &self,
        credentials: &Credentials,
        id: &str,
    ) -> Result<BoardConfig, ConfigServiceError> {
        let Some(board) = self.store.board(id) else {
            return Err(ConfigServiceError::UnknownBoard(id.to_string()));
        };
        self.require(credentials, id, ModerationLevel::BoardOwner, id)
            .await?;
        Ok(board.config)
    }

    async fn require(
        &self,
        credentials: &Credentials,
        board: &str,
        required: ModerationLevel,
        target: &str,
    ) -> Result<(), ConfigServiceError> {
        let level = resolve_level(self.credentials.as_ref(), credentials, board).await?;
        if level < required {
            return Err(ConfigServiceError::Forbidden {
                target: target.to_string(),
            });
        }
        Ok(())
    }

    /// Replace the global configuration.
    #[instrument(skip_all, fields(user = %credentials.user_id))]
    pub async fn update_global(
        &self,
        credentials: &Credentials,
        config: GlobalConfig,
    ) -> Result<ConfigWrite, ConfigServiceError> {
        self.require(credentials, ALL_BOARD_ID, ModerationLevel::Admin, "global configuration")
            .await?;
        config.validate()?;

        let write = self.store.set_global(config)?;
        if write.changed {
            self.events.publish(EventKind::GlobalUpdated {
                fingerprint: write.fingerprint.clone(),
            });
        }
        Ok(write)
    }

    /// Create or replace a board.
    #[instrument(skip_all, fields(user = %credentials.user_id, board = %config.id))]
    pub async fn update_board(
        &self,
        credentials: &Credentials,
        config: BoardConfig,
    ) -> Result<ConfigWrite, ConfigServiceError> {
        config.validate()?;

        let required = if self.store.is_board(&config.id) {
            ModerationLevel::BoardOwner
        } else {
            ModerationLevel::Admin
        };
        self.require(credentials, &config.id, required, &config.id)
            .await?;

        let id = config.id.clone();
        let write = self.store.set_board(config)?;
        if write.changed {
            self.events.publish(EventKind::BoardUpdated {
                board: id,
                fingerprint: write.fingerprint.clone(),
            });
        }
        Ok(write)
    }

    /// Remove a board. Pseudo-boards cannot be removed.
    #[instrument(skip_all, fields(user = %credentials.user_id, board = %id))]
    pub async fn remove_board(
        &self,
        credentials: &Credentials,
        id: &str,
    ) -> Result<(), ConfigServiceError> {
        if is_pseudo_board(id) {
            return Err(StoreError::ReservedBoard(id.to_string()).into());
        }
        if !self.store.is_board(id) {
            return Err(ConfigServiceError::UnknownBoard(id.to_string()));
        }

        self.require(credentials, id, ModerationLevel::BoardOwner, id)
            .await?;

        self.store.remove_board(id);
        self.events.publish(EventKind::BoardRemoved {
            board: id.to_string(),
        });
        info!("Board removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::auth::testing::FixedResolver;

    fn service(level: ModerationLevel) -> (ConfigService, Arc<ConfigStore>, Arc<EventQueue>) {
        let store = Arc::new(ConfigStore::new(GlobalConfig::default()).expect("store"));
        let events = Arc::new(EventQueue::new());
        let service = ConfigService::new(
            store.clone(),
            Arc::new(FixedResolver::new(Ok(true), level)),
            events.clone(),
        );
        (service, store, events)
    }

    fn creds() -> Credentials {
        Credentials::new("staff", "session")
    }

    #[tokio::test]
    async fn admin_creates_board_and_event_is_published_once() {
        let (service, store, events) = service(ModerationLevel::Admin);

        let created = service
            .update_board(&creds(), BoardConfig::new("g", "Games"))
            .await
            .expect("create");
        assert!(created.changed);
        assert!(store.is_board("g"));

        let unchanged = service
            .update_board(&creds(), BoardConfig::new("g", "Games"))
            .await
            .expect("repeat");
        assert!(!unchanged.changed);
        assert_eq!(unchanged.fingerprint, created.fingerprint);

        let drained = events.drain(10);
        assert_eq!(drained.len(), 1);
        assert!(matches!(
            &drained[0].kind,
            EventKind::BoardUpdated { board, fingerprint }
                if board == "g" && *fingerprint == created.fingerprint
        ));
    }

    #[tokio::test]
    async fn owner_may_edit_but_not_create() {
        let (service, store, _) = service(ModerationLevel::BoardOwner);

        let err = service
            .update_board(&creds(), BoardConfig::new("g", "Games"))
            .await
            .expect_err("owners cannot create");
        assert!(matches!(err, ConfigServiceError::Forbidden { .. }));

        store
            .set_board(BoardConfig::new("g", "Games"))
            .expect("seed board");
        assert!(
            service
                .update_board(&creds(), BoardConfig::new("g", "Vidya"))
                .await
                .expect("edit")
                .changed
        );
        assert_eq!(store.board("g").expect("board").title(), "Vidya");
    }

    #[tokio::test]
    async fn anonymous_writes_are_forbidden() {
        let (service, store, events) = service(ModerationLevel::Admin);
        let before = store.global_hash();

        let mut conf = GlobalConfig::default();
        conf.public.default_lang = "de_DE".to_string();
        let err = service
            .update_global(&Credentials::default(), conf)
            .await
            .expect_err("anonymous");
        assert!(matches!(err, ConfigServiceError::Forbidden { .. }));
        assert_eq!(store.global_hash(), before);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn global_update_publishes_new_fingerprint() {
        let (service, store, events) = service(ModerationLevel::Admin);

        let noop = service
            .update_global(&creds(), GlobalConfig::default())
            .await
            .expect("no-op");
        assert!(!noop.changed);
        assert_eq!(noop.fingerprint, store.global_hash());
        assert!(events.is_empty());

        let mut conf = GlobalConfig::default();
        conf.public.default_css = "ocean".to_string();
        let write = service.update_global(&creds(), conf).await.expect("update");
        assert!(write.changed);
        assert_eq!(write.fingerprint, store.global_hash());

        let drained = events.drain(10);
        assert_eq!(
            drained[0].kind,
            EventKind::GlobalUpdated {
                fingerprint: write.fingerprint
            }
        );
    }

    #[tokio::test]
    async fn moderators_cannot_change_global() {
        let (service, _, _) = service(ModerationLevel::Moderator);
        let err = service
            .update_global(&creds(), GlobalConfig::default())
            .await
            .expect_err("forbidden");
        assert!(matches!(err, ConfigServiceError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn invalid_board_is_rejected_before_auth() {
        let (service, _, _) = service(ModerationLevel::Admin);
        let err = service
            .update_board(&creds(), BoardConfig::new("all", "Everything"))
            .await
            .expect_err("reserved");
        assert!(matches!(err, ConfigServiceError::Domain(_)));

        let mut themed = BoardConfig::new("g", "Games");
        themed.public.default_css = "solarized".to_string();
        assert!(service.update_board(&creds(), themed).await.is_err());
    }

    #[tokio::test]
    async fn reads_require_position() {
        let (admin, store, _) = service(ModerationLevel::Admin);
        store.set_board(BoardConfig::new("g", "Games")).expect("seed");
        assert_eq!(
            admin.read_global(&creds()).await.expect("global"),
            GlobalConfig::default()
        );
        assert_eq!(
            admin.read_board(&creds(), "g").await.expect("board").public.title,
            "Games"
        );
        assert!(matches!(
            admin.read_board(&creds(), "x").await,
            Err(ConfigServiceError::UnknownBoard(_))
        ));

        let (janitor, store, _) = service(ModerationLevel::Janitor);
        store.set_board(BoardConfig::new("g", "Games")).expect("seed");
        assert!(matches!(
            janitor.read_board(&creds(), "g").await,
            Err(ConfigServiceError::Forbidden { .. })
        ));
        assert!(janitor.read_global(&creds()).await.is_err());
    }

    #[tokio::test]
    async fn removal_rules() {
        let (service, store, events) = service(ModerationLevel::BoardOwner);

        assert!(matches!(
            service.remove_board(&creds(), "g").await,
            Err(ConfigServiceError::UnknownBoard(_))
        ));
        assert!(matches!(
            service.remove_board(&creds(), "all").await,
            Err(ConfigServiceError::Store(StoreError::ReservedBoard(_)))
        ));

        store.set_board(BoardConfig::new("g", "Games")).expect("seed");
        service.remove_board(&creds(), "g").await.expect("remove");
        assert!(!store.is_board("g"));
        assert_eq!(events.len(), 1);
    }
}
