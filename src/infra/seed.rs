//! Startup seed file.
//!
//! A TOML document holding the initial global configuration, boards, login
//! sessions and staff positions:
//!
//! ```toml
//! [global]
//! rootURL = "https://example.org"
//!
//! [global.public]
//! defaultCSS = "ocean"
//!
//! [[boards]]
//! id = "g"
//! public = { title = "Games" }
//!
//! [[sessions]]
//! user = "admin"
//! token = "secret"
//!
//! [[staff]]
//! board = "all"
//! user = "admin"
//! position = "admin"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::{
    domain::{
        auth::ModerationLevel,
        boards::{ALL_BOARD_ID, BoardConfig, validate_board_id},
        error::DomainError,
        global::GlobalConfig,
    },
    store::{ConfigStore, StoreError},
};

use super::sessions::MemorySessionStore;

/// Longest session lifetime a seed may request.
const MAX_SESSION_DAYS: u32 = 3650;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid seed entry `{entry}`")]
    Invalid {
        entry: String,
        #[source]
        source: DomainError,
    },
    #[error("duplicate board `{0}` in seed")]
    DuplicateBoard(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedDocument {
    pub global: GlobalConfig,
    pub boards: Vec<BoardConfig>,
    pub sessions: Vec<SeedSession>,
    pub staff: Vec<SeedStaff>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSession {
    pub user: String,
    pub token: String,
    /// Lifetime in days; the global session expiry when absent.
    #[serde(default)]
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStaff {
    /// Board id; `all` grants the position on every board.
    pub board: String,
    pub user: String,
    pub position: ModerationLevel,
}

impl SeedDocument {
    pub async fn read(path: &Path) -> Result<Self, SeedError> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&data).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    /// Check every entry without touching any store.
    pub fn validate(&self) -> Result<(), SeedError> {
        self.global.validate().map_err(|source| SeedError::Invalid {
            entry: "global".to_string(),
            source,
        })?;

        let mut seen = Vec::with_capacity(self.boards.len());
        for board in &self.boards {
            board.validate().map_err(|source| SeedError::Invalid {
                entry: format!("boards.{}", board.id),
                source,
            })?;
            if seen.contains(&board.id.as_str()) {
                return Err(SeedError::DuplicateBoard(board.id.clone()));
            }
            seen.push(board.id.as_str());
        }

        for staff in &self.staff {
            if staff.board != ALL_BOARD_ID {
                validate_board_id(&staff.board).map_err(|source| SeedError::Invalid {
                    entry: format!("staff.{}", staff.user),
                    source,
                })?;
            }
            if staff.position <= ModerationLevel::User {
                return Err(SeedError::Invalid {
                    entry: format!("staff.{}", staff.user),
                    source: DomainError::validation("staff position must be janitor or higher"),
                });
            }
        }

        for session in &self.sessions {
            if session.user.is_empty() || session.token.is_empty() {
                return Err(SeedError::Invalid {
                    entry: "sessions".to_string(),
                    source: DomainError::validation("session user and token must not be empty"),
                });
            }
            if self.session_days(session) > MAX_SESSION_DAYS {
                return Err(SeedError::Invalid {
                    entry: format!("sessions.{}", session.user),
                    source: DomainError::validation(format!(
                        "session lifetime exceeds {MAX_SESSION_DAYS} days"
                    )),
                });
            }
        }
        Ok(())
    }

    fn session_days(&self, session: &SeedSession) -> u32 {
        session
            .expires_in_days
            .unwrap_or(self.global.session_expiry)
    }

    /// Build a store holding the seeded configuration.
    pub fn build_store(&self) -> Result<ConfigStore, SeedError> {
        self.validate()?;
        let store = ConfigStore::new(self.global.clone())?;
        for board in &self.boards {
            store.set_board(board.clone())?;
        }
        info!(
            boards = self.boards.len(),
            fingerprint = %store.global_hash(),
            "Configuration store seeded"
        );
        Ok(store)
    }

    /// Load sessions and staff positions into `sessions`.
    pub fn populate_sessions(&self, sessions: &MemorySessionStore) -> Result<(), SeedError> {
        let now = OffsetDateTime::now_utc();
        for session in &self.sessions {
            let days = self.session_days(session);
            let expires = now
                .checked_add(Duration::days(i64::from(days)))
                .ok_or_else(|| SeedError::Invalid {
                    entry: format!("sessions.{}", session.user),
                    source: DomainError::validation(format!(
                        "session lifetime of {days} days is out of range"
                    )),
                })?;
            sessions.insert_session(&session.user, &session.token, expires);
        }
        for staff in &self.staff {
            sessions.assign_position(&staff.board, &staff.user, staff.position);
        }
        info!(
            sessions = self.sessions.len(),
            staff = self.staff.len(),
            "Session store seeded"
        );
        Ok(())
    }
}
