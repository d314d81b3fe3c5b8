//! In-memory login sessions and staff positions.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    application::auth::{AuthError, CredentialResolver, OwnershipRepo},
    domain::{
        auth::{Credentials, ModerationLevel},
        boards::ALL_BOARD_ID,
    },
    util::lock::{rw_read, rw_write},
};

const SOURCE: &str = "infra::sessions";

/// Longest accepted user id.
pub const MAX_USER_ID_LEN: usize = 20;

#[derive(Debug, Clone)]
struct SessionRecord {
    token: String,
    expires_at: OffsetDateTime,
}

/// Session and position store kept in process memory.
///
/// Positions granted on the `all` board apply to every board.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<SessionRecord>>>,
    positions: RwLock<HashMap<(String, String), ModerationLevel>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_session(&self, user_id: &str, token: &str, expires_at: OffsetDateTime) {
        rw_write(&self.sessions, SOURCE, "insert_session")
            .entry(user_id.to_string())
            .or_default()
            .push(SessionRecord {
                token: token.to_string(),
                expires_at,
            });
    }

    /// Drop every session of `user_id`.
    pub fn revoke_sessions(&self, user_id: &str) {
        rw_write(&self.sessions, SOURCE, "revoke_sessions").remove(user_id);
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn prune_expired(&self, now: OffsetDateTime) -> usize {
        let mut sessions = rw_write(&self.sessions, SOURCE, "prune_expired");
        let mut removed = 0;
        for records in sessions.values_mut() {
            let before = records.len();
            records.retain(|record| record.expires_at > now);
            removed += before - records.len();
        }
        sessions.retain(|_, records| !records.is_empty());
        removed
    }

    pub fn assign_position(&self, board: &str, user_id: &str, level: ModerationLevel) {
        rw_write(&self.positions, SOURCE, "assign_position")
            .insert((board.to_string(), user_id.to_string()), level);
    }

    pub fn clear_position(&self, board: &str, user_id: &str) {
        rw_write(&self.positions, SOURCE, "clear_position")
            .remove(&(board.to_string(), user_id.to_string()));
    }
}

#[async_trait]
impl CredentialResolver for MemorySessionStore {
    async fn is_logged_in(&self, credentials: &Credentials) -> Result<bool, AuthError> {
        if credentials.user_id.len() > MAX_USER_ID_LEN || credentials.session.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let now = OffsetDateTime::now_utc();
        let sessions = rw_read(&self.sessions, SOURCE, "is_logged_in");
        let Some(records) = sessions.get(&credentials.user_id) else {
            return Ok(false);
        };

        let mut matched = false;
        for record in records.iter().filter(|record| record.expires_at > now) {
            matched |= bool::from(record.token.as_bytes().ct_eq(credentials.session.as_bytes()));
        }
        if !matched {
            debug!(user = %credentials.user_id, "No live session matched");
        }
        Ok(matched)
    }

    async fn position(&self, board: &str, user_id: &str) -> Result<ModerationLevel, AuthError> {
        let positions = rw_read(&self.positions, SOURCE, "position");
        let on_board = positions
            .get(&(board.to_string(), user_id.to_string()))
            .copied();
        let global = positions
            .get(&(ALL_BOARD_ID.to_string(), user_id.to_string()))
            .copied();
        Ok(on_board
            .into_iter()
            .chain(global)
            .max()
            .unwrap_or(ModerationLevel::User))
    }
}

#[async_trait]
impl OwnershipRepo for MemorySessionStore {
    async fn owned_boards(&self, user_id: &str) -> Result<Vec<String>, AuthError> {
        let positions = rw_read(&self.positions, SOURCE, "owned_boards");
        let mut boards: Vec<String> = positions
            .iter()
            .filter(|((board, user), level)| {
                user == user_id && **level == ModerationLevel::BoardOwner && board != ALL_BOARD_ID
            })
            .map(|((board, _), _)| board.clone())
            .collect();
        boards.sort();
        Ok(boards)
    }
}
