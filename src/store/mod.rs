//! In-memory configuration store.
//!
//! Holds the global configuration and every board configuration, each bundled
//! with its serialized public projection and fingerprint. The global value and
//! the board map live behind independent locks; neither lock is ever taken
//! while the other is held.
//!
//! Projections are serialized and hashed before any lock is taken. Writers
//! hold the exclusive lock only for the swap of the complete
//! `(config, json, hash)` triple, so readers observe either the old triple or
//! the new one.

mod container;
pub mod pseudo;

use std::{collections::HashMap, sync::RwLock};

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{
    boards::{BoardConfig, BoardTitle, BoardTitleList, is_pseudo_board},
    global::GlobalConfig,
};
use crate::util::lock::{rw_read, rw_write};

pub use container::{BoardContainer, FINGERPRINT_LEN, GlobalContainer, fingerprint};
pub use pseudo::{ALL_BOARD, BEST_BOARD};

const SOURCE: &str = "store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize public configuration: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("board `{0}` is a reserved pseudo-board")]
    ReservedBoard(String),
}

/// Outcome of a configuration write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWrite {
    /// Whether the stored value was replaced.
    pub changed: bool,
    /// Fingerprint of the value that is stored after the write.
    pub fingerprint: String,
}

/// Shared configuration store. Construct once and share behind an `Arc`.
pub struct ConfigStore {
    global: RwLock<GlobalContainer>,
    boards: RwLock<HashMap<String, BoardContainer>>,
}

impl ConfigStore {
    /// Create a store holding `global` and no boards.
    pub fn new(global: GlobalConfig) -> Result<Self, StoreError> {
        let global = GlobalContainer::build(global)?;
        Ok(Self {
            global: RwLock::new(global),
            boards: RwLock::new(HashMap::new()),
        })
    }

    // ========================================================================
    // Global configuration
    // ========================================================================

    /// Current global configuration.
    pub fn global(&self) -> GlobalConfig {
        rw_read(&self.global, SOURCE, "global").config.clone()
    }

    /// Current global configuration together with its JSON and fingerprint.
    pub fn global_container(&self) -> GlobalContainer {
        rw_read(&self.global, SOURCE, "global_container").clone()
    }

    /// Client JSON of the global configuration and its fingerprint.
    pub fn global_public(&self) -> (Bytes, String) {
        let guard = rw_read(&self.global, SOURCE, "global_public");
        (guard.json.clone(), guard.hash.clone())
    }

    /// Fingerprint of the current global public projection.
    pub fn global_hash(&self) -> String {
        rw_read(&self.global, SOURCE, "global_hash").hash.clone()
    }

    /// Replace the global configuration.
    ///
    /// A value structurally equal to the stored one leaves the store
    /// untouched and reports `changed: false`. On error nothing is changed.
    pub fn set_global(&self, config: GlobalConfig) -> Result<ConfigWrite, StoreError> {
        let container = GlobalContainer::build(config)?;
        let fingerprint = container.hash.clone();

        let mut global = rw_write(&self.global, SOURCE, "set_global");
        if global.config == container.config {
            drop(global);
            counter!("boardstore_config_global_writes_total", "outcome" => "unchanged")
                .increment(1);
            debug!("Global configuration unchanged");
            return Ok(ConfigWrite {
                changed: false,
                fingerprint,
            });
        }
        *global = container;
        drop(global);

        counter!("boardstore_config_global_writes_total", "outcome" => "changed").increment(1);
        info!(fingerprint = %fingerprint, "Global configuration replaced");
        Ok(ConfigWrite {
            changed: true,
            fingerprint,
        })
    }

    // ========================================================================
    // Board configuration
    // ========================================================================

    /// Configuration of board `id`, including the pseudo-boards.
    pub fn board(&self, id: &str) -> Option<BoardContainer> {
        if let Some(pseudo) = pseudo::lookup(id) {
            return Some(pseudo.clone());
        }
        rw_read(&self.boards, SOURCE, "board").get(id).cloned()
    }

    /// Independent copy of every stored board.
    pub fn all_boards(&self) -> HashMap<String, BoardContainer> {
        rw_read(&self.boards, SOURCE, "all_boards").clone()
    }

    /// Insert or replace a board configuration.
    ///
    /// Reports `changed: false` and leaves the store untouched when the
    /// stored configuration is structurally equal to `config`. Equality is
    /// decided on the full value, not on fingerprints.
    pub fn set_board(&self, config: BoardConfig) -> Result<ConfigWrite, StoreError> {
        if is_pseudo_board(&config.id) {
            return Err(StoreError::ReservedBoard(config.id));
        }

        let container = BoardContainer::build(config)?;
        let id = container.id().to_string();
        let fingerprint = container.hash.clone();

        let mut boards = rw_write(&self.boards, SOURCE, "set_board");
        if boards
            .get(&id)
            .is_some_and(|current| current.config == container.config)
        {
            drop(boards);
            counter!("boardstore_config_board_writes_total", "outcome" => "unchanged")
                .increment(1);
            debug!(board = %id, "Board configuration unchanged");
            return Ok(ConfigWrite {
                changed: false,
                fingerprint,
            });
        }
        boards.insert(id.clone(), container);
        drop(boards);

        counter!("boardstore_config_board_writes_total", "outcome" => "changed").increment(1);
        info!(board = %id, fingerprint = %fingerprint, "Board configuration replaced");
        Ok(ConfigWrite {
            changed: true,
            fingerprint,
        })
    }

    /// Delete board `id`. Absent boards and pseudo-boards are ignored.
    pub fn remove_board(&self, id: &str) {
        let removed = rw_write(&self.boards, SOURCE, "remove_board")
            .remove(id)
            .is_some();
        if removed {
            counter!("boardstore_config_board_removals_total").increment(1);
            info!(board = %id, "Board configuration removed");
        }
    }

    /// Whether `id` is a stored board or a pseudo-board.
    pub fn is_board(&self, id: &str) -> bool {
        is_pseudo_board(id) || rw_read(&self.boards, SOURCE, "is_board").contains_key(id)
    }

    /// Sorted ids of stored boards, pseudo-boards excluded.
    pub fn board_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = rw_read(&self.boards, SOURCE, "board_ids")
            .keys()
            .filter(|id| !is_pseudo_board(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Board titles with `all` and `best` first.
    pub fn board_titles(&self) -> BoardTitleList {
        let boards: Vec<BoardTitle> = rw_read(&self.boards, SOURCE, "board_titles")
            .values()
            .filter(|board| !is_pseudo_board(board.id()))
            .map(|board| BoardTitle {
                id: board.id().to_string(),
                title: board.title().to_string(),
            })
            .collect();
        BoardTitleList::new(pseudo::pinned_titles(), boards)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Restore the default global configuration and drop every board.
    ///
    /// Test support: gives each test a clean baseline without a new process.
    pub fn reset(&self) -> Result<(), StoreError> {
        let container = GlobalContainer::build(GlobalConfig::default())?;
        *rw_write(&self.global, SOURCE, "reset") = container;
        self.reset_boards();
        Ok(())
    }

    /// Drop every board. Test support, like [`ConfigStore::reset`].
    pub fn reset_boards(&self) {
        rw_write(&self.boards, SOURCE, "reset_boards").clear();
    }

    /// Release board state at process shutdown.
    pub fn shutdown(&self) {
        let count = {
            let mut boards = rw_write(&self.boards, SOURCE, "shutdown");
            let count = boards.len();
            boards.clear();
            count
        };
        info!(boards = count, "Configuration store shut down");
    }
}
