//! Render cache key definitions.

use std::fmt;

/// Identifies one renderable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKey {
    /// A board index page or the board catalog.
    Board {
        board: String,
        catalog: bool,
        page: u32,
    },
    /// A thread, optionally truncated to its last `last_n` posts (0 = all).
    Thread { id: u64, last_n: u32 },
}

impl ContentKey {
    pub fn board_page(board: impl Into<String>, page: u32) -> Self {
        Self::Board {
            board: board.into(),
            catalog: false,
            page,
        }
    }

    pub fn catalog(board: impl Into<String>) -> Self {
        Self::Board {
            board: board.into(),
            catalog: true,
            page: 0,
        }
    }

    pub fn thread(id: u64, last_n: u32) -> Self {
        Self::Thread { id, last_n }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKey::Board {
                board,
                catalog: true,
                ..
            } => write!(f, "/{board}/catalog"),
            ContentKey::Board { board, page, .. } => write!(f, "/{board}/?page={page}"),
            ContentKey::Thread { id, last_n: 0 } => write!(f, "thread:{id}"),
            ContentKey::Thread { id, last_n } => write!(f, "thread:{id}?last={last_n}"),
        }
    }
}
