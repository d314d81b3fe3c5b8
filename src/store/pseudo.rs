//! Constant descriptors of the `all` and `best` pseudo-boards.
//!
//! Their projections are serialized once per process and their fingerprints
//! are fixed tokens, so they never change between requests.

use bytes::Bytes;
use once_cell::sync::Lazy;

use crate::domain::{
    boards::{ALL_BOARD_ID, BEST_BOARD_ID, BoardConfig, BoardPublic, BoardTitle, default_eightball},
    global::GlobalPublic,
};

use super::container::BoardContainer;

/// Aggregate view over every board.
pub static ALL_BOARD: Lazy<BoardContainer> = Lazy::new(|| pseudo_board(ALL_BOARD_ID, "🕸", "0"));

/// Curated view.
pub static BEST_BOARD: Lazy<BoardContainer> = Lazy::new(|| pseudo_board(BEST_BOARD_ID, "best", "1"));

fn pseudo_board(id: &str, title: &str, hash: &str) -> BoardContainer {
    let public = BoardPublic {
        title: title.to_string(),
        default_css: GlobalPublic::default().default_css,
        banners: Vec::new(),
    };
    // A struct of strings and integers always serializes.
    let json = serde_json::to_vec(&public).unwrap_or_default();
    BoardContainer {
        config: BoardConfig {
            id: id.to_string(),
            eightball: default_eightball(),
            public,
        },
        json: Bytes::from(json),
        hash: hash.to_string(),
    }
}

/// Descriptor for `id` when it names a pseudo-board.
pub fn lookup(id: &str) -> Option<&'static BoardContainer> {
    match id {
        ALL_BOARD_ID => Some(&ALL_BOARD),
        BEST_BOARD_ID => Some(&BEST_BOARD),
        _ => None,
    }
}

/// Title entries for the pseudo-boards, in display order.
pub fn pinned_titles() -> Vec<BoardTitle> {
    [&*ALL_BOARD, &*BEST_BOARD]
        .into_iter()
        .map(|board| BoardTitle {
            id: board.id().to_string(),
            title: board.title().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_have_fixed_hashes() {
        assert_eq!(ALL_BOARD.hash, "0");
        assert_eq!(BEST_BOARD.hash, "1");
        assert_eq!(ALL_BOARD.id(), "all");
        assert_eq!(BEST_BOARD.id(), "best");
    }

    #[test]
    fn projection_is_computed_once() {
        let first = ALL_BOARD.json.as_ptr();
        let second = lookup("all").expect("pseudo-board").json.as_ptr();
        assert_eq!(first, second);

        let public: BoardPublic = serde_json::from_slice(&ALL_BOARD.json).expect("decode");
        assert_eq!(public.title, "🕸");
    }

    #[test]
    fn pinned_titles_order() {
        let ids: Vec<_> = pinned_titles().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["all", "best"]);
        assert!(lookup("g").is_none());
    }
}
