//! Per-board configuration and the derived board title listing.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Identifier of the aggregate pseudo-board.
pub const ALL_BOARD_ID: &str = "all";
/// Identifier of the curated pseudo-board.
pub const BEST_BOARD_ID: &str = "best";

const MAX_BOARD_ID_LEN: usize = 10;
const MAX_TITLE_LEN: usize = 100;

/// Default answer set for the `#8ball` command.
pub fn default_eightball() -> Vec<String> {
    [
        "Yes",
        "No",
        "Maybe",
        "It can't be helped",
        "Hell yeah, motherfucker!",
        "Anta baka?",
    ]
    .iter()
    .map(|answer| answer.to_string())
    .collect()
}

/// Returns whether `id` names one of the constant pseudo-boards.
pub fn is_pseudo_board(id: &str) -> bool {
    id == ALL_BOARD_ID || id == BEST_BOARD_ID
}

/// Configuration of a single board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_eightball")]
    pub eightball: Vec<String>,
    #[serde(default)]
    pub public: BoardPublic,
}

/// Client-visible subset of [`BoardConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardPublic {
    pub title: String,
    #[serde(rename = "defaultCSS")]
    pub default_css: String,
    pub banners: Vec<u16>,
}

impl Default for BoardPublic {
    fn default() -> Self {
        Self {
            title: String::new(),
            default_css: "moe".to_string(),
            banners: Vec::new(),
        }
    }
}

impl BoardConfig {
    /// Build a board with default answers, theme and no banners.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eightball: default_eightball(),
            public: BoardPublic {
                title: title.into(),
                ..BoardPublic::default()
            },
        }
    }

    /// Validate the fields writers may supply.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_board_id(&self.id)?;
        if is_pseudo_board(&self.id) {
            return Err(DomainError::validation(format!(
                "board id `{}` is reserved",
                self.id
            )));
        }
        if self.public.title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::validation(format!(
                "board title exceeds {MAX_TITLE_LEN} characters"
            )));
        }
        if !super::global::is_known_theme(&self.public.default_css) {
            return Err(DomainError::validation(format!(
                "unknown theme `{}`",
                self.public.default_css
            )));
        }
        Ok(())
    }
}

/// Board ids are 1 to 10 lowercase ASCII letters or digits.
pub fn validate_board_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() || id.len() > MAX_BOARD_ID_LEN {
        return Err(DomainError::validation(format!(
            "board id must be 1-{MAX_BOARD_ID_LEN} characters"
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(DomainError::validation(format!(
            "board id `{id}` contains invalid characters"
        )));
    }
    Ok(())
}

/// Board id paired with its display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardTitle {
    pub id: String,
    pub title: String,
}

/// Board titles with the pseudo-boards first and the rest ordered by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct BoardTitleList(Vec<BoardTitle>);

impl BoardTitleList {
    /// Build the listing; `pinned` keeps its order, `boards` is sorted by id.
    pub fn new(pinned: Vec<BoardTitle>, mut boards: Vec<BoardTitle>) -> Self {
        boards.sort_by(|a, b| a.id.cmp(&b.id));
        let mut titles = pinned;
        titles.extend(boards);
        Self(titles)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoardTitle> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only entries whose id is in `ids`, preserving order.
    pub fn retain_ids(mut self, ids: &[String]) -> Self {
        self.0.retain(|title| ids.iter().any(|id| id == &title.id));
        self
    }

    pub fn into_inner(self) -> Vec<BoardTitle> {
        self.0
    }
}

impl<'a> IntoIterator for &'a BoardTitleList {
    type Item = &'a BoardTitle;
    type IntoIter = std::slice::Iter<'a, BoardTitle>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
