//! Render cache.
//!
//! Stores pre-rendered board listings and threads keyed by [`ContentKey`].
//! Every stored entry carries a generation number that changes whenever the
//! entry is replaced; the delivery layer folds that number into response
//! validators.
//!
//! ## Configuration
//!
//! ```toml
//! [render_cache]
//! capacity = 512
//! ```

mod config;
mod keys;
mod store;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use config::RenderCacheConfig;
pub use keys::ContentKey;
pub use store::MemoryRenderCache;

/// Monotonic entry version assigned by the cache.
pub type Generation = u64;

/// Metadata the renderer needs besides the cached fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMeta {
    /// One page of a board index.
    BoardPage { page: u32, total_pages: u32 },
    /// The board catalog.
    Catalog,
    /// A thread and the board it was posted on.
    Thread {
        board: String,
        subject: String,
        locked: bool,
    },
}

impl PageMeta {
    pub fn kind(&self) -> &'static str {
        match self {
            PageMeta::BoardPage { .. } => "a board page",
            PageMeta::Catalog => "a catalog",
            PageMeta::Thread { .. } => "a thread",
        }
    }

    /// Whether this metadata can describe content stored under `key`.
    pub fn fits(&self, key: &ContentKey) -> bool {
        matches!(
            (key, self),
            (ContentKey::Thread { .. }, PageMeta::Thread { .. })
                | (ContentKey::Board { catalog: true, .. }, PageMeta::Catalog)
                | (ContentKey::Board { catalog: false, .. }, PageMeta::BoardPage { .. })
        )
    }
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub html: Bytes,
    pub generation: Generation,
    pub meta: PageMeta,
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// The addressed content does not exist.
    #[error("content not found")]
    NotFound,
    /// The requested page lies past the last page.
    #[error("page {page} out of range ({total_pages} pages)")]
    PageOverflow { page: u32, total_pages: u32 },
    /// The entry's metadata belongs to a different kind of content.
    #[error("cached entry is {found}, not the requested content")]
    MetaMismatch { found: &'static str },
    #[error("render cache backend failure: {0}")]
    Backend(String),
}

/// Source of pre-rendered content.
#[async_trait]
pub trait RenderCache: Send + Sync {
    async fn lookup(&self, key: &ContentKey) -> Result<CachedPage, CacheError>;
}
