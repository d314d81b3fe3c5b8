//! In-process render cache backed by an LRU map.

use std::{
    collections::HashMap,
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use super::{
    CacheError, CachedPage, ContentKey, Generation, PageMeta, RenderCache,
    config::RenderCacheConfig,
};
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThreadKey {
    id: u64,
    last_n: u32,
}

#[derive(Debug, Clone)]
struct ThreadEntry {
    html: Bytes,
    board: String,
    subject: String,
    locked: bool,
    generation: Generation,
}

#[derive(Debug, Clone)]
struct Listing {
    pages: Vec<Bytes>,
    generation: Generation,
}

#[derive(Debug, Clone)]
struct Catalog {
    html: Bytes,
    generation: Generation,
}

/// Listing and catalog of one board. Kept outside the LRU so eviction never
/// makes a populated board look empty.
#[derive(Debug, Clone, Default)]
struct BoardEntries {
    listing: Option<Listing>,
    catalog: Option<Catalog>,
}

/// Render cache kept in process memory.
///
/// Board listings and catalogs stay until the board is invalidated; a board
/// that has never been stored reads as a single empty page, so a new board
/// renders before anything was posted. Thread variants share an LRU bounded
/// by the configured capacity, and unknown threads are not found.
pub struct MemoryRenderCache {
    boards: RwLock<HashMap<String, BoardEntries>>,
    threads: RwLock<LruCache<ThreadKey, ThreadEntry>>,
    generation: AtomicU64,
}

impl MemoryRenderCache {
    pub fn new(config: &RenderCacheConfig) -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            threads: RwLock::new(LruCache::new(config.capacity_non_zero())),
            generation: AtomicU64::new(0),
        }
    }

    fn next_generation(&self) -> Generation {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store every index page of `board`; returns the new generation.
    pub fn store_board_pages(&self, board: &str, pages: Vec<Bytes>) -> Generation {
        let generation = self.next_generation();
        rw_write(&self.boards, SOURCE, "store_board_pages")
            .entry(board.to_string())
            .or_default()
            .listing = Some(Listing { pages, generation });
        generation
    }

    /// Store the catalog of `board`; returns the new generation.
    pub fn store_catalog(&self, board: &str, html: Bytes) -> Generation {
        let generation = self.next_generation();
        rw_write(&self.boards, SOURCE, "store_catalog")
            .entry(board.to_string())
            .or_default()
            .catalog = Some(Catalog { html, generation });
        generation
    }

    /// Store one variant of a thread; returns the new generation.
    pub fn store_thread(
        &self,
        id: u64,
        last_n: u32,
        board: &str,
        html: Bytes,
        subject: impl Into<String>,
        locked: bool,
    ) -> Generation {
        let generation = self.next_generation();
        rw_write(&self.threads, SOURCE, "store_thread").put(
            ThreadKey { id, last_n },
            ThreadEntry {
                html,
                board: board.to_string(),
                subject: subject.into(),
                locked,
                generation,
            },
        );
        generation
    }

    /// Drop every cached variant of thread `id`.
    pub fn invalidate_thread(&self, id: u64) {
        let mut threads = rw_write(&self.threads, SOURCE, "invalidate_thread");
        let stale: Vec<ThreadKey> = threads
            .iter()
            .filter(|(key, _)| key.id == id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            threads.pop(&key);
        }
    }

    /// Drop the listing and catalog of `board`.
    pub fn invalidate_board(&self, board: &str) {
        rw_write(&self.boards, SOURCE, "invalidate_board").remove(board);
    }

    pub fn clear(&self) {
        rw_write(&self.boards, SOURCE, "clear").clear();
        rw_write(&self.threads, SOURCE, "clear").clear();
    }

    fn board(&self, board: &str) -> Option<BoardEntries> {
        rw_read(&self.boards, SOURCE, "board").get(board).cloned()
    }

    fn thread(&self, key: &ThreadKey) -> Option<ThreadEntry> {
        let entry = rw_write(&self.threads, SOURCE, "thread").get(key).cloned();
        match entry {
            Some(_) => counter!("boardstore_render_cache_hit_total").increment(1),
            None => counter!("boardstore_render_cache_miss_total").increment(1),
        }
        entry
    }
}

fn listing_page(pages: &[Bytes], page: u32, generation: Generation) -> Result<CachedPage, CacheError> {
    let total_pages = u32::try_from(pages.len()).unwrap_or(u32::MAX).max(1);
    if page >= total_pages {
        return Err(CacheError::PageOverflow { page, total_pages });
    }
    let html = pages.get(page as usize).cloned().unwrap_or_default();
    Ok(CachedPage {
        html,
        generation,
        meta: PageMeta::BoardPage { page, total_pages },
    })
}

#[async_trait]
impl RenderCache for MemoryRenderCache {
    async fn lookup(&self, key: &ContentKey) -> Result<CachedPage, CacheError> {
        match key {
            ContentKey::Board {
                board,
                catalog: true,
                ..
            } => Ok(match self.board(board).and_then(|entries| entries.catalog) {
                Some(Catalog { html, generation }) => CachedPage {
                    html,
                    generation,
                    meta: PageMeta::Catalog,
                },
                None => CachedPage {
                    html: Bytes::new(),
                    generation: 0,
                    meta: PageMeta::Catalog,
                },
            }),
            ContentKey::Board { board, page, .. } => {
                match self.board(board).and_then(|entries| entries.listing) {
                    Some(Listing { pages, generation }) => listing_page(&pages, *page, generation),
                    None => listing_page(&[], *page, 0),
                }
            }
            ContentKey::Thread { id, last_n } => {
                let entry = self
                    .thread(&ThreadKey {
                        id: *id,
                        last_n: *last_n,
                    })
                    .ok_or(CacheError::NotFound)?;
                Ok(CachedPage {
                    html: entry.html,
                    generation: entry.generation,
                    meta: PageMeta::Thread {
                        board: entry.board,
                        subject: entry.subject,
                        locked: entry.locked,
                    },
                })
            }
        }
    }
}
