//! Conditional delivery of rendered board pages and threads.
//!
//! For every request the coordinator resolves the requester's position,
//! looks the content up in the render cache, derives a validator from the
//! cache generation, the current global fingerprint and the position, and
//! either reports "not modified" or renders the final document. The global
//! fingerprint is read from the store on every request and never memoized.

mod validator;

use std::{sync::Arc, time::Instant};

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, instrument};

pub use validator::{fingerprint_validator, format_validator, matches_validator};

use crate::{
    application::{
        auth::{AuthError, CredentialResolver, resolve_level},
        render::{Presentation, RenderError, RenderView, Renderer},
    },
    cache::{CacheError, CachedPage, ContentKey, PageMeta, RenderCache},
    domain::{
        auth::Credentials,
        boards::ALL_BOARD_ID,
        global::is_known_theme,
    },
    store::ConfigStore,
};

/// Largest accepted `last` thread truncation.
pub const MAX_LAST_N: u32 = 500;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("board `{0}` does not exist")]
    UnknownBoard(String),
    #[error("content `{0}` not found")]
    NotFound(ContentKey),
    #[error("page {page} of `{key}` is past the last page ({total_pages})")]
    PageOverflow {
        key: ContentKey,
        page: u32,
        total_pages: u32,
    },
    #[error("failed to resolve requester position")]
    Auth(#[source] AuthError),
    #[error("render cache lookup for `{key}` failed")]
    Cache {
        key: ContentKey,
        #[source]
        source: CacheError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl DeliveryError {
    /// Whether the error maps to a not-found response.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DeliveryError::UnknownBoard(_)
                | DeliveryError::NotFound(_)
                | DeliveryError::PageOverflow { .. }
        )
    }
}

/// One request for a renderable resource.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Board named in the request path.
    pub board: String,
    pub key: ContentKey,
    pub credentials: Credentials,
    /// Raw `If-None-Match` header.
    pub if_none_match: Option<String>,
    /// Raw `theme` cookie.
    pub theme: Option<String>,
    pub minimal: bool,
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    NotModified { validator: String },
    Rendered { validator: String, body: Bytes },
}

impl Delivery {
    pub fn validator(&self) -> &str {
        match self {
            Delivery::NotModified { validator } | Delivery::Rendered { validator, .. } => {
                validator
            }
        }
    }
}

pub struct DeliveryCoordinator {
    store: Arc<ConfigStore>,
    cache: Arc<dyn RenderCache>,
    credentials: Arc<dyn CredentialResolver>,
    renderer: Arc<dyn Renderer>,
}

impl DeliveryCoordinator {
    pub fn new(
        store: Arc<ConfigStore>,
        cache: Arc<dyn RenderCache>,
        credentials: Arc<dyn CredentialResolver>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            store,
            cache,
            credentials,
            renderer,
        }
    }

    #[instrument(skip_all, fields(board = %request.board, key = %request.key))]
    pub async fn deliver(&self, request: DeliveryRequest) -> Result<Delivery, DeliveryError> {
        let started_at = Instant::now();
        let result = self.deliver_inner(request).await;
        histogram!("boardstore_delivery_ms").record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn deliver_inner(&self, request: DeliveryRequest) -> Result<Delivery, DeliveryError> {
        if !self.store.is_board(&request.board) {
            return Err(DeliveryError::UnknownBoard(request.board));
        }

        let level = resolve_level(self.credentials.as_ref(), &request.credentials, &request.board)
            .await
            .map_err(DeliveryError::Auth)?;

        let cached = self.lookup(&request.key).await?;
        if let PageMeta::Thread { board, .. } = &cached.meta {
            if request.board != ALL_BOARD_ID && *board != request.board {
                return Err(DeliveryError::NotFound(request.key));
            }
        }

        let validator = format_validator(cached.generation, &self.store.global_hash(), level);
        if matches_validator(request.if_none_match.as_deref(), &validator) {
            counter!("boardstore_delivery_not_modified_total").increment(1);
            debug!(validator = %validator, "Client copy is current");
            return Ok(Delivery::NotModified { validator });
        }

        let presentation = Presentation {
            theme: self.resolve_theme(&request.board, request.theme.as_deref()),
            level,
            minimal: request.minimal,
        };
        let body = self.render(&request, &cached, &presentation)?;

        counter!("boardstore_delivery_rendered_total").increment(1);
        Ok(Delivery::Rendered { validator, body })
    }

    async fn lookup(&self, key: &ContentKey) -> Result<CachedPage, DeliveryError> {
        match self.cache.lookup(key).await {
            Ok(page) if page.meta.fits(key) => Ok(page),
            Ok(page) => Err(DeliveryError::Cache {
                key: key.clone(),
                source: CacheError::MetaMismatch {
                    found: page.meta.kind(),
                },
            }),
            Err(CacheError::NotFound) => Err(DeliveryError::NotFound(key.clone())),
            Err(CacheError::PageOverflow { page, total_pages }) => {
                Err(DeliveryError::PageOverflow {
                    key: key.clone(),
                    page,
                    total_pages,
                })
            }
            Err(source) => Err(DeliveryError::Cache {
                key: key.clone(),
                source,
            }),
        }
    }

    fn render(
        &self,
        request: &DeliveryRequest,
        cached: &CachedPage,
        presentation: &Presentation,
    ) -> Result<Bytes, DeliveryError> {
        let title = self
            .store
            .board(&request.board)
            .map(|board| board.config.public.title)
            .unwrap_or_default();

        let view = match (&request.key, &cached.meta) {
            (ContentKey::Thread { id, last_n }, PageMeta::Thread { subject, locked, .. }) => {
                RenderView::Thread {
                    id: *id,
                    board: &request.board,
                    subject,
                    abbreviated: *last_n != 0,
                    locked: *locked,
                    presentation,
                    html: &cached.html,
                }
            }
            (
                ContentKey::Board { catalog: false, .. },
                PageMeta::BoardPage { page, total_pages },
            ) => RenderView::Board {
                board: &request.board,
                title: &title,
                catalog: false,
                page: *page,
                total_pages: *total_pages,
                presentation,
                html: &cached.html,
            },
            (ContentKey::Board { catalog: true, .. }, PageMeta::Catalog) => RenderView::Board {
                board: &request.board,
                title: &title,
                catalog: true,
                page: 0,
                total_pages: 0,
                presentation,
                html: &cached.html,
            },
            (key, meta) => {
                return Err(DeliveryError::Cache {
                    key: key.clone(),
                    source: CacheError::MetaMismatch { found: meta.kind() },
                });
            }
        };

        Ok(self.renderer.render(&view)?)
    }

    /// Theme from the `theme` cookie when it names a known theme, otherwise
    /// the board default (the global default for the aggregate board).
    pub fn resolve_theme(&self, board: &str, cookie: Option<&str>) -> String {
        if let Some(theme) = cookie.filter(|theme| is_known_theme(theme)) {
            return theme.to_string();
        }
        if board == ALL_BOARD_ID {
            return self.store.global().public.default_css;
        }
        match self.store.board(board) {
            Some(board) => board.config.public.default_css,
            None => self.store.global().public.default_css,
        }
    }
}

/// Parse the `last` query parameter; anything outside 1..=MAX_LAST_N means
/// the whole thread.
pub fn parse_last_n(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .filter(|n| (1..=MAX_LAST_N).contains(n))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        application::{auth::testing::FixedResolver, render::ShellRenderer},
        cache::{MemoryRenderCache, RenderCacheConfig},
        domain::{auth::ModerationLevel, boards::BoardConfig, global::GlobalConfig},
    };

    struct Fixture {
        store: Arc<ConfigStore>,
        cache: Arc<MemoryRenderCache>,
        renders: Arc<CountingRenderer>,
        coordinator: DeliveryCoordinator,
    }

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, view: &RenderView<'_>) -> Result<Bytes, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ShellRenderer.render(view)
        }
    }

    struct FailingCache;

    #[async_trait]
    impl RenderCache for FailingCache {
        async fn lookup(&self, _key: &ContentKey) -> Result<CachedPage, CacheError> {
            Err(CacheError::Backend("connection reset".to_string()))
        }
    }

    /// Answers every lookup with a board page, whatever the key.
    struct BoardPageCache;

    #[async_trait]
    impl RenderCache for BoardPageCache {
        async fn lookup(&self, _key: &ContentKey) -> Result<CachedPage, CacheError> {
            Ok(CachedPage {
                html: Bytes::from_static(b"<p>page</p>"),
                generation: 1,
                meta: PageMeta::BoardPage {
                    page: 0,
                    total_pages: 1,
                },
            })
        }
    }

    fn fixture(level: ModerationLevel) -> Fixture {
        let store = Arc::new(ConfigStore::new(GlobalConfig::default()).expect("store"));
        store
            .set_board(BoardConfig::new("g", "Games"))
            .expect("set board");
        let cache = Arc::new(MemoryRenderCache::new(&RenderCacheConfig::default()));
        let renders = Arc::new(CountingRenderer::default());
        let coordinator = DeliveryCoordinator::new(
            store.clone(),
            cache.clone(),
            Arc::new(FixedResolver::new(Ok(true), level)),
            renders.clone(),
        );
        Fixture {
            store,
            cache,
            renders,
            coordinator,
        }
    }

    fn request(key: ContentKey, credentials: Credentials, etag: Option<&str>) -> DeliveryRequest {
        DeliveryRequest {
            board: "g".to_string(),
            key,
            credentials,
            if_none_match: etag.map(str::to_string),
            theme: None,
            minimal: false,
        }
    }

    #[tokio::test]
    async fn matching_validator_skips_rendering() {
        let fx = fixture(ModerationLevel::User);
        fx.cache
            .store_board_pages("g", vec![Bytes::from_static(b"<p>t</p>")]);

        let first = fx
            .coordinator
            .deliver(request(ContentKey::board_page("g", 0), Credentials::default(), None))
            .await
            .expect("rendered");
        assert!(matches!(first, Delivery::Rendered { .. }));
        assert_eq!(fx.renders.calls.load(Ordering::SeqCst), 1);

        let second = fx
            .coordinator
            .deliver(request(
                ContentKey::board_page("g", 0),
                Credentials::default(),
                Some(first.validator()),
            ))
            .await
            .expect("not modified");
        assert!(matches!(second, Delivery::NotModified { .. }));
        assert_eq!(second.validator(), first.validator());
        assert_eq!(fx.renders.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn global_config_change_invalidates_validator() {
        let fx = fixture(ModerationLevel::User);
        let first = fx
            .coordinator
            .deliver(request(ContentKey::board_page("g", 0), Credentials::default(), None))
            .await
            .expect("rendered");

        let mut conf = GlobalConfig::default();
        conf.public.default_lang = "pl_PL".to_string();
        fx.store.set_global(conf).expect("set global");

        let second = fx
            .coordinator
            .deliver(request(
                ContentKey::board_page("g", 0),
                Credentials::default(),
                Some(first.validator()),
            ))
            .await
            .expect("rendered");
        assert!(matches!(second, Delivery::Rendered { .. }));
        assert_ne!(second.validator(), first.validator());
    }

    #[tokio::test]
    async fn staff_and_anonymous_validators_differ() {
        let fx = fixture(ModerationLevel::Moderator);
        let anonymous = fx
            .coordinator
            .deliver(request(ContentKey::catalog("g"), Credentials::default(), None))
            .await
            .expect("anonymous");
        let staff = fx
            .coordinator
            .deliver(request(
                ContentKey::catalog("g"),
                Credentials::new("mod", "s"),
                Some(anonymous.validator()),
            ))
            .await
            .expect("staff");

        assert!(matches!(staff, Delivery::Rendered { .. }));
        assert!(staff.validator().ends_with("-moderator\""));
    }

    #[tokio::test]
    async fn unknown_board_is_not_found() {
        let fx = fixture(ModerationLevel::User);
        let mut req = request(ContentKey::board_page("x", 0), Credentials::default(), None);
        req.board = "x".to_string();
        let err = fx.coordinator.deliver(req).await.expect_err("unknown board");
        assert!(matches!(err, DeliveryError::UnknownBoard(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn page_overflow_is_not_found() {
        let fx = fixture(ModerationLevel::User);
        let err = fx
            .coordinator
            .deliver(request(ContentKey::board_page("g", 4), Credentials::default(), None))
            .await
            .expect_err("overflow");
        assert!(matches!(err, DeliveryError::PageOverflow { page: 4, .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn thread_on_other_board_is_not_found() {
        let fx = fixture(ModerationLevel::User);
        fx.cache
            .store_thread(9, 0, "a", Bytes::from_static(b"<p>op</p>"), "Hi", false);

        let err = fx
            .coordinator
            .deliver(request(ContentKey::thread(9, 0), Credentials::default(), None))
            .await
            .expect_err("wrong board");
        assert!(matches!(err, DeliveryError::NotFound(_)));

        let mut req = request(ContentKey::thread(9, 0), Credentials::default(), None);
        req.board = "all".to_string();
        assert!(fx.coordinator.deliver(req).await.is_ok());
    }

    #[tokio::test]
    async fn missing_thread_is_not_found() {
        let fx = fixture(ModerationLevel::User);
        let err = fx
            .coordinator
            .deliver(request(ContentKey::thread(1, 0), Credentials::default(), None))
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn cache_backend_failure_is_internal() {
        let store = Arc::new(ConfigStore::new(GlobalConfig::default()).expect("store"));
        store.set_board(BoardConfig::new("g", "Games")).expect("set");
        let coordinator = DeliveryCoordinator::new(
            store,
            Arc::new(FailingCache),
            Arc::new(FixedResolver::new(Ok(true), ModerationLevel::User)),
            Arc::new(ShellRenderer),
        );

        let err = coordinator
            .deliver(request(ContentKey::board_page("g", 0), Credentials::default(), None))
            .await
            .expect_err("backend failure");
        assert!(matches!(err, DeliveryError::Cache { .. }));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn mismatched_cache_metadata_is_internal() {
        let store = Arc::new(ConfigStore::new(GlobalConfig::default()).expect("store"));
        store.set_board(BoardConfig::new("g", "Games")).expect("set");
        let renders = Arc::new(CountingRenderer::default());
        let coordinator = DeliveryCoordinator::new(
            store,
            Arc::new(BoardPageCache),
            Arc::new(FixedResolver::new(Ok(true), ModerationLevel::User)),
            renders.clone(),
        );

        for key in [ContentKey::thread(3, 0), ContentKey::catalog("g")] {
            let err = coordinator
                .deliver(request(key, Credentials::default(), None))
                .await
                .expect_err("mismatched metadata");
            assert!(matches!(
                err,
                DeliveryError::Cache {
                    source: CacheError::MetaMismatch { found: "a board page" },
                    ..
                }
            ));
            assert!(!err.is_not_found());
        }
        assert_eq!(renders.calls.load(Ordering::SeqCst), 0);

        assert!(
            coordinator
                .deliver(request(ContentKey::board_page("g", 0), Credentials::default(), None))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn credential_backend_failure_is_internal() {
        let store = Arc::new(ConfigStore::new(GlobalConfig::default()).expect("store"));
        store.set_board(BoardConfig::new("g", "Games")).expect("set");
        let coordinator = DeliveryCoordinator::new(
            store,
            Arc::new(MemoryRenderCache::new(&RenderCacheConfig::default())),
            Arc::new(FixedResolver::new(Err("timeout"), ModerationLevel::User)),
            Arc::new(ShellRenderer),
        );

        let err = coordinator
            .deliver(request(
                ContentKey::board_page("g", 0),
                Credentials::new("u", "s"),
                None,
            ))
            .await
            .expect_err("auth failure");
        assert!(matches!(err, DeliveryError::Auth(_)));
    }

    #[test]
    fn theme_resolution() {
        let fx = fixture(ModerationLevel::User);
        let mut board = BoardConfig::new("t", "Tea");
        board.public.default_css = "tea".to_string();
        fx.store.set_board(board).expect("set");

        assert_eq!(fx.coordinator.resolve_theme("t", Some("gar")), "gar");
        assert_eq!(fx.coordinator.resolve_theme("t", Some("nope")), "tea");
        assert_eq!(fx.coordinator.resolve_theme("t", None), "tea");
        assert_eq!(fx.coordinator.resolve_theme("all", None), "moe");
    }

    #[test]
    fn last_n_parsing() {
        assert_eq!(parse_last_n(None), 0);
        assert_eq!(parse_last_n(Some("100")), 100);
        assert_eq!(parse_last_n(Some("0")), 0);
        assert_eq!(parse_last_n(Some("501")), 0);
        assert_eq!(parse_last_n(Some("abc")), 0);
    }
}
