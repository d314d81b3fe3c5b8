use std::{future::IntoFuture, path::Path, process, sync::Arc, time::Duration};

use boardstore::{
    application::{
        boards::BoardDirectory,
        delivery::DeliveryCoordinator,
        error::AppError,
        events::{EventConsumer, EventQueue},
        render::ShellRenderer,
        settings::ConfigService,
    },
    cache::{MemoryRenderCache, RenderCacheConfig},
    config,
    infra::{
        error::InfraError,
        http::{self, AdminState, HttpState},
        seed::SeedDocument,
        sessions::MemorySessionStore,
        telemetry,
    },
    store::ConfigStore,
};
use time::OffsetDateTime;
use tokio::{sync::watch, task::JoinHandle, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CheckSeed(args) => run_check_seed(&args.file).await,
    }
}

struct ApplicationContext {
    store: Arc<ConfigStore>,
    sessions: Arc<MemorySessionStore>,
    consumer: EventConsumer,
    http_state: HttpState,
    admin_state: AdminState,
}

async fn load_seed(settings: &config::Settings) -> Result<SeedDocument, AppError> {
    match settings.seed.file.as_deref() {
        Some(path) => SeedDocument::read(path)
            .await
            .map_err(|err| AppError::from(InfraError::from(err))),
        None => {
            info!("No seed file configured; starting with default configuration");
            Ok(SeedDocument::default())
        }
    }
}

fn build_application_context(
    settings: &config::Settings,
    seed: &SeedDocument,
) -> Result<ApplicationContext, AppError> {
    let store = Arc::new(
        seed.build_store()
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );

    let sessions = Arc::new(MemorySessionStore::new());
    seed.populate_sessions(&sessions)
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let render_cache = Arc::new(MemoryRenderCache::new(&RenderCacheConfig::from(
        &settings.render_cache,
    )));
    let events = Arc::new(EventQueue::with_capacity(settings.events.capacity.get()));

    let delivery = Arc::new(DeliveryCoordinator::new(
        store.clone(),
        render_cache.clone(),
        sessions.clone(),
        Arc::new(ShellRenderer),
    ));
    let config_service = ConfigService::new(store.clone(), sessions.clone(), events.clone());
    let consumer = EventConsumer::new(events, render_cache);

    let http_state = HttpState {
        store: store.clone(),
        delivery,
        boards: BoardDirectory::new(store.clone(), sessions.clone()),
    };
    let admin_state = AdminState {
        config: config_service,
    };

    Ok(ApplicationContext {
        store,
        sessions,
        consumer,
        http_state,
        admin_state,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let seed = load_seed(&settings).await?;
    let app = build_application_context(&settings, &seed)?;

    let consumer_handle = app.consumer.spawn(settings.events.interval);
    let prune_handle = spawn_session_pruner(app.sessions.clone());

    let result = serve_http(&settings, app.http_state, app.admin_state).await;

    for handle in [consumer_handle, prune_handle] {
        handle.abort();
        let _ = handle.await;
    }
    app.store.shutdown();

    result
}

async fn run_check_seed(path: &Path) -> Result<(), AppError> {
    let seed = SeedDocument::read(path)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let store = seed
        .build_store()
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        path = %path.display(),
        fingerprint = %store.global_hash(),
        "Global configuration is valid"
    );
    let boards = store.all_boards();
    for id in store.board_ids() {
        if let Some(board) = boards.get(&id) {
            info!(board = %id, fingerprint = %board.hash, "Board configuration is valid");
        }
    }

    store.shutdown();
    Ok(())
}

fn spawn_session_pruner(sessions: Arc<MemorySessionStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let removed = sessions.prune_expired(OffsetDateTime::now_utc());
            if removed > 0 {
                info!(removed, "Pruned expired sessions");
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
        .into_future();
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .into_future();

    let servers = async { try_join!(public_server, admin_server).map(|_| ()) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, servers).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
