//! Runtime settings.
//!
//! Sources are merged lowest precedence first: `config/default.*`,
//! `boardstore.*`, the file named by `--config-file`, `BOARDSTORE__*`
//! environment variables, then command-line overrides. The merged raw
//! document is checked section by section into [`Settings`].

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CheckSeedArgs, CliArgs, Command, ServeArgs, ServeOverrides};

const BASE_FILE: &str = "config/default";
const LOCAL_FILE: &str = "boardstore";
const ENV_PREFIX: &str = "BOARDSTORE";
const LOOPBACK: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 8000;
const DEFAULT_ADMIN_PORT: u16 = 8001;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
const DEFAULT_RENDER_CACHE_CAPACITY: usize = 512;
const DEFAULT_EVENTS_INTERVAL_MS: u64 = 500;
const DEFAULT_EVENTS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render_cache: RenderCacheSettings,
    pub events: EventSettings,
    pub seed: SeedSettings,
}

/// Listener addresses. The public and admin listeners never share one.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    /// Upper bound on connection draining after a shutdown signal.
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderCacheSettings {
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct EventSettings {
    /// How often the consumer drains the event queue.
    pub interval: Duration,
    /// Pending events kept before the oldest is dropped.
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Clone, Default)]
pub struct SeedSettings {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read configuration sources: {0}")]
    Source(#[from] config::ConfigError),
    #[error("`{key}` is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> LoadError {
    LoadError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// Parse the command line and load settings for it.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut sources = Config::builder()
        .add_source(File::with_name(BASE_FILE).required(false))
        .add_source(File::with_name(LOCAL_FILE).required(false));
    if let Some(path) = &cli.config_file {
        sources = sources.add_source(File::from(path.as_path()));
    }
    let sources = sources.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = sources.build()?.try_deserialize()?;
    match &cli.command {
        Some(Command::Serve(serve)) => raw.merge_overrides(&serve.overrides),
        Some(Command::CheckSeed(check)) => raw.seed.file = Some(check.file.clone()),
        None => {}
    }

    Settings::try_from(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServer,
    logging: RawLogging,
    render_cache: RawRenderCache,
    events: RawEvents,
    seed: RawSeed,
}

impl RawSettings {
    /// Command-line values replace whatever the file and environment said.
    fn merge_overrides(&mut self, overrides: &ServeOverrides) {
        let ServeOverrides {
            server_host,
            server_admin_host,
            public_port,
            admin_port,
            server_graceful_shutdown_seconds,
            log_level,
            log_json,
            render_cache_capacity,
            events_interval_ms,
            seed_file,
        } = overrides.clone();

        let server = &mut self.server;
        server.host = server_host.or(server.host.take());
        server.admin_host = server_admin_host.or(server.admin_host.take());
        server.public_port = public_port.or(server.public_port);
        server.admin_port = admin_port.or(server.admin_port);
        server.graceful_shutdown_seconds =
            server_graceful_shutdown_seconds.or(server.graceful_shutdown_seconds);

        self.logging.level = log_level.or(self.logging.level.take());
        self.logging.json = log_json.or(self.logging.json);
        self.render_cache.capacity = render_cache_capacity.or(self.render_cache.capacity);
        self.events.interval_ms = events_interval_ms.or(self.events.interval_ms);
        self.seed.file = seed_file.or(self.seed.file.take());
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = LoadError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            server: raw.server.resolve()?,
            logging: raw.logging.resolve()?,
            render_cache: raw.render_cache.resolve()?,
            events: raw.events.resolve()?,
            seed: SeedSettings {
                file: raw.seed.file.filter(|path| !path.as_os_str().is_empty()),
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServer {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

impl RawServer {
    fn resolve(self) -> Result<ServerSettings, LoadError> {
        let public_addr = listener_addr(
            "server.public_port",
            self.host.as_deref(),
            self.public_port.unwrap_or(DEFAULT_PUBLIC_PORT),
        )?;
        let admin_addr = listener_addr(
            "server.admin_port",
            self.admin_host.as_deref(),
            self.admin_port.unwrap_or(DEFAULT_ADMIN_PORT),
        )?;
        if public_addr == admin_addr {
            return Err(invalid(
                "server.admin_port",
                format!("{admin_addr} is already the public listener"),
            ));
        }

        let grace = self
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS);
        if grace == 0 {
            return Err(invalid("server.graceful_shutdown_seconds", "must be positive"));
        }

        Ok(ServerSettings {
            public_addr,
            admin_addr,
            graceful_shutdown: Duration::from_secs(grace),
        })
    }
}

fn listener_addr(key: &'static str, host: Option<&str>, port: u16) -> Result<SocketAddr, LoadError> {
    if port == 0 {
        return Err(invalid(key, "port 0 is not a fixed listener port"));
    }
    let host = host.unwrap_or(LOOPBACK);
    format!("{host}:{port}")
        .parse()
        .map_err(|err| invalid(key, format!("`{host}:{port}` is not a socket address: {err}")))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLogging {
    level: Option<String>,
    json: Option<bool>,
}

impl RawLogging {
    fn resolve(self) -> Result<LoggingSettings, LoadError> {
        let level = self
            .level
            .as_deref()
            .map(LevelFilter::from_str)
            .transpose()
            .map_err(|err| invalid("logging.level", err.to_string()))?
            .unwrap_or(LevelFilter::INFO);
        let format = match self.json {
            Some(true) => LogFormat::Json,
            _ => LogFormat::Compact,
        };
        Ok(LoggingSettings { level, format })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderCache {
    capacity: Option<usize>,
}

impl RawRenderCache {
    fn resolve(self) -> Result<RenderCacheSettings, LoadError> {
        let capacity = self.capacity.unwrap_or(DEFAULT_RENDER_CACHE_CAPACITY);
        NonZeroUsize::new(capacity)
            .map(|capacity| RenderCacheSettings { capacity })
            .ok_or_else(|| invalid("render_cache.capacity", "must hold at least one entry"))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEvents {
    interval_ms: Option<u64>,
    capacity: Option<usize>,
}

impl RawEvents {
    fn resolve(self) -> Result<EventSettings, LoadError> {
        let interval = match self.interval_ms.unwrap_or(DEFAULT_EVENTS_INTERVAL_MS) {
            0 => return Err(invalid("events.interval_ms", "must be positive")),
            ms => Duration::from_millis(ms),
        };
        let capacity = NonZeroUsize::new(self.capacity.unwrap_or(DEFAULT_EVENTS_CAPACITY))
            .ok_or_else(|| invalid("events.capacity", "must hold at least one event"))?;
        Ok(EventSettings { interval, capacity })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSeed {
    file: Option<PathBuf>,
}
