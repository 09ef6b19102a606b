//! Configuration layer: typed settings with layered precedence
//! (file → environment → legacy environment → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{BusOverride, CliArgs, Command, PublishArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "field-search";
const ENV_PREFIX: &str = "FIELD_SEARCH";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8082;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_CACHE_TTL_SECS: u64 = 300;
/// Upper bound for `cache.ttl_seconds` (30 days).
pub(crate) const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
pub(crate) const DEFAULT_LOCAL_CAPACITY: usize = 1000;
pub(crate) const DEFAULT_SHARED_TIMEOUT_MS: u64 = 2000;
pub(crate) const DEFAULT_BUS_STREAM: &str = "fields_events";
pub(crate) const DEFAULT_BUS_GROUP: &str = "search-api";
pub(crate) const DEFAULT_BUS_CONSUMER: &str = "search-api-1";
pub(crate) const DEFAULT_BUS_CHANNEL_CAPACITY: usize = 64;
pub(crate) const DEFAULT_BUS_BATCH_SIZE: usize = 16;
pub(crate) const DEFAULT_BUS_BLOCK_MS: u64 = 5000;
pub(crate) const DEFAULT_BUS_COMMAND_TIMEOUT_MS: u64 = 2000;

/// Variables understood by earlier deployments of the service, consulted
/// only when the structured key is absent. Earlier names win.
const LEGACY_INDEX_URL: &[&str] = &["SOLR_URL"];
const LEGACY_FIELDS_API_URL: &[&str] = &["FIELDS_API_URL"];
const LEGACY_CACHE_HOST: &[&str] = &["CACHE_HOST", "MEMCACHED_HOST"];
const LEGACY_BUS_URL: &[&str] = &["BUS_URL", "RABBITMQ_URL"];
const LEGACY_PORT: &[&str] = &["PORT"];

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub index: IndexSettings,
    pub fields_api: FieldsApiSettings,
    pub cache: CacheSettings,
    pub bus: BusSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Solr core the repository talks to.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FieldsApiSettings {
    pub url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub local_capacity: NonZeroUsize,
    pub shared_host: Option<String>,
    pub shared_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BusSettings {
    pub url: Option<String>,
    pub stream: String,
    pub group: String,
    pub consumer: String,
    pub channel_capacity: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub block: Duration,
    /// Upper bound for every bus command other than the blocking read.
    pub command_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_legacy_env(|name| std::env::var(name).ok())?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Publish(args)) => raw.apply_bus_override(&args.bus),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    index: RawEndpointSettings,
    fields_api: RawEndpointSettings,
    cache: RawCacheSettings,
    bus: RawBusSettings,
}

impl RawSettings {
    fn apply_legacy_env<F>(&mut self, lookup: F) -> Result<(), LoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };

        if self.index.url.is_none() {
            self.index.url = first(LEGACY_INDEX_URL);
        }
        if self.fields_api.url.is_none() {
            self.fields_api.url = first(LEGACY_FIELDS_API_URL);
        }
        if self.cache.shared_host.is_none() {
            self.cache.shared_host = first(LEGACY_CACHE_HOST);
        }
        if self.bus.url.is_none() {
            self.bus.url = first(LEGACY_BUS_URL);
        }
        if self.server.port.is_none()
            && let Some(port) = first(LEGACY_PORT)
        {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|err| LoadError::invalid("server.port", format!("PORT: {err}")))?;
            self.server.port = Some(port);
        }
        Ok(())
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.index_url.as_ref() {
            self.index.url = Some(url.clone());
        }
        if let Some(url) = overrides.fields_api_url.as_ref() {
            self.fields_api.url = Some(url.clone());
        }
        if let Some(host) = overrides.cache_shared_host.as_ref() {
            self.cache.shared_host = Some(host.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }

        self.apply_bus_override(&overrides.bus);
    }

    fn apply_bus_override(&mut self, overrides: &BusOverride) {
        if let Some(url) = overrides.bus_url.as_ref() {
            self.bus.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            index,
            fields_api,
            cache,
            bus,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let index = build_index_settings(index)?;
        let fields_api = build_fields_api_settings(fields_api)?;
        let cache = build_cache_settings(cache)?;
        let bus = build_bus_settings(bus)?;

        Ok(Self {
            server,
            logging,
            index,
            fields_api,
            cache,
            bus,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.host", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_index_settings(index: RawEndpointSettings) -> Result<IndexSettings, LoadError> {
    Ok(IndexSettings {
        url: non_blank(index.url),
        timeout: seconds(index.timeout_seconds, "index.timeout_seconds")?,
    })
}

fn build_fields_api_settings(
    fields_api: RawEndpointSettings,
) -> Result<FieldsApiSettings, LoadError> {
    Ok(FieldsApiSettings {
        url: non_blank(fields_api.url),
        timeout: seconds(fields_api.timeout_seconds, "fields_api.timeout_seconds")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = non_zero_u64(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    if ttl_seconds.get() > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            format!("must not exceed {MAX_CACHE_TTL_SECS}"),
        ));
    }
    let local_capacity = non_zero_usize(
        cache.local_capacity.unwrap_or(DEFAULT_LOCAL_CAPACITY),
        "cache.local_capacity",
    )?;
    let shared_timeout_ms = non_zero_u64(
        cache.shared_timeout_ms.unwrap_or(DEFAULT_SHARED_TIMEOUT_MS),
        "cache.shared_timeout_ms",
    )?;

    Ok(CacheSettings {
        ttl: Duration::from_secs(ttl_seconds.get()),
        local_capacity,
        shared_host: non_blank(cache.shared_host),
        shared_timeout: Duration::from_millis(shared_timeout_ms.get()),
    })
}

fn build_bus_settings(bus: RawBusSettings) -> Result<BusSettings, LoadError> {
    let stream = required_name(bus.stream, DEFAULT_BUS_STREAM, "bus.stream")?;
    let group = required_name(bus.group, DEFAULT_BUS_GROUP, "bus.group")?;
    let consumer = required_name(bus.consumer, DEFAULT_BUS_CONSUMER, "bus.consumer")?;
    let channel_capacity = non_zero_usize(
        bus.channel_capacity.unwrap_or(DEFAULT_BUS_CHANNEL_CAPACITY),
        "bus.channel_capacity",
    )?;
    let batch_size = non_zero_usize(
        bus.batch_size.unwrap_or(DEFAULT_BUS_BATCH_SIZE),
        "bus.batch_size",
    )?;
    let block_ms = non_zero_u64(bus.block_ms.unwrap_or(DEFAULT_BUS_BLOCK_MS), "bus.block_ms")?;
    let command_timeout_ms = non_zero_u64(
        bus.command_timeout_ms.unwrap_or(DEFAULT_BUS_COMMAND_TIMEOUT_MS),
        "bus.command_timeout_ms",
    )?;

    Ok(BusSettings {
        url: non_blank(bus.url),
        stream,
        group,
        consumer,
        channel_capacity,
        batch_size,
        block: Duration::from_millis(block_ms.get()),
        command_timeout: Duration::from_millis(command_timeout_ms.get()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEndpointSettings {
    url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    local_capacity: Option<usize>,
    shared_host: Option<String>,
    shared_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBusSettings {
    url: Option<String>,
    stream: Option<String>,
    group: Option<String>,
    consumer: Option<String>,
    channel_capacity: Option<usize>,
    batch_size: Option<usize>,
    block_ms: Option<u64>,
    command_timeout_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn required_name(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    match value {
        None => Ok(default.to_string()),
        Some(value) => non_blank(Some(value))
            .ok_or_else(|| LoadError::invalid(key, "must not be empty")),
    }
}

fn seconds(value: Option<u64>, key: &'static str) -> Result<Duration, LoadError> {
    let secs = non_zero_u64(value.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS), key)?;
    Ok(Duration::from_secs(secs.get()))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
