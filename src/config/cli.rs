use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::domain::events::{ChangeOperation, FIELD_ENTITY};

/// Command-line arguments for the field-search binary.
#[derive(Debug, Parser)]
#[command(
    name = "field-search",
    version,
    about = "Cached full-text search over sport fields"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FIELD_SEARCH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the search endpoint and the change-event consumer.
    Serve(Box<ServeArgs>),
    /// Publish a single change event to the bus.
    Publish(PublishArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BusOverride {
    /// Override the event bus URL.
    #[arg(long = "bus-url", value_name = "URL")]
    pub bus_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub bus: BusOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the Solr core URL.
    #[arg(long = "index-url", value_name = "URL")]
    pub index_url: Option<String>,

    /// Override the fields API base URL.
    #[arg(long = "fields-api-url", value_name = "URL")]
    pub fields_api_url: Option<String>,

    /// Override the shared cache host.
    #[arg(long = "cache-shared-host", value_name = "HOST")]
    pub cache_shared_host: Option<String>,

    /// Override the cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PublishArgs {
    #[command(flatten)]
    pub bus: BusOverride,

    /// Change operation (create|update|delete).
    #[arg(long, value_name = "OPERATION")]
    pub operation: ChangeOperation,

    /// Identifier of the changed record.
    #[arg(long, value_name = "ID")]
    pub id: String,

    /// Entity type of the changed record.
    #[arg(long = "entity-type", value_name = "TYPE", default_value = FIELD_ENTITY)]
    pub entity_type: String,
}
