use std::{process, sync::Arc, time::Duration};

use field_search::{
    application::{
        error::AppError,
        repos::{FieldSource, IndexRepository},
        search::SearchService,
        sync::IndexSynchronizer,
    },
    cache::{CacheConfig, CacheTiers, LocalCache, SearchCache, SharedCache},
    config,
    domain::events::ChangeEvent,
    infra::{
        bus::{BusConfig, BusError, EventPublisher, RedisStreamBus, run_event_worker},
        error::InfraError,
        fields_api::HttpFieldSource,
        http::{self, HttpState},
        solr::SolrRepository,
        telemetry,
    },
};
use tokio::sync::{mpsc, watch};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Publish(args) => run_publish(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let index_url = settings
        .index
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("index url is not configured"))?;
    let fields_api_url = settings
        .fields_api
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("fields api url is not configured"))?;

    let index: Arc<dyn IndexRepository> =
        Arc::new(SolrRepository::new(index_url, settings.index.timeout)?);
    let source: Arc<dyn FieldSource> = Arc::new(HttpFieldSource::new(
        fields_api_url,
        settings.fields_api.timeout,
    )?);
    let caches = build_caches(&settings).await;

    let search = Arc::new(SearchService::new(index.clone(), caches.clone()));
    let synchronizer = Arc::new(IndexSynchronizer::new(index, source, caches));

    let bus_config = BusConfig::try_from(&settings.bus)?;
    let bus = RedisStreamBus::connect(&bus_config)
        .await
        .map_err(bus_error)?;
    bus.ensure_group().await.map_err(bus_error)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let (delivery_tx, delivery_rx) = mpsc::channel(bus_config.channel_capacity.get());
    let subscriber = bus.spawn_subscriber(delivery_tx, stop_rx);
    let worker = tokio::spawn(run_event_worker(delivery_rx, synchronizer));

    let result = serve_http(&settings, HttpState { search }).await;

    // Stopping the subscriber closes the channel; the worker then drains it.
    let _ = stop_tx.send(true);
    if let Err(err) = subscriber.await {
        warn!(error = %err, "Bus subscriber task failed");
    }
    match tokio::time::timeout(settings.server.graceful_shutdown, worker).await {
        Ok(Ok(handled)) => info!(handled, "Event worker drained"),
        Ok(Err(err)) => warn!(error = %err, "Event worker task failed"),
        Err(_) => warn!("Event worker did not drain before the shutdown deadline"),
    }

    result
}

async fn run_publish(
    settings: config::Settings,
    args: config::PublishArgs,
) -> Result<(), AppError> {
    let bus_config = BusConfig::try_from(&settings.bus)?;
    let bus = RedisStreamBus::connect(&bus_config)
        .await
        .map_err(bus_error)?;

    let event = ChangeEvent::new(args.operation, args.id, args.entity_type);
    let entry_id = bus.publish(&event).await.map_err(bus_error)?;

    info!(
        target: "field_search::publish",
        entry_id = %entry_id,
        stream = %bus_config.stream,
        routing_key = %event.routing_key(),
        "Change event published"
    );
    Ok(())
}

async fn build_caches(settings: &config::Settings) -> CacheTiers {
    let cache_config = CacheConfig::from(&settings.cache);
    let local: Arc<dyn SearchCache> = Arc::new(LocalCache::new(&cache_config));
    let shared: Arc<dyn SearchCache> = Arc::new(SharedCache::connect(&cache_config).await);
    CacheTiers::new(local, shared)
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "Search API listening");

    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(true);
        },
    );

    tokio::select! {
        result = async { server.await } => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = drain_deadline(&mut signalled_rx, settings.server.graceful_shutdown) => {
            warn!("In-flight requests did not finish before the shutdown deadline");
            Ok(())
        }
    }
}

async fn drain_deadline(signalled: &mut watch::Receiver<bool>, grace: Duration) {
    if signalled.wait_for(|signalled| *signalled).await.is_err() {
        return std::future::pending().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
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
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}

fn bus_error(err: BusError) -> AppError {
    AppError::from(InfraError::bus(err.to_string()))
}
