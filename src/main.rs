use std::sync::Arc;

use anyhow::{Error, Result};
use notify_service::{
    api::{health_router, run_api_server},
    clients::{
        consumer::NotificationConsumer,
        database::DatabaseClient,
        health::HealthChecker,
        ntfy::NtfyClient,
        relay::{LoggingHandler, ProviderRelay},
        topology::Topology,
    },
    config::Config,
    models::channel::ChannelType,
    utils::{init_tracing, shutdown_signal},
    worker::{
        handler::{ChannelHandler, HandlerRegistry},
        processor::MessageProcessor,
    },
};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing();

    let database = Arc::new(DatabaseClient::connect(&config.database_url, &config.pool_config()).await?);
    database.migrate().await?;

    let handlers = build_handlers(&config)?;
    let topology = Topology::default();
    let worker_config = config.worker_config();

    let processor = Arc::new(MessageProcessor::new(
        topology.dead_letter_queue.clone(),
        handlers,
        database.clone(),
        Arc::new(config.requeue_backoff()),
        worker_config.message_timeout,
    ));

    let mut consumer = NotificationConsumer::connect(
        &config.rabbitmq_url,
        &config.connect_retry_config(),
        config.prefetch_count,
        topology.clone(),
    )
    .await?;

    consumer
        .start(&topology.consumer_queues(), &worker_config, processor)
        .await?;

    info!(
        workers = worker_config.workers,
        queues = ?topology.consumer_queues(),
        "Worker is up and running, waiting for messages"
    );

    let health_checker = HealthChecker::new()
        .with_check("database", true, database.clone())
        .with_check("message_broker", true, consumer.broker());

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(run_api_server(
        health_router(health_checker),
        config.server_port,
        async move {
            let _ = shutdown_rx.changed().await;
        },
    ));

    shutdown_signal().await;

    consumer.stop().await;

    let _ = shutdown_tx.send(true);
    match server.await {
        Ok(Err(e)) => error!(error = %e, "Health server failed"),
        Err(e) => error!(error = %e, "Health server task panicked"),
        Ok(Ok(())) => {}
    }

    database.close().await;

    info!("Worker stopped");

    Ok(())
}

fn build_handlers(config: &Config) -> Result<HandlerRegistry, Error> {
    let push: Arc<dyn ChannelHandler> = Arc::new(NtfyClient::new(
        &config.ntfy_base_url,
        &config.ntfy_topic,
        config.delivery_timeout(),
    )?);

    let email = relay_or_log(ChannelType::Email, config.email_provider_url.as_deref(), config)?;
    let sms = relay_or_log(ChannelType::Sms, config.sms_provider_url.as_deref(), config)?;

    Ok(HandlerRegistry::new()
        .register(ChannelType::Push, push)
        .register(ChannelType::Email, email)
        .register(ChannelType::Sms, sms))
}

fn relay_or_log(
    channel: ChannelType,
    endpoint: Option<&str>,
    config: &Config,
) -> Result<Arc<dyn ChannelHandler>, Error> {
    Ok(match endpoint {
        Some(endpoint) => Arc::new(ProviderRelay::new(channel, endpoint, config.delivery_timeout())?),
        None => Arc::new(LoggingHandler::new(channel)),
    })
}
