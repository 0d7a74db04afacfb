use std::sync::Arc;

use anyhow::{Error, Result};
use notify_service::{
    api::{ingress_router, run_api_server},
    clients::{
        database::DatabaseClient, health::HealthChecker, rbmq::Producer, redis::RedisClient,
        topology::Topology,
    },
    config::Config,
    rate_limiter::RateLimiter,
    service::NotificationService,
    utils::{init_tracing, shutdown_signal},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing();

    let producer = Arc::new(
        Producer::connect(
            &config.rabbitmq_url,
            Topology::default(),
            &config.connect_retry_config(),
            config.publish_retry_config(),
        )
        .await?,
    );

    let database = Arc::new(DatabaseClient::connect(&config.database_url, &config.pool_config()).await?);
    database.migrate().await?;

    let redis = Arc::new(RedisClient::connect(&config.redis_url).await?);
    let limiter = RateLimiter::new(redis.clone(), config.rate_limit_config());

    let service = Arc::new(NotificationService::new(
        limiter,
        database.clone(),
        producer.clone(),
    ));

    let health_checker = HealthChecker::new()
        .with_check("database", true, database.clone())
        .with_check("message_broker", true, producer.clone())
        .with_check("cache_service", false, redis);

    run_api_server(
        ingress_router(service, health_checker),
        config.server_port,
        shutdown_signal(),
    )
    .await?;

    producer.close().await;
    database.close().await;

    info!("Server stopped");

    Ok(())
}
