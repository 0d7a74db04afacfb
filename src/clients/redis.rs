use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::MultiplexedConnection};
use tracing::info;

use crate::rate_limiter::WindowCounter;

/// INCR plus EXPIRE in one server-side step. A key left without a TTL
/// (negative TTL) is re-armed on the next hit.
const INCREMENT_IN_WINDOW: &str = r#"
local count = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

#[derive(Clone)]
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    pub async fn connect(redis_url: &str) -> Result<Self, Error> {
        info!("Connecting to Redis");

        let client =
            Client::open(redis_url).map_err(|e| anyhow!("Failed to create redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis: {}", e))?;

        info!("Redis connection established");

        Ok(Self { connection })
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();

        conn.ping::<String>()
            .await
            .map_err(|e| anyhow!("Redis ping failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl WindowCounter for RedisClient {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, Error> {
        let mut conn = self.connection.clone();

        let count: u64 = Script::new(INCREMENT_IN_WINDOW)
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow!("Failed to increment rate counter: {}", e))?;

        Ok(count)
    }
}
