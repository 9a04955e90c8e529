use redis::aio::ConnectionManager;
use tokio::time::{timeout, Duration};

/// Connect to Redis with a bounded wait so a dead cache host cannot
/// stall startup. The caller treats failure as "run without cache".
pub async fn get_redis() -> anyhow::Result<ConnectionManager> {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let client = redis::Client::open(redis_url)?;

    let manager = timeout(Duration::from_secs(5), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 5 seconds"))??;

    Ok(manager)
}
