use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::env;
use std::time::Duration;

/// Connection-pool settings, resolved from the environment.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable must be set"))?;

        Ok(Self {
            url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", 10),
            min_connections: parse_env("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: parse_env("DB_CONNECT_TIMEOUT_SECS", 5),
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", 300),
        })
    }
}

pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(true);

    Ok(Database::connect(opt).await?)
}

fn parse_env<T: std::str::FromStr + Copy>(var_name: &str, default: T) -> T {
    env::var(var_name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
