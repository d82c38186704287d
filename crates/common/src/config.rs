//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration. Without it jobs run on the in-process worker pool.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Federation configuration.
    #[serde(default)]
    pub federation: FederationConfig,
    /// Media storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base address of this instance, e.g. `https://vitrine.example`.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Federation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Whether the inbox accepts activities at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Username of the local system actor that signs outbound fetches.
    #[serde(default = "default_system_actor")]
    pub system_actor: String,
    /// Replay window for the `Date` header, in seconds.
    #[serde(default = "default_signature_max_age")]
    pub signature_max_age_secs: i64,
    /// Age after which a cached remote actor is refetched, in seconds.
    #[serde(default = "default_actor_refresh")]
    pub actor_refresh_secs: i64,
    /// Timeout for every outbound signed HTTP call, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Attempts a delivery job gets before it is dropped.
    #[serde(default = "default_delivery_max_attempts")]
    pub delivery_max_attempts: usize,
    /// Followers loaded per page during local timeline fan-out.
    #[serde(default = "default_fanout_chunk_size")]
    pub fanout_chunk_size: u64,
    /// Concurrent timeline inserts during local fan-out.
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
    /// Jobs executed concurrently by the queue worker.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// User agent sent with outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            system_actor: default_system_actor(),
            signature_max_age_secs: default_signature_max_age(),
            actor_refresh_secs: default_actor_refresh(),
            http_timeout_secs: default_http_timeout(),
            delivery_max_attempts: default_delivery_max_attempts(),
            fanout_chunk_size: default_fanout_chunk_size(),
            fanout_concurrency: default_fanout_concurrency(),
            worker_concurrency: default_worker_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

/// Storage for cached remote media (avatars and headers).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory the files are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    /// URL prefix the files are served under.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "vitrine".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_system_actor() -> String {
    "instance.actor".to_string()
}

const fn default_signature_max_age() -> i64 {
    300
}

const fn default_actor_refresh() -> i64 {
    24 * 60 * 60
}

const fn default_http_timeout() -> u64 {
    10
}

const fn default_delivery_max_attempts() -> usize {
    3
}

const fn default_fanout_chunk_size() -> u64 {
    100
}

const fn default_fanout_concurrency() -> usize {
    8
}

const fn default_worker_concurrency() -> usize {
    16
}

fn default_user_agent() -> String {
    format!("vitrine/{}", env!("CARGO_PKG_VERSION"))
}

fn default_storage_path() -> String {
    "./files".to_string()
}

fn default_storage_url() -> String {
    "/files".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `VITRINE_ENV`)
    /// 3. Environment variables with `VITRINE__` prefix, after reading `.env`
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("VITRINE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("VITRINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("VITRINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_federation_defaults() {
        let config: Config = config::Config::builder()
            .set_override("server.url", "https://vitrine.example")
            .unwrap()
            .set_override("database.url", "postgres://localhost/vitrine")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.redis.is_none());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.federation.signature_max_age_secs, 300);
        assert_eq!(config.federation.actor_refresh_secs, 86_400);
        assert_eq!(config.federation.delivery_max_attempts, 3);
        assert_eq!(config.federation.fanout_chunk_size, 100);
        assert_eq!(config.storage.base_url, "/files");
    }
}
