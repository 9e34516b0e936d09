use catalog_storage::StoreStrategy;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

/// Environment variables consulted, in order, when `upstream.password` is not
/// configured. `PASS_1C` is the name existing deployments already set.
pub const UPSTREAM_PASSWORD_ENV: &str = "UPSTREAM_PASSWORD";
pub const LEGACY_UPSTREAM_PASSWORD_ENV: &str = "PASS_1C";

/// First non-empty upstream password found through `lookup`.
pub fn upstream_password_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    [UPSTREAM_PASSWORD_ENV, LEGACY_UPSTREAM_PASSWORD_ENV]
        .into_iter()
        .filter_map(|name| lookup(name))
        .find(|p| !p.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream catalog provider
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Snapshot store selection
    #[serde(default)]
    pub store: StoreConfig,
    /// Refresh triggers
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if !self.server.path_prefix.is_empty() && !self.server.path_prefix.starts_with('/') {
            return Err("server.path_prefix must start with '/'".into());
        }
        // Upstream validations
        if self.upstream.url.is_empty() {
            return Err("upstream.url must not be empty".into());
        }
        if self.upstream.timeout_secs == 0 {
            return Err("upstream.timeout_secs must be > 0".into());
        }
        // Refresh validations
        if self.refresh.periodic && self.refresh.interval_secs == 0 {
            return Err("refresh.interval_secs must be > 0 when refresh.periodic=true".into());
        }
        // Store validations
        if self.store.key_prefix.is_empty() {
            return Err("store.key_prefix must not be empty".into());
        }
        if self.store.strategy == StoreStrategy::Keyed && self.store.keyed_backend == KeyedBackend::Redis
        {
            let password = self.store.redis.password.as_deref().unwrap_or("");
            if password.is_empty() {
                return Err("store.strategy=keyed requires store.redis.password".into());
            }
            if self.store.redis.pool_size == 0 {
                return Err("store.redis.pool_size must be > 0".into());
            }
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Mount point for all routes, e.g. `/1cgw`. Empty mounts at the root.
    #[serde(default)]
    pub path_prefix: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3210
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path_prefix: String::new(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Upstream catalog provider settings.
///
/// The request goes to a fixed URL with HTTP Basic credentials. The password is
/// a secret and is expected from the environment rather than the config file.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,

    #[serde(default = "default_upstream_username")]
    pub username: String,

    /// Basic-auth password. Falls back to `UPSTREAM_PASSWORD`, then `PASS_1C`, when unset.
    #[serde(default)]
    pub password: Option<String>,

    /// Whole-request timeout, including reading the body.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upstream_url() -> String {
    "https://1c.fariante.ru/acc/hs/catalog/all".into()
}
fn default_upstream_username() -> String {
    "Интеграция".into()
}
fn default_upstream_timeout_secs() -> u64 {
    10
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            username: default_upstream_username(),
            password: None,
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `blob` keeps the upstream payload verbatim, `keyed` stores one key per record
    #[serde(default)]
    pub strategy: StoreStrategy,

    /// Key-value service used by the keyed strategy
    #[serde(default)]
    pub keyed_backend: KeyedBackend,

    /// Namespace for all keys written by the keyed strategy
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_key_prefix() -> String {
    "catalog".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strategy: StoreStrategy::default(),
            keyed_backend: KeyedBackend::default(),
            key_prefix: default_key_prefix(),
            redis: RedisConfig::default(),
        }
    }
}

/// Key-value service behind the keyed strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyedBackend {
    #[default]
    Redis,
    /// In-process map, for local runs without Redis
    Memory,
}

/// Redis configuration for the keyed strategy
#[derive(Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Required when the keyed strategy uses Redis
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            password: None,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("pool_size", &self.pool_size)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh once before serving (failures are logged, not fatal)
    #[serde(default = "default_true")]
    pub on_startup: bool,

    /// Run a background refresh every `interval_secs`
    #[serde(default)]
    pub periodic: bool,

    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,

    /// When set, `POST /update` requires `Authorization: Bearer <token>`
    #[serde(default)]
    pub trigger_token: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval_secs() -> u64 {
    3600 // 1 hour
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            on_startup: default_true(),
            periodic: false,
            interval_secs: default_refresh_interval_secs(),
            trigger_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, upstream_password_from_env};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "catalog-gateway.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., CATALOG_GATEWAY__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("CATALOG_GATEWAY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;

        if merged.upstream.password.as_deref().unwrap_or("").is_empty() {
            merged.upstream.password = upstream_password_from_env(|name| std::env::var(name).ok());
        }

        merged.validate()?;
        Ok(merged)
    }
}
