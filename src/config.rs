//! Server and engine configuration loaded from environment variables

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Read an env var and parse it, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

/// Tunables of the synchronization engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on any single session store call
    pub store_timeout: Duration,
    /// Per-connection outbound queue depth
    pub outbound_buffer: usize,
    /// Dropped messages tolerated before a slow connection is closed
    pub max_send_drops: u64,
    /// Sessions with no connections and no activity for this long are reclaimed
    pub session_idle_ttl: Duration,
    pub reaper_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(2000),
            outbound_buffer: 64,
            max_send_drops: 32,
            session_idle_ttl: Duration::from_secs(3600),
            reaper_interval: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_timeout: Duration::from_millis(env_or(
                "STORE_TIMEOUT_MS",
                defaults.store_timeout.as_millis() as u64,
            )),
            outbound_buffer: env_or("OUTBOUND_BUFFER", defaults.outbound_buffer).max(1),
            max_send_drops: env_or("MAX_SEND_DROPS", defaults.max_send_drops),
            session_idle_ttl: Duration::from_secs(env_or(
                "SESSION_IDLE_TTL_SECS",
                defaults.session_idle_ttl.as_secs(),
            )),
            reaper_interval: Duration::from_secs(
                env_or("REAPER_INTERVAL_SECS", defaults.reaper_interval.as_secs()).max(1),
            ),
        }
    }
}

/// Process-level configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// How many successive ports to try when the configured one is taken
    pub port_search_attempts: u16,
    pub static_dir: String,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            port_search_attempts: 10,
            static_dir: "public".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            port: env_or("PORT", defaults.port),
            port_search_attempts: env_or("PORT_SEARCH_ATTEMPTS", defaults.port_search_attempts)
                .max(1),
            static_dir: std::env::var("STATIC_DIR")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.static_dir),
            engine: EngineConfig::from_env(),
        }
    }
}
