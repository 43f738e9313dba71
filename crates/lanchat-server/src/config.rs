use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use lanchat_gateway::config::{GatewayConfig, parse_duration};

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    /// Upload size limit in bytes.
    pub max_file_size: u64,
    /// Uploaded files older than this are deleted. Zero keeps them forever.
    pub uploads_retention: Duration,
    /// How often expired uploads and history are pruned. Zero disables it.
    pub cleanup_interval: Duration,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port: u16 = var("SERVER_PORT", "13050")
            .parse()
            .context("SERVER_PORT must be a port number")?;
        let max_file_size_mb: u64 = var("MAX_FILE_SIZE", "500")
            .parse()
            .context("MAX_FILE_SIZE must be a size in megabytes")?;
        let reconnect_grace_ms: u64 = var("RECONNECT_GRACE_MS", "3000")
            .parse()
            .context("RECONNECT_GRACE_MS must be milliseconds")?;
        let join_debounce_ms: u64 = var("JOIN_DEBOUNCE_MS", "2000")
            .parse()
            .context("JOIN_DEBOUNCE_MS must be milliseconds")?;

        let cleanup_interval = parse_duration(&var("CLEANUP_INTERVAL", "1h"));
        let gateway = GatewayConfig {
            reconnect_grace: Duration::from_millis(reconnect_grace_ms),
            join_debounce: Duration::from_millis(join_debounce_ms),
            history_retention: parse_duration(&var("HISTORY_RETENTION", "7d")),
            sweep_interval: cleanup_interval,
            ..GatewayConfig::default()
        };

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            uploads_dir: var("UPLOADS_DIR", "./uploads").into(),
            max_file_size: max_file_size_mb.saturating_mul(1024 * 1024),
            uploads_retention: parse_duration(&var("UPLOADS_RETENTION", "1d")),
            cleanup_interval,
            gateway,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
