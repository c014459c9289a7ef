//! Relay settings: listen address and the per-board delivery limits.
//!
//! A flag (or its `BOARDCAST_*` variable, where it has one) beats the
//! `[server]` table of `<config dir>/boardcast-relay/config.toml`, which
//! beats the built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hub::DEFAULT_PEER_BUFFER;

/// Why the relay settings could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// File that failed.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid relay TOML.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RelayConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the relay config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_message_size: Option<usize>,
    peer_buffer: Option<usize>,
    send_timeout_ms: Option<u64>,
}

/// Command line of `boardcast-relay`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Boardcast move relay")]
pub struct RelayCliArgs {
    /// Address to listen on.
    #[arg(short, long, env = "BOARDCAST_ADDR")]
    pub bind: Option<String>,

    /// Config file to read instead of the default location.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Outbound queue capacity per connection.
    #[arg(long)]
    pub peer_buffer: Option<usize>,

    /// Milliseconds a single socket write may take before the connection is dropped.
    #[arg(long)]
    pub send_timeout_ms: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "BOARDCAST_LOG")]
    pub log_level: String,
}

/// Settings the relay runs with.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address, `0.0.0.0:4000` unless overridden.
    pub bind_addr: String,
    /// Largest inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub peer_buffer: usize,
    /// Upper bound on a single socket write.
    pub send_timeout: Duration,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4000".to_string(),
            max_message_size: 64 * 1024,
            peer_buffer: DEFAULT_PEER_BUFFER,
            send_timeout: Duration::from_secs(5),
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Resolves the settings for this run.
    ///
    /// An explicit `--config` file must exist; the default file is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &RelayCliArgs, file: &RelayConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_message_size: cli
                .max_message_size
                .or(file.server.max_message_size)
                .unwrap_or(defaults.max_message_size),
            peer_buffer: cli
                .peer_buffer
                .or(file.server.peer_buffer)
                .unwrap_or(defaults.peer_buffer),
            send_timeout: cli
                .send_timeout_ms
                .or(file.server.send_timeout_ms)
                .map_or(defaults.send_timeout, Duration::from_millis),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<RelayConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|source| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(RelayConfigFile::default());
    };
    let path = config_dir.join("boardcast-relay").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
