use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
};

use clap::Parser;

/// Command-line arguments, each with an environment-variable fallback.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "local-llm-gateway",
    about = "Local HTTP gateway over a text-generation runtime"
)]
pub struct Cli {
    /// Model identifier handed to the backend.
    #[arg(long)]
    pub model: Option<String>,

    /// Host to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind.
    #[arg(long)]
    pub port: Option<u16>,

    /// Cache-size hint forwarded to the backend, in tokens.
    #[arg(long)]
    pub max_cache_size: Option<usize>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Environment variables consumed by the backend runtime, not by the
/// gateway itself. Defaults are exported at startup when unset.
pub const BACKEND_BUFFER_CACHE_LIMIT_VAR: &str = "BACKEND_BUFFER_CACHE_LIMIT";
pub const BACKEND_GPU_MEMORY_LIMIT_VAR: &str = "BACKEND_GPU_MEMORY_LIMIT";

const DEFAULT_BUFFER_CACHE_LIMIT: &str = "2048";
const DEFAULT_GPU_MEMORY_LIMIT: &str = "0.8";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_id: String,
    pub max_cache_size: usize,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let host = cli
            .host
            .clone()
            .or_else(|| env::var("GATEWAY_HOST").ok())
            .unwrap_or_else(|| "localhost".to_string());
        let port = cli
            .port
            .or_else(|| env::var("GATEWAY_PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(8080);

        let listen_addr = (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("could not resolve bind address {host}:{port}"))?;

        let model_id = cli
            .model
            .clone()
            .or_else(|| env::var("MODEL_ID").ok())
            .unwrap_or_else(|| "gemma-3-12b-it-4bit".to_string());

        let max_cache_size = cli
            .max_cache_size
            .or_else(|| {
                env::var("MAX_CACHE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(32768);

        Ok(Self {
            listen_addr,
            model_id,
            max_cache_size,
        })
    }
}

/// Export default backend memory limits when the operator has not set them.
///
/// Call before the runtime spawns worker threads; mutating the environment
/// is unsafe once other threads may be reading it.
pub fn export_backend_memory_env() {
    for (key, value) in [
        (BACKEND_BUFFER_CACHE_LIMIT_VAR, DEFAULT_BUFFER_CACHE_LIMIT),
        (BACKEND_GPU_MEMORY_LIMIT_VAR, DEFAULT_GPU_MEMORY_LIMIT),
    ] {
        if env::var_os(key).is_none() {
            // SAFETY: called from the sync main before the async runtime is
            // built, while the process is still single-threaded.
            unsafe { env::set_var(key, value) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_set() {
        let cli = Cli {
            model: None,
            host: None,
            port: None,
            max_cache_size: None,
            verbose: false,
        };
        // Scrub env fallbacks so the test is hermetic.
        for key in ["GATEWAY_HOST", "GATEWAY_PORT", "MODEL_ID", "MAX_CACHE_SIZE"] {
            unsafe { env::remove_var(key) };
        }

        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.model_id, "gemma-3-12b-it-4bit");
        assert_eq!(config.max_cache_size, 32768);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli {
            model: Some("tiny".into()),
            host: Some("127.0.0.1".into()),
            port: Some(9001),
            max_cache_size: Some(1024),
            verbose: false,
        };

        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:9001");
        assert_eq!(config.model_id, "tiny");
        assert_eq!(config.max_cache_size, 1024);
    }
}
