use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MODEL_ENDPOINT: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_MODEL_NAME: &str = "tinyllama";

/// Service configuration, injected into `AppState` at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Ollama-compatible chat endpoint
    pub model_endpoint: String,
    pub model_name: String,
    /// Per-call timeout for the model request. `None` waits indefinitely.
    pub model_timeout: Option<Duration>,
    /// Where uploaded PDFs are staged for parsing. `None` uses the OS temp dir.
    pub staging_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            model_endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_timeout: None,
            staging_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to the
    /// default for anything absent or unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            bind_addr: parse_or("BIND_ADDR", &lookup, default.bind_addr),
            model_endpoint: lookup("MODEL_ENDPOINT").unwrap_or(default.model_endpoint),
            model_name: lookup("MODEL_NAME").unwrap_or(default.model_name),
            model_timeout: lookup("MODEL_TIMEOUT_SECS")
                .and_then(|v| match v.parse::<u64>() {
                    Ok(0) => None,
                    Ok(secs) => Some(Duration::from_secs(secs)),
                    Err(_) => {
                        warn!("ignoring invalid MODEL_TIMEOUT_SECS={}", v);
                        None
                    }
                })
                .or(default.model_timeout),
            staging_dir: lookup("STAGING_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or(default.staging_dir),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring invalid {}={}", key, raw);
            default
        }),
        None => default,
    }
}
