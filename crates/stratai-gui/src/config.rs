use std::env;

use anyhow::{Context, Result};
use stratai_core::{Config, ConfigLoader};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    pub max_concurrency: usize,
    pub auth_token: Option<String>,
    pub otel_endpoint: Option<String>,
    /// Idle time after which a browser session is forgotten.
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
    /// Crew, model and search settings; resolved through `STRATAI_CONFIG`.
    pub core: Config,
}

impl AppConfig {
    const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8080";
    pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
    pub const DEFAULT_MAX_SESSIONS: usize = 1024;

    pub fn from_env() -> Result<Self> {
        let listen_addr =
            env::var("GUI_LISTEN_ADDR").unwrap_or_else(|_| Self::DEFAULT_LISTEN_ADDR.to_string());

        let max_concurrency = env::var("GUI_MAX_CONCURRENCY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|nz| nz.get())
                    .unwrap_or(4)
            });

        let auth_token = non_empty_var("GUI_AUTH_TOKEN");
        let otel_endpoint = non_empty_var("GUI_OTEL_ENDPOINT");

        let session_ttl_secs = positive_var("GUI_SESSION_TTL_SECS")
            .unwrap_or(Self::DEFAULT_SESSION_TTL_SECS);
        let max_sessions = positive_var("GUI_MAX_SESSIONS")
            .map(|value| value as usize)
            .unwrap_or(Self::DEFAULT_MAX_SESSIONS);

        let core = ConfigLoader::load_or_default(None)
            .context("failed to load StratAI configuration")?;

        Ok(Self {
            listen_addr,
            max_concurrency,
            auth_token,
            otel_endpoint,
            session_ttl_secs,
            max_sessions,
            core,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive_var(name: &str) -> Option<u64> {
    non_empty_var(name)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}
