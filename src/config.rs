use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Process-wide settings, read once at startup and shared read-only.
#[derive(Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub api_url: String,
    pub graphql_url: String,
    pub bind_addr: SocketAddr,
    pub static_dir: String,
    pub request_timeout: Duration,
    pub upstream_timeout: Duration,
    pub rate_limit_per_minute: u32,
}

// Keep the token out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("graphql_url", &self.graphql_url)
            .field("bind_addr", &self.bind_addr)
            .field("static_dir", &self.static_dir)
            .field("request_timeout", &self.request_timeout)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}

#[derive(Deserialize)]
struct SecretsFile {
    github_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_url = env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let graphql_url = env::var("GITHUB_GRAPHQL_URL")
            .unwrap_or_else(|_| format!("{}/graphql", api_url));

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3030".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3030")?;

        let timeout_secs: u64 = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;

        let upstream_secs: u64 = env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")?;

        let rate_limit_per_minute = env::var("RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("RATE_LIMIT_PER_MINUTE must be a non-negative integer")?;

        let secrets_path = env::var("SECRETS_FILE").unwrap_or_else(|_| "secrets.json".to_string());
        let github_token = env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| load_token_file(Path::new(&secrets_path)));

        Ok(Config {
            github_token,
            api_url,
            graphql_url,
            bind_addr,
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            // A single call must never outlive the request that issued it.
            upstream_timeout: Duration::from_secs(upstream_secs.min(timeout_secs)),
            rate_limit_per_minute,
        })
    }

    /// Settings pointing at an arbitrary GitHub-compatible base URL.
    pub fn for_api(api_url: &str, github_token: Option<&str>) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        Config {
            github_token: github_token.map(str::to_string),
            graphql_url: format!("{}/graphql", api_url),
            api_url,
            bind_addr: ([127, 0, 0, 1], 3030).into(),
            static_dir: "static".to_string(),
            request_timeout: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 0,
        }
    }

    pub fn credential_configured(&self) -> bool {
        self.github_token.is_some()
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_per_minute > 0
    }
}

fn load_token_file(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str::<SecretsFile>(&raw).map_err(anyhow::Error::from));

    match parsed {
        Ok(secrets) => {
            let token = secrets.github_token.filter(|t| !t.trim().is_empty());
            if token.is_some() {
                info!("Loaded GitHub token from {}", path.display());
            }
            token
        }
        Err(e) => {
            warn!("Ignoring unreadable secrets file {}: {}", path.display(), e);
            None
        }
    }
}
