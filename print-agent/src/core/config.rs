use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

/// Remote job store endpoint (PostgREST-style hosted table)
#[derive(Debug, Clone)]
pub struct StoreEndpoint {
    /// Base URL, e.g. https://project.example.co/rest/v1
    pub url: String,
    /// API key, sent as `apikey` and bearer token
    pub key: String,
    pub jobs_table: String,
    pub printers_table: String,
    /// Column stamped with the claiming agent id; the claim writes `status` only when unset
    pub claimed_by_column: Option<String>,
}

/// Agent configuration
///
/// # Environment variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/crab/print-agent | Working directory (embedded store, logs) |
/// | HTTP_PORT | 9300 | Local HTTP port |
/// | AGENT_ID | print-agent-<hostname> | Identifier reported by /health and stamped on claimed jobs |
/// | STORE_URL | (unset) | Remote job store; embedded redb store when unset |
/// | STORE_KEY | (empty) | Remote job store API key |
/// | STORE_JOBS_TABLE | print_jobs | Remote jobs table |
/// | STORE_PRINTERS_TABLE | printers | Remote printer config table |
/// | STORE_CLAIMED_BY_COLUMN | (unset) | Remote jobs column for the claiming agent id |
/// | POLL_INTERVAL_SECS | 5 | Backlog scan interval |
/// | NETWORK_TIMEOUT_MS | 10000 | Network printer connect+send bound |
/// | INTERACTIVE_TIMEOUT_MS | 15000 | Bound on direct print requests |
/// | TIMEZONE | Asia/Kolkata | Timezone for printed timestamps |
/// | LOG_LEVEL | info | Log level |
/// | LOG_JSON | false | JSON log format |
/// | LOG_DIR | (unset) | Directory for rolling log files |
/// | ENVIRONMENT | development | Runtime environment |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/crab HTTP_PORT=9300 AGENT_ID=counter-1 cargo run -p print-agent
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub agent_id: String,
    /// `None` selects the embedded store
    pub store: Option<StoreEndpoint>,
    pub poll_interval_secs: u64,
    pub network_timeout_ms: u64,
    pub interactive_timeout_ms: u64,
    pub timezone: Tz,
    /// Rolling log file directory, if any
    pub log_dir: Option<String>,
    /// development | staging | production
    pub environment: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from environment variables, with defaults for anything unset
    pub fn from_env() -> Self {
        let store = std::env::var("STORE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| StoreEndpoint {
                url: url.trim_end_matches('/').to_string(),
                key: std::env::var("STORE_KEY").unwrap_or_default(),
                jobs_table: std::env::var("STORE_JOBS_TABLE")
                    .unwrap_or_else(|_| "print_jobs".into()),
                printers_table: std::env::var("STORE_PRINTERS_TABLE")
                    .unwrap_or_else(|_| "printers".into()),
                claimed_by_column: std::env::var("STORE_CLAIMED_BY_COLUMN")
                    .ok()
                    .filter(|c| !c.trim().is_empty()),
            });

        let timezone = std::env::var("TIMEZONE")
            .ok()
            .and_then(|tz| match tz.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    tracing::warn!(timezone = %tz, "Unknown timezone, falling back to Asia/Kolkata");
                    None
                }
            })
            .unwrap_or(chrono_tz::Asia::Kolkata);

        Self {
            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/crab/print-agent".into()),
            http_port: env_or("HTTP_PORT", 9300),
            agent_id: std::env::var("AGENT_ID").unwrap_or_else(|_| default_agent_id()),
            store,
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", 5).max(1),
            network_timeout_ms: env_or("NETWORK_TIMEOUT_MS", 10_000),
            interactive_timeout_ms: env_or("INTERACTIVE_TIMEOUT_MS", 15_000),
            timezone,
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Override the work dir and port (tests)
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config.store = None;
        config
    }

    /// Path of the embedded job store
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("print_jobs.redb")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn interactive_timeout(&self) -> Duration {
        Duration::from_millis(self.interactive_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_agent_id() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "local".into());
    format!("print-agent-{}", host)
}
