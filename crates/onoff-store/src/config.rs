//! Runtime configuration, read from the environment (and `.env`) at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::DEFAULT_ORGS;

pub const DEFAULT_POLL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    /// Forge base URL, without `/api/v1`.
    pub forge_url: String,
    /// Optional API token; without one only public repos are visible.
    pub token: Option<String>,
    /// Gateway listen address.
    pub bind_address: String,
    /// Ledger JSON file.
    pub data_path: PathBuf,
    /// Platform config root that packages are installed under.
    pub install_root: PathBuf,
    /// Static store list (YAML).
    pub store_list_path: PathBuf,
    /// Organizations always listed by the browse view.
    pub default_orgs: Vec<String>,
    pub poll_interval: Duration,
    /// Program that downloads and unpacks a payload: `<unpacker> <url> <dest>`.
    pub unpacker: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            forge_url: env_or("ONOFF_STORE_URL", "http://localhost:3000"),
            token: std::env::var("ONOFF_STORE_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            bind_address: env_or("ONOFF_STORE_BIND", "0.0.0.0:8124"),
            data_path: env_or("ONOFF_STORE_DATA", ".storage/onoff_store.packages").into(),
            install_root: env_or("ONOFF_STORE_ROOT", ".").into(),
            store_list_path: env_or("ONOFF_STORE_LIST", "store_list.yaml").into(),
            default_orgs: parse_orgs(&env_or("ONOFF_STORE_ORGS", &DEFAULT_ORGS.join(","))),
            poll_interval: poll_interval(std::env::var("ONOFF_STORE_POLL_SECS").ok().as_deref()),
            unpacker: env_or("ONOFF_STORE_UNPACKER", "onoff-unpack"),
            log_level: env_or("ONOFF_STORE_LOG", "info"),
            log_json: std::env::var("ONOFF_STORE_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Seconds between update sweeps; zero or garbage means the hourly default.
pub fn poll_interval(raw: Option<&str>) -> Duration {
    let secs = raw
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_POLL_SECS);
    Duration::from_secs(secs)
}

/// Comma separated, blanks dropped.
pub fn parse_orgs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
