// src/config/app.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_WEBHOOK: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_DAILY_SUMMARY: &str = "DAILY_SUMMARY";
pub const ENV_STATE_DIR: &str = "VACANCY_STATE_DIR";
pub const ENV_DATA_DIR: &str = "VACANCY_DATA_DIR";
pub const ENV_NOTIFY_TIMEOUT: &str = "NOTIFY_TIMEOUT_SECS";

/// Process-level settings, resolved once at startup and passed down
/// explicitly to the pipeline and notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` means dry run: digests are logged instead of posted.
    pub webhook_url: Option<String>,
    pub daily_summary: bool,
    pub state_dir: PathBuf,
    pub data_dir: PathBuf,
    pub notify_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            daily_summary: false,
            state_dir: PathBuf::from("data/state"),
            data_dir: PathBuf::from("data"),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            webhook_url: env::var(ENV_WEBHOOK)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            daily_summary: env::var(ENV_DAILY_SUMMARY)
                .ok()
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            state_dir: env::var(ENV_STATE_DIR).map(PathBuf::from).unwrap_or(d.state_dir),
            data_dir: env::var(ENV_DATA_DIR).map(PathBuf::from).unwrap_or(d.data_dir),
            notify_timeout: env::var(ENV_NOTIFY_TIMEOUT)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(d.notify_timeout),
        }
    }
}
