use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const MIN_POLL_INTERVAL_MS: u64 = 500;
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base: String,
    pub poll_interval: Duration,
    pub download_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            download_dir: PathBuf::from("downloads"),
            export_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`. Blank values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let poll_interval = var("SIFT_POLL_INTERVAL_MS")
            .and_then(|v| match v.parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring invalid SIFT_POLL_INTERVAL_MS");
                    None
                }
            })
            .map(clamp_poll_interval)
            .unwrap_or(defaults.poll_interval);

        Self {
            api_base: var("SIFT_API_BASE").unwrap_or(defaults.api_base),
            poll_interval,
            download_dir: var("SIFT_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            export_dir: var("SIFT_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
        }
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        api_base: Option<String>,
        poll_interval_ms: Option<u64>,
        download_dir: Option<PathBuf>,
        export_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
            self.api_base = base.trim().to_string();
        }
        if let Some(ms) = poll_interval_ms {
            self.poll_interval = clamp_poll_interval(ms);
        }
        if let Some(dir) = download_dir {
            self.download_dir = dir;
        }
        if let Some(dir) = export_dir {
            self.export_dir = dir;
        }
        self
    }
}

fn clamp_poll_interval(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS))
}
