//! Process-wide `tracing` setup for hosts that do not install their own
//! subscriber.
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_FILE: &str = "editor-stream.logs.jsonl";

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `info` or `editor_stream=debug`.
    pub filter: String,
    /// JSON lines go here when set; otherwise compact text on stderr.
    pub json_log_path: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Reads `EDITOR_STREAM_OBSERVABILITY`, `EDITOR_STREAM_LOG_LEVEL`,
    /// `RUST_LOG` and `EDITOR_STREAM_JSON_LOG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("EDITOR_STREAM_OBSERVABILITY")
            .map(|v| parse_bool(&v).unwrap_or(true))
            .unwrap_or(true);
        let filter = ["EDITOR_STREAM_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .find(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let json_log_path = lookup("EDITOR_STREAM_JSON_LOG_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            filter,
            json_log_path,
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        tracing_subscriber::EnvFilter::try_new(&self.filter)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Installs a subscriber once per process; later calls do nothing.
///
/// Fails silently when another global subscriber is already set.
pub fn init_observability() {
    INIT.get_or_init(|| install(&ObservabilityConfig::from_env()));
}

fn install(config: &ObservabilityConfig) {
    if !config.enabled {
        return;
    }
    let filter = config.env_filter();
    match &config.json_log_path {
        Some(path) => {
            let (dir, file_name) = split_log_path(path);
            if !dir.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(&dir);
            }
            let writer = tracing_appender::rolling::never(dir, file_name);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init();
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init();
        }
    }
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}
