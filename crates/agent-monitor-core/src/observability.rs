use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const LOG_FILE_FALLBACK: &str = "agent-monitor.logs.jsonl";

/// Only an explicit off value disables logging.
fn logging_switched_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off" | "disabled"
    )
}

fn env_filter(default_level: &str) -> EnvFilter {
    std::env::var("AGENT_MONITOR_LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Initialize logging once per process.
///
/// - `AGENT_MONITOR_OBSERVABILITY=off` disables it entirely.
/// - `AGENT_MONITOR_LOG_LEVEL`, then `RUST_LOG`, override `default_level`.
/// - `AGENT_MONITOR_JSON_LOG_PATH` sends JSON lines to that file; otherwise a
///   compact format goes to stderr so stdout stays free for the session.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| {
        if std::env::var("AGENT_MONITOR_OBSERVABILITY").is_ok_and(|v| logging_switched_off(&v)) {
            return;
        }

        let registry = tracing_subscriber::registry().with(env_filter(default_level));
        match std::env::var("AGENT_MONITOR_JSON_LOG_PATH") {
            Ok(raw) => {
                let path = Path::new(&raw);
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let _ = std::fs::create_dir_all(dir);
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(LOG_FILE_FALLBACK);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = registry.with(layer).try_init();
            }
            Err(_) => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = registry.with(layer).try_init();
            }
        }
    });
}
