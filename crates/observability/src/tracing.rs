//! Tracing subscriber installation.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable, for terminals.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format {other:?} (expected json or pretty)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `info,atelier_jobs=debug`.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LogConfig {
    /// Reads `ATELIER_LOG_FORMAT` and `RUST_LOG`. Unknown formats fall back to JSON.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("ATELIER_LOG_FORMAT").ok().as_deref(),
            std::env::var("RUST_LOG").ok().as_deref(),
        )
    }

    fn from_vars(format: Option<&str>, filter: Option<&str>) -> Self {
        let format = match format.map(LogFormat::from_str) {
            Some(Ok(format)) => format,
            Some(Err(e)) => {
                eprintln!("ignoring ATELIER_LOG_FORMAT: {e}");
                LogFormat::default()
            }
            None => LogFormat::default(),
        };
        let filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FILTER)
            .to_string();

        Self { format, filter }
    }
}

/// Install the global subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_json_at_info() {
        assert_eq!(LogConfig::from_vars(None, None), LogConfig::default());
        assert_eq!(LogConfig::default().format, LogFormat::Json);
        assert_eq!(LogConfig::default().filter, "info");
    }

    #[test]
    fn reads_format_and_filter() {
        let config = LogConfig::from_vars(Some("Pretty"), Some("debug,hyper=warn"));
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "debug,hyper=warn");
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        let config = LogConfig::from_vars(Some("xml"), Some("  "));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "info");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(&LogConfig::default());
        init(&LogConfig::from_vars(Some("pretty"), None));
    }
}
