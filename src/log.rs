use clap::ValueEnum;
use serde::Deserialize;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the global stderr subscriber. `RUST_LOG` directives still apply on
/// top of `level`. Calling this twice keeps the first subscriber.
pub fn init(level: LogLevel) {
    let env_filter = EnvFilter::from_default_env().add_directive(level.as_filter().into());

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        tracing::debug!(error = %e, "Tracing subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filters() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_filter(), LevelFilter::WARN);
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
    }

    #[test]
    fn test_cli_names_match_config_names() {
        assert_eq!(LogLevel::from_str("warn", true), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("TRACE", true), Ok(LogLevel::Trace));
        assert!(LogLevel::from_str("verbose", true).is_err());

        #[derive(Deserialize)]
        struct Level {
            level: LogLevel,
        }
        for variant in LogLevel::value_variants() {
            let name = variant.to_possible_value().unwrap().get_name().to_string();
            let parsed: Level = toml::from_str(&format!("level = \"{name}\"")).unwrap();
            assert_eq!(parsed.level, *variant);
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(LogLevel::Debug);
        init(LogLevel::Error);
    }
}
