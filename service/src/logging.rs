use crate::config::Config;
use log::LevelFilter;
use simplelog::{ConfigBuilder, SharedLogger, TermLogger, TerminalMode};

/// Dependencies whose logs are suppressed below `TRACE`.
const FILTERED_MODULES: &[&str] = &[
    "sqlx",
    "sea_orm",
    "tower",
    "tracing",
    "hyper",
    "axum",
    "tungstenite",
];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at the configured level.
    ///
    /// At `TRACE` every module logs, including dependencies. At any other
    /// level the modules in `FILTERED_MODULES` are silenced.
    pub fn init_logger(config: &Config) -> Result<(), log::SetLoggerError> {
        simplelog::CombinedLogger::init(vec![Self::term_logger(config.log_level_filter)])
    }

    fn term_logger(level: LevelFilter) -> Box<dyn SharedLogger> {
        TermLogger::new(
            level,
            Self::build_log_config(Self::should_filter_dependencies(level)),
            TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noisy_dependencies_are_filtered() {
        for module in ["sqlx", "sea_orm", "axum", "hyper", "tungstenite"] {
            assert!(
                FILTERED_MODULES.contains(&module),
                "{module} should be filtered"
            );
        }
    }

    #[test]
    fn trace_level_disables_filtering() {
        assert!(!Logger::should_filter_dependencies(LevelFilter::Trace));
    }

    #[test]
    fn other_levels_enable_filtering() {
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(Logger::should_filter_dependencies(level), "{level} should filter");
        }
    }

    #[test]
    fn term_logger_reports_its_level() {
        let logger = Logger::term_logger(LevelFilter::Debug);

        assert_eq!(logger.level(), LevelFilter::Debug);
    }
}
