use std::sync::Once;

use log::LevelFilter;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "kiln_engine=trace,wgpu=warn"). When it is `None`, `RUST_LOG` is read
/// instead, and `default_level` applies if that is unset too.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    pub default_level: LevelFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            default_level: LevelFilter::Info,
        }
    }
}

/// Builds, but does not install, a logger for `config`.
pub fn build_logger(config: &LoggingConfig) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();

    let filter = config
        .env_filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok());

    match filter {
        Some(filter) => {
            builder.parse_filters(&filter);
        }
        None => {
            builder.filter_level(config.default_level);
        }
    }

    builder.write_style(config.write_style);
    builder
}

static INIT: Once = Once::new();

/// Installs the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        if let Err(e) = build_logger(&config).try_init() {
            // Another logger got there first (tests, embedding host).
            eprintln!("kiln-engine: logger not installed: {e}");
            return;
        }
        log::debug!("logging initialized");
    });
}
