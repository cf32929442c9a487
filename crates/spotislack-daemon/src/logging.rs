//! Tracing subscriber setup

use spotislack_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset: the configured one, raised by `-v`
pub fn default_directive(config: &LoggingConfig, verbose: u8) -> String {
    match verbose {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber; `RUST_LOG` wins over the configuration
pub fn init_tracing(config: &LoggingConfig, verbose: u8) {
    let directive = default_directive(config, verbose);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if config.format == "json" {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}
