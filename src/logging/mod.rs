use crate::cli::TracingFormat;
use crate::config::Config;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Configure and initialize logging for the application.
///
/// `RUST_LOG` wins when set; otherwise dependencies log at `warn` and this
/// crate at the configured `LOG_LEVEL`.
pub fn setup_logging(config: &Config, tracing_format: TracingFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    match tracing_format {
        TracingFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).compact())
            .init(),
        TracingFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .init(),
    }
}

fn default_directives(level: &str) -> String {
    // Redis reconnect chatter is noise below warn.
    format!("warn,folio={level},redis=warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse() {
        let directives = default_directives("debug");
        assert_eq!(directives, "warn,folio=debug,redis=warn");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
