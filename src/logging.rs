use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};

const DEFAULT_LOG_SPEC: &str = "info";

/// Starts the stdout logger. `RUST_LOG` wins over `LOG_LEVEL`, which wins
/// over the default spec.
///
/// Keep the returned handle alive for as long as the process logs.
pub fn init_logging() -> Result<LoggerHandle, FlexiLoggerError> {
    let spec = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_SPEC.to_string());

    Logger::try_with_env_or_str(spec)?.log_to_stdout().start()
}
