use std::path::Path;
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Possible errors from logging initialization.
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    /// Log output file cannot be created.
    #[error("cannot create log output file")]
    IoError(#[from] std::io::Error),

    /// Global subscriber was already set.
    #[error("global tracing subscriber already initialized")]
    AlreadyInitialized,
}

/// Where a [`initialize`]d subscriber writes formatted log lines.
pub enum LogOutput<'a> {
    Stderr,
    File(&'a Path),
}

impl<'a> From<&'a str> for LogOutput<'a> {
    fn from(value: &'a str) -> Self {
        if value.is_empty() || value.eq_ignore_ascii_case("stderr") {
            LogOutput::Stderr
        } else {
            LogOutput::File(Path::new(value))
        }
    }
}

/// Initializes the global `tracing` subscriber for `app_name`.\
/// Returns a [`WorkerGuard`] that must be kept alive for the duration of the process:
/// dropping it flushes and detaches the non-blocking writer.
pub fn initialize(app_name: &str, log_level: &str, output: LogOutput<'_>) -> Result<WorkerGuard, LoggingError> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let (writer, guard) = match output {
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path.file_name().map_or_else(|| format!("{app_name}.log"), |n| n.to_string_lossy().into_owned());
            let appender = tracing_appender::rolling::never(dir, file_name);
            tracing_appender::non_blocking(appender)
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(BoxMakeWriter::new(writer))
        .with_target(true)
        .with_timer(timer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guard)
}
