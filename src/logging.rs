use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LoggingConfig, log_file_name};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When file logging is enabled
/// the returned guard must be held until exit so buffered lines are flushed.
pub fn init(config: &LoggingConfig, log_dir: &Path) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let (writer, guard) = if config.file {
        std::fs::create_dir_all(log_dir)?;
        let appender = tracing_appender::rolling::never(log_dir, log_file_name());
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (BoxMakeWriter::new(writer), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stderr), None)
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Console => fmt::layer()
            .with_writer(writer)
            .with_ansi(!config.file)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()?;

    Ok(guard)
}
