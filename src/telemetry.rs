//! Logging setup for the `tracker` binary.

use std::path::{Path, PathBuf};

use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, LoggingSection};

pub const LOG_ENV_VAR: &str = "TRACKER_LOG";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the non-blocking file writer alive. Drop it last.
pub struct TelemetryGuard {
    _guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. `verbose` raises the default level to `debug`.
///
/// Calling this twice keeps the first subscriber.
pub fn init(logging: &LoggingSection, log_file: Option<PathBuf>, verbose: bool) -> TelemetryGuard {
    let filter = build_filter(&logging.level, verbose);

    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(logging.format)];

    let mut file_error = None;
    if let Some(path) = log_file {
        match file_layer(&path, logging.format) {
            Ok((layer, guard)) => {
                layers.push(layer);
                guards.push(guard);
            }
            Err(e) => file_error = Some(format!("log file init failed for {}: {}", path.display(), e)),
        }
    }

    let _ = subscriber(filter, layers).try_init();

    if let Some(error) = file_error {
        tracing::warn!("{}", error);
    }
    TelemetryGuard { _guards: guards }
}

/// The filter wraps every output layer, so each sink sees the same events.
fn subscriber(filter: EnvFilter, layers: Vec<BoxedLayer>) -> impl tracing::Subscriber + Send + Sync {
    Registry::default().with(layers.with_filter(filter))
}

/// `TRACKER_LOG` wins over the configured level.
fn build_filter(level: &str, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return filter;
    }
    let level = if verbose { "debug" } else { level };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true),
        ),
    }
}

fn file_layer(
    path: &Path,
    format: LogFormat,
) -> std::io::Result<(BoxedLayer, tracing_appender::non_blocking::WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "tracker.log".into());
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer: BoxedLayer = match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true),
        ),
    };
    Ok((layer, guard))
}
