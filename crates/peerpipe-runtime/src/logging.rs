//! Logging setup for peerpipe services.
//!
//! Installs a `tracing-subscriber` registry described by [`LoggingConfig`].
//! The pipe emits a `dispatch` span per inbound request and a `send` span
//! per outbound request; enable `span_events` to see their lifecycles.
//!
//! `RUST_LOG`, when set, replaces the configured base level. Per-module
//! `filters` are always added on top.

use std::ffi::OsStr;
use std::path::Path;

use tracing::warn;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "peerpipe.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Installs the global subscriber, leaving an existing one in place.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = try_init_from_config(config);
}

/// Installs the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn try_init_from_config(config: &LoggingConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(env_filter(config))
        .try_init()
}

fn fmt_layer(config: &LoggingConfig) -> BoxedLayer {
    let writer = make_writer(config);
    let spans = fmt_span(&config.span_events);

    match config.format {
        #[cfg(feature = "json-log")]
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(spans)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_span_events(spans)
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Full => fmt::layer()
            .with_span_events(spans)
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_span_events(spans)
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location)
            .with_writer(writer)
            .boxed(),
    }
}

fn make_writer(config: &LoggingConfig) -> BoxMakeWriter {
    match (config.output, config.file_path.as_deref()) {
        (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
        (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
        (LogOutput::File, Some(path)) => BoxMakeWriter::new(file_appender(path, config.rotation)),
        (LogOutput::File, None) => {
            warn!("File output requested but no file path configured, falling back to stdout");
            BoxMakeWriter::new(std::io::stdout)
        }
    }
}

fn file_appender(path: &Path, rotation: LogRotation) -> RollingFileAppender {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
    match rotation {
        LogRotation::Never => tracing_appender::rolling::never(dir, name),
        LogRotation::Hourly => tracing_appender::rolling::hourly(dir, name),
        LogRotation::Daily => tracing_appender::rolling::daily(dir, name),
    }
}

fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

/// Per-module directives, e.g. `peerpipe_transport=trace`.
fn filter_directives(config: &LoggingConfig) -> Vec<String> {
    let mut directives: Vec<String> = config
        .filters
        .iter()
        .map(|(module, level)| format!("{module}={level}"))
        .collect();
    directives.sort();
    directives
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    for directive in filter_directives(config) {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => warn!(%directive, error = %e, "Ignoring invalid log filter"),
        }
    }
    filter
}
