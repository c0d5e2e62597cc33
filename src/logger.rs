use std::fmt;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

use crate::constants::{LOG_DIRECTORY, LOG_FILE_PREFIX};

/// Logs to stdout and to a daily rotated file under `logs/`. The returned
/// guard flushes the file writer on drop and must be held by `main`.
pub fn init_default_logger() -> eyre::Result<WorkerGuard> {
    std::fs::create_dir_all(LOG_DIRECTORY)?;

    let file_appender = tracing_appender::rolling::daily(LOG_DIRECTORY, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(LineFormatter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .event_format(LineFormatter);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(guard)
}

/// `2024-10-21 14:03:11 INFO  message key=value`
pub struct LineFormatter;

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(writer, "{timestamp} {:<5} ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
