//! Trace output (spec §6).
//!
//! The original library kept a thread-local trace callback and level. This
//! crate replaces that with an ordinary [`tracing`] subscriber; the only
//! thing worth hand-rolling is the line format spec.md actually promises:
//! `LEVEL|thread-id|local-ISO-8601-timestamp|message`, ANSI-colored by level.
//! `tracing-subscriber`'s stock formatters get close but don't match the
//! literal level tags (`DEBG|INFO|WARN|CRIT`), so we supply a small
//! [`tracing_subscriber::fmt::FormatEvent`] impl instead of reaching for a
//! second color crate.

use std::fmt;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

fn level_tag(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::TRACE | Level::DEBUG => ("DEBG", "\x1b[36m"),
        Level::INFO => ("INFO", "\x1b[32m"),
        Level::WARN => ("WARN", "\x1b[33m"),
        Level::ERROR => ("CRIT", "\x1b[31m"),
    }
}

/// Event formatter producing the `LEVEL|thread|timestamp|msg` line shape.
pub struct TraceFormat;

impl<S, N> FormatEvent<S, N> for TraceFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let (tag, color) = level_tag(meta.level());
        let now = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        write!(
            writer,
            "{color}{tag}{RESET}{DIM}|{RESET}{thread_name}{DIM}|{RESET}{now}{DIM}|{RESET}"
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Sets a global subscriber using [`TraceFormat`], filtered by `trace_level`
/// (spec §4.9, 0..9 mapped onto the five `tracing` levels). Idempotent:
/// repeated calls after the first are no-ops, matching §9's guidance that
/// truly process-wide state gets an idempotent init function.
pub fn init(trace_level: u8) {
    let level = match trace_level {
        0 => Level::ERROR,
        1..=2 => Level::WARN,
        3..=5 => Level::INFO,
        6..=7 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .event_format(TraceFormat)
        .finish();

    // A second call to `init` would panic on the global default already
    // being set; ignore that to keep initialization idempotent.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
