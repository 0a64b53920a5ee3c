//! Process-wide logging setup.
//!
//! [`init_with_level`] installs a stderr logger for the `log` facade, lines
//! look like `[   1.042s  INFO driver] message`. With the `tracing` feature,
//! [`init_tracing`] installs a `tracing-subscriber` instead.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, fmt::format::FmtSpan, util::SubscriberInitExt, EnvFilter};

struct SessionLogger {
    max_level: LevelFilter,
    origin: Instant,
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Module name only, `ringscore::driver` -> `driver`.
        let module = record
            .target()
            .rsplit("::")
            .next()
            .unwrap_or_default();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{:>8.3}s {:>5} {module}] {}",
            self.origin.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static SESSION_LOGGER: OnceLock<SessionLogger> = OnceLock::new();

/// Route `log` records at or above `level` to stderr.
///
/// Only the first call installs the logger; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if SESSION_LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = SESSION_LOGGER.get_or_init(|| SessionLogger {
        max_level: level,
        origin: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`),
/// emitting span close events, optionally as JSON lines.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
