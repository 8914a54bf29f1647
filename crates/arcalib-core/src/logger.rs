//! Stderr logger for the command-line tools.
//!
//! Every record is printed as `[elapsed LEVEL module] message`. Records from
//! crates outside the workspace are shown only at `Trace` so that image
//! decoders do not drown the frame loop output.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const WORKSPACE_PREFIX: &str = "arcalib";

struct FrameLogger {
    level: LevelFilter,
    started: Instant,
}

impl FrameLogger {
    fn short_target<'a>(&self, target: &'a str) -> &'a str {
        target.rsplit("::").next().unwrap_or(target)
    }
}

impl Log for FrameLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() > self.level {
            return false;
        }
        metadata.target().starts_with(WORKSPACE_PREFIX) || self.level == LevelFilter::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            self.short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<FrameLogger> = OnceLock::new();

/// Install the frame logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| FrameLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber; `RUST_LOG` overrides the default `info`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_target_strips_module_path() {
        let logger = FrameLogger {
            level: LevelFilter::Info,
            started: Instant::now(),
        };
        assert_eq!(logger.short_target("arcalib_session::trigger"), "trigger");
        assert_eq!(logger.short_target("arcalib"), "arcalib");
    }

    #[test]
    fn foreign_targets_hidden_below_trace() {
        let logger = FrameLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        let ours = Metadata::builder()
            .level(log::Level::Info)
            .target("arcalib_session::session")
            .build();
        let foreign = Metadata::builder()
            .level(log::Level::Info)
            .target("png::decoder")
            .build();
        assert!(logger.enabled(&ours));
        assert!(!logger.enabled(&foreign));
    }
}
