// src/logging.rs
use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Target of trade ledger events (buys, sells, realized P/L).
pub const LEDGER: &str = "ledger";

/// Console output plus two daily-rolling files: `ledger.log` with trades only and
/// `trace.log` with everything this crate emits at DEBUG and above.
/// The returned guards flush the file writers on drop and must outlive the runtime.
pub fn init(log_dir: &str) -> Result<Vec<WorkerGuard>> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Cannot create log directory {}", log_dir))?;

    let (ledger_writer, ledger_guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, "ledger.log"));
    let (trace_writer, trace_guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, "trace.log"));

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pump_sniper=debug"));

    let ledger_filter = Targets::new().with_target(LEDGER, Level::INFO);
    let trace_filter = Targets::new()
        .with_target(env!("CARGO_PKG_NAME"), Level::DEBUG)
        .with_target(LEDGER, Level::INFO)
        .with_default(Level::WARN);

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_filter(console_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(ledger_writer)
                .with_filter(ledger_filter),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(trace_writer)
                .with_filter(trace_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(vec![ledger_guard, trace_guard])
}
