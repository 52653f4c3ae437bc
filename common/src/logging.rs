//! Common logging initializer
//!
//! Everything goes to `stderr` (or to a file), `stdout` is reserved for the data we produce.
//!

use eyre::Result;
use tracing::trace;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_tree::HierarchicalLayer;

/// Keep this alive as long as we want the file logger to be flushed.
///
#[derive(Default)]
pub struct LogGuard {
    file: Option<WorkerGuard>,
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard")
            .field("file", &self.file.is_some())
            .finish()
    }
}

#[tracing::instrument]
pub fn init_logging(name: &'static str, use_tree: bool, use_file: Option<String>) -> Result<LogGuard> {
    // Initialise logging early
    //
    // Load filters from environment
    //
    let filter = EnvFilter::from_default_env();

    // Do we want hierarchical output?
    //
    let (tree, plain) = if use_tree {
        (
            Some(
                HierarchicalLayer::new(2)
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_span_retrace(true)
                    .with_span_modes(true)
                    .with_targets(true)
                    .with_verbose_entry(true)
                    .with_verbose_exit(true)
                    .with_bracketed_fields(true),
            ),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(true)
                    .with_target(false)
                    .compact(),
            ),
        )
    };

    // Log to file?
    //
    let mut guard = LogGuard::default();
    let file = match use_file {
        Some(dir) => {
            // Basic append-only rolling file for all traces.
            //
            let file_appender = tracing_appender::rolling::hourly(dir, name);
            let (writer, wg) = tracing_appender::non_blocking(file_appender);
            guard.file = Some(wg);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    // Combine filters & exporters
    //
    tracing_subscriber::registry()
        .with(filter)
        .with(tree)
        .with(plain)
        .with(file)
        .try_init()?;

    trace!("Logging initialised.");
    Ok(guard)
}

/// Flush whatever is pending and release the file writer.
///
#[tracing::instrument(skip(guard))]
pub fn close_logging(guard: LogGuard) {
    trace!("Logging closed.");
    drop(guard);
}
