//! Opt-in JSON-lines logging. Without the `trace` feature nothing is
//! installed and every `tracing` event is discarded at its callsite.

use std::io;
use std::path::Path;

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "ime_client=debug,ime_session=debug,ime_core=info";

/// Log file created under the directory given to [`init_tracing`].
pub const LOG_FILE_NAME: &str = "ime-client.jsonl";

#[cfg(feature = "trace")]
static INIT: std::sync::Once = std::sync::Once::new();

/// Install a JSON-lines subscriber writing to `log_dir/ime-client.jsonl`,
/// creating `log_dir` if needed. Later calls only check the directory.
/// A subscriber installed elsewhere first is left in place.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    INIT.call_once(|| {
        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        // Flushes on drop; the client logs until the process exits.
        std::mem::forget(guard);

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::fmt()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .with_env_filter(filter)
            .try_init();
        if installed.is_err() {
            tracing::warn!("a global subscriber is already installed; keeping it");
        }
    });
    Ok(())
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &Path) -> io::Result<()> {
    Ok(())
}
