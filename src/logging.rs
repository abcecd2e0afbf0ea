use std::path::Path;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Initialise logging. With `debug` the level is `debug` unless `RUST_LOG`
/// overrides it; otherwise it is fixed at `info`.
///
/// When `log_file` is given, output goes to that file as well as stderr.
/// Calling this more than once keeps the first subscriber.
pub fn init(debug: bool, log_file: Option<&Path>) {
    // Without debug logging `RUST_LOG` is ignored so a stray variable in the
    // user's environment cannot turn on hook tracing.
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let file_appender = log_file.and_then(|path| {
        let file_name = path.file_name()?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Some(tracing_appender::rolling::never(dir, file_name))
    });
    let file_skipped = log_file.is_some() && file_appender.is_none();

    let _ = match file_appender {
        Some(appender) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::io::stderr.and(appender))
            .try_init(),
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if file_skipped {
        tracing::warn!(
            path = ?log_file,
            "log file path has no file name, logging to stderr only"
        );
    }
}
