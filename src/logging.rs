use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise logging at `info`, or `debug` when `debug` is set. The level can
/// only be overridden via `RUST_LOG` when debug logging is enabled.
///
/// When `log_file` is given, output is also appended to that file. Calling
/// this more than once is harmless; later calls are ignored.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(debug)))
    } else {
        EnvFilter::new(level(debug))
    };

    let file_layer = log_file.and_then(|path| {
        let file_name = path.file_name()?.to_owned();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name.to_string_lossy())
            .build(&dir);
        match appender {
            Ok(appender) => Some(fmt::layer().with_ansi(false).with_writer(appender)),
            Err(e) => {
                eprintln!("could not open log file in {}: {e}", dir.display());
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
}

fn level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::level;

    #[test]
    fn level_follows_debug_flag() {
        assert_eq!(level(true), "debug");
        assert_eq!(level(false), "info");
    }
}
