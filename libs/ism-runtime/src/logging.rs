//! Logging sink setup (spec §6 `logging.*`, §10.1).
//!
//! Scoped down from the teacher's multi-crate `MultiFileRouter` (which routes log
//! records to different files by crate-name prefix, for a multi-module REST server) to
//! this crate's simpler need: one level, one optional file under
//! `<run_dir>/log/<logging.file>`, and a `propagate` flag controlling whether a second
//! stdout layer is also installed.

use crate::config::LoggingConfig;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Maps the spec's level names onto `tracing::Level`. `CRITICAL` has no `tracing`
/// counterpart and is mapped onto `ERROR`, the closest available severity.
pub fn parse_level(s: &str) -> Level {
    match s.to_ascii_uppercase().as_str() {
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARNING" | "WARN" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[derive(Clone)]
struct RotatingWriter(Arc<Mutex<FileRotate<AppendCount>>>);

impl RotatingWriter {
    fn at_path(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rotate = FileRotate::new(
            path,
            AppendCount::new(3),
            ContentLimit::Bytes(10 * 1024 * 1024),
            file_rotate::compression::Compression::None,
            #[cfg(unix)]
            None,
        );
        Ok(Self(Arc::new(Mutex::new(rotate))))
    }
}

impl std::io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("rotating writer lock poisoned").write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().expect("rotating writer lock poisoned").flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = Self;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Installs the global `tracing` subscriber per `cfg`, bridging any dependency still
/// emitting via the `log` facade (`tracing_log::LogTracer`). Falls back to a bare
/// console subscriber when `cfg` is `None`, matching the teacher's
/// "falls back to default logging when config is empty" behaviour.
pub fn init_logging_from_config(cfg: Option<&LoggingConfig>, run_dir: &Path) {
    let _ = tracing_log::LogTracer::init();

    let Some(cfg) = cfg else {
        init_default_logging();
        return;
    };

    let level = parse_level(&cfg.level);
    let filter = EnvFilter::new(level.to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match &cfg.file {
        Some(filename) => {
            let log_path = run_dir.join("log").join(filename);
            match RotatingWriter::at_path(&log_path) {
                Ok(writer) => {
                    let file_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer);
                    if cfg.propagate {
                        let _ = registry
                            .with(file_layer)
                            .with(tracing_subscriber::fmt::layer())
                            .try_init();
                    } else {
                        let _ = registry.with(file_layer).try_init();
                    }
                }
                Err(e) => {
                    // Can't create the log file: fall back to console-only so the
                    // engine still has a working logging sink.
                    let _ = registry.with(tracing_subscriber::fmt::layer()).try_init();
                    tracing::error!(error = %e, path = %log_path.display(), "failed to open log file");
                }
            }
        }
        None => {
            let _ = registry.with(tracing_subscriber::fmt::layer()).try_init();
        }
    }
}

/// Bare console subscriber, used when no `LoggingConfig` is supplied at all.
pub fn init_default_logging() {
    let _ = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_maps_critical_to_error() {
        assert_eq!(parse_level("CRITICAL"), Level::ERROR);
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn rotating_writer_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("engine.log");
        let _writer = RotatingWriter::at_path(&path).unwrap();
        assert!(path.parent().unwrap().exists());
    }
}
