use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use file_rotate::{
    ContentLimit, FileRotate,
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFileConfig, LogFormat, LoggingConfig};

// Keeps the non-blocking console worker alive for the whole process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Transport crates that flood DEBUG output.
const NOISY_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "tower", "rustls"];

// ================= rotating writer for files =================

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl<'a> fmt::MakeWriter<'a> for RotWriter {
    type Writer = RotWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RotWriterHandle(Arc::clone(&self.0))
    }
}

struct RotWriterHandle(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

fn max_size_bytes(file: &LogFileConfig) -> usize {
    file.max_size_mb
        .checked_mul(1024 * 1024)
        .and_then(|b| usize::try_from(b).ok())
        .unwrap_or(usize::MAX)
}

fn create_rotating_writer(file: &LogFileConfig) -> io::Result<RotWriter> {
    if let Some(parent) = file.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let rot = FileRotate::new(
        &file.path,
        AppendTimestamp::default(FileLimit::MaxFiles(file.max_backups)),
        ContentLimit::BytesSurpassed(max_size_bytes(file)),
        Compression::None,
        None,
    );
    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

// ================= targets =================

fn level_filter(level: Option<tracing::Level>) -> LevelFilter {
    level.map_or(LevelFilter::OFF, LevelFilter::from_level)
}

fn console_targets(cfg: &LoggingConfig) -> Targets {
    let default_level = level_filter(cfg.console_level);
    let mut targets = Targets::new().with_default(default_level);
    // Quiet unless the operator asked for more than DEBUG.
    if default_level < LevelFilter::TRACE {
        for crate_name in NOISY_CRATES {
            targets = targets.with_target(*crate_name, LevelFilter::WARN);
        }
    }
    targets
}

fn file_targets(file: &LogFileConfig) -> Targets {
    let mut targets = Targets::new().with_default(level_filter(file.file_level));
    for crate_name in NOISY_CRATES {
        targets = targets.with_target(*crate_name, LevelFilter::WARN);
    }
    targets
}

fn stderr_supports_ansi() -> bool {
    _ = enable_ansi_support::enable_ansi_support();
    supports_color::on(supports_color::Stream::Stderr).is_some_and(|level| level.has_basic)
}

// ================= init =================

/// Installs the global subscriber: a non-blocking stderr console layer (text
/// or JSON) and an optional size-rotated JSON file layer. `RUST_LOG`, when set,
/// caps both.
///
/// Calling it again after a subscriber is installed has no effect.
pub fn init(cfg: &LoggingConfig) {
    // Runs before the subscriber exists, so failures go to stderr.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env: Option<EnvFilter> = EnvFilter::try_from_default_env().ok();

    let (nb_stderr, guard) = tracing_appender::non_blocking(io::stderr());
    _ = CONSOLE_GUARD.set(guard);

    let console_filter = console_targets(cfg);
    let text_layer = (cfg.format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(nb_stderr.clone())
            .with_ansi(stderr_supports_ansi())
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(console_filter.clone())
    });
    let json_layer = (cfg.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(nb_stderr)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(console_filter)
    });

    let file_layer = cfg.file.as_ref().and_then(|file| {
        match create_rotating_writer(file) {
            Ok(writer) => Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_writer(writer)
                    .with_filter(file_targets(file)),
            ),
            Err(e) => {
                eprintln!(
                    "Failed to initialize log file '{}': {e}",
                    file.path.display()
                );
                None
            }
        }
    });

    let subscriber = Registry::default()
        .with(env)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer);

    _ = subscriber.try_init();
}
