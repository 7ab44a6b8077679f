use std::{env, fs, panic, path::PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

pub fn init_tracing(app_name: &str) -> TracingGuards {
    // RUST_LOG wins over the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the report
    let console = fmt::layer().with_writer(std::io::stderr);
    let (file, guard) = match rolling_writer(app_name) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    let subscriber = Registry::default().with(filter).with(console).with(file);
    let _ = tracing::subscriber::set_global_default(subscriber);
    TracingGuards { _file_guard: guard }
}

fn rolling_writer(app_name: &str) -> Option<(NonBlocking, WorkerGuard)> {
    let log_root = log_root(app_name)?;
    fs::create_dir_all(&log_root).ok()?;
    // daily() panics when the directory is not writable
    let appender = panic::catch_unwind(|| {
        tracing_appender::rolling::daily(&log_root, format!("{app_name}.log"))
    })
    .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

// File logging only when LOG_DIR is set.
fn log_root(app_name: &str) -> Option<PathBuf> {
    let dir = env::var("LOG_DIR").ok().filter(|value| !value.trim().is_empty())?;
    Some(PathBuf::from(dir).join(app_name))
}
