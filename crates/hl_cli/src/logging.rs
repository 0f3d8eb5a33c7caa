use hl_core::{Error, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber: stdout always, plus `log_file` when given.
/// The filter defaults to `info` and honours `RUST_LOG`. Later calls are no-ops.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| result = install(log_file));
    result
}

fn install(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_receives_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");

        init_logging(Some(&path)).unwrap();
        tracing::warn!("📡 logging smoke test");
        // A second call must not try to install another subscriber.
        init_logging(None).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("logging smoke test"));
    }
}
