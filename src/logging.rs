// logging.rs — Diagnostic log for the injected DLL.
//
// The game owns stdout/stderr (usually there are none), so events go to a file
// next to the DLL. Everything in the crate logs through `tracing`; this module
// only installs the subscriber.

use crate::config::OverlayConfig;
use once_cell::sync::OnceCell;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Path of the active log file, set by the first successful `init`.
static LOG_PATH: OnceCell<PathBuf> = OnceCell::new();

/// Where the log goes: `dir/<log_file_name>`, or the working directory when
/// the DLL's directory is unknown.
pub fn log_path(config: &OverlayConfig, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.join(&config.log_file_name),
        None => PathBuf::from(&config.log_file_name),
    }
}

/// Install the file subscriber. Later calls are no-ops and return the path
/// chosen by the first one.
pub fn init(config: &OverlayConfig, dir: Option<&Path>) -> std::io::Result<&'static Path> {
    LOG_PATH
        .get_or_try_init(|| {
            let path = log_path(config, dir);
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            let filter = EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new("info"));
            // Another subscriber may already be installed by the host or a test
            // harness; ours then simply stays unused.
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_ids(true)
                .try_init();
            Ok(path)
        })
        .map(PathBuf::as_path)
}

/// Path of the active log file, if logging was initialised.
pub fn current_path() -> Option<&'static Path> {
    LOG_PATH.get().map(PathBuf::as_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_sits_in_given_directory() {
        let cfg = OverlayConfig::default();
        let dir = Path::new("/opt/game/plugins");
        assert_eq!(log_path(&cfg, Some(dir)), dir.join("dialog_overlay.log"));
        assert_eq!(log_path(&cfg, None), PathBuf::from("dialog_overlay.log"));
    }

    #[test]
    fn init_is_idempotent() {
        let dir = std::env::temp_dir();
        let cfg = OverlayConfig::default();
        let first = init(&cfg, Some(&dir)).unwrap();
        let other = OverlayConfig {
            log_file_name: "other.log".into(),
            ..OverlayConfig::default()
        };
        let second = init(&other, Some(&dir)).unwrap();
        assert_eq!(first, second);
        assert_eq!(current_path(), Some(first));
        tracing::info!("logging initialised");
    }
}
