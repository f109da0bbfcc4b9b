//! Configuration file watcher for hot reload.
//!
//! Watches the directory holding the file rather than the file itself, so
//! editors that save through a rename are still seen. Bursts of events for
//! one save collapse into a single update: a reload is only sent when the
//! parsed route table differs from the last one delivered.

use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: RouterConfig,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, whose contents are currently `current`.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, current: RouterConfig) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Keep the returned watcher alive for as long as
    /// updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let last = Mutex::new(self.current);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let Some(file_name) = path.file_name() else {
                        return;
                    };
                    if !is_reload_event(&event, file_name) {
                        return;
                    }
                    match load_config(&path) {
                        Ok(new_config) => {
                            let mut last = last.lock();
                            if *last == new_config {
                                tracing::debug!(path = ?path, kind = ?event.kind, "Config unchanged, skipping reload");
                                return;
                            }
                            tracing::info!(path = ?path, routes = new_config.routes.len(), "Config file changed, reloading");
                            *last = new_config.clone();
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current routes");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_dir(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Whether `event` may have changed the contents of `file_name`.
/// Metadata-only changes, reads and removals never trigger a reload.
fn is_reload_event(event: &Event, file_name: &OsStr) -> bool {
    let relevant_kind = match &event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    relevant_kind && event.paths.iter().any(|p| p.file_name() == Some(file_name))
}
