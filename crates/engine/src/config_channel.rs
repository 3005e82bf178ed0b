//! Validated configuration channel and file watcher.
//!
//! Readers hold the [`SharedConfig`] pointer and `load()` it per query or
//! per cycle; updates are validated first and swapped in whole, so a reader
//! never sees a half-applied or invalid config. Restart-only fields keep
//! their running values until the process restarts.

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use launchdex_core::{EngineConfig, Error, Result};
use launchdex_search::SharedConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of an accepted configuration update.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    /// Config before the update
    pub previous: Arc<EngineConfig>,
    /// Config now published
    pub current: Arc<EngineConfig>,
    /// Restart-only fields that changed in the proposal but were kept
    pub restart_required: Vec<&'static str>,
}

impl ConfigUpdate {
    /// True when discovery or exclusion roots changed
    pub fn discovery_changed(&self) -> bool {
        self.previous.root_set() != self.current.root_set()
            || self.previous.exclude_set() != self.current.exclude_set()
    }
}

/// Holder of the live, validated configuration.
pub struct ConfigChannel {
    current: SharedConfig,
    revision: AtomicU64,
    last_rejection: Mutex<Option<String>>,
}

impl ConfigChannel {
    /// Start from a validated config.
    pub fn new(initial: EngineConfig) -> Result<Self> {
        initial.validate()?;
        Ok(ConfigChannel {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            revision: AtomicU64::new(0),
            last_rejection: Mutex::new(None),
        })
    }

    /// Pointer shared with the search engine and indexer
    pub fn shared(&self) -> SharedConfig {
        Arc::clone(&self.current)
    }

    /// The current config
    pub fn load(&self) -> Arc<EngineConfig> {
        self.current.load_full()
    }

    /// Number of accepted updates
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Reason the most recent proposal was rejected, cleared on success
    pub fn last_rejection(&self) -> Option<String> {
        self.last_rejection.lock().clone()
    }

    /// Validate and publish `next`.
    ///
    /// # Errors
    ///
    /// `Error::ConfigValidation` if `next` is out of range; the running
    /// config stays in place.
    pub fn propose(&self, next: EngineConfig) -> Result<ConfigUpdate> {
        if let Err(e) = next.validate() {
            self.reject(e.to_string());
            return Err(e.into());
        }

        let previous = self.current.load_full();
        let restart_required = previous.restart_required_changes(&next);
        let next = if restart_required.is_empty() {
            next
        } else {
            info!(
                target: "launchdex::config",
                fields = ?restart_required,
                "Restart required for changed fields; keeping running values"
            );
            next.with_restart_fields_from(&previous)
        };

        let current = Arc::new(next);
        self.current.store(Arc::clone(&current));
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_rejection.lock() = None;
        info!(target: "launchdex::config", revision, "Configuration updated");

        Ok(ConfigUpdate {
            previous,
            current,
            restart_required,
        })
    }

    /// Parse TOML text and propose it.
    pub fn propose_toml(&self, content: &str) -> Result<ConfigUpdate> {
        match EngineConfig::from_toml_str(content) {
            Ok(next) => self.propose(next),
            Err(e) => {
                self.reject(e.to_string());
                Err(e)
            }
        }
    }

    fn reject(&self, reason: String) {
        warn!(
            target: "launchdex::config",
            reason = %reason,
            "Configuration rejected; keeping previous"
        );
        *self.last_rejection.lock() = Some(reason);
    }
}

impl std::fmt::Debug for ConfigChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigChannel")
            .field("revision", &self.revision())
            .field("last_rejection", &self.last_rejection())
            .finish()
    }
}

// ============================================================================
// ConfigWatcher
// ============================================================================

/// Quiet period after the last file event before the config is re-read
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches the config file and proposes its contents after every change.
///
/// The parent directory is watched through `notify`, so editors that save
/// by writing a temp file and renaming it over the original are seen too.
/// Bursts of events are folded into one re-read once `debounce` passes
/// without further events. Content identical to the last read is not
/// proposed again.
pub struct ConfigWatcher {
    watcher: Option<RecommendedWatcher>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ConfigWatcher {
    /// Watch `path`, proposing its contents to `channel` on every change.
    ///
    /// `on_update` runs on the watcher thread after each accepted update.
    ///
    /// # Errors
    ///
    /// `Error::ConfigWatch` if the parent directory cannot be watched,
    /// `Error::StoreIo` if the thread cannot be spawned.
    pub fn spawn<F>(
        path: PathBuf,
        channel: Arc<ConfigChannel>,
        debounce: Duration,
        on_update: F,
    ) -> Result<Self>
    where
        F: Fn(&ConfigUpdate) + Send + 'static,
    {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| Error::ConfigWatch(format!("{} names no file", path.display())))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = unbounded::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| {
                let _ = event_tx.send(event);
            },
            notify::Config::default(),
        )
        .map_err(watch_error)?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let reloader = Reloader {
            last_content: std::fs::read_to_string(&path).ok(),
            path,
            channel,
        };
        let thread = thread::Builder::new()
            .name("launchdex-config".to_string())
            .spawn(move || {
                watch_loop(reloader, &file_name, debounce, &event_rx, &stop_rx, on_update)
            })
            .map_err(Error::StoreIo)?;

        Ok(ConfigWatcher {
            watcher: Some(watcher),
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stop watching and join the thread. Idempotent.
    pub fn stop(&mut self) {
        drop(self.watcher.take());
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(target: "launchdex::config", "Config watcher exited abnormally");
            }
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("running", &self.thread.is_some())
            .finish()
    }
}

fn watch_error(e: notify::Error) -> Error {
    Error::ConfigWatch(e.to_string())
}

fn watch_loop<F>(
    mut reloader: Reloader,
    file_name: &OsString,
    debounce: Duration,
    events: &Receiver<notify::Result<Event>>,
    stop: &Receiver<()>,
    on_update: F,
) where
    F: Fn(&ConfigUpdate),
{
    loop {
        select! {
            recv(stop) -> _ => return,
            recv(events) -> msg => match msg {
                Ok(Ok(event)) if touches(&event, file_name) => {}
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => {
                    warn!(target: "launchdex::config", error = %e, "Config watch error");
                    continue;
                }
                Err(_) => return,
            },
        }

        // Let the burst settle.
        loop {
            select! {
                recv(stop) -> _ => return,
                recv(events) -> msg => {
                    if msg.is_err() {
                        return;
                    }
                }
                default(debounce) => break,
            }
        }

        if let Some(update) = reloader.reload() {
            on_update(&update);
        }
    }
}

/// True for non-access events that name the config file.
fn touches(event: &Event, file_name: &OsString) -> bool {
    !matches!(event.kind, EventKind::Access(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

struct Reloader {
    path: PathBuf,
    channel: Arc<ConfigChannel>,
    last_content: Option<String>,
}

impl Reloader {
    /// Re-read the file and propose it if its content changed.
    fn reload(&mut self) -> Option<ConfigUpdate> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    target: "launchdex::config",
                    path = %self.path.display(),
                    "Config file missing"
                );
                return None;
            }
            Err(e) => {
                warn!(
                    target: "launchdex::config",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read config file"
                );
                return None;
            }
        };
        if self.last_content.as_deref() == Some(content.as_str()) {
            return None;
        }
        let update = self.channel.propose_toml(&content).ok();
        self.last_content = Some(content);
        update
    }
}
