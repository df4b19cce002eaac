//! Hot-reload of the definitions file.
//!
//! - `notify` watches the definitions file's directory
//! - events are queued on a channel and drained from the tick thread via
//!   [`DefinitionWatcher::poll`], so reloads never race a tick
//! - a reload builds a complete new registry first; on failure the current
//!   registry stays in place
//! - the swap disposes the old registry's hook bindings

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::NpcError;
use crate::loader::DefinitionLoader;
use crate::registry::RegistryHandle;

/// Reload bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    /// Seconds since the Unix epoch
    pub last_reload_time: f64,
    pub last_error: Option<String>,
    pub definitions_loaded: usize,
}

impl HotReloadState {
    fn record(&mut self, result: &Result<usize, NpcError>) {
        self.last_reload_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        match result {
            Ok(loaded) => {
                self.reload_count += 1;
                self.last_reload_success = true;
                self.last_error = None;
                self.definitions_loaded = *loaded;
            }
            Err(err) => {
                self.last_reload_success = false;
                self.last_error = Some(err.to_string());
            }
        }
    }
}

/// Serializable view of the reload state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadStatus {
    pub enabled: bool,
    pub watched_file: Option<String>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_reload_time: f64,
    pub last_error: Option<String>,
    pub definitions_loaded: usize,
}

impl ReloadStatus {
    pub fn from_state(state: &HotReloadState) -> Self {
        Self {
            enabled: state.enabled,
            watched_file: state.watched_file.as_ref().map(|p| p.display().to_string()),
            reload_count: state.reload_count,
            last_reload_success: state.last_reload_success,
            last_reload_time: state.last_reload_time,
            last_error: state.last_error.clone(),
            definitions_loaded: state.definitions_loaded,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Load definitions and swap them into `handle`. The old registry stays
/// installed when loading fails.
pub fn reload(loader: &DefinitionLoader, handle: &RegistryHandle) -> Result<usize, NpcError> {
    let registry = loader.load()?;
    let loaded = registry.len();
    handle.replace(registry);
    Ok(loaded)
}

pub struct DefinitionWatcher {
    loader: DefinitionLoader,
    handle: Arc<RegistryHandle>,
    state: HotReloadState,
    watcher: Option<(RecommendedWatcher, Receiver<notify::Result<Event>>)>,
}

impl DefinitionWatcher {
    /// Reload manually only; call [`watch`](Self::watch) to follow the file.
    pub fn new(loader: DefinitionLoader, handle: Arc<RegistryHandle>) -> Self {
        let state = HotReloadState {
            watched_file: Some(loader.path().to_path_buf()),
            ..HotReloadState::default()
        };
        Self {
            loader,
            handle,
            state,
            watcher: None,
        }
    }

    /// Start watching the definitions file's directory.
    pub fn watch(&mut self) -> Result<(), NpcError> {
        let path = self.loader.path();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), "Hot-reload enabled for custom NPC definitions");
        self.state.enabled = true;
        self.watcher = Some((watcher, rx));
        Ok(())
    }

    pub fn state(&self) -> &HotReloadState {
        &self.state
    }

    pub fn status(&self) -> ReloadStatus {
        ReloadStatus::from_state(&self.state)
    }

    pub fn loader(&self) -> &DefinitionLoader {
        &self.loader
    }

    /// Reload now, regardless of file events.
    pub fn reload(&mut self) -> Result<usize, NpcError> {
        let result = reload(&self.loader, &self.handle);
        self.state.record(&result);
        match &result {
            Ok(loaded) => info!(loaded, count = self.state.reload_count, "Definitions reloaded"),
            Err(err) => error!(error = %err, "Definitions reload failed"),
        }
        result
    }

    /// Drain pending file events; reload at most once. Returns whether a
    /// reload was attempted.
    pub fn poll(&mut self) -> bool {
        let Some((_, rx)) = &self.watcher else {
            return false;
        };

        let mut changed = false;
        while let Ok(result) = rx.try_recv() {
            match result {
                Ok(event) => changed |= is_definitions_event(&event, self.loader.path()),
                Err(err) => warn!(error = %err, "File watcher error"),
            }
        }
        if changed {
            info!("Definitions file modified, reloading...");
            // Failure is recorded in the state and logged.
            let _ = self.reload();
        }
        changed
    }
}

/// Modification or creation of the watched definitions file
fn is_definitions_event(event: &Event, watched: &Path) -> bool {
    let Some(file_name) = watched.file_name() else {
        return false;
    };
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == Some(file_name))
}
