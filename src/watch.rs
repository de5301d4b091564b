use anyhow::{anyhow, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
};

/// Watches the loaded config file so theme edits apply without a restart.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    changes_rx: Receiver<notify::Result<notify::Event>>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Config file {} does not exist", path.display()));
        }
        // Editors often replace the file, so watch the directory instead.
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %path.display(), "watching config");

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            changes_rx: rx,
        })
    }

    /// Drains pending events; true if any touched the config file.
    pub fn poll_changed(&self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.changes_rx.try_recv() {
            match event {
                Ok(evt) => {
                    if evt.paths.iter().any(|p| is_same_file(p, &self.path)) {
                        changed = true;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "config watcher error"),
            }
        }
        changed
    }
}

fn is_same_file(event_path: &Path, watched: &Path) -> bool {
    if event_path == watched {
        return true;
    }
    match (event_path.canonicalize(), watched.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => event_path.file_name() == watched.file_name(),
    }
}
