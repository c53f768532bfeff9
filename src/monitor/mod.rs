use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Watches a working copy and reports edits that can change its status.
pub struct FileMonitor {
    // Dropping the watcher stops the notifications.
    _watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<FileEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Create,
    Modify,
    Delete,
}

impl FileMonitor {
    pub fn new(root: &Path) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watch_root = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("File watch error: {}", e);
                        return;
                    }
                };

                let kind = match event.kind {
                    EventKind::Create(_) => FileEventKind::Create,
                    EventKind::Modify(_) => FileEventKind::Modify,
                    EventKind::Remove(_) => FileEventKind::Delete,
                    _ => return,
                };

                for path in event.paths {
                    if is_relevant(&watch_root, &path) {
                        let _ = event_tx.send(FileEvent { path, kind });
                    }
                }
            },
            Config::default()
                .with_poll_interval(Duration::from_secs(1))
                .with_compare_contents(false),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!("Watching {:?} for changes", root);

        Ok(Self {
            _watcher: watcher,
            event_rx,
        })
    }

    /// Drains pending events; true when at least one arrived.
    pub fn try_drain(&mut self) -> bool {
        let mut seen = 0usize;
        while let Ok(event) = self.event_rx.try_recv() {
            tracing::trace!("File event {:?} on {:?}", event.kind, event.path);
            seen += 1;
        }
        if seen > 0 {
            tracing::debug!("Coalesced {} file events", seen);
        }
        seen > 0
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Option<FileEvent> {
        self.event_rx.recv().await
    }
}

/// Changes inside `.git` are our own index writes and lock files.
pub fn is_relevant(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    !relative
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
}

impl Drop for FileMonitor {
    fn drop(&mut self) {
        tracing::info!("File monitor stopped");
    }
}
