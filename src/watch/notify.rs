//! [`WatchFileSystem`] backed by the `notify` crate.
//!
//! ```text
//! notify ─► channel ─► aggregator thread ─► on_invalid (first event)
//!                                       └─► on_change (quiet for `delay`)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};

use super::{ChangeCallback, InvalidCallback, WatchFileSystem, Watcher};
use crate::error::{BuildError, Result};
use crate::fs::{Timestamps, millis};

/// How often the aggregator checks whether it was closed.
const POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyWatchFileSystem;

impl NotifyWatchFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl WatchFileSystem for NotifyWatchFileSystem {
    fn watch(
        &self,
        files: Vec<PathBuf>,
        dirs: Vec<PathBuf>,
        start_time: u64,
        delay: Duration,
        on_change: ChangeCallback,
        on_invalid: InvalidCallback,
    ) -> Result<Box<dyn super::Watcher>> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(watch_error)?;

        // Paths may vanish between the build and the subscription.
        for file in files.iter().filter(|f| f.exists()) {
            watcher
                .watch(file, RecursiveMode::NonRecursive)
                .map_err(watch_error)?;
        }
        for dir in dirs.iter().filter(|d| d.exists()) {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(watch_error)?;
        }
        crate::debug!("watch"; "watching {} files, {} directories", files.len(), dirs.len());

        let stop = Arc::new(AtomicBool::new(false));
        let aggregator = Aggregator {
            files,
            dirs,
            start_time,
            delay,
            stop: Arc::clone(&stop),
        };
        std::thread::Builder::new()
            .name("weft-watch".into())
            .spawn(move || aggregator.run(rx, on_change, on_invalid))
            .map_err(|e| BuildError::Watch(e.to_string()))?;

        Ok(Box::new(NotifyWatcher {
            inner: Some(watcher),
            stop,
        }))
    }
}

fn watch_error(err: notify::Error) -> BuildError {
    BuildError::Watch(err.to_string())
}

struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
    stop: Arc<AtomicBool>,
}

impl Watcher for NotifyWatcher {
    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.inner.take();
    }
}

impl Drop for NotifyWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

struct Aggregator {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    start_time: u64,
    delay: Duration,
    stop: Arc<AtomicBool>,
}

impl Aggregator {
    fn run(
        self,
        rx: mpsc::Receiver<notify::Result<notify::Event>>,
        on_change: ChangeCallback,
        on_invalid: InvalidCallback,
    ) {
        let mut on_invalid = Some(on_invalid);
        let mut deadline = None;

        // Edits made while the build was running count right away.
        if self.modified_since_start()
            && let Some(fire) = on_invalid.take()
        {
            fire();
            deadline = Some(Instant::now() + self.delay);
        }

        loop {
            if self.stopped() {
                return;
            }

            let timeout = deadline.map_or(POLL, |d: Instant| {
                d.saturating_duration_since(Instant::now()).min(POLL)
            });
            match rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    if is_relevant(&event) {
                        crate::debug!("watch"; "{:?} {:?}", event.kind, event.paths);
                        if let Some(fire) = on_invalid.take() {
                            fire();
                        }
                        deadline = Some(Instant::now() + self.delay);
                    }
                }
                Ok(Err(err)) => {
                    if !self.stopped() {
                        on_change(Err(watch_error(err)));
                    }
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                if !self.stopped() {
                    on_change(Ok(self.timestamps()));
                }
                return;
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn modified_since_start(&self) -> bool {
        self.files
            .iter()
            .filter_map(|file| mtime(file))
            .any(|time| time > self.start_time)
    }

    /// Current modification times of every watched file, plus each watched
    /// directory stamped with the newest time found below it.
    fn timestamps(&self) -> Timestamps {
        let mut timestamps = Timestamps::default();
        for file in &self.files {
            if let Some(time) = mtime(file) {
                timestamps.files.insert(file.clone(), time);
            }
        }
        for dir in &self.dirs {
            let newest = scan_dir(dir, &mut timestamps);
            timestamps.dirs.insert(dir.clone(), newest);
        }
        timestamps
    }
}

fn mtime(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(millis(modified))
}

/// Record every file below `dir` and return the newest time seen.
fn scan_dir(dir: &Path, timestamps: &mut Timestamps) -> u64 {
    let mut newest = mtime(dir).unwrap_or(0);
    let Ok(entries) = std::fs::read_dir(dir) else {
        return newest;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let time = match entry.file_type() {
            Ok(kind) if kind.is_dir() => scan_dir(&path, timestamps),
            Ok(_) => {
                let time = mtime(&path).unwrap_or(0);
                timestamps.files.insert(path, time);
                time
            }
            Err(_) => continue,
        };
        newest = newest.max(time);
    }
    newest
}

/// Editor artifacts: backups, swap files, dotfiles.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_relevant(event: &notify::Event) -> bool {
    let kind_matters = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        // mtime/chmod noise would trigger endless rebuilds
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    kind_matters && event.paths.iter().any(|p| !is_temp_file(p))
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use notify::event::{CreateKind, DataChange, MetadataKind};
    use tempfile::TempDir;

    use super::*;

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_relevant_events() {
        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert!(is_relevant(&event(modify, "/src/a.js")));
        assert!(is_relevant(&event(EventKind::Create(CreateKind::File), "/src/b.js")));
        assert!(!is_relevant(&event(modify, "/src/.a.js.swp")));
        assert!(!is_relevant(&event(modify, "/src/a.js~")));
        assert!(!is_relevant(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            "/src/a.js"
        )));
    }

    #[test]
    fn test_scan_dir_stamps_newest() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.js"), "a").unwrap();
        std::fs::write(dir.path().join("nested/b.js"), "b").unwrap();

        let mut timestamps = Timestamps::default();
        let newest = scan_dir(dir.path(), &mut timestamps);

        assert_eq!(timestamps.files.len(), 2);
        let max_file = timestamps.files.values().copied().max().unwrap();
        assert!(newest >= max_file);
        assert!(timestamps.file(&dir.path().join("nested/b.js")).is_some());
    }

    #[test]
    fn test_aggregator_reports_edit_made_during_build() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.js");
        std::fs::write(&file, "a").unwrap();

        let aggregator = Aggregator {
            files: vec![file.clone()],
            dirs: Vec::new(),
            start_time: 0,
            delay: Duration::from_millis(10),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let (_tx, rx) = channel();
        let (done_tx, done_rx) = channel();
        let (invalid_tx, invalid_rx) = channel();
        aggregator.run(
            rx,
            Box::new(move |result| {
                let _ = done_tx.send(result.map(|ts| ts.file(&file)));
            }),
            Box::new(move || {
                let _ = invalid_tx.send(());
            }),
        );

        assert!(invalid_rx.try_recv().is_ok());
        let stamp = done_rx.try_recv().unwrap().unwrap();
        assert!(stamp.is_some_and(|t| t > 0));
    }

    #[test]
    fn test_aggregator_stops_when_closed() {
        let stop = Arc::new(AtomicBool::new(true));
        let aggregator = Aggregator {
            files: Vec::new(),
            dirs: Vec::new(),
            start_time: 0,
            delay: Duration::from_millis(10),
            stop,
        };
        let (_tx, rx) = channel();
        let (done_tx, done_rx) = channel::<()>();
        aggregator.run(
            rx,
            Box::new(move |_| {
                let _ = done_tx.send(());
            }),
            Box::new(|| {}),
        );
        assert!(done_rx.try_recv().is_err());
    }
}
