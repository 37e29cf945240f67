//! Watching the open file for changes made by other programs.
//!
//! notify delivers events on its own thread; they are only queued on a
//! channel here and drained by [`FileWatcher::poll_change`] on the main
//! sequence, so reloading never races an edit.
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Quiet time after the last file event before a change is reported.
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches one file and reports debounced change notifications.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl FileWatcher {
    /// Start watching `path`.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or the file's
    /// directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // Event paths from the OS are absolute and canonical.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
        tracing::debug!(target = %target_path.display(), "watching file");

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
        })
    }

    /// The canonical path of the watched file.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Whether this watcher already follows `path`.
    pub fn is_watching(&self, path: &Path) -> bool {
        path.canonicalize().is_ok_and(|p| p == self.target_path) || path == self.target_path
    }

    /// Drain queued events. Returns true once a change has been quiet for
    /// the debounce interval.
    pub fn poll_change(&mut self, now: Instant) -> bool {
        let mut relevant = 0u32;
        let mut ignored = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.is_relevant(&ev) => relevant += 1,
                Ok(_) => ignored += 1,
                Err(err) => {
                    tracing::warn!(%err, "file watcher error");
                    crate::perf::log_event("watcher.error", err.to_string());
                }
            }
        }
        if relevant + ignored > 0 {
            crate::perf::log_event(
                "watcher.poll",
                format!(
                    "relevant={relevant} ignored={ignored} target={}",
                    self.target_path.display()
                ),
            );
        }
        if relevant > 0 {
            self.pending_since = Some(now);
        }
        self.take_ready(now)
    }

    fn take_ready(&mut self, now: Instant) -> bool {
        let Some(since) = self.pending_since else {
            return false;
        };
        if now.saturating_duration_since(since) >= self.debounce {
            self.pending_since = None;
            return true;
        }
        false
    }

    fn is_relevant(&self, event: &Event) -> bool {
        // Our own atomic saves create a hidden sibling first.
        if !event.paths.is_empty() && event.paths.iter().all(|path| is_save_temp(path)) {
            return false;
        }
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("target_path", &self.target_path)
            .field("debounce", &self.debounce)
            .field("pending", &self.pending_since.is_some())
            .finish_non_exhaustive()
    }
}

fn is_save_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with('.') && name.ends_with(".livemark-tmp"))
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use tempfile::tempdir;

    fn event(paths: Vec<PathBuf>) -> Event {
        Event {
            kind: EventKind::Any,
            paths,
            attrs: notify::event::EventAttributes::new(),
        }
    }

    #[test]
    fn test_directory_level_event_is_relevant_for_watched_file() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("doc.md");
        std::fs::write(&path, "hi").expect("write");
        let watcher = FileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");

        assert!(watcher.is_relevant(&event(vec![canonical_dir])));
    }

    #[test]
    fn test_own_save_temp_file_is_ignored() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("doc.md");
        std::fs::write(&path, "hi").expect("write");
        let watcher = FileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");

        let temp = canonical_dir.join(".doc.md.livemark-tmp");
        assert!(!watcher.is_relevant(&event(vec![temp.clone()])));
        // The rename onto the target still counts.
        assert!(watcher.is_relevant(&event(vec![temp, path])));
    }

    #[test]
    fn test_unrelated_sibling_is_ignored() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("doc.md");
        std::fs::write(&path, "hi").expect("write");
        let watcher = FileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");

        assert!(!watcher.is_relevant(&event(vec![canonical_dir.join("other.md")])));
    }

    #[test]
    fn test_watch_root_for_relative_file_is_dot() {
        let root = watch_root_for(Path::new("notes.md"));
        assert_eq!(root, PathBuf::from("."));
    }

    #[test]
    fn test_is_watching_accepts_relative_and_canonical_paths() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "hi").expect("write");
        let watcher = FileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");

        assert!(watcher.is_watching(&path));
        assert!(watcher.is_watching(&path.canonicalize().unwrap()));
        assert!(!watcher.is_watching(&dir.path().join("other.md")));
    }

    #[test]
    fn test_real_file_modification_detected() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("watched.md");
        std::fs::write(&path, "original").expect("write");

        let mut watcher = FileWatcher::new(&path, Duration::from_millis(50)).expect("watcher");
        // Give the backend time to register the watch.
        std::thread::sleep(Duration::from_millis(500));

        std::fs::write(&path, "modified").expect("write");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut detected = false;
        while Instant::now() < deadline {
            if watcher.poll_change(Instant::now()) {
                detected = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        assert!(detected, "watcher should detect a modification within 5 seconds");
    }

    #[test]
    fn test_change_reported_once_after_debounce() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "hi").expect("write");
        let mut watcher = FileWatcher::new(&path, Duration::from_millis(200)).expect("watcher");

        let start = Instant::now();
        watcher.pending_since = Some(start);
        assert!(!watcher.take_ready(start + Duration::from_millis(199)));
        assert!(watcher.take_ready(start + Duration::from_millis(200)));
        assert!(!watcher.take_ready(start + Duration::from_millis(400)));
    }
}
