//! Timing scopes and the render debug log.
//!
//! `--perf` turns on [`scope`] timings, which are emitted as `tracing`
//! events on the `livemark::perf` target. `--render-debug-log PATH` opens a
//! plain text file that [`log_event`] appends timestamped lines to, so a
//! slow preview can be diagnosed without a subscriber configured.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

static ENABLED: AtomicBool = AtomicBool::new(false);
static DEBUG_LOG: LazyLock<Mutex<DebugLog>> = LazyLock::new(|| Mutex::new(DebugLog::closed()));

/// Guard that reports its lifetime when dropped, if timing is enabled.
#[derive(Debug)]
#[must_use = "the scope is timed until the guard is dropped"]
pub struct Scope {
    name: &'static str,
    start: Instant,
}

impl Scope {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(target: "livemark::perf", scope = self.name, elapsed_ms, "timing");
        log_event(self.name, format!("{elapsed_ms:.2} ms"));
    }
}

#[derive(Debug)]
struct DebugLog {
    start: Instant,
    writer: Option<BufWriter<File>>,
}

impl DebugLog {
    fn closed() -> Self {
        Self {
            start: Instant::now(),
            writer: None,
        }
    }
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Start timing `name`.
pub fn scope(name: &'static str) -> Scope {
    Scope {
        name,
        start: Instant::now(),
    }
}

/// Open (or, with `None`, close) the render debug log.
///
/// # Errors
/// Returns an error if the log file cannot be created or written.
pub fn set_debug_log_path(path: Option<&Path>) -> std::io::Result<()> {
    let mut log = DEBUG_LOG.lock().expect("debug log lock poisoned");
    let Some(path) = path else {
        if let Some(mut writer) = log.writer.take() {
            writer.flush()?;
        }
        return Ok(());
    };
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "livemark render debug log start")?;
    writer.flush()?;
    log.start = Instant::now();
    log.writer = Some(writer);
    Ok(())
}

pub fn is_debug_log_enabled() -> bool {
    DEBUG_LOG
        .lock()
        .expect("debug log lock poisoned")
        .writer
        .is_some()
}

/// Append one line to the debug log, if it is open. Write failures are
/// ignored.
pub fn log_event(name: &str, detail: impl AsRef<str>) {
    let mut log = DEBUG_LOG.lock().expect("debug log lock poisoned");
    let elapsed_ms = log.start.elapsed().as_secs_f64() * 1000.0;
    let Some(writer) = log.writer.as_mut() else {
        return;
    };
    let _ = writeln!(writer, "[{elapsed_ms:>10.3} ms] {name}: {}", detail.as_ref());
    let _ = writer.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_set_enabled_toggles_runtime_flag() {
        set_enabled(true);
        assert!(is_enabled());

        set_enabled(false);
        assert!(!is_enabled());
    }

    #[test]
    fn test_scope_measures_elapsed_time() {
        let scope = scope("test.scope");
        std::thread::sleep(Duration::from_millis(2));
        assert!(scope.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_debug_log_path_enables_logging_and_writes() {
        let temp_file = NamedTempFile::new().unwrap();
        set_debug_log_path(Some(temp_file.path())).unwrap();
        assert!(is_debug_log_enabled());
        log_event("render.pass", "generation=3 bytes=120");
        set_debug_log_path(None).unwrap();
        assert!(!is_debug_log_enabled());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("livemark render debug log start"));
        assert!(content.contains("render.pass: generation=3 bytes=120"));
    }
}
