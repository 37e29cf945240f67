//! Host integration for the editing core.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: State transitions that never touch the file system
//! - [`App`]: Side effects (files, session, watcher) and the CLI loop

mod effects;
mod event_loop;
mod model;
mod update;

pub use effects::{CloseDecision, CloseOutcome, RestoreSource};
pub use model::{ChangeListener, Model, ToastLevel};
pub use update::{Message, update};

use std::path::PathBuf;
use std::time::Duration;

use crate::render::ExtensionSet;
use crate::scheduler::DEFAULT_QUIET_PERIOD;
use crate::session::SessionStore;
use crate::watcher::DEFAULT_WATCH_DEBOUNCE;

/// Owns the host configuration and performs side effects for a [`Model`].
#[derive(Debug, Clone)]
pub struct App {
    startup_path: Option<PathBuf>,
    session: SessionStore,
    watch_enabled: bool,
    watch_debounce: Duration,
    quiet_period: Duration,
    extensions: ExtensionSet,
    stylesheet: bool,
    output: Option<PathBuf>,
    replace_all: Option<(String, String)>,
    write: bool,
}

impl App {
    /// Create an application. `startup_path` is only opened when there is
    /// no session to restore.
    pub fn new(startup_path: Option<PathBuf>) -> Self {
        Self {
            startup_path,
            session: SessionStore::default(),
            watch_enabled: false,
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
            quiet_period: DEFAULT_QUIET_PERIOD,
            extensions: ExtensionSet::standard(),
            stylesheet: true,
            output: None,
            replace_all: None,
            write: false,
        }
    }

    /// Use `session` instead of `session.json` in the working directory.
    #[must_use]
    pub fn with_session(mut self, session: SessionStore) -> Self {
        self.session = session;
        self
    }

    /// Enable or disable file watching.
    #[must_use]
    pub const fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    /// Quiet time before an external change is acted on.
    #[must_use]
    pub const fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Quiet time after the last edit before the preview re-renders.
    #[must_use]
    pub const fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    #[must_use]
    pub const fn with_extensions(mut self, extensions: ExtensionSet) -> Self {
        self.extensions = extensions;
        self
    }

    /// Wrap previews in a standalone HTML page.
    #[must_use]
    pub const fn with_stylesheet(mut self, stylesheet: bool) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    /// Write previews to `path` instead of stdout.
    #[must_use]
    pub fn with_output(mut self, path: Option<PathBuf>) -> Self {
        self.output = path;
        self
    }

    /// Replace every `query` with `replacement` after startup.
    #[must_use]
    pub fn with_replace_all(mut self, query: String, replacement: String) -> Self {
        self.replace_all = Some((query, replacement));
        self
    }

    /// Save the document back to its file after startup edits.
    #[must_use]
    pub const fn with_write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub const fn session(&self) -> &SessionStore {
        &self.session
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(None)
    }
}
