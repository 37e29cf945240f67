use std::path::{Path, PathBuf};

use crate::app::{App, Message, Model, ToastLevel, update};
use crate::document::ContentOrigin;
use crate::file::{self, FileError, Loaded};
use crate::render::{ComrakRenderer, RenderPipeline};
use crate::watcher::FileWatcher;

/// Where the startup document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreSource {
    /// The file recorded in the session.
    SessionFile(PathBuf),
    /// Unsaved text recorded in the session.
    UnsavedText,
    /// The path given on the command line.
    StartupFile(PathBuf),
    /// Nothing to restore.
    Empty,
}

/// The host's answer when closing a dirty document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseDecision {
    Save,
    SaveAs(PathBuf),
    Discard,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Exit,
    Cancelled,
}

impl App {
    /// A fresh model carrying this app's render settings.
    pub fn build_model(&self) -> Model {
        let pipeline = RenderPipeline::new(Box::new(ComrakRenderer), self.extensions)
            .with_stylesheet(self.stylesheet);
        let mut model = Model::default()
            .with_quiet_period(self.quiet_period)
            .with_pipeline(pipeline);
        model.watch_enabled = self.watch_enabled;
        model
    }

    /// Fill `model` with the startup document.
    ///
    /// A session file, when present, decides everything: its file is
    /// reopened if it still loads, otherwise its unsaved text comes back as
    /// a dirty untitled buffer. The startup path is only consulted when no
    /// session file exists.
    pub fn restore_session(&self, model: &mut Model) -> RestoreSource {
        let _scope = crate::perf::scope("app.restore_session");
        if self.session.exists() {
            let record = self.session.restore().unwrap_or_default();
            if let Some(path) = record.last_file.as_deref()
                && file::exists(path)
            {
                match file::load(path) {
                    Ok(loaded) => {
                        Self::apply_loaded(model, path, loaded);
                        return RestoreSource::SessionFile(path.to_path_buf());
                    }
                    Err(err) => {
                        tracing::warn!(%err, "session file no longer loads");
                        model.show_toast(ToastLevel::Warning, format!("Restore failed: {err}"));
                    }
                }
            }
            if let Some(text) = record.last_text {
                model.replace_content(&text, ContentOrigin::Unsaved);
                return RestoreSource::UnsavedText;
            }
            model.replace_content("", ContentOrigin::New);
            return RestoreSource::Empty;
        }

        if let Some(path) = &self.startup_path
            && Self::open_file(model, path).is_ok()
        {
            return RestoreSource::StartupFile(path.clone());
        }
        model.replace_content("", ContentOrigin::New);
        RestoreSource::Empty
    }

    /// Best-effort session snapshot of the current document.
    pub fn save_session(&self, model: &Model) {
        self.session.save(&model.document);
    }

    /// Load `path` into the buffer, reporting failures as a toast.
    ///
    /// # Errors
    /// Returns the [`FileError`] when the file cannot be read; the buffer is
    /// left untouched.
    pub fn open_file(model: &mut Model, path: &Path) -> Result<(), FileError> {
        match file::load(path) {
            Ok(loaded) => {
                Self::apply_loaded(model, path, loaded);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "open failed");
                model.show_toast(ToastLevel::Error, format!("Open failed: {err}"));
                Err(err)
            }
        }
    }

    fn apply_loaded(model: &mut Model, path: &Path, loaded: Loaded) {
        let fallback = loaded.is_fallback();
        model.finder.close();
        model.replace_content(
            &loaded.text,
            ContentOrigin::Disk {
                path: path.to_path_buf(),
                encoding: loaded.encoding,
            },
        );
        if fallback {
            model.show_toast(
                ToastLevel::Warning,
                format!("{} is not UTF-8; decoded as Latin-1", model.document.display_name()),
            );
        }
    }

    /// Write the buffer to `path` and associate it.
    ///
    /// On failure the dirty flag is unchanged and the status line names
    /// the path and the cause.
    ///
    /// # Errors
    /// Returns the [`FileError`] from the write.
    pub fn save_to(model: &mut Model, path: &Path) -> Result<(), FileError> {
        let _scope = crate::perf::scope("app.save");
        let encoding = model.document.encoding();
        match file::save_encoded(path, &model.document.text(), encoding) {
            Ok(()) => {
                let change = model.document.mark_synced(path.to_path_buf());
                model.route_change(change);
                model.show_toast(ToastLevel::Info, format!("Saved {}", path.display()));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "save failed");
                model.show_toast(ToastLevel::Error, format!("Save failed: {err}"));
                Err(err)
            }
        }
    }

    /// Close the document, asking `decide` only when there are unsaved
    /// edits. A session snapshot is written before anything else.
    pub fn request_close(
        &self,
        model: &mut Model,
        decide: impl FnOnce(&Model) -> CloseDecision,
    ) -> CloseOutcome {
        self.save_session(model);
        if !model.document.is_dirty() {
            model.should_quit = true;
            return CloseOutcome::Exit;
        }

        let target = match decide(model) {
            CloseDecision::Cancel => return CloseOutcome::Cancelled,
            CloseDecision::Discard => {
                model.should_quit = true;
                return CloseOutcome::Exit;
            }
            CloseDecision::Save => model.document.file_path().map(Path::to_path_buf),
            CloseDecision::SaveAs(path) => Some(path),
        };
        let Some(path) = target else {
            model.show_toast(ToastLevel::Warning, "Choose a file name to save to");
            return CloseOutcome::Cancelled;
        };
        if Self::save_to(model, &path).is_err() {
            return CloseOutcome::Cancelled;
        }
        self.save_session(model);
        model.should_quit = true;
        CloseOutcome::Exit
    }

    pub(super) fn make_file_watcher(&self, path: &Path) -> notify::Result<FileWatcher> {
        FileWatcher::new(path, self.watch_debounce)
    }

    /// Point the watcher at the document's file, or drop it when watching
    /// is off or there is no file.
    pub(super) fn sync_watcher(&self, model: &mut Model, file_watcher: &mut Option<FileWatcher>) {
        let path = match model.document.file_path() {
            Some(path) if model.watch_enabled => path.to_path_buf(),
            _ => {
                *file_watcher = None;
                return;
            }
        };
        if file_watcher
            .as_ref()
            .is_some_and(|watcher| watcher.is_watching(&path))
        {
            return;
        }
        match self.make_file_watcher(&path) {
            Ok(watcher) => *file_watcher = Some(watcher),
            Err(err) => {
                *file_watcher = None;
                model.show_toast(ToastLevel::Warning, format!("Watch unavailable: {err}"));
                crate::perf::log_event(
                    "watcher.error",
                    format!("failed path={} err={err}", path.display()),
                );
            }
        }
    }

    /// React to an external change of the associated file.
    ///
    /// A clean buffer follows the disk. A dirty buffer is kept and the
    /// conflict is flagged instead.
    fn handle_file_changed(model: &mut Model) {
        let Some(path) = model.document.file_path().map(Path::to_path_buf) else {
            return;
        };
        let loaded = match file::load(&path) {
            Ok(loaded) => loaded,
            Err(err) => {
                model.show_toast(ToastLevel::Warning, format!("Reload failed: {err}"));
                crate::perf::log_event("reload.error", err.to_string());
                return;
            }
        };
        if loaded.text == model.document.text() {
            return;
        }
        if model.document.is_dirty() {
            model.disk_conflict = true;
            model.show_toast(
                ToastLevel::Warning,
                format!(
                    "{} changed on disk; keeping unsaved edits",
                    model.document.display_name()
                ),
            );
            return;
        }
        Self::apply_loaded(model, &path, loaded);
        model.show_toast(ToastLevel::Info, "Reloaded");
    }

    pub(super) fn handle_message_side_effects(
        &self,
        model: &mut Model,
        file_watcher: &mut Option<FileWatcher>,
        msg: &Message,
    ) {
        match msg {
            Message::Open(path) => {
                if Self::open_file(model, path).is_ok() {
                    self.sync_watcher(model, file_watcher);
                }
            }
            Message::Save => match model.document.file_path().map(Path::to_path_buf) {
                Some(path) => {
                    let _ = Self::save_to(model, &path);
                }
                None => model.show_toast(ToastLevel::Warning, "No file name; use Save As"),
            },
            Message::SaveAs(path) => {
                if Self::save_to(model, path).is_ok() {
                    self.sync_watcher(model, file_watcher);
                }
            }
            Message::NewDocument | Message::ToggleWatch => {
                self.sync_watcher(model, file_watcher);
            }
            Message::FileChanged => {
                Self::handle_file_changed(model);
                self.save_session(model);
            }
            Message::ReloadFromDisk => {
                if let Some(path) = model.document.file_path().map(Path::to_path_buf)
                    && Self::open_file(model, &path).is_ok()
                {
                    model.show_toast(ToastLevel::Info, "Reloaded");
                }
            }
            _ => {}
        }
    }

    /// Run `msg` through [`update`] and then its side effects.
    pub fn dispatch(
        &self,
        model: Model,
        file_watcher: &mut Option<FileWatcher>,
        msg: Message,
    ) -> Model {
        let mut model = update(model, msg.clone());
        self.handle_message_side_effects(&mut model, file_watcher, &msg);
        model
    }
}
