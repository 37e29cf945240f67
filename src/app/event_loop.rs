use std::io::{Write, stdout};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use crate::app::{App, Message, Model, ToastLevel};
use crate::scheduler::RenderOutcome;
use crate::watcher::FileWatcher;

/// Longest sleep between watch-loop iterations.
const IDLE_POLL: Duration = Duration::from_millis(200);

/// Prints each new status message once.
#[derive(Debug, Default)]
pub(super) struct StatusReporter {
    last: Option<String>,
}

impl StatusReporter {
    pub(super) fn take_new<'a>(&mut self, model: &'a Model) -> Option<(&'a str, ToastLevel)> {
        let Some((message, level)) = model.active_toast() else {
            self.last = None;
            return None;
        };
        if self.last.as_deref() == Some(message) {
            return None;
        }
        self.last = Some(message.to_string());
        Some((message, level))
    }

    fn report(&mut self, model: &Model) {
        if let Some((message, level)) = self.take_new(model) {
            let prefix = match level {
                ToastLevel::Info => "",
                ToastLevel::Warning => "warning: ",
                ToastLevel::Error => "error: ",
            };
            eprintln!("livemark: {prefix}{message}");
        }
    }
}

impl App {
    /// Run the command-line host.
    ///
    /// Restores the session (or opens the startup file), applies the
    /// requested replace-all and save, and renders the preview. With
    /// watching enabled it keeps re-rendering after external changes.
    ///
    /// # Errors
    ///
    /// Returns an error if a requested save fails or the preview cannot be
    /// written.
    pub fn run(&self) -> Result<()> {
        let _run_scope = crate::perf::scope("app.run.total");
        let mut status = StatusReporter::default();
        let mut file_watcher: Option<FileWatcher> = None;

        let mut model = self.build_model();
        let source = self.restore_session(&mut model);
        tracing::info!(?source, title = model.title(), "document ready");
        status.report(&model);

        if let Some((query, replacement)) = self.replace_all.clone() {
            model = self.dispatch(
                model,
                &mut file_watcher,
                Message::ReplaceAll { query, replacement },
            );
            status.report(&model);
        }

        if self.write {
            let Some(path) = model.document.file_path().map(Path::to_path_buf) else {
                bail!("--write needs a document with a file; none is open");
            };
            Self::save_to(&mut model, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            status.report(&model);
        }

        if model.render_now() == RenderOutcome::Failed {
            tracing::warn!("initial render failed; writing error page");
        }
        self.emit_preview(&mut model)?;

        if self.watch_enabled {
            self.watch_loop(model, &mut file_watcher, &mut status)
        } else {
            self.save_session(&model);
            Ok(())
        }
    }

    fn watch_loop(
        &self,
        mut model: Model,
        file_watcher: &mut Option<FileWatcher>,
        status: &mut StatusReporter,
    ) -> Result<()> {
        self.sync_watcher(&mut model, file_watcher);
        status.report(&model);
        if file_watcher.is_none() {
            tracing::warn!("nothing to watch: the document has no file");
            self.save_session(&model);
            return Ok(());
        }

        loop {
            let changed = file_watcher
                .as_mut()
                .is_some_and(|watcher| watcher.poll_change(Instant::now()));
            if changed {
                model = self.dispatch(model, file_watcher, Message::FileChanged);
                status.report(&model);
            }

            if model.poll_render().is_some() {
                self.emit_preview(&mut model)?;
            }
            model.expire_toast();

            if model.should_quit {
                break;
            }
            let sleep = model
                .scheduler
                .time_until_due(model.now())
                .map_or(IDLE_POLL, |due| due.min(IDLE_POLL));
            std::thread::sleep(sleep);
        }

        self.save_session(&model);
        Ok(())
    }

    /// Write the latest preview page, if it changed, to the output.
    fn emit_preview(&self, model: &mut Model) -> Result<()> {
        let Some(html) = model.preview.take_update() else {
            return Ok(());
        };
        let _scope = crate::perf::scope("app.emit_preview");
        match &self.output {
            Some(path) => crate::file::save(path, &html)
                .with_context(|| format!("Failed to write preview to {}", path.display()))?,
            None => {
                let mut out = stdout().lock();
                out.write_all(html.as_bytes())
                    .context("Failed to write preview to stdout")?;
                out.flush()?;
            }
        }
        crate::perf::log_event("preview.emit", format!("bytes={}", html.len()));
        Ok(())
    }
}
