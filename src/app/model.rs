use std::time::{Duration, Instant};

use crate::document::{ChangeKind, ContentOrigin, Document, DocumentChange};
use crate::render::RenderPipeline;
use crate::scheduler::{Clock, HtmlPreview, RenderOutcome, RenderScheduler, SystemClock};
use crate::search::FindReplace;

const TOAST_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// Extra observer for document changes. Receives each change together
/// with the refreshed window title.
pub type ChangeListener = Box<dyn FnMut(&DocumentChange, &str)>;

/// The complete application state.
///
/// All state lives here - no global or scattered state. Every
/// [`DocumentChange`] goes through [`Model::route_change`], which turns it
/// into one render request and one title update.
pub struct Model {
    /// The one open document
    pub document: Document,
    /// Find/replace session over `document`
    pub finder: FindReplace,
    /// Debounces preview renders
    pub scheduler: RenderScheduler,
    /// Converter plus render settings
    pub pipeline: RenderPipeline,
    /// Latest rendered page
    pub preview: HtmlPreview,
    clock: Box<dyn Clock>,
    title: String,
    toast: Option<Toast>,
    change_listener: Option<ChangeListener>,
    /// The file changed on disk while the buffer had unsaved edits
    pub disk_conflict: bool,
    /// Whether file watching is enabled
    pub watch_enabled: bool,
    /// Whether the app should quit
    pub should_quit: bool,
}

impl Model {
    pub fn new(document: Document) -> Self {
        let title = document.title();
        Self {
            document,
            finder: FindReplace::new(),
            scheduler: RenderScheduler::default(),
            pipeline: RenderPipeline::default(),
            preview: HtmlPreview::new(),
            clock: Box::new(SystemClock),
            title,
            toast: None,
            change_listener: None,
            disk_conflict: false,
            watch_enabled: false,
            should_quit: false,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: RenderPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.scheduler = RenderScheduler::new(quiet_period);
        self
    }

    /// Register the single host listener, replacing any previous one.
    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        self.change_listener = Some(listener);
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Window title as of the last routed change.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Deliver one change: arm the render scheduler if the content moved,
    /// refresh the title and tell the host listener.
    pub fn route_change(&mut self, change: DocumentChange) {
        if change.content_changed() {
            let _ticket = self.scheduler.notify_edit(self.clock.now());
        }
        if matches!(change.kind, ChangeKind::Replaced | ChangeKind::Synced) {
            self.disk_conflict = false;
        }
        self.title = self.document.title();
        if let Some(listener) = self.change_listener.as_mut() {
            listener(&change, &self.title);
        }
    }

    /// Replace the whole buffer. Renders armed for the previous content
    /// are cancelled before the new content is routed.
    pub fn replace_content(&mut self, text: &str, origin: ContentOrigin) {
        self.scheduler.cancel();
        let change = self.document.set_content(text, origin);
        self.route_change(change);
    }

    /// Render if the debounce deadline has passed.
    pub fn poll_render(&mut self) -> Option<RenderOutcome> {
        let now = self.clock.now();
        self.scheduler
            .poll(now, &self.document, &self.pipeline, &mut self.preview)
    }

    /// Render a pending request immediately.
    pub fn flush_render(&mut self) -> Option<RenderOutcome> {
        self.scheduler
            .flush(&self.document, &self.pipeline, &mut self.preview)
    }

    /// Render the current content now, whether or not anything is pending.
    pub fn render_now(&mut self) -> RenderOutcome {
        let now = self.clock.now();
        self.scheduler
            .render_now(now, &self.document, &self.pipeline, &mut self.preview)
    }

    pub fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: self.clock.now() + TOAST_DURATION,
        });
    }

    /// Drop the toast if it has expired. Returns true when one was removed.
    pub fn expire_toast(&mut self) -> bool {
        let now = self.clock.now();
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.message.as_str(), toast.level))
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("document", &self.document)
            .field("finder", &self.finder)
            .field("scheduler", &self.scheduler)
            .field("pipeline", &self.pipeline)
            .field("title", &self.title)
            .field("toast", &self.toast)
            .field("disk_conflict", &self.disk_conflict)
            .field("watch_enabled", &self.watch_enabled)
            .field("should_quit", &self.should_quit)
            .finish_non_exhaustive()
    }
}
