//! Debounced rendering of the document preview.
//!
//! Every content change re-arms a single timer. Only when the document has
//! been quiet for the whole quiet period does one render of the *current*
//! text run. Each arm and each cancel bumps a generation counter, and a
//! [`RenderTicket`] from an older generation never renders, so a timer
//! callback that was already in flight when the user kept typing (or when
//! the document was replaced) is harmless.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::document::Document;
use crate::render::{RenderError, RenderPipeline, escape_html};

/// Quiet time after the last edit before the preview re-renders.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Where rendered HTML goes.
pub trait PreviewSink {
    /// Hidden previews are skipped entirely.
    fn is_visible(&self) -> bool;
    fn show(&mut self, html: &str);
    fn show_error(&mut self, error: &RenderError);
}

/// An armed render: the generation it belongs to and when it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    pub generation: u64,
    pub deadline: Instant,
}

/// What a fired render did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    SkippedHidden,
    Failed,
}

/// Cancel-and-reschedule debouncer for preview renders.
#[derive(Debug)]
pub struct RenderScheduler {
    quiet_period: Duration,
    generation: u64,
    pending: Option<RenderTicket>,
    renders: u64,
}

impl RenderScheduler {
    pub const fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            generation: 0,
            pending: None,
            renders: 0,
        }
    }

    pub const fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Arm (or re-arm) the timer after a content change.
    pub fn notify_edit(&mut self, now: Instant) -> RenderTicket {
        self.generation += 1;
        let ticket = RenderTicket {
            generation: self.generation,
            deadline: now + self.quiet_period,
        };
        self.pending = Some(ticket);
        ticket
    }

    /// Disarm. Tickets handed out before this call become stale.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if self.pending.take().is_some() {
            tracing::debug!(generation = self.generation, "pending render cancelled");
        }
    }

    pub const fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|ticket| ticket.deadline)
    }

    /// How long a host loop may sleep before the pending render is due.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Completed render attempts, successful or not.
    pub const fn render_count(&self) -> u64 {
        self.renders
    }

    /// Disarm and return the pending ticket if its deadline has passed.
    pub fn take_ready(&mut self, now: Instant) -> Option<RenderTicket> {
        let ticket = self.pending?;
        if now >= ticket.deadline {
            self.pending = None;
            Some(ticket)
        } else {
            None
        }
    }

    /// Render if the pending ticket is due.
    pub fn poll(
        &mut self,
        now: Instant,
        document: &Document,
        pipeline: &RenderPipeline,
        sink: &mut dyn PreviewSink,
    ) -> Option<RenderOutcome> {
        let ticket = self.take_ready(now)?;
        Some(self.render_pass(ticket, document, pipeline, sink))
    }

    /// Timer callback for hosts that drive their own timers. Stale tickets
    /// return `None` without rendering.
    pub fn fire(
        &mut self,
        ticket: RenderTicket,
        document: &Document,
        pipeline: &RenderPipeline,
        sink: &mut dyn PreviewSink,
    ) -> Option<RenderOutcome> {
        if self.pending != Some(ticket) {
            tracing::trace!(generation = ticket.generation, "stale render ticket ignored");
            return None;
        }
        self.pending = None;
        Some(self.render_pass(ticket, document, pipeline, sink))
    }

    /// Render the pending request now, ignoring its deadline.
    pub fn flush(
        &mut self,
        document: &Document,
        pipeline: &RenderPipeline,
        sink: &mut dyn PreviewSink,
    ) -> Option<RenderOutcome> {
        let ticket = self.pending.take()?;
        Some(self.render_pass(ticket, document, pipeline, sink))
    }

    /// Render immediately, superseding anything pending.
    pub fn render_now(
        &mut self,
        now: Instant,
        document: &Document,
        pipeline: &RenderPipeline,
        sink: &mut dyn PreviewSink,
    ) -> RenderOutcome {
        self.pending = None;
        self.generation += 1;
        let ticket = RenderTicket {
            generation: self.generation,
            deadline: now,
        };
        self.render_pass(ticket, document, pipeline, sink)
    }

    fn render_pass(
        &mut self,
        ticket: RenderTicket,
        document: &Document,
        pipeline: &RenderPipeline,
        sink: &mut dyn PreviewSink,
    ) -> RenderOutcome {
        if !sink.is_visible() {
            tracing::debug!(generation = ticket.generation, "preview hidden, render skipped");
            return RenderOutcome::SkippedHidden;
        }

        let scope = crate::perf::scope("render.pass");
        let text = document.text();
        let result = panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(&text)))
            .unwrap_or_else(|_| Err(RenderError::Panicked));
        self.renders += 1;

        match result {
            Ok(html) => {
                crate::perf::log_event(
                    "render.pass",
                    format!(
                        "generation={} bytes={} elapsed_ms={:.2}",
                        ticket.generation,
                        html.len(),
                        scope.elapsed().as_secs_f64() * 1000.0
                    ),
                );
                sink.show(&html);
                RenderOutcome::Rendered
            }
            Err(err) => {
                tracing::warn!(generation = ticket.generation, %err, "render failed");
                crate::perf::log_event("render.error", err.to_string());
                sink.show_error(&err);
                RenderOutcome::Failed
            }
        }
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

/// In-memory preview that keeps the latest page for a host to pick up.
#[derive(Debug, Clone)]
pub struct HtmlPreview {
    visible: bool,
    content: Option<String>,
    last_error: Option<String>,
    unread: bool,
}

impl HtmlPreview {
    pub const fn new() -> Self {
        Self {
            visible: true,
            content: None,
            last_error: None,
            unread: false,
        }
    }

    pub const fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// The latest page, which is an inline error page after a failure.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The latest page if it changed since the previous call.
    pub fn take_update(&mut self) -> Option<String> {
        if !self.unread {
            return None;
        }
        self.unread = false;
        self.content.clone()
    }
}

impl Default for HtmlPreview {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewSink for HtmlPreview {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn show(&mut self, html: &str) {
        self.content = Some(html.to_string());
        self.last_error = None;
        self.unread = true;
    }

    fn show_error(&mut self, error: &RenderError) {
        let message = error.to_string();
        self.content = Some(format!(
            "<pre class=\"error\">Render error: {}</pre>\n",
            escape_html(&message)
        ));
        self.last_error = Some(message);
        self.unread = true;
    }
}
