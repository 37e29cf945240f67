// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. render::RenderError)
    clippy::module_name_repetitions
)]

//! # Livemark
//!
//! The core of a live markdown editor.
//!
//! Livemark keeps one text buffer in sync with an HTML preview while it is
//! being edited:
//! - Undoable edits with dirty tracking against the last save
//! - Debounced preview rendering (one render per quiet period)
//! - Find and replace, with replace-all as a single undo step
//! - Encoding-aware loading (UTF-8, UTF-16 with BOM, Latin-1) and atomic saves
//! - Session restore that never loses unsaved text
//!
//! ## Architecture
//!
//! Livemark uses The Elm Architecture (TEA) pattern:
//! - **Model**: Application state
//! - **Message**: Events and actions
//! - **Update**: State transitions
//! - **Effects**: File, session and watcher I/O
//!
//! ## Modules
//!
//! - [`app`]: Model, messages and the CLI host
//! - [`document`]: Text buffer and undo history
//! - [`file`]: Loading and saving
//! - [`render`]: Markdown to HTML
//! - [`scheduler`]: Debounced preview rendering
//! - [`search`]: Find and replace
//! - [`session`]: Session persistence
//! - [`highlight`]: Code block highlighting
//! - [`watcher`]: File watching
//! - [`config`]: Saved default flags

pub mod app;
pub mod config;
pub mod document;
pub mod file;
pub mod highlight;
pub mod perf;
pub mod render;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model};
    pub use crate::document::Document;
    pub use crate::render::{ExtensionSet, RenderPipeline};
    pub use crate::scheduler::RenderScheduler;
    pub use crate::search::FindReplace;
    pub use crate::session::SessionStore;
}
