use std::path::PathBuf;

use crate::app::{Model, ToastLevel};
use crate::document::{ContentOrigin, Selection};
use crate::search::SearchOptions;

/// All possible events and actions in the application.
///
/// These represent user input, system events, and internal actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Editing
    /// The editor widget now holds this text
    Edit(String),
    /// Revert the newest edit
    Undo,
    /// Reapply the newest undone edit
    Redo,
    /// Cursor or selection moved
    Select(Selection),
    /// First visible byte offset moved
    ScrollTo(usize),
    /// Start over with an empty untitled document
    NewDocument,

    // Find/replace
    /// Start a fresh find/replace session
    OpenFind,
    /// End the find/replace session
    CloseFind,
    /// Change how queries match
    SetSearchOptions(SearchOptions),
    /// Select the next occurrence
    FindNext(String),
    /// Replace the selected occurrence and move to the next one
    ReplaceOne { query: String, replacement: String },
    /// Replace every occurrence as one undoable step
    ReplaceAll { query: String, replacement: String },

    // Preview
    /// Drop any pending render
    CancelRender,
    /// Render right away
    RequestRender,
    /// Show or hide the preview
    SetPreviewVisible(bool),

    // Files
    /// Load a file into the buffer
    Open(PathBuf),
    /// Save to the associated file
    Save,
    /// Save to a new path and associate it
    SaveAs(PathBuf),
    /// Toggle file watching
    ToggleWatch,
    /// File changed externally
    FileChanged,
    /// Reload from disk, discarding edits
    ReloadFromDisk,

    /// Quit the application
    Quit,
}

/// Apply a message to the model.
///
/// Everything that touches the file system is left to
/// [`App::handle_message_side_effects`](crate::app::App).
pub fn update(mut model: Model, msg: Message) -> Model {
    match msg {
        Message::Edit(text) => {
            if let Some(change) = model.document.apply_edit(&text) {
                model.route_change(change);
            }
        }
        Message::Undo => {
            if let Some(change) = model.document.undo() {
                model.route_change(change);
            }
        }
        Message::Redo => {
            if let Some(change) = model.document.redo() {
                model.route_change(change);
            }
        }
        Message::Select(selection) => model.document.set_selection(selection),
        Message::ScrollTo(offset) => model.document.set_scroll_anchor(offset),
        Message::NewDocument => {
            model.finder.close();
            model.replace_content("", ContentOrigin::New);
        }

        Message::OpenFind => {
            model.finder.open();
        }
        Message::CloseFind => model.finder.close(),
        Message::SetSearchOptions(options) => model.finder.set_options(options),
        Message::FindNext(query) => {
            let result = model.finder.find_next(&mut model.document, &query);
            if !result.is_found() && !query.is_empty() {
                model.show_toast(ToastLevel::Info, format!("Not found: {query}"));
            }
        }
        Message::ReplaceOne { query, replacement } => {
            let outcome = model
                .finder
                .replace_one(&mut model.document, &query, &replacement);
            if let Some(change) = outcome.change {
                model.route_change(change);
            }
            if !outcome.replaced && !outcome.result.is_found() && !query.is_empty() {
                model.show_toast(ToastLevel::Info, format!("Not found: {query}"));
            }
        }
        Message::ReplaceAll { query, replacement } => {
            let outcome = model
                .finder
                .replace_all(&mut model.document, &query, &replacement);
            if let Some(change) = outcome.change {
                model.route_change(change);
            }
            let noun = if outcome.count == 1 { "occurrence" } else { "occurrences" };
            model.show_toast(
                ToastLevel::Info,
                format!("Replaced {} {noun}", outcome.count),
            );
        }

        Message::CancelRender => model.scheduler.cancel(),
        Message::RequestRender => {
            model.render_now();
        }
        Message::SetPreviewVisible(visible) => {
            model.preview.set_visible(visible);
            if visible {
                // Catch up on edits made while hidden.
                let _ticket = model.scheduler.notify_edit(model.now());
            }
        }

        Message::ToggleWatch => model.watch_enabled = !model.watch_enabled,
        Message::Quit => model.should_quit = true,

        Message::Open(_)
        | Message::Save
        | Message::SaveAs(_)
        | Message::FileChanged
        | Message::ReloadFromDisk => {}
    }
    model
}
