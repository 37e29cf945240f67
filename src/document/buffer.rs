use std::hash::{DefaultHasher, Hasher};
use std::path::{Path, PathBuf};

use ropey::Rope;

use super::history::{Edit, History, Selection, Transaction};
use crate::file::Encoding;

/// Application name used in window titles.
pub const APP_NAME: &str = "livemark";

/// Where wholesale content came from. Decides the dirty flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOrigin {
    /// Read from `path`; the content equals what is on disk.
    Disk { path: PathBuf, encoding: Encoding },
    /// Restored text that has no backing file.
    Unsaved,
    /// A fresh, empty-style document.
    New,
}

/// What a state-changing operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Content replaced wholesale (load, new, restore).
    Replaced,
    /// Direct typing or a find/replace edit.
    Edited,
    /// Saved to disk; content untouched.
    Synced,
    Undo,
    Redo,
}

/// The single notification produced by every state-changing operation.
///
/// Hosts route it to the render scheduler and to the title/status line.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    /// Dirty flag after the operation.
    pub dirty: bool,
}

impl DocumentChange {
    /// Whether the rendered view is now stale.
    pub const fn content_changed(&self) -> bool {
        !matches!(self.kind, ChangeKind::Synced)
    }
}

/// Length plus hash of a content snapshot, used to detect edits that
/// return the buffer to its last synced state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentStamp {
    len: usize,
    hash: u64,
}

impl ContentStamp {
    fn of(rope: &Rope) -> Self {
        let mut hasher = DefaultHasher::new();
        for chunk in rope.chunks() {
            hasher.write(chunk.as_bytes());
        }
        Self {
            len: rope.len_bytes(),
            hash: hasher.finish(),
        }
    }
}

/// The one open document: text, file association and dirty state.
///
/// Offsets in this API are byte offsets into the UTF-8 content and are
/// clamped to character boundaries.
pub struct Document {
    rope: Rope,
    file_path: Option<PathBuf>,
    encoding: Encoding,
    dirty: bool,
    /// Snapshot of the last load/save; `None` when the text never had a
    /// backing file (restored unsaved text).
    synced: Option<ContentStamp>,
    selection: Selection,
    scroll_anchor: usize,
    history: History,
}

impl Document {
    /// An empty, clean, untitled document.
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// An untitled document holding `text`, treated as clean.
    pub fn from_text(text: &str) -> Self {
        let rope = Rope::from_str(text);
        let synced = Some(ContentStamp::of(&rope));
        Self {
            rope,
            file_path: None,
            encoding: Encoding::Utf8,
            dirty: false,
            synced,
            selection: Selection::default(),
            scroll_anchor: 0,
            history: History::default(),
        }
    }

    /// The full text content.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Text in a byte range. Out-of-range ends are clamped.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let start = self.clamp_offset(start);
        let end = self.clamp_offset(end).max(start);
        let start_char = self.rope.byte_to_char(start);
        let end_char = self.rope.byte_to_char(end);
        self.rope.slice(start_char..end_char).to_string()
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.rope.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_bytes() == 0
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Encoding the content was decoded from.
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether the content differs from the last load or save.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn selection(&self) -> Selection {
        self.selection
    }

    /// Byte offset of the current cursor (end of the selection).
    pub const fn cursor(&self) -> usize {
        self.selection.end
    }

    /// Select a range. Does not count as an edit.
    pub fn set_selection(&mut self, selection: Selection) {
        let start = self.clamp_offset(selection.start);
        let end = self.clamp_offset(selection.end);
        self.selection = Selection::new(start.min(end), start.max(end));
    }

    /// Byte offset of the first visible line, as reported by the host view.
    pub const fn scroll_anchor(&self) -> usize {
        self.scroll_anchor
    }

    pub fn set_scroll_anchor(&mut self, offset: usize) {
        self.scroll_anchor = self.clamp_offset(offset);
    }

    /// Replace the content wholesale.
    ///
    /// Clears history and selection. `origin` decides the dirty flag and
    /// the file association.
    pub fn set_content(&mut self, text: &str, origin: ContentOrigin) -> DocumentChange {
        self.rope = Rope::from_str(text);
        self.selection = Selection::default();
        self.scroll_anchor = 0;
        self.history.clear();
        match origin {
            ContentOrigin::Disk { path, encoding } => {
                self.file_path = Some(path);
                self.encoding = encoding;
                self.synced = Some(ContentStamp::of(&self.rope));
                self.dirty = false;
            }
            ContentOrigin::Unsaved => {
                self.file_path = None;
                self.encoding = Encoding::Utf8;
                self.synced = None;
                self.dirty = true;
            }
            ContentOrigin::New => {
                self.file_path = None;
                self.encoding = Encoding::Utf8;
                self.synced = Some(ContentStamp::of(&self.rope));
                self.dirty = false;
            }
        }
        self.change(ChangeKind::Replaced)
    }

    /// Replace the content as a result of direct typing.
    ///
    /// The difference to the current content is stored as one undoable
    /// edit and the cursor is placed after the inserted text. Returns
    /// `None` when `text` is identical to the current content.
    pub fn apply_edit(&mut self, text: &str) -> Option<DocumentChange> {
        let current = self.text();
        let edit = diff(&current, text)?;
        let caret = edit.offset + edit.inserted.len();
        let transaction = Transaction::new(vec![edit], self.selection, Selection::caret(caret));
        self.commit(transaction);
        Some(self.change(ChangeKind::Edited))
    }

    /// Apply several replacements as one undoable step.
    ///
    /// `edits` must be sorted by offset and disjoint, in the coordinates of
    /// the current content. When `selection_after` is `None` the current
    /// selection and scroll anchor are mapped through the edits rather than
    /// following each insertion. Returns `None` for an empty edit list.
    pub fn replace_ranges(
        &mut self,
        edits: Vec<Edit>,
        selection_after: Option<Selection>,
    ) -> Option<DocumentChange> {
        if edits.is_empty() {
            return None;
        }
        let before = self.selection;
        let mut transaction = Transaction::new(edits, before, before);
        let after = selection_after.unwrap_or_else(|| transaction.map_selection(before));
        transaction.set_selection_after(after);
        self.commit(transaction);
        Some(self.change(ChangeKind::Edited))
    }

    /// Record a successful save to `path`.
    pub fn mark_synced(&mut self, path: PathBuf) -> DocumentChange {
        self.file_path = Some(path);
        self.encoding = self.encoding.saved_as();
        self.synced = Some(ContentStamp::of(&self.rope));
        self.dirty = false;
        self.change(ChangeKind::Synced)
    }

    /// Revert the newest transaction.
    pub fn undo(&mut self) -> Option<DocumentChange> {
        let transaction = self.history.take_undo()?;
        let inverse = transaction.inverse();
        self.apply_transaction(&inverse);
        self.selection = inverse.selection_after();
        self.refresh_dirty();
        Some(self.change(ChangeKind::Undo))
    }

    /// Reapply the newest undone transaction.
    pub fn redo(&mut self) -> Option<DocumentChange> {
        let transaction = self.history.take_redo()?;
        self.apply_transaction(&transaction);
        self.selection = transaction.selection_after();
        self.refresh_dirty();
        Some(self.change(ChangeKind::Redo))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// The bare file name, or `"Untitled"`.
    pub fn display_name(&self) -> String {
        self.file_path
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(|| "Untitled".to_owned(), |n| n.to_string_lossy().into_owned())
    }

    /// Window title.
    ///
    /// | State | Title |
    /// |---|---|
    /// | No path, clean | `"livemark"` |
    /// | Path set, clean | `"name - livemark"` |
    /// | Dirty | `"*name - livemark"` |
    pub fn title(&self) -> String {
        if self.file_path.is_none() && !self.dirty {
            return APP_NAME.to_owned();
        }
        let marker = if self.dirty { "*" } else { "" };
        format!("{marker}{} - {APP_NAME}", self.display_name())
    }

    // --- Private helpers ---

    fn commit(&mut self, transaction: Transaction) {
        self.apply_transaction(&transaction);
        self.selection = transaction.selection_after();
        self.history.record(transaction);
        self.refresh_dirty();
    }

    /// Apply edits back to front so earlier offsets stay valid. The scroll
    /// anchor follows the text it pointed at.
    fn apply_transaction(&mut self, transaction: &Transaction) {
        let anchor = transaction.map_offset(self.scroll_anchor);
        for edit in transaction.edits().iter().rev() {
            let start = self.rope.byte_to_char(edit.offset);
            let end = self.rope.byte_to_char(edit.offset + edit.removed.len());
            self.rope.remove(start..end);
            self.rope.insert(start, &edit.inserted);
        }
        self.scroll_anchor = self.clamp_offset(anchor);
    }

    fn refresh_dirty(&mut self) {
        self.dirty = self.synced != Some(ContentStamp::of(&self.rope));
    }

    fn change(&self, kind: ChangeKind) -> DocumentChange {
        DocumentChange {
            kind,
            dirty: self.dirty,
        }
    }

    /// Clamp to the content length, then back to the previous char boundary.
    fn clamp_offset(&self, offset: usize) -> usize {
        let offset = offset.min(self.rope.len_bytes());
        self.rope.char_to_byte(self.rope.byte_to_char(offset))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("rope", &format_args!("Rope({} bytes)", self.rope.len_bytes()))
            .field("file_path", &self.file_path)
            .field("dirty", &self.dirty)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

/// The single replacement turning `old` into `new`, found by trimming the
/// common prefix and suffix. `None` when the strings are equal.
fn diff(old: &str, new: &str) -> Option<Edit> {
    if old == new {
        return None;
    }
    let mut prefix = old
        .bytes()
        .zip(new.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let max_suffix = old.len().min(new.len()) - prefix;
    let mut suffix = old
        .bytes()
        .rev()
        .zip(new.bytes().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(old.len() - suffix) {
        suffix -= 1;
    }

    Some(Edit {
        offset: prefix,
        removed: old[prefix..old.len() - suffix].to_string(),
        inserted: new[prefix..new.len() - suffix].to_string(),
    })
}
