//! Undo/redo history made of multi-edit transactions.

use std::ops::Range;

/// A selection as a half-open byte range. `start == end` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// A selection spanning `range`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty selection at `offset`.
    pub const fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// One replacement, in the byte coordinates of the text the transaction
/// was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub removed: String,
    pub inserted: String,
}

impl Edit {
    fn removed_end(&self) -> usize {
        self.offset + self.removed.len()
    }
}

/// A group of edits that undo and redo as a single step.
///
/// Edits are sorted by offset and never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    edits: Vec<Edit>,
    selection_before: Selection,
    selection_after: Selection,
}

impl Transaction {
    pub(crate) fn new(edits: Vec<Edit>, before: Selection, after: Selection) -> Self {
        debug_assert!(
            edits
                .windows(2)
                .all(|pair| pair[0].removed_end() <= pair[1].offset),
            "transaction edits must be sorted and disjoint"
        );
        Self {
            edits,
            selection_before: before,
            selection_after: after,
        }
    }

    pub(crate) const fn set_selection_after(&mut self, selection: Selection) {
        self.selection_after = selection;
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub const fn selection_before(&self) -> Selection {
        self.selection_before
    }

    pub const fn selection_after(&self) -> Selection {
        self.selection_after
    }

    /// The transaction that reverts this one, expressed in the coordinates
    /// of the text this one produces.
    pub fn inverse(&self) -> Self {
        let mut added = 0usize;
        let mut removed = 0usize;
        let edits = self
            .edits
            .iter()
            .map(|edit| {
                let offset = edit.offset + added - removed;
                added += edit.inserted.len();
                removed += edit.removed.len();
                Edit {
                    offset,
                    removed: edit.inserted.clone(),
                    inserted: edit.removed.clone(),
                }
            })
            .collect();
        Self {
            edits,
            selection_before: self.selection_after,
            selection_after: self.selection_before,
        }
    }

    /// Map an offset in the original text to the produced text.
    ///
    /// Offsets inside a replaced range collapse to the start of its
    /// replacement.
    pub fn map_offset(&self, offset: usize) -> usize {
        let mut added = 0usize;
        let mut removed = 0usize;
        for edit in &self.edits {
            if offset < edit.offset {
                break;
            }
            if offset < edit.removed_end() {
                return edit.offset + added - removed;
            }
            added += edit.inserted.len();
            removed += edit.removed.len();
        }
        offset + added - removed
    }

    pub fn map_selection(&self, selection: Selection) -> Selection {
        Selection::new(
            self.map_offset(selection.start),
            self.map_offset(selection.end),
        )
    }
}

/// Linear undo/redo stacks. Recording a new transaction drops the redo
/// stack.
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<Transaction>,
    redo: Vec<Transaction>,
    limit: usize,
}

/// Transactions kept before the oldest is discarded.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

impl History {
    pub const fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    pub fn record(&mut self, transaction: Transaction) {
        self.redo.clear();
        self.undo.push(transaction);
        if self.undo.len() > self.limit {
            let excess = self.undo.len() - self.limit;
            self.undo.drain(..excess);
        }
    }

    /// Pop the newest transaction, moving it onto the redo stack.
    pub fn take_undo(&mut self) -> Option<Transaction> {
        let transaction = self.undo.pop()?;
        self.redo.push(transaction.clone());
        Some(transaction)
    }

    /// Pop the newest undone transaction, moving it back onto the undo stack.
    pub fn take_redo(&mut self) -> Option<Transaction> {
        let transaction = self.redo.pop()?;
        self.undo.push(transaction.clone());
        Some(transaction)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(offset: usize, removed: &str, inserted: &str) -> Edit {
        Edit {
            offset,
            removed: removed.to_string(),
            inserted: inserted.to_string(),
        }
    }

    fn replace_all_a_with_bb() -> Transaction {
        // "aXa" -> "bbXbb"
        Transaction::new(
            vec![edit(0, "a", "bb"), edit(2, "a", "bb")],
            Selection::caret(0),
            Selection::caret(0),
        )
    }

    #[test]
    fn test_map_offset_shifts_after_growing_edits() {
        let tx = replace_all_a_with_bb();
        assert_eq!(tx.map_offset(1), 2); // the X
        assert_eq!(tx.map_offset(3), 5); // end of text
    }

    #[test]
    fn test_map_offset_inside_replaced_range_collapses_to_start() {
        let tx = Transaction::new(
            vec![edit(2, "abcd", "z")],
            Selection::caret(0),
            Selection::caret(0),
        );
        assert_eq!(tx.map_offset(4), 2);
        assert_eq!(tx.map_offset(6), 3);
    }

    #[test]
    fn test_map_offset_before_edit_is_unchanged() {
        let tx = Transaction::new(
            vec![edit(5, "", "inserted")],
            Selection::caret(0),
            Selection::caret(0),
        );
        assert_eq!(tx.map_offset(3), 3);
        assert_eq!(tx.map_offset(5), 13);
    }

    #[test]
    fn test_inverse_uses_produced_coordinates() {
        let inverse = replace_all_a_with_bb().inverse();
        assert_eq!(
            inverse.edits(),
            &[edit(0, "bb", "a"), edit(3, "bb", "a")]
        );
    }

    #[test]
    fn test_inverse_swaps_selections() {
        let tx = Transaction::new(vec![edit(0, "", "x")], Selection::caret(0), Selection::caret(1));
        let inverse = tx.inverse();
        assert_eq!(inverse.selection_before(), Selection::caret(1));
        assert_eq!(inverse.selection_after(), Selection::caret(0));
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::default();
        history.record(replace_all_a_with_bb());
        assert!(history.take_undo().is_some());
        assert!(history.can_redo());
        history.record(replace_all_a_with_bb());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_then_redo_moves_between_stacks() {
        let mut history = History::default();
        history.record(replace_all_a_with_bb());
        let undone = history.take_undo().unwrap();
        assert!(!history.can_undo());
        let redone = history.take_redo().unwrap();
        assert_eq!(undone, redone);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_discards_oldest() {
        let mut history = History::new(2);
        for _ in 0..5 {
            history.record(replace_all_a_with_bb());
        }
        assert_eq!(history.undo_depth(), 2);
    }
}
