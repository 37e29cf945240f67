//! The document buffer.
//!
//! This module handles:
//! - Holding the text of the single open document in a rope
//! - Dirty tracking against the last load/save snapshot
//! - Undoable edits, including multi-range transactions
//!
//! No operation here performs file I/O. Every state change returns a
//! [`DocumentChange`] for the host to route onward.

mod buffer;
mod history;

pub use buffer::{APP_NAME, ChangeKind, ContentOrigin, Document, DocumentChange};
pub use history::{DEFAULT_HISTORY_LIMIT, Edit, History, Selection, Transaction};
