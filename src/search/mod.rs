//! Find and replace over the open document.
//!
//! The engine is idle until opened. While active it keeps the last query,
//! replacement and match so a host can repeat "find next" without asking
//! again. Closing discards that state and never touches the document.
//!
//! Matching is literal. Case-insensitive matching folds ASCII only, which
//! keeps byte offsets identical between the folded and original text.

use std::borrow::Cow;
use std::ops::Range;

use crate::document::{Document, DocumentChange, Edit, Selection};

/// How queries match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub match_case: bool,
    /// Require non-word characters (or the text edge) on both sides.
    pub whole_word: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_case: true,
            whole_word: false,
        }
    }
}

/// State of an active find/replace session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    pub replacement: String,
    /// Byte offset the next forward search starts from.
    pub cursor_position: usize,
    pub options: SearchOptions,
    pub last_match: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    /// The byte range now selected in the document.
    Found(Range<usize>),
    NotFound,
}

impl SearchResult {
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Result of [`FindReplace::replace_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Whether the selection matched and was replaced.
    pub replaced: bool,
    /// The follow-up search.
    pub result: SearchResult,
    pub change: Option<DocumentChange>,
}

/// Result of [`FindReplace::replace_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceAllOutcome {
    pub count: usize,
    /// `None` when nothing matched; the document is then untouched.
    pub change: Option<DocumentChange>,
}

/// The find/replace engine.
#[derive(Debug, Clone, Default)]
pub struct FindReplace {
    state: Option<SearchState>,
}

impl FindReplace {
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Start a fresh session, discarding any previous state.
    pub fn open(&mut self) -> &mut SearchState {
        self.state.insert(SearchState::default())
    }

    pub fn close(&mut self) {
        self.state = None;
    }

    pub const fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub const fn state(&self) -> Option<&SearchState> {
        self.state.as_ref()
    }

    pub fn set_options(&mut self, options: SearchOptions) {
        self.active().options = options;
    }

    fn active(&mut self) -> &mut SearchState {
        self.state.get_or_insert_with(SearchState::default)
    }

    /// Select the next occurrence of `query` after the cursor, wrapping to
    /// the start of the document once.
    pub fn find_next(&mut self, document: &mut Document, query: &str) -> SearchResult {
        let state = self.active();
        query.clone_into(&mut state.query);
        if query.is_empty() {
            state.last_match = None;
            return SearchResult::NotFound;
        }

        let text = document.text();
        let from = document.selection().end;
        let matcher = Matcher::new(&text, query, state.options);
        let found = matcher.find_from(from).or_else(|| matcher.find_from(0));

        let Some(range) = found else {
            state.last_match = None;
            return SearchResult::NotFound;
        };
        document.set_selection(Selection::new(range.start, range.end));
        state.cursor_position = range.end;
        state.last_match = Some(range.clone());
        SearchResult::Found(range)
    }

    /// Replace the selection if it is an occurrence of `query`, then move
    /// on to the next occurrence.
    pub fn replace_one(
        &mut self,
        document: &mut Document,
        query: &str,
        replacement: &str,
    ) -> ReplaceOutcome {
        let state = self.active();
        replacement.clone_into(&mut state.replacement);
        let options = state.options;
        if query.is_empty() {
            return ReplaceOutcome {
                replaced: false,
                result: self.find_next(document, query),
                change: None,
            };
        }

        let selection = document.selection();
        let text = document.text();
        let selected_match = !selection.is_empty()
            && find_from(&text, query, selection.start, options) == Some(selection.range());

        let change = if selected_match {
            let edit = Edit {
                offset: selection.start,
                removed: text[selection.range()].to_string(),
                inserted: replacement.to_string(),
            };
            let caret = Selection::caret(selection.start + replacement.len());
            document.replace_ranges(vec![edit], Some(caret))
        } else {
            None
        };

        ReplaceOutcome {
            replaced: change.is_some(),
            result: self.find_next(document, query),
            change,
        }
    }

    /// Replace every occurrence as one undoable step.
    ///
    /// Occurrences are taken left to right without overlap from the
    /// original text, so replacement text is never searched again. The
    /// selection and scroll position are mapped through the batch.
    pub fn replace_all(
        &mut self,
        document: &mut Document,
        query: &str,
        replacement: &str,
    ) -> ReplaceAllOutcome {
        let state = self.active();
        query.clone_into(&mut state.query);
        replacement.clone_into(&mut state.replacement);
        state.last_match = None;
        if query.is_empty() {
            return ReplaceAllOutcome {
                count: 0,
                change: None,
            };
        }

        let _scope = crate::perf::scope("search.replace_all");
        let text = document.text();
        let edits: Vec<Edit> = find_matches(&text, query, state.options)
            .into_iter()
            .map(|range| Edit {
                offset: range.start,
                removed: text[range].to_string(),
                inserted: replacement.to_string(),
            })
            .collect();
        let count = edits.len();
        let change = document.replace_ranges(edits, None);
        state.cursor_position = document.selection().end;
        tracing::debug!(count, "replace all");
        ReplaceAllOutcome { count, change }
    }
}

/// Every non-overlapping occurrence of `needle`, left to right.
pub fn find_matches(haystack: &str, needle: &str, options: SearchOptions) -> Vec<Range<usize>> {
    let matcher = Matcher::new(haystack, needle, options);
    let mut matches = Vec::new();
    let mut from = 0;
    while let Some(range) = matcher.find_from(from) {
        from = range.end;
        matches.push(range);
    }
    matches
}

/// First occurrence of `needle` starting at or after byte `from`.
pub fn find_from(
    haystack: &str,
    needle: &str,
    from: usize,
    options: SearchOptions,
) -> Option<Range<usize>> {
    Matcher::new(haystack, needle, options).find_from(from)
}

/// A needle prepared against one haystack. Case folding happens once here,
/// not per lookup.
struct Matcher<'a> {
    haystack: &'a str,
    folded: Cow<'a, str>,
    needle: Cow<'a, str>,
    whole_word: bool,
}

impl<'a> Matcher<'a> {
    fn new(haystack: &'a str, needle: &'a str, options: SearchOptions) -> Self {
        let (folded, needle) = if options.match_case {
            (Cow::Borrowed(haystack), Cow::Borrowed(needle))
        } else {
            (
                Cow::Owned(haystack.to_ascii_lowercase()),
                Cow::Owned(needle.to_ascii_lowercase()),
            )
        };
        Self {
            haystack,
            folded,
            needle,
            whole_word: options.whole_word,
        }
    }

    fn find_from(&self, from: usize) -> Option<Range<usize>> {
        let pattern = self.needle.as_ref();
        if pattern.is_empty() || from > self.haystack.len() || !self.haystack.is_char_boundary(from)
        {
            return None;
        }

        let hay = self.folded.as_ref();
        let mut start = from;
        while let Some(pos) = hay[start..].find(pattern) {
            let begin = start + pos;
            let end = begin + pattern.len();
            if !self.whole_word || is_whole_word(self.haystack, begin, end) {
                return Some(begin..end);
            }
            let step = self.haystack[begin..].chars().next().map_or(1, char::len_utf8);
            start = begin + step;
        }
        None
    }
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn insensitive() -> SearchOptions {
        SearchOptions {
            match_case: false,
            whole_word: false,
        }
    }

    #[test]
    fn test_find_next_cycles_with_wrap() {
        let mut doc = Document::from_text("abcabc");
        let mut finder = FindReplace::new();

        assert_eq!(finder.find_next(&mut doc, "abc"), SearchResult::Found(0..3));
        assert_eq!(finder.find_next(&mut doc, "abc"), SearchResult::Found(3..6));
        assert_eq!(finder.find_next(&mut doc, "abc"), SearchResult::Found(0..3));
        assert_eq!(doc.selection(), Selection::new(0, 3));
    }

    #[test]
    fn test_find_next_empty_query_is_not_found() {
        let mut doc = Document::from_text("abc");
        let mut finder = FindReplace::new();
        assert_eq!(finder.find_next(&mut doc, ""), SearchResult::NotFound);
        assert_eq!(doc.selection(), Selection::default());
    }

    #[test]
    fn test_find_next_missing_query_is_not_found() {
        let mut doc = Document::from_text("abc");
        let mut finder = FindReplace::new();
        assert_eq!(finder.find_next(&mut doc, "zzz"), SearchResult::NotFound);
        assert!(finder.state().unwrap().last_match.is_none());
    }

    #[test]
    fn test_find_next_opens_engine_and_tracks_state() {
        let mut doc = Document::from_text("one two");
        let mut finder = FindReplace::new();
        assert!(!finder.is_active());

        finder.find_next(&mut doc, "two");
        let state = finder.state().unwrap();
        assert_eq!(state.query, "two");
        assert_eq!(state.cursor_position, 7);
        assert_eq!(state.last_match, Some(4..7));
    }

    #[test]
    fn test_close_discards_state_but_not_document() {
        let mut doc = Document::from_text("abc");
        let mut finder = FindReplace::new();
        finder.find_next(&mut doc, "b");
        finder.close();
        assert!(finder.state().is_none());
        assert_eq!(doc.text(), "abc");
        assert_eq!(doc.selection(), Selection::new(1, 2));
    }

    #[test]
    fn test_reopen_resets_state() {
        let mut finder = FindReplace::new();
        finder.set_options(insensitive());
        finder.open().query = "x".to_string();
        let state = finder.open();
        assert_eq!(state, &mut SearchState::default());
    }

    #[test]
    fn test_case_insensitive_find() {
        let mut doc = Document::from_text("Hello HELLO");
        let mut finder = FindReplace::new();
        finder.set_options(insensitive());
        assert_eq!(finder.find_next(&mut doc, "hello"), SearchResult::Found(0..5));
        assert_eq!(finder.find_next(&mut doc, "hello"), SearchResult::Found(6..11));
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let mut doc = Document::from_text("Hello hello");
        let mut finder = FindReplace::new();
        assert_eq!(finder.find_next(&mut doc, "hello"), SearchResult::Found(6..11));
    }

    #[test]
    fn test_whole_word_skips_embedded_matches() {
        let options = SearchOptions {
            match_case: true,
            whole_word: true,
        };
        assert_eq!(find_matches("cat concat cat_x cat.", "cat", options), vec![0..3, 17..20]);
    }

    #[test]
    fn test_find_handles_multibyte_text() {
        let text = "ñandú ñandú";
        let ranges = find_matches(text, "ñandú", SearchOptions::default());
        assert_eq!(ranges.len(), 2);
        assert_eq!(&text[ranges[1].clone()], "ñandú");
    }

    #[test]
    fn test_replace_one_requires_selection_match() {
        let mut doc = Document::from_text("foo bar foo");
        let mut finder = FindReplace::new();

        // Nothing selected: behaves as find.
        let outcome = finder.replace_one(&mut doc, "foo", "X");
        assert!(!outcome.replaced);
        assert_eq!(outcome.result, SearchResult::Found(0..3));
        assert_eq!(doc.text(), "foo bar foo");

        let outcome = finder.replace_one(&mut doc, "foo", "X");
        assert!(outcome.replaced);
        assert_eq!(doc.text(), "X bar foo");
        assert_eq!(outcome.result, SearchResult::Found(6..9));
        assert!(outcome.change.unwrap().dirty);
    }

    #[test]
    fn test_replace_one_with_stale_selection_only_finds() {
        let mut doc = Document::from_text("foo bar");
        doc.set_selection(Selection::new(4, 7));
        let mut finder = FindReplace::new();
        let outcome = finder.replace_one(&mut doc, "foo", "X");
        assert!(!outcome.replaced);
        assert_eq!(doc.text(), "foo bar");
        assert_eq!(outcome.result, SearchResult::Found(0..3));
    }

    #[test]
    fn test_replace_all_is_one_undo_step() {
        let mut doc = Document::from_text("aaa");
        let mut finder = FindReplace::new();

        let outcome = finder.replace_all(&mut doc, "a", "bb");
        assert_eq!(outcome.count, 3);
        assert_eq!(doc.text(), "bbbbbb");
        assert!(doc.is_dirty());

        let _ = doc.undo();
        assert_eq!(doc.text(), "aaa");
        assert!(!doc.is_dirty());
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_replace_all_zero_matches_is_noop() {
        let mut doc = Document::from_text("abc");
        let mut finder = FindReplace::new();
        let outcome = finder.replace_all(&mut doc, "zzz", "y");
        assert_eq!(outcome.count, 0);
        assert!(outcome.change.is_none());
        assert!(!doc.is_dirty());
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_replace_all_empty_query_is_noop() {
        let mut doc = Document::from_text("abc");
        let mut finder = FindReplace::new();
        let outcome = finder.replace_all(&mut doc, "", "y");
        assert_eq!(outcome.count, 0);
        assert_eq!(doc.text(), "abc");
    }

    #[test]
    fn test_replace_all_maps_cursor_through_batch() {
        let mut doc = Document::from_text("x a y a z");
        doc.set_selection(Selection::caret(8)); // before "z"
        let mut finder = FindReplace::new();
        finder.replace_all(&mut doc, "a", "long");
        assert_eq!(doc.text(), "x long y long z");
        assert_eq!(doc.selection(), Selection::caret(14));
    }

    #[test]
    fn test_replace_all_does_not_rescan_replacement() {
        let mut doc = Document::from_text("ab");
        let mut finder = FindReplace::new();
        let outcome = finder.replace_all(&mut doc, "a", "aa");
        assert_eq!(outcome.count, 1);
        assert_eq!(doc.text(), "aab");
    }

    #[test]
    fn test_case_insensitive_replace_all_on_large_document() {
        let text = "A a ".repeat(25_000);
        let mut doc = Document::from_text(&text);
        let mut finder = FindReplace::new();
        finder.set_options(insensitive());

        let outcome = finder.replace_all(&mut doc, "a", "b");

        assert_eq!(outcome.count, 50_000);
        assert_eq!(doc.text(), "b b ".repeat(25_000));
    }

    #[test]
    fn test_find_matches_case_insensitive_whole_word() {
        let options = SearchOptions {
            match_case: false,
            whole_word: true,
        };
        assert_eq!(find_matches("Cat cat_ CAT", "cat", options), vec![0..3, 9..12]);
    }

    proptest! {
        #[test]
        fn prop_replace_all_matches_str_replace(
            text in "[ab ]{0,40}",
            query in "[ab]{1,3}",
            replacement in "[ab]{0,4}",
        ) {
            let mut doc = Document::from_text(&text);
            let mut finder = FindReplace::new();
            let outcome = finder.replace_all(&mut doc, &query, &replacement);
            prop_assert_eq!(doc.text(), text.replace(&query, &replacement));
            prop_assert_eq!(outcome.count, text.matches(query.as_str()).count());
        }

        #[test]
        fn prop_replace_all_undo_restores_original(
            text in "[abc\n]{0,40}",
            query in "[abc]{1,2}",
            replacement in "[xyz]{0,3}",
        ) {
            let mut doc = Document::from_text(&text);
            let mut finder = FindReplace::new();
            let outcome = finder.replace_all(&mut doc, &query, &replacement);
            if outcome.change.is_some() {
                let _ = doc.undo();
            }
            prop_assert_eq!(doc.text(), text);
            prop_assert!(!doc.is_dirty());
        }

        #[test]
        fn prop_case_insensitive_matches_lowercased_search(
            text in "[aAbB]{0,30}",
            query in "[aAbB]{1,3}",
        ) {
            let found = find_matches(&text, &query, SearchOptions { match_case: false, whole_word: false });
            let expected: Vec<_> = text
                .to_ascii_lowercase()
                .match_indices(&query.to_ascii_lowercase())
                .map(|(i, m)| i..i + m.len())
                .collect();
            prop_assert_eq!(found, expected);
        }
    }
}
