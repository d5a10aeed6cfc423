//! The capability interface the interpreter requires from its host editor.
//!
//! The interpreter never owns the text; it drives an implementation of
//! [`TextBuffer`] supplied by the embedder. [`rope::RopeBuffer`] is the
//! ropey-backed implementation used by the demo editor and by tests.

pub mod rope;

pub use rope::RopeBuffer;

/// Opaque reference to a line-tracking marker. Valid until the buffer
/// invalidates it (for example when the marked line is deleted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub(crate) usize);

/// Abstract text-buffer capability consumed by the command executor.
///
/// Positions are absolute character indices; lines are 0-indexed. Motions
/// move the caret, and with `extend` set they keep the selection anchor in
/// place so an operator can act on the swept span.
pub trait TextBuffer {
    // ── Position and geometry ─────────────────────────────────────────

    fn pos(&self) -> usize;
    fn set_pos(&mut self, pos: usize);
    /// Current selection as (anchor, caret). Equal values mean no selection.
    fn selection(&self) -> (usize, usize);
    fn set_selection(&mut self, anchor: usize, caret: usize);
    fn len_chars(&self) -> usize;
    fn line_count(&self) -> usize;
    fn line_of(&self, pos: usize) -> usize;
    fn line_start(&self, line: usize) -> usize;
    /// Position just before the line terminator (or end of text).
    fn line_end(&self, line: usize) -> usize;
    /// Text of one line without its terminator.
    fn line_text(&self, line: usize) -> String;
    /// The buffer's line terminator.
    fn eol(&self) -> &'static str;

    // ── Motions ───────────────────────────────────────────────────────

    /// Move left within the current line.
    fn move_left(&mut self, n: usize, extend: bool);
    /// Move right within the current line.
    fn move_right(&mut self, n: usize, extend: bool);
    fn move_up(&mut self, n: usize, extend: bool);
    fn move_down(&mut self, n: usize, extend: bool);
    /// Next word start; `big` uses whitespace-delimited WORDs.
    fn word_right(&mut self, big: bool, extend: bool);
    /// Previous word start.
    fn word_left(&mut self, big: bool, extend: bool);
    /// End of the current or next word.
    fn word_end_right(&mut self, big: bool, extend: bool);
    fn para_down(&mut self, extend: bool);
    fn para_up(&mut self, extend: bool);

    // ── Edits ─────────────────────────────────────────────────────────

    fn insert_text(&mut self, pos: usize, text: &str);
    /// Remove a range without touching the clipboard.
    fn remove_text(&mut self, start: usize, end: usize);
    /// Remove the selection and place it on the clipboard.
    fn cut_selection(&mut self);
    /// Copy the selection to the clipboard without removing it.
    fn copy_selection(&mut self);
    fn clipboard_text(&self) -> Option<String>;
    /// Open an atomic edit scope; nested calls are flattened into one undo
    /// step, and a scope with no edits leaves no undo entry.
    fn begin_atomic(&mut self);
    fn end_atomic(&mut self);
    fn undo(&mut self);
    /// Join `count` lines starting at `line` (vi `J` semantics: terminator
    /// plus leading whitespace collapse to a single space).
    fn join_lines(&mut self, line: usize, count: usize);
    fn indent_lines(&mut self, first: usize, last: usize);
    fn unindent_lines(&mut self, first: usize, last: usize);

    // ── Markers ───────────────────────────────────────────────────────

    fn add_marker(&mut self, line: usize) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    /// Line the marker currently tracks, or `None` once invalidated.
    fn marker_line(&self, handle: MarkerHandle) -> Option<usize>;

    // ── Search ────────────────────────────────────────────────────────

    /// Identifier token under the caret, if the caret sits on one.
    fn ident_under_cursor(&self) -> Option<String>;
    /// Case-sensitive search. Forward finds the first match at or after
    /// `from`; backward the last match at or before `from`. No wraparound;
    /// callers wrap by re-searching from the far end.
    fn find_text(&self, pattern: &str, from: usize, forward: bool, whole_word: bool)
    -> Option<usize>;
    /// Record the active search so `n` can repeat it.
    fn remember_search(&mut self, pattern: &str, forward: bool, whole_word: bool);
    /// Jump to the next match of the remembered search, wrapping around.
    fn repeat_search(&mut self);

    // ── View ──────────────────────────────────────────────────────────

    fn first_visible_line(&self) -> usize;
    fn visible_line_count(&self) -> usize;
    fn scroll_to_line(&mut self, line: usize);
    /// Visual mode indicator: block caret in normal mode, bar in insert.
    fn set_block_caret(&mut self, block: bool);
}
