use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ropey::Rope;

use super::{MarkerHandle, TextBuffer};
use crate::error::VikeyError;

/// Undo state captured before a mutation. Rope clones are O(1), so keeping
/// whole snapshots is cheaper than it looks.
struct Snapshot {
    rope: Rope,
    caret: usize,
    anchor: usize,
    markers: Vec<Option<usize>>,
}

/// A [`TextBuffer`] backed by a rope data structure.
///
/// The rope stores the text as a balanced tree of chunks, giving O(log n)
/// indexing by line and efficient edits even on very large files. On top of
/// the raw text this adds a selection anchor, a clipboard register, grouped
/// snapshot undo, line-tracking markers, and a remembered search.
pub struct RopeBuffer {
    rope: Rope,
    filename: Option<PathBuf>,
    eol: &'static str,
    caret: usize,
    anchor: usize,
    register: Option<String>,
    undo_stack: Vec<Snapshot>,
    pending: Option<Snapshot>,
    atomic_depth: usize,
    markers: Vec<Option<usize>>,
    last_search: Option<(String, bool, bool)>,
    scroll: usize,
    view_height: usize,
    block_caret: bool,
}

/// Word-motion character class: 0 = whitespace, 1 = word, 2 = punctuation.
/// `big` collapses word and punctuation into one class (vi WORDs).
fn char_class(c: char, big: bool) -> u8 {
    if c.is_whitespace() {
        0
    } else if big || c.is_alphanumeric() || c == '_' {
        1
    } else {
        2
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl RopeBuffer {
    pub fn from_str(text: &str) -> Self {
        let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            rope: Rope::from_str(text),
            filename: None,
            eol,
            caret: 0,
            anchor: 0,
            register: None,
            undo_stack: Vec::new(),
            pending: None,
            atomic_depth: 0,
            markers: Vec::new(),
            last_search: None,
            scroll: 0,
            view_height: 24,
            block_caret: false,
        }
    }

    /// Load a file from disk into a rope-backed buffer.
    pub fn from_file(path: PathBuf) -> Result<Self, VikeyError> {
        let text = std::fs::read_to_string(&path).map_err(|e| VikeyError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut buf = Self::from_str(&text);
        buf.filename = Some(path);
        Ok(buf)
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Write the buffer contents back to its file.
    pub fn write(&self) -> Result<(), VikeyError> {
        let Some(path) = &self.filename else {
            return Ok(());
        };
        let file = std::fs::File::create(path).map_err(|e| VikeyError::FileWrite {
            path: path.display().to_string(),
            source: e,
        })?;
        self.rope
            .write_to(BufWriter::new(file))
            .map_err(|e| VikeyError::FileWrite {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(())
    }

    pub fn is_block_caret(&self) -> bool {
        self.block_caret
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll
    }

    pub fn set_view_height(&mut self, height: usize) {
        self.view_height = height.max(1);
    }

    /// Keep the caret visible within the viewport.
    pub fn adjust_scroll(&mut self) {
        let line = self.line_of(self.caret);
        if line < self.scroll {
            self.scroll = line;
        }
        if line >= self.scroll + self.view_height {
            self.scroll = line - self.view_height + 1;
        }
    }

    // ── Insert-mode editing used by the embedding editor ──────────────

    pub fn type_char(&mut self, ch: char) {
        let pos = self.caret;
        self.edit_insert(pos, &ch.to_string());
        self.set_pos(pos + 1);
    }

    pub fn type_newline(&mut self) {
        let pos = self.caret;
        let eol = self.eol;
        self.edit_insert(pos, eol);
        self.set_pos(pos + eol.chars().count());
    }

    pub fn backspace(&mut self) {
        if self.caret == 0 {
            return;
        }
        let pos = self.caret;
        self.edit_remove(pos - 1, pos);
        self.set_pos(pos - 1);
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            rope: self.rope.clone(),
            caret: self.caret,
            anchor: self.anchor,
            markers: self.markers.clone(),
        }
    }

    /// Commit an undo entry for the mutation about to happen. Inside an
    /// atomic scope only the first mutation commits the scope's snapshot.
    fn record_undo(&mut self) {
        if self.atomic_depth > 0 {
            if let Some(snap) = self.pending.take() {
                self.undo_stack.push(snap);
            }
        } else {
            let snap = self.snapshot();
            self.undo_stack.push(snap);
        }
    }

    fn edit_insert(&mut self, pos: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let pos = pos.min(self.rope.len_chars());
        self.record_undo();
        let ins_line = self.rope.char_to_line(pos);
        let at_line_start = pos == self.rope.line_to_char(ins_line);
        let newlines = text.matches('\n').count();
        if newlines > 0 {
            for slot in self.markers.iter_mut().flatten() {
                if *slot > ins_line || (*slot == ins_line && at_line_start) {
                    *slot += newlines;
                }
            }
        }
        self.rope.insert(pos, text);
    }

    fn edit_remove(&mut self, start: usize, end: usize) {
        let end = end.min(self.rope.len_chars());
        if start >= end {
            return;
        }
        self.record_undo();
        let start_line = self.rope.char_to_line(start);
        let end_line = self.rope.char_to_line(end);
        let removed = end_line - start_line;
        if removed > 0 {
            let full_start = start == self.rope.line_to_char(start_line);
            let end_at_line_start = end == self.rope.line_to_char(end_line);
            for slot in self.markers.iter_mut() {
                let Some(line) = *slot else { continue };
                if line < start_line {
                    continue;
                } else if line == start_line {
                    if full_start {
                        *slot = None;
                    }
                } else if line < end_line {
                    *slot = None;
                } else if line == end_line {
                    *slot = if end_at_line_start {
                        Some(line - removed)
                    } else {
                        // The tail of this line merges into the start line.
                        Some(start_line)
                    };
                } else {
                    *slot = Some(line - removed);
                }
            }
        }
        self.rope.remove(start..end);
    }

    fn char_at(&self, idx: usize) -> Option<char> {
        if idx < self.rope.len_chars() {
            Some(self.rope.char(idx))
        } else {
            None
        }
    }

    fn apply_motion(&mut self, new_pos: usize, extend: bool) {
        self.caret = new_pos.min(self.rope.len_chars());
        if !extend {
            self.anchor = self.caret;
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.rope.slice(start..end).to_string()
    }

    fn last_line(&self) -> usize {
        self.line_count().saturating_sub(1)
    }
}

impl TextBuffer for RopeBuffer {
    fn pos(&self) -> usize {
        self.caret
    }

    fn set_pos(&mut self, pos: usize) {
        self.caret = pos.min(self.rope.len_chars());
        self.anchor = self.caret;
    }

    fn selection(&self) -> (usize, usize) {
        (self.anchor, self.caret)
    }

    fn set_selection(&mut self, anchor: usize, caret: usize) {
        let len = self.rope.len_chars();
        self.anchor = anchor.min(len);
        self.caret = caret.min(len);
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Number of lines, not counting the empty line a trailing terminator
    /// produces.
    fn line_count(&self) -> usize {
        let count = self.rope.len_lines();
        if count > 1 && self.rope.line(count - 1).len_chars() == 0 {
            count - 1
        } else {
            count
        }
    }

    fn line_of(&self, pos: usize) -> usize {
        self.rope
            .char_to_line(pos.min(self.rope.len_chars()))
            .min(self.last_line())
    }

    fn line_start(&self, line: usize) -> usize {
        self.rope.line_to_char(line.min(self.last_line()))
    }

    fn line_end(&self, line: usize) -> usize {
        let line = line.min(self.last_line());
        let slice = self.rope.line(line);
        let mut len = slice.len_chars();
        let text = slice;
        // Trim the terminator.
        if len > 0 && text.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && text.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        self.rope.line_to_char(line) + len
    }

    fn line_text(&self, line: usize) -> String {
        let start = self.line_start(line);
        let end = self.line_end(line);
        self.slice(start, end)
    }

    fn eol(&self) -> &'static str {
        self.eol
    }

    fn move_left(&mut self, n: usize, extend: bool) {
        let start = self.line_start(self.line_of(self.caret));
        let new = self.caret.saturating_sub(n).max(start);
        self.apply_motion(new, extend);
    }

    fn move_right(&mut self, n: usize, extend: bool) {
        let end = self.line_end(self.line_of(self.caret));
        let new = (self.caret + n).min(end);
        self.apply_motion(new, extend);
    }

    fn move_up(&mut self, n: usize, extend: bool) {
        let line = self.line_of(self.caret);
        let col = self.caret - self.line_start(line);
        let target = line.saturating_sub(n);
        let start = self.line_start(target);
        let new = (start + col).min(self.line_end(target));
        self.apply_motion(new, extend);
    }

    fn move_down(&mut self, n: usize, extend: bool) {
        let line = self.line_of(self.caret);
        let col = self.caret - self.line_start(line);
        let target = (line + n).min(self.last_line());
        let start = self.line_start(target);
        let new = (start + col).min(self.line_end(target));
        self.apply_motion(new, extend);
    }

    fn word_right(&mut self, big: bool, extend: bool) {
        let len = self.rope.len_chars();
        let mut i = self.caret;
        if let Some(c) = self.char_at(i) {
            let cls = char_class(c, big);
            if cls != 0 {
                while i < len && char_class(self.rope.char(i), big) == cls {
                    i += 1;
                }
            }
        }
        while i < len && self.rope.char(i).is_whitespace() {
            i += 1;
        }
        self.apply_motion(i, extend);
    }

    fn word_left(&mut self, big: bool, extend: bool) {
        if self.caret == 0 {
            self.apply_motion(0, extend);
            return;
        }
        let mut i = self.caret - 1;
        while i > 0 && self.rope.char(i).is_whitespace() {
            i -= 1;
        }
        if self.rope.char(i).is_whitespace() {
            self.apply_motion(0, extend);
            return;
        }
        let cls = char_class(self.rope.char(i), big);
        while i > 0 && char_class(self.rope.char(i - 1), big) == cls {
            i -= 1;
        }
        self.apply_motion(i, extend);
    }

    fn word_end_right(&mut self, big: bool, extend: bool) {
        let len = self.rope.len_chars();
        if len == 0 {
            return;
        }
        let mut i = (self.caret + 1).min(len.saturating_sub(1));
        while i < len && self.rope.char(i).is_whitespace() {
            i += 1;
        }
        if i >= len {
            self.apply_motion(len.saturating_sub(1), extend);
            return;
        }
        let cls = char_class(self.rope.char(i), big);
        while i + 1 < len && char_class(self.rope.char(i + 1), big) == cls {
            i += 1;
        }
        self.apply_motion(i, extend);
    }

    fn para_down(&mut self, extend: bool) {
        let last = self.last_line();
        let mut line = self.line_of(self.caret);
        // Skip past the current paragraph, then land on the blank line.
        while line < last && self.line_end(line) == self.line_start(line) {
            line += 1;
        }
        while line < last && self.line_end(line) > self.line_start(line) {
            line += 1;
        }
        let new = if self.line_end(line) == self.line_start(line) {
            self.line_start(line)
        } else {
            self.line_end(line)
        };
        self.apply_motion(new, extend);
    }

    fn para_up(&mut self, extend: bool) {
        let mut line = self.line_of(self.caret);
        while line > 0 && self.line_end(line) == self.line_start(line) {
            line -= 1;
        }
        while line > 0 && self.line_end(line) > self.line_start(line) {
            line -= 1;
        }
        self.apply_motion(self.line_start(line), extend);
    }

    fn insert_text(&mut self, pos: usize, text: &str) {
        self.edit_insert(pos, text);
    }

    fn remove_text(&mut self, start: usize, end: usize) {
        self.edit_remove(start, end);
        let len = self.rope.len_chars();
        self.caret = self.caret.min(len);
        self.anchor = self.anchor.min(len);
    }

    fn cut_selection(&mut self) {
        let (a, b) = self.selection();
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        if start == end {
            return;
        }
        self.register = Some(self.slice(start, end));
        self.edit_remove(start, end);
        self.caret = start;
        self.anchor = start;
    }

    fn copy_selection(&mut self) {
        let (a, b) = self.selection();
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        if start == end {
            return;
        }
        self.register = Some(self.slice(start, end));
        self.anchor = self.caret;
    }

    fn clipboard_text(&self) -> Option<String> {
        self.register.clone()
    }

    fn begin_atomic(&mut self) {
        if self.atomic_depth == 0 {
            self.pending = Some(self.snapshot());
        }
        self.atomic_depth += 1;
    }

    fn end_atomic(&mut self) {
        self.atomic_depth = self.atomic_depth.saturating_sub(1);
        if self.atomic_depth == 0 {
            self.pending = None;
        }
    }

    fn undo(&mut self) {
        if let Some(snap) = self.undo_stack.pop() {
            self.rope = snap.rope;
            self.caret = snap.caret;
            self.anchor = snap.anchor;
            self.markers = snap.markers;
        }
    }

    fn join_lines(&mut self, line: usize, count: usize) {
        let joins = count.max(2) - 1;
        for _ in 0..joins {
            if line + 1 >= self.line_count() {
                break;
            }
            let at = self.line_end(line);
            let next_start = self.line_start(line + 1);
            let ws: usize = self
                .line_text(line + 1)
                .chars()
                .take_while(|c| c.is_whitespace())
                .count();
            self.edit_remove(at, next_start + ws);
            self.edit_insert(at, " ");
            self.caret = at;
            self.anchor = at;
        }
    }

    fn indent_lines(&mut self, first: usize, last: usize) {
        let last = last.min(self.last_line());
        for line in first..=last {
            if self.line_end(line) > self.line_start(line) {
                let start = self.line_start(line);
                self.edit_insert(start, "\t");
            }
        }
    }

    fn unindent_lines(&mut self, first: usize, last: usize) {
        let last = last.min(self.last_line());
        for line in first..=last {
            let start = self.line_start(line);
            let text = self.line_text(line);
            let take = if text.starts_with('\t') {
                1
            } else {
                text.chars().take_while(|&c| c == ' ').count().min(4)
            };
            self.edit_remove(start, start + take);
        }
    }

    fn add_marker(&mut self, line: usize) -> MarkerHandle {
        self.markers.push(Some(line.min(self.last_line())));
        MarkerHandle(self.markers.len() - 1)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if let Some(slot) = self.markers.get_mut(handle.0) {
            *slot = None;
        }
    }

    fn marker_line(&self, handle: MarkerHandle) -> Option<usize> {
        self.markers.get(handle.0).copied().flatten()
    }

    fn ident_under_cursor(&self) -> Option<String> {
        let line = self.line_of(self.caret);
        let start = self.line_start(line);
        let chars: Vec<char> = self.line_text(line).chars().collect();
        let col = self.caret - start;
        if col >= chars.len() || !is_ident(chars[col]) {
            return None;
        }
        let mut lo = col;
        while lo > 0 && is_ident(chars[lo - 1]) {
            lo -= 1;
        }
        let mut hi = col;
        while hi + 1 < chars.len() && is_ident(chars[hi + 1]) {
            hi += 1;
        }
        Some(chars[lo..=hi].iter().collect())
    }

    fn find_text(
        &self,
        pattern: &str,
        from: usize,
        forward: bool,
        whole_word: bool,
    ) -> Option<usize> {
        let text: Vec<char> = self.rope.chars().collect();
        let pat: Vec<char> = pattern.chars().collect();
        if pat.is_empty() || pat.len() > text.len() {
            return None;
        }
        let max_start = text.len() - pat.len();
        let matches_at = |start: usize| -> bool {
            if text[start..start + pat.len()] != pat[..] {
                return false;
            }
            if whole_word {
                if start > 0 && is_ident(text[start - 1]) {
                    return false;
                }
                let after = start + pat.len();
                if after < text.len() && is_ident(text[after]) {
                    return false;
                }
            }
            true
        };
        if forward {
            (from.min(max_start + 1)..=max_start).find(|&s| matches_at(s))
        } else {
            (0..=from.min(max_start)).rev().find(|&s| matches_at(s))
        }
    }

    fn remember_search(&mut self, pattern: &str, forward: bool, whole_word: bool) {
        self.last_search = Some((pattern.to_string(), forward, whole_word));
    }

    fn repeat_search(&mut self) {
        let Some((pattern, forward, whole)) = self.last_search.clone() else {
            return;
        };
        let found = if forward {
            self.find_text(&pattern, self.caret + 1, true, whole)
                .or_else(|| self.find_text(&pattern, 0, true, whole))
        } else {
            self.find_text(&pattern, self.caret.saturating_sub(1), false, whole)
                .or_else(|| self.find_text(&pattern, self.rope.len_chars(), false, whole))
        };
        if let Some(pos) = found {
            self.set_pos(pos);
        }
    }

    fn first_visible_line(&self) -> usize {
        self.scroll
    }

    fn visible_line_count(&self) -> usize {
        self.view_height
    }

    fn scroll_to_line(&mut self, line: usize) {
        self.scroll = line.min(self.last_line());
    }

    fn set_block_caret(&mut self, block: bool) {
        self.block_caret = block;
    }
}
