//! Command execution against the abstract text buffer.
//!
//! Every mutating command runs inside one atomic-edit scope so it undoes as
//! a single step no matter how large its internal repeat is. Commands the
//! grammar accepts but this module has no mapping for (`><`, `dy`, ...) are
//! a classifier/executor contract mismatch: loud in development builds,
//! silently discarded in release.

use crate::grammar::Command;
use crate::marks::{Mark, MarkTable};
use crate::textbuf::TextBuffer;

/// Lines kept above a search match so it never lands on the top view line.
const SEARCH_SCROLL_MARGIN: usize = 5;

/// Input widget the embedder is asked to open for `:`, `/` and `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Command,
    SearchForward,
    SearchBackward,
}

/// Result of executing one classified command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Command ran (possibly as a no-op); stay in normal mode.
    Handled,
    /// Command ran and the handler must switch to insert mode.
    SwitchInsert,
    /// Ask the embedder to open a command/search input.
    OpenPrompt(Prompt),
    /// Command aborted without mutating anything.
    Rejected,
}

fn contract_mismatch(what: &str) -> Effect {
    log::error!("no executor mapping for classified command: {what}");
    debug_assert!(false, "no executor mapping for classified command: {what}");
    Effect::Rejected
}

/// Execute a classified command. `Repeat` and `FindAgain` must be resolved
/// by the handler before reaching this point.
pub fn execute<B: TextBuffer>(cmd: &Command, buf: &mut B, marks: &mut MarkTable) -> Effect {
    match cmd {
        Command::Single(c) => exec_single(*c, buf),
        Command::Counted { count, key } => exec_counted(*count, *key, buf),
        Command::Operator { count, op, motion } => exec_operator(*count, *op, *motion, buf),
        Command::Find {
            count,
            kind,
            target,
        } => exec_find(*count, *kind, *target, buf),
        Command::Goto(sub) => exec_goto(*sub, buf),
        Command::IdentSearch { reverse } => exec_ident_search(*reverse, buf),
        Command::SetMark(label) => exec_set_mark(*label, buf, marks),
        Command::JumpMark(label) => exec_jump_mark(*label, buf, marks),
        Command::Repeat | Command::FindAgain { .. } => {
            contract_mismatch("repeat commands must be resolved by the handler")
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

fn current_line<B: TextBuffer>(buf: &B) -> usize {
    buf.line_of(buf.pos())
}

/// Position of the first non-whitespace character on `line` (column 0 when
/// the line is blank).
fn first_non_blank<B: TextBuffer>(buf: &B, line: usize) -> usize {
    let start = buf.line_start(line);
    let end = buf.line_end(line);
    let offset = buf
        .line_text(line)
        .chars()
        .take_while(|c| c.is_whitespace())
        .count();
    if start + offset >= end { start } else { start + offset }
}

/// Last character position on `line` (normal-mode `$` target).
fn last_char_pos<B: TextBuffer>(buf: &B, line: usize) -> usize {
    let start = buf.line_start(line);
    let end = buf.line_end(line);
    if end > start { end - 1 } else { start }
}

fn goto_line<B: TextBuffer>(buf: &mut B, line: usize) {
    let line = line.min(buf.line_count().saturating_sub(1));
    let pos = first_non_blank(buf, line);
    buf.set_pos(pos);
}

/// End of a linewise span covering `top..=bottom`, including the trailing
/// terminator when one exists.
fn linewise_end<B: TextBuffer>(buf: &B, bottom: usize) -> usize {
    if bottom + 1 < buf.line_count() {
        buf.line_start(bottom + 1)
    } else {
        buf.len_chars()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether the caret sits on a non-whitespace character of its line.
fn cursor_on_word<B: TextBuffer>(buf: &B) -> bool {
    let line = current_line(buf);
    let col = buf.pos() - buf.line_start(line);
    buf.line_text(line)
        .chars()
        .nth(col)
        .is_some_and(|c| !c.is_whitespace())
}

/// Start position of the identifier the caret sits in (the caret position
/// itself when it is not on an identifier character).
fn ident_start<B: TextBuffer>(buf: &B) -> usize {
    let line = current_line(buf);
    let start = buf.line_start(line);
    let chars: Vec<char> = buf.line_text(line).chars().collect();
    let mut col = buf.pos() - start;
    while col > 0 && col <= chars.len() && is_ident_char(chars[col - 1]) {
        col -= 1;
    }
    start + col
}

/// Pull the caret back onto a real line after a cut that may have removed
/// the text it sat on.
fn reseat_after_cut<B: TextBuffer>(buf: &mut B) {
    let len = buf.len_chars();
    if len == 0 {
        buf.set_pos(0);
        return;
    }
    if buf.pos() >= len {
        let line = buf.line_of(len - 1);
        buf.set_pos(buf.line_start(line));
    }
}

// ── Single keys ───────────────────────────────────────────────────────

fn exec_single<B: TextBuffer>(key: char, buf: &mut B) -> Effect {
    match key {
        'i' => Effect::SwitchInsert,
        'a' => {
            let line = current_line(buf);
            if buf.pos() < buf.line_end(line) {
                buf.move_right(1, false);
            }
            Effect::SwitchInsert
        }
        'A' => {
            let line = current_line(buf);
            let end = buf.line_end(line);
            buf.set_pos(end);
            Effect::SwitchInsert
        }
        'I' => {
            let line = current_line(buf);
            let pos = first_non_blank(buf, line);
            buf.set_pos(pos);
            Effect::SwitchInsert
        }
        'H' => {
            goto_line(buf, buf.first_visible_line());
            Effect::Handled
        }
        'M' => {
            let top = buf.first_visible_line();
            let bottom = (top + buf.visible_line_count().saturating_sub(1))
                .min(buf.line_count().saturating_sub(1));
            goto_line(buf, usize::midpoint(top, bottom));
            Effect::Handled
        }
        'L' => {
            let top = buf.first_visible_line();
            goto_line(buf, top + buf.visible_line_count().saturating_sub(1));
            Effect::Handled
        }
        '0' => {
            let line = current_line(buf);
            let start = buf.line_start(line);
            buf.set_pos(start);
            Effect::Handled
        }
        '^' => {
            let line = current_line(buf);
            let pos = first_non_blank(buf, line);
            buf.set_pos(pos);
            Effect::Handled
        }
        '$' => {
            let line = current_line(buf);
            let pos = last_char_pos(buf, line);
            buf.set_pos(pos);
            Effect::Handled
        }
        'n' => {
            buf.repeat_search();
            Effect::Handled
        }
        ':' => Effect::OpenPrompt(Prompt::Command),
        '/' => Effect::OpenPrompt(Prompt::SearchForward),
        '?' => Effect::OpenPrompt(Prompt::SearchBackward),
        _ => contract_mismatch(&format!("single key {key:?}")),
    }
}

// ── Counted single keys ───────────────────────────────────────────────

fn exec_counted<B: TextBuffer>(count: Option<usize>, key: char, buf: &mut B) -> Effect {
    if count == Some(0) {
        return Effect::Rejected;
    }
    let n = count.unwrap_or(1);
    match key {
        'h' => buf.move_left(n, false),
        'l' => buf.move_right(n, false),
        'k' => buf.move_up(n, false),
        'j' => buf.move_down(n, false),
        'w' | 'W' => {
            for _ in 0..n {
                buf.word_right(key == 'W', false);
            }
        }
        'b' | 'B' => {
            for _ in 0..n {
                buf.word_left(key == 'B', false);
            }
        }
        'e' | 'E' => {
            for _ in 0..n {
                buf.word_end_right(key == 'E', false);
            }
        }
        '{' => {
            for _ in 0..n {
                buf.para_up(false);
            }
        }
        '}' => {
            for _ in 0..n {
                buf.para_down(false);
            }
        }
        '+' => {
            buf.move_down(n, false);
            goto_line(buf, current_line(buf));
        }
        '-' => {
            buf.move_up(n, false);
            goto_line(buf, current_line(buf));
        }
        '|' => {
            // Count names a target column, 1-indexed.
            let line = current_line(buf);
            let start = buf.line_start(line);
            let end = buf.line_end(line);
            buf.set_pos((start + n - 1).min(end));
        }
        'G' => {
            // Count names a target line; without one, go to the last line.
            let target = match count {
                Some(c) => c - 1,
                None => buf.line_count().saturating_sub(1),
            };
            goto_line(buf, target);
        }
        'J' => {
            let line = current_line(buf);
            buf.begin_atomic();
            buf.join_lines(line, n.max(2));
            buf.end_atomic();
        }
        'u' => {
            for _ in 0..n {
                buf.undo();
            }
        }
        'x' => return exec_delete_chars(buf, n, true, false),
        'X' => return exec_delete_chars(buf, n, false, false),
        's' => return exec_delete_chars(buf, n, true, true),
        '~' => return exec_toggle_case(buf, n),
        'C' | 'D' => {
            let line = current_line(buf);
            let bottom = (line + n - 1).min(buf.line_count().saturating_sub(1));
            let end = buf.line_end(bottom);
            if buf.pos() < end {
                buf.begin_atomic();
                buf.set_selection(buf.pos(), end);
                buf.cut_selection();
                buf.end_atomic();
            }
            if key == 'C' {
                return Effect::SwitchInsert;
            }
            reseat_after_cut(buf);
        }
        'o' => {
            let eol = buf.eol();
            buf.begin_atomic();
            for _ in 0..n {
                let line = current_line(buf);
                let end = buf.line_end(line);
                buf.insert_text(end, eol);
                buf.set_pos(end + eol.chars().count());
            }
            buf.end_atomic();
            return Effect::SwitchInsert;
        }
        'O' => {
            let eol = buf.eol();
            buf.begin_atomic();
            for _ in 0..n {
                let line = current_line(buf);
                let start = buf.line_start(line);
                buf.insert_text(start, eol);
                buf.set_pos(start);
            }
            buf.end_atomic();
            return Effect::SwitchInsert;
        }
        'p' => return exec_paste(buf, n, true),
        'P' => return exec_paste(buf, n, false),
        _ => return contract_mismatch(&format!("counted key {key:?}")),
    }
    Effect::Handled
}

/// `x`/`X`/`s`: delete up to `n` characters without crossing the line
/// boundary. `s` substitutes (enters insert mode afterwards).
fn exec_delete_chars<B: TextBuffer>(
    buf: &mut B,
    n: usize,
    forward: bool,
    substitute: bool,
) -> Effect {
    let line = current_line(buf);
    let pos = buf.pos();
    let (start, end) = if forward {
        let avail = buf.line_end(line) - pos;
        (pos, pos + n.min(avail))
    } else {
        let avail = pos - buf.line_start(line);
        (pos - n.min(avail), pos)
    };
    if start == end {
        return if substitute {
            Effect::SwitchInsert
        } else {
            Effect::Handled
        };
    }
    buf.begin_atomic();
    buf.set_selection(start, end);
    buf.cut_selection();
    buf.end_atomic();
    if substitute {
        return Effect::SwitchInsert;
    }
    // When the deletion consumed up to end-of-line the caret steps back
    // onto the new last character.
    let line_end = buf.line_end(line);
    if buf.pos() >= line_end && line_end > buf.line_start(line) {
        buf.set_pos(line_end - 1);
    }
    Effect::Handled
}

fn exec_toggle_case<B: TextBuffer>(buf: &mut B, n: usize) -> Effect {
    let line = current_line(buf);
    let pos = buf.pos();
    let start = buf.line_start(line);
    let end = buf.line_end(line);
    let take = n.min(end - pos);
    if take == 0 {
        return Effect::Handled;
    }
    let col = pos - start;
    let swapped: String = buf
        .line_text(line)
        .chars()
        .skip(col)
        .take(take)
        .map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                c.to_uppercase().next().unwrap_or(c)
            }
        })
        .collect();
    buf.begin_atomic();
    buf.remove_text(pos, pos + take);
    buf.insert_text(pos, &swapped);
    buf.end_atomic();
    buf.set_pos((pos + take).min(last_char_pos(buf, line)));
    Effect::Handled
}

/// `p`/`P`. A clipboard ending in a line terminator pastes linewise (a new
/// line below/above the current one); anything else pastes characterwise.
fn exec_paste<B: TextBuffer>(buf: &mut B, n: usize, after: bool) -> Effect {
    let Some(text) = buf.clipboard_text() else {
        return Effect::Handled;
    };
    if text.is_empty() {
        return Effect::Handled;
    }
    let linewise = text.ends_with('\n');
    let eol = buf.eol();
    buf.begin_atomic();
    for _ in 0..n {
        let line = current_line(buf);
        if linewise {
            let (at, prefix) = if after {
                if line + 1 < buf.line_count() {
                    (buf.line_start(line + 1), "")
                } else {
                    // Below the last line; supply the missing terminator.
                    let len = buf.len_chars();
                    let unterminated = buf.line_end(line) == len;
                    (len, if unterminated { eol } else { "" })
                }
            } else {
                (buf.line_start(line), "")
            };
            buf.insert_text(at, &format!("{prefix}{text}"));
            // Caret lands on the first pasted character.
            buf.set_pos(at + prefix.chars().count());
        } else {
            let at = if after {
                (buf.pos() + 1).min(buf.line_end(line))
            } else {
                buf.pos()
            };
            buf.insert_text(at, &text);
            // Caret lands one position right of the pasted span.
            buf.set_pos(at + text.chars().count());
        }
    }
    buf.end_atomic();
    Effect::Handled
}

// ── Operator + motion ─────────────────────────────────────────────────

fn exec_operator<B: TextBuffer>(
    count: Option<usize>,
    op: char,
    motion: char,
    buf: &mut B,
) -> Effect {
    if count == Some(0) {
        return Effect::Rejected;
    }
    // Open the atomic scope before any motion moves the caret so undo
    // restores the pre-command cursor. A scope that ends up making no
    // edits (yank, rejected pair) leaves no undo entry.
    buf.begin_atomic();
    let effect = exec_operator_inner(count, op, motion, buf);
    buf.end_atomic();
    effect
}

fn exec_operator_inner<B: TextBuffer>(
    count: Option<usize>,
    op: char,
    motion: char,
    buf: &mut B,
) -> Effect {
    let n = count.unwrap_or(1);

    // Doubled operators act linewise on `n` lines from the current one.
    if op == motion {
        let line = current_line(buf);
        let bottom = (line + n - 1).min(buf.line_count().saturating_sub(1));
        return exec_linewise(op, line, bottom, buf);
    }

    // Line-target motions select whole lines between the current line and
    // the target, whichever side of the cursor the target is on.
    if matches!(motion, 'G' | 'H' | 'L' | 'M') {
        let cur = current_line(buf);
        let last = buf.line_count().saturating_sub(1);
        let target = match motion {
            'G' => match count {
                Some(c) => (c - 1).min(last),
                None => last,
            },
            'H' => buf.first_visible_line().min(last),
            'L' => (buf.first_visible_line() + buf.visible_line_count().saturating_sub(1))
                .min(last),
            _ => {
                let top = buf.first_visible_line();
                let bottom =
                    (top + buf.visible_line_count().saturating_sub(1)).min(last);
                usize::midpoint(top, bottom)
            }
        };
        return exec_linewise(op, cur.min(target), cur.max(target), buf);
    }

    let anchor = buf.pos();
    match motion {
        'w' | 'W' => {
            // `cw` on a word acts like `ce`: the span stops at the end of
            // the current word-part and leaves trailing whitespace alone.
            if op == 'c' && cursor_on_word(buf) {
                for _ in 0..n {
                    buf.word_end_right(motion == 'W', true);
                }
                let (a, c) = buf.selection();
                buf.set_selection(a, (c + 1).min(buf.len_chars()));
            } else {
                for _ in 0..n {
                    buf.word_right(motion == 'W', true);
                }
            }
        }
        'b' | 'B' => {
            for _ in 0..n {
                buf.word_left(motion == 'B', true);
            }
        }
        'e' | 'E' => {
            for _ in 0..n {
                buf.word_end_right(motion == 'E', true);
            }
            // Include the character under the motion's landing point.
            let (a, c) = buf.selection();
            buf.set_selection(a, (c + 1).min(buf.len_chars()));
        }
        'h' => buf.move_left(n, true),
        'l' => buf.move_right(n, true),
        '{' => {
            for _ in 0..n {
                buf.para_up(true);
            }
        }
        '}' => {
            for _ in 0..n {
                buf.para_down(true);
            }
        }
        '$' => {
            let end = buf.line_end(current_line(buf));
            buf.set_selection(anchor, end);
        }
        '0' => {
            let start = buf.line_start(current_line(buf));
            buf.set_selection(anchor, start);
        }
        '|' => {
            let line = current_line(buf);
            let start = buf.line_start(line);
            let end = buf.line_end(line);
            buf.set_selection(anchor, (start + n - 1).min(end));
        }
        _ => return contract_mismatch(&format!("operator {op:?} with motion {motion:?}")),
    }

    let (a, c) = buf.selection();
    let (start, end) = if a <= c { (a, c) } else { (c, a) };
    match op {
        'd' => {
            buf.set_selection(start, end);
            buf.cut_selection();
            reseat_after_cut(buf);
            Effect::Handled
        }
        'c' => {
            buf.set_selection(start, end);
            buf.cut_selection();
            Effect::SwitchInsert
        }
        'y' => {
            buf.set_selection(start, end);
            buf.copy_selection();
            buf.set_pos(anchor);
            Effect::Handled
        }
        '>' | '<' => {
            let first = buf.line_of(start);
            let bottom = buf.line_of(end);
            buf.set_pos(anchor);
            exec_linewise(op, first, bottom, buf)
        }
        _ => contract_mismatch(&format!("operator {op:?}")),
    }
}

/// Apply an operator to whole lines `top..=bottom`. Callers own the atomic
/// scope.
fn exec_linewise<B: TextBuffer>(op: char, top: usize, bottom: usize, buf: &mut B) -> Effect {
    match op {
        '>' => {
            buf.indent_lines(top, bottom);
            goto_line(buf, top);
            Effect::Handled
        }
        '<' => {
            buf.unindent_lines(top, bottom);
            goto_line(buf, top);
            Effect::Handled
        }
        'd' => {
            let start = buf.line_start(top);
            let end = linewise_end(buf, bottom);
            buf.set_selection(start, end);
            buf.cut_selection();
            reseat_after_cut(buf);
            Effect::Handled
        }
        'y' => {
            let orig = buf.pos();
            let start = buf.line_start(top);
            let end = linewise_end(buf, bottom);
            buf.set_selection(start, end);
            buf.copy_selection();
            buf.set_pos(orig);
            Effect::Handled
        }
        'c' => {
            // Leave the terminator so the replacement text does not consume
            // the line break.
            let start = buf.line_start(top);
            let end = buf.line_end(bottom);
            buf.set_selection(start, end);
            buf.cut_selection();
            Effect::SwitchInsert
        }
        _ => contract_mismatch(&format!("linewise operator {op:?}")),
    }
}

// ── Character find ────────────────────────────────────────────────────

fn exec_find<B: TextBuffer>(count: usize, kind: char, target: char, buf: &mut B) -> Effect {
    if count == 0 {
        return Effect::Rejected;
    }
    let line = current_line(buf);
    let start = buf.line_start(line);
    let chars: Vec<char> = buf.line_text(line).chars().collect();
    let col = buf.pos() - start;
    let forward = kind == 'f' || kind == 't';
    let hit = if forward {
        let mut remaining = count;
        let mut found = None;
        for (i, &c) in chars.iter().enumerate().skip(col + 1) {
            if c == target {
                remaining -= 1;
                if remaining == 0 {
                    found = Some(i);
                    break;
                }
            }
        }
        found.map(|i| if kind == 't' { i - 1 } else { i })
    } else {
        let mut remaining = count;
        let mut found = None;
        for i in (0..col.min(chars.len())).rev() {
            if chars[i] == target {
                remaining -= 1;
                if remaining == 0 {
                    found = Some(i);
                    break;
                }
            }
        }
        found.map(|i| if kind == 'T' { i + 1 } else { i })
    };
    if let Some(col) = hit {
        buf.set_pos(start + col);
    }
    Effect::Handled
}

// ── g sub-commands ────────────────────────────────────────────────────

fn exec_goto<B: TextBuffer>(sub: char, buf: &mut B) -> Effect {
    match sub {
        'g' => {
            goto_line(buf, 0);
            Effect::Handled
        }
        // `gf` (open file at cursor) is a defined no-op.
        'f' => Effect::Handled,
        _ => contract_mismatch(&format!("g sub-command {sub:?}")),
    }
}

// ── Identifier search ─────────────────────────────────────────────────

fn exec_ident_search<B: TextBuffer>(reverse: bool, buf: &mut B) -> Effect {
    let Some(word) = buf.ident_under_cursor() else {
        return Effect::Handled;
    };
    let pos = buf.pos();
    let found = if reverse {
        // Start before the current identifier so the search cannot land on
        // its own occurrence.
        let token = ident_start(buf);
        let before = if token > 0 {
            buf.find_text(&word, token - 1, false, true)
        } else {
            None
        };
        before.or_else(|| buf.find_text(&word, buf.len_chars(), false, true))
    } else {
        buf.find_text(&word, pos + 1, true, true)
            .or_else(|| buf.find_text(&word, 0, true, true))
    };
    if let Some(hit) = found {
        buf.set_pos(hit);
        buf.remember_search(&word, !reverse, true);
        let line = buf.line_of(hit);
        buf.scroll_to_line(line.saturating_sub(SEARCH_SCROLL_MARGIN));
    }
    Effect::Handled
}

// ── Bookmarks ─────────────────────────────────────────────────────────

fn exec_set_mark<B: TextBuffer>(label: char, buf: &mut B, marks: &mut MarkTable) -> Effect {
    let line = current_line(buf);
    let col = buf.pos() - buf.line_start(line);
    let handle = buf.add_marker(line);
    if let Some(old) = marks.set(label, Mark { handle, col }) {
        buf.remove_marker(old.handle);
    }
    Effect::Handled
}

fn exec_jump_mark<B: TextBuffer>(label: char, buf: &mut B, marks: &mut MarkTable) -> Effect {
    let Some(mark) = marks.get(label) else {
        return Effect::Handled;
    };
    match buf.marker_line(mark.handle) {
        Some(line) => {
            let start = buf.line_start(line);
            let end = buf.line_end(line);
            buf.set_pos((start + mark.col).min(end));
        }
        None => {
            // The buffer invalidated the marker; evict lazily.
            marks.evict(label);
            buf.remove_marker(mark.handle);
        }
    }
    Effect::Handled
}
