//! Key-event entry point: mode tracking, command accumulation, and the
//! repeat caches.
//!
//! `handle_key` is called synchronously for every key event the embedding
//! editor receives. It returns `true` when the key was consumed; `false`
//! hands the key back to the editor for literal text input.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::exec::{self, Effect, Prompt};
use crate::grammar::{self, Command, Parse};
use crate::marks::MarkTable;
use crate::mode::Mode;
use crate::textbuf::TextBuffer;

/// Where the interpreter's notifications go: mode/pending-command status
/// text, and requests to open a command or search input.
pub trait StatusSink {
    fn show_status(&mut self, text: &str);
    fn open_prompt(&mut self, prompt: Prompt);
}

/// The last completed character-find command, kept for `;` and `,`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FindCmd {
    kind: char,
    target: char,
}

impl FindCmd {
    /// Flip the search direction, preserving the till/on distinction:
    /// `f`↔`F` and `t`↔`T`.
    fn reversed(self) -> Self {
        let kind = match self.kind {
            'f' => 'F',
            'F' => 'f',
            't' => 'T',
            'T' => 't',
            other => other,
        };
        Self { kind, ..self }
    }
}

/// Per-view interpreter state. Owns the mode, the pending command buffer,
/// the repeat caches, and the bookmark table.
pub struct ViHandler {
    mode: Mode,
    pending: String,
    last_command: Option<String>,
    last_find: Option<FindCmd>,
    marks: MarkTable,
}

impl Default for ViHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ViHandler {
    pub fn new() -> Self {
        Self {
            // Inert until the user engages modal editing with Escape.
            mode: Mode::Insert,
            pending: String::new(),
            last_command: None,
            last_find: None,
            marks: MarkTable::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The partial command accumulated so far, for status display.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn set_mode<B: TextBuffer, S: StatusSink>(&mut self, mode: Mode, buf: &mut B, status: &mut S) {
        self.mode = mode;
        self.pending.clear();
        buf.set_block_caret(mode == Mode::Normal);
        status.show_status(&mode.to_string());
    }

    /// Process one key event. Returns whether the key was consumed.
    pub fn handle_key<B: TextBuffer, S: StatusSink>(
        &mut self,
        key: KeyEvent,
        buf: &mut B,
        status: &mut S,
    ) -> bool {
        match self.mode {
            Mode::Insert => self.handle_insert_key(key, buf, status),
            Mode::Normal => self.handle_normal_key(key, buf, status),
        }
    }

    fn handle_insert_key<B: TextBuffer, S: StatusSink>(
        &mut self,
        key: KeyEvent,
        buf: &mut B,
        status: &mut S,
    ) -> bool {
        let to_normal = match key.code {
            // Escape with Shift is not a mode switch.
            KeyCode::Esc => key.modifiers.is_empty(),
            KeyCode::Char('[') => {
                key.modifiers.contains(KeyModifiers::CONTROL)
                    || key.modifiers.contains(KeyModifiers::SUPER)
            }
            _ => false,
        };
        if to_normal {
            self.set_mode(Mode::Normal, buf, status);
            return true;
        }
        // Everything else is literal input for the embedding editor.
        false
    }

    fn handle_normal_key<B: TextBuffer, S: StatusSink>(
        &mut self,
        key: KeyEvent,
        buf: &mut B,
        status: &mut S,
    ) -> bool {
        let ch = match key.code {
            KeyCode::Esc if key.modifiers.is_empty() => {
                self.pending.clear();
                status.show_status(&self.mode.to_string());
                return true;
            }
            KeyCode::Char(c)
                if key
                    .modifiers
                    .difference(KeyModifiers::SHIFT)
                    .is_empty() =>
            {
                c
            }
            // Modified or non-character keys fall through to the editor.
            _ => return false,
        };

        self.pending.push(ch);
        match grammar::classify(&self.pending, self.last_find.is_some()) {
            Parse::Incomplete => {
                status.show_status(&format!("{} {}", self.mode, self.pending));
            }
            Parse::Reject => {
                // Garbage chords are discarded silently; in normal mode the
                // key is swallowed either way.
                log::debug!("discarding unrecognized sequence {:?}", self.pending);
                self.pending.clear();
                status.show_status(&self.mode.to_string());
            }
            Parse::Complete(cmd) => {
                let completed = self.pending.clone();
                self.pending.clear();
                self.dispatch(&cmd, Some(completed), buf, status);
            }
        }
        true
    }

    /// Execute a classified command, resolving the repeat commands against
    /// the caches, then record the caches and apply any mode switch.
    fn dispatch<B: TextBuffer, S: StatusSink>(
        &mut self,
        cmd: &Command,
        completed: Option<String>,
        buf: &mut B,
        status: &mut S,
    ) {
        let effect = match cmd {
            Command::Repeat => {
                let Some(last) = self.last_command.clone() else {
                    status.show_status(&self.mode.to_string());
                    return;
                };
                // Re-run the cached command without overwriting the cache.
                if let Parse::Complete(repeat) =
                    grammar::classify(&last, self.last_find.is_some())
                {
                    self.dispatch(&repeat, None, buf, status);
                }
                return;
            }
            Command::FindAgain { reverse } => {
                let Some(find) = self.last_find else {
                    status.show_status(&self.mode.to_string());
                    return;
                };
                let find = if *reverse { find.reversed() } else { find };
                exec::execute(
                    &Command::Find {
                        count: 1,
                        kind: find.kind,
                        target: find.target,
                    },
                    buf,
                    &mut self.marks,
                )
            }
            other => exec::execute(other, buf, &mut self.marks),
        };

        match effect {
            Effect::Rejected => {
                status.show_status(&self.mode.to_string());
            }
            Effect::Handled | Effect::SwitchInsert | Effect::OpenPrompt(_) => {
                if let Command::Find { kind, target, .. } = cmd {
                    self.last_find = Some(FindCmd {
                        kind: *kind,
                        target: *target,
                    });
                }
                if let Some(buffer) = completed {
                    self.last_command = Some(buffer);
                }
                match effect {
                    Effect::SwitchInsert => self.set_mode(Mode::Insert, buf, status),
                    Effect::OpenPrompt(prompt) => {
                        status.show_status(&self.mode.to_string());
                        status.open_prompt(prompt);
                    }
                    _ => status.show_status(&self.mode.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textbuf::RopeBuffer;

    #[derive(Default)]
    struct TestSink {
        status: String,
        prompts: Vec<Prompt>,
    }

    impl StatusSink for TestSink {
        fn show_status(&mut self, text: &str) {
            self.status = text.to_string();
        }

        fn open_prompt(&mut self, prompt: Prompt) {
            self.prompts.push(prompt);
        }
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn esc() -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    fn feed(vi: &mut ViHandler, buf: &mut RopeBuffer, sink: &mut TestSink, keys: &str) {
        for c in keys.chars() {
            vi.handle_key(key(c), buf, sink);
        }
    }

    fn engaged(text: &str) -> (ViHandler, RopeBuffer, TestSink) {
        let mut vi = ViHandler::new();
        let mut buf = RopeBuffer::from_str(text);
        let mut sink = TestSink::default();
        vi.handle_key(esc(), &mut buf, &mut sink);
        (vi, buf, sink)
    }

    #[test]
    fn starts_insert_and_inert() {
        let mut vi = ViHandler::new();
        let mut buf = RopeBuffer::from_str("abc\n");
        let mut sink = TestSink::default();
        assert_eq!(vi.mode(), Mode::Insert);
        assert!(!vi.handle_key(key('x'), &mut buf, &mut sink));
    }

    #[test]
    fn escape_engages_normal_mode() {
        let (vi, _, sink) = engaged("abc\n");
        assert_eq!(vi.mode(), Mode::Normal);
        assert_eq!(sink.status, "NORMAL");
    }

    #[test]
    fn shifted_escape_passes_through() {
        let mut vi = ViHandler::new();
        let mut buf = RopeBuffer::from_str("abc\n");
        let mut sink = TestSink::default();
        let shifted = KeyEvent::new(KeyCode::Esc, KeyModifiers::SHIFT);
        assert!(!vi.handle_key(shifted, &mut buf, &mut sink));
        assert_eq!(vi.mode(), Mode::Insert);
    }

    #[test]
    fn ctrl_bracket_switches_mode() {
        let mut vi = ViHandler::new();
        let mut buf = RopeBuffer::from_str("abc\n");
        let mut sink = TestSink::default();
        let combo = KeyEvent::new(KeyCode::Char('['), KeyModifiers::CONTROL);
        assert!(vi.handle_key(combo, &mut buf, &mut sink));
        assert_eq!(vi.mode(), Mode::Normal);
    }

    #[test]
    fn i_returns_to_insert() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        assert!(vi.handle_key(key('i'), &mut buf, &mut sink));
        assert_eq!(vi.mode(), Mode::Insert);
        assert_eq!(sink.status, "INSERT");
    }

    #[test]
    fn pending_buffer_shown_while_incomplete() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        feed(&mut vi, &mut buf, &mut sink, "2d");
        assert_eq!(vi.pending(), "2d");
        assert_eq!(sink.status, "NORMAL 2d");
    }

    #[test]
    fn completed_command_clears_pending() {
        let (mut vi, mut buf, mut sink) = engaged("aaa\nbbb\nccc\n");
        feed(&mut vi, &mut buf, &mut sink, "2j");
        assert!(vi.pending().is_empty());
        assert_eq!(buf.line_of(buf.pos()), 2);
    }

    #[test]
    fn rejected_sequence_is_swallowed() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        assert!(vi.handle_key(key('q'), &mut buf, &mut sink));
        assert!(vi.pending().is_empty());
        assert_eq!(buf.line_text(0), "abc");
    }

    #[test]
    fn escape_aborts_pending_command() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        feed(&mut vi, &mut buf, &mut sink, "2d");
        vi.handle_key(esc(), &mut buf, &mut sink);
        assert!(vi.pending().is_empty());
        assert_eq!(vi.mode(), Mode::Normal);
    }

    #[test]
    fn insert_mode_passes_printable_keys() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        vi.handle_key(key('i'), &mut buf, &mut sink);
        assert!(!vi.handle_key(key('z'), &mut buf, &mut sink));
        assert_eq!(buf.line_text(0), "abc"); // handler never edits in insert
    }

    #[test]
    fn delete_then_dot_repeats() {
        let (mut vi, mut buf, mut sink) = engaged("aaa\nbbb\nccc\n");
        feed(&mut vi, &mut buf, &mut sink, "dd");
        assert_eq!(buf.line_text(0), "bbb");
        feed(&mut vi, &mut buf, &mut sink, ".");
        assert_eq!(buf.line_text(0), "ccc");
    }

    #[test]
    fn dot_with_no_history_is_noop() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        feed(&mut vi, &mut buf, &mut sink, ".");
        assert_eq!(buf.line_text(0), "abc");
    }

    #[test]
    fn change_word_repeats_via_dot() {
        let (mut vi, mut buf, mut sink) = engaged("foo bar\nqux quux\n");
        feed(&mut vi, &mut buf, &mut sink, "cw");
        assert_eq!(vi.mode(), Mode::Insert);
        assert_eq!(buf.line_text(0), " bar");
        // Type replacement text through the embedder, then leave insert.
        buf.type_char('X');
        vi.handle_key(esc(), &mut buf, &mut sink);
        // Repeat on the next line.
        buf.set_pos(buf.line_start(1));
        feed(&mut vi, &mut buf, &mut sink, ".");
        assert_eq!(vi.mode(), Mode::Insert);
        assert_eq!(buf.line_text(1), " quux");
    }

    #[test]
    fn semicolon_repeats_find_comma_reverses() {
        let (mut vi, mut buf, mut sink) = engaged("axbxcx\n");
        feed(&mut vi, &mut buf, &mut sink, "fx");
        assert_eq!(buf.pos(), 1);
        feed(&mut vi, &mut buf, &mut sink, ";");
        assert_eq!(buf.pos(), 3);
        feed(&mut vi, &mut buf, &mut sink, ";");
        assert_eq!(buf.pos(), 5);
        feed(&mut vi, &mut buf, &mut sink, ",");
        assert_eq!(buf.pos(), 3);
    }

    #[test]
    fn comma_preserves_till_semantics() {
        // `,` after `fx` behaves like `Fx`, never like `Tx`.
        let (mut vi, mut buf, mut sink) = engaged("xabxc\n");
        buf.set_pos(1);
        feed(&mut vi, &mut buf, &mut sink, "fx");
        assert_eq!(buf.pos(), 3);
        feed(&mut vi, &mut buf, &mut sink, ",");
        assert_eq!(buf.pos(), 0); // on the x, not one past it
    }

    #[test]
    fn semicolon_without_find_rejected() {
        let (mut vi, mut buf, mut sink) = engaged("axb\n");
        feed(&mut vi, &mut buf, &mut sink, ";");
        assert_eq!(buf.pos(), 0);
        assert!(vi.pending().is_empty());
    }

    #[test]
    fn colon_requests_command_prompt() {
        let (mut vi, mut buf, mut sink) = engaged("abc\n");
        feed(&mut vi, &mut buf, &mut sink, ":");
        assert_eq!(sink.prompts, vec![Prompt::Command]);
        feed(&mut vi, &mut buf, &mut sink, "/");
        assert_eq!(
            sink.prompts,
            vec![Prompt::Command, Prompt::SearchForward]
        );
    }

    #[test]
    fn bookmark_round_trip_through_keys() {
        let (mut vi, mut buf, mut sink) = engaged("one\ntwo\nthree\n");
        buf.set_pos(buf.line_start(1) + 1);
        feed(&mut vi, &mut buf, &mut sink, "ma");
        feed(&mut vi, &mut buf, &mut sink, "G");
        assert_eq!(buf.line_of(buf.pos()), 2);
        feed(&mut vi, &mut buf, &mut sink, "`a");
        assert_eq!(buf.pos(), buf.line_start(1) + 1);
    }

    #[test]
    fn mode_switch_clears_pending_but_not_caches() {
        let (mut vi, mut buf, mut sink) = engaged("axb\n");
        feed(&mut vi, &mut buf, &mut sink, "fx");
        feed(&mut vi, &mut buf, &mut sink, "i");
        vi.handle_key(esc(), &mut buf, &mut sink);
        // The find cache survived the round trip through insert mode.
        buf.set_pos(0);
        feed(&mut vi, &mut buf, &mut sink, ";");
        assert_eq!(buf.pos(), 1);
    }

    #[test]
    fn grouped_edit_undoes_as_one_step() {
        let (mut vi, mut buf, mut sink) = engaged("one two three\n");
        feed(&mut vi, &mut buf, &mut sink, "d2w");
        assert_eq!(buf.line_text(0), "three");
        feed(&mut vi, &mut buf, &mut sink, "u");
        assert_eq!(buf.line_text(0), "one two three");
        assert_eq!(buf.pos(), 0);
    }
}
