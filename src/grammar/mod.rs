//! Command grammar for normal mode.
//!
//! `classify` is a pure function over the pending key string accumulated by
//! the handler. It either recognizes a complete command, asks the handler to
//! keep buffering, or rejects the sequence outright. Rule order matters: a
//! solitary `0` is always "go to column 0" and never the start of a count,
//! because vi counts cannot begin with a zero.

/// Single keys that never take a count.
const SINGLE_KEYS: &str = "AHILM0^$nia/?:";

/// Single keys that take an optional leading count.
const COUNTED_KEYS: &str = "bBCDeEGhjJklOopPsuwWxX{}~|+-";

/// Operators that combine with a following motion.
const OPERATORS: &str = "cdy<>";

/// Motions an operator may combine with. Includes the operator letters
/// themselves so `cc`/`dd`/`yy`/`>>`/`<<` parse as linewise forms.
const OPERATOR_MOTIONS: &str = "bBcdeEGhHlLMwWy|{}$<>";

/// Character-find command letters.
const FIND_KINDS: &str = "fFtT";

/// A fully classified normal-mode command.
///
/// Counts are kept as `Option<usize>` because some commands treat an
/// explicit count differently from an absent one (`G` goes to the last line
/// without a count but to line N with one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `.` — re-execute the last completed command.
    Repeat,
    /// A single key with no count (`A`, `H`, `0`, `$`, `:` ...).
    Single(char),
    /// A repeatable single key with an optional count (`3j`, `x`, `5G`).
    Counted { count: Option<usize>, key: char },
    /// Operator plus motion (`dw`, `3cw`, `d2j`, `yy`, `>>`).
    Operator {
        count: Option<usize>,
        op: char,
        motion: char,
    },
    /// Character find (`fx`, `3Fx`, `tx`, `Tx`).
    Find {
        count: usize,
        kind: char,
        target: char,
    },
    /// `g` sub-command: `g` for `gg` (first line), `f` for `gf` (no-op).
    Goto(char),
    /// `*` / `#` — whole-word search for the identifier under the cursor.
    IdentSearch { reverse: bool },
    /// `m<letter>` — record a bookmark.
    SetMark(char),
    /// `` `<letter> `` — jump to a bookmark.
    JumpMark(char),
    /// `;` / `,` — repeat the last character find.
    FindAgain { reverse: bool },
}

/// Classifier outcome for the buffer as accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parse {
    /// The buffer is a strict prefix of some command; keep buffering.
    Incomplete,
    /// No rule matches and none can; discard the buffer.
    Reject,
    Complete(Command),
}

/// Split an optional leading count off `chars` starting at `idx`.
///
/// Returns `(count, next_idx)`, or `None` when the digit run is not a valid
/// count (leading zero, or overflow).
fn split_count(chars: &[char], idx: usize) -> Option<(Option<usize>, usize)> {
    let mut end = idx;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end == idx {
        return Some((None, idx));
    }
    // A count never starts with '0'; a lone '0' is the column-0 motion and
    // is recognized before we get here.
    if chars[idx] == '0' {
        return None;
    }
    let digits: String = chars[idx..end].iter().collect();
    let count = digits.parse::<usize>().ok()?;
    Some((Some(count), end))
}

/// Classify the pending command buffer.
///
/// `has_last_find` reports whether a previous `f`/`F`/`t`/`T` completed, and
/// gates `;` and `,` exactly as the grammar requires.
pub fn classify(buffer: &str, has_last_find: bool) -> Parse {
    let chars: Vec<char> = buffer.chars().collect();
    if chars.is_empty() {
        return Parse::Incomplete;
    }

    // One-key forms that shadow the count parser ('0') or exist only as
    // complete single-character commands.
    if chars.len() == 1 {
        let c = chars[0];
        if c == '.' {
            return Parse::Complete(Command::Repeat);
        }
        if SINGLE_KEYS.contains(c) {
            return Parse::Complete(Command::Single(c));
        }
        if c == '*' || c == '#' {
            return Parse::Complete(Command::IdentSearch { reverse: c == '#' });
        }
        if c == ';' || c == ',' {
            if has_last_find {
                return Parse::Complete(Command::FindAgain { reverse: c == ',' });
            }
            return Parse::Reject;
        }
    }

    let Some((count, idx)) = split_count(&chars, 0) else {
        return Parse::Reject;
    };
    let rest = &chars[idx..];
    if rest.is_empty() {
        // Digits only; still waiting for the command key.
        return Parse::Incomplete;
    }
    let head = rest[0];

    if rest.len() == 1 && COUNTED_KEYS.contains(head) {
        return Parse::Complete(Command::Counted { count, key: head });
    }

    if FIND_KINDS.contains(head) {
        return match rest.len() {
            1 => Parse::Incomplete,
            2 => Parse::Complete(Command::Find {
                count: count.unwrap_or(1),
                kind: head,
                target: rest[1],
            }),
            _ => Parse::Reject,
        };
    }

    if OPERATORS.contains(head) {
        let op = head;
        let after = &rest[1..];
        if after.is_empty() {
            return Parse::Incomplete;
        }
        // `c0`/`d0`/`y0`: motion to column 0, not the start of a count.
        if after == ['0'] && "cdy".contains(op) {
            return Parse::Complete(Command::Operator {
                count,
                op,
                motion: '0',
            });
        }
        let Some((inner, midx)) = split_count(rest, 1) else {
            return Parse::Reject;
        };
        let motion = &rest[midx..];
        if motion.is_empty() {
            return Parse::Incomplete;
        }
        if motion.len() == 1 && OPERATOR_MOTIONS.contains(motion[0]) {
            // Whichever digit run is present supplies the count; when both
            // are given, the motion-side run wins.
            return Parse::Complete(Command::Operator {
                count: inner.or(count),
                op,
                motion: motion[0],
            });
        }
        return Parse::Reject;
    }

    // The remaining forms never take a count.
    if count.is_none() {
        if head == 'g' {
            return match rest.len() {
                1 => Parse::Incomplete,
                2 if rest[1] == 'g' || rest[1] == 'f' => Parse::Complete(Command::Goto(rest[1])),
                _ => Parse::Reject,
            };
        }
        if head == 'm' || head == '`' {
            return match rest.len() {
                1 => Parse::Incomplete,
                2 if rest[1].is_ascii_alphabetic() => Parse::Complete(if head == 'm' {
                    Command::SetMark(rest[1])
                } else {
                    Command::JumpMark(rest[1])
                }),
                _ => Parse::Reject,
            };
        }
    }

    Parse::Reject
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buffer: &str) -> Command {
        match classify(buffer, true) {
            Parse::Complete(cmd) => cmd,
            other => panic!("expected complete for {buffer:?}, got {other:?}"),
        }
    }

    #[test]
    fn empty_buffer_is_incomplete() {
        assert_eq!(classify("", false), Parse::Incomplete);
    }

    #[test]
    fn dot_is_repeat() {
        assert_eq!(complete("."), Command::Repeat);
    }

    #[test]
    fn solitary_zero_is_column_motion() {
        // '0' must never be treated as a pending count digit.
        assert_eq!(complete("0"), Command::Single('0'));
    }

    #[test]
    fn single_keys_complete_immediately() {
        for c in "AHILM^$nia/?:".chars() {
            assert_eq!(complete(&c.to_string()), Command::Single(c));
        }
    }

    #[test]
    fn digits_keep_buffering() {
        assert_eq!(classify("1", false), Parse::Incomplete);
        assert_eq!(classify("10", false), Parse::Incomplete);
        assert_eq!(classify("123", false), Parse::Incomplete);
    }

    #[test]
    fn counted_single_with_count() {
        assert_eq!(
            complete("10j"),
            Command::Counted {
                count: Some(10),
                key: 'j'
            }
        );
    }

    #[test]
    fn counted_single_without_count() {
        assert_eq!(complete("x"), Command::Counted { count: None, key: 'x' });
        assert_eq!(complete("G"), Command::Counted { count: None, key: 'G' });
    }

    #[test]
    fn explicit_one_g_is_distinguishable() {
        assert_eq!(
            complete("1G"),
            Command::Counted {
                count: Some(1),
                key: 'G'
            }
        );
    }

    #[test]
    fn leading_zero_count_rejected() {
        assert_eq!(classify("01", false), Parse::Reject);
        assert_eq!(classify("0G", false), Parse::Reject);
    }

    #[test]
    fn operator_alone_buffers() {
        for c in "cdy<>".chars() {
            assert_eq!(classify(&c.to_string(), false), Parse::Incomplete);
        }
    }

    #[test]
    fn operator_with_motion() {
        assert_eq!(
            complete("dw"),
            Command::Operator {
                count: None,
                op: 'd',
                motion: 'w'
            }
        );
        assert_eq!(
            complete("3cw"),
            Command::Operator {
                count: Some(3),
                op: 'c',
                motion: 'w'
            }
        );
    }

    #[test]
    fn operator_with_inner_count() {
        assert_eq!(
            complete("d2w"),
            Command::Operator {
                count: Some(2),
                op: 'd',
                motion: 'w'
            }
        );
        // Pending inner count keeps buffering.
        assert_eq!(classify("d2", false), Parse::Incomplete);
        assert_eq!(classify("3d2", false), Parse::Incomplete);
    }

    #[test]
    fn inner_count_wins_over_outer() {
        assert_eq!(
            complete("2d3w"),
            Command::Operator {
                count: Some(3),
                op: 'd',
                motion: 'w'
            }
        );
    }

    #[test]
    fn linewise_doubled_operators() {
        assert_eq!(
            complete("dd"),
            Command::Operator {
                count: None,
                op: 'd',
                motion: 'd'
            }
        );
        assert_eq!(
            complete(">>"),
            Command::Operator {
                count: None,
                op: '>',
                motion: '>'
            }
        );
    }

    #[test]
    fn operator_zero_is_column_motion() {
        assert_eq!(
            complete("d0"),
            Command::Operator {
                count: None,
                op: 'd',
                motion: '0'
            }
        );
    }

    #[test]
    fn indent_zero_rejected() {
        // `>0` has no linewise-zero special case.
        assert_eq!(classify(">0", false), Parse::Reject);
    }

    #[test]
    fn find_char_buffers_then_completes() {
        assert_eq!(classify("f", false), Parse::Incomplete);
        assert_eq!(classify("3f", false), Parse::Incomplete);
        assert_eq!(
            complete("3fx"),
            Command::Find {
                count: 3,
                kind: 'f',
                target: 'x'
            }
        );
        assert_eq!(
            complete("T;"),
            Command::Find {
                count: 1,
                kind: 'T',
                target: ';'
            }
        );
    }

    #[test]
    fn goto_subcommands() {
        assert_eq!(classify("g", false), Parse::Incomplete);
        assert_eq!(complete("gg"), Command::Goto('g'));
        assert_eq!(complete("gf"), Command::Goto('f'));
        assert_eq!(classify("gx", false), Parse::Reject);
    }

    #[test]
    fn ident_search_directions() {
        assert_eq!(complete("*"), Command::IdentSearch { reverse: false });
        assert_eq!(complete("#"), Command::IdentSearch { reverse: true });
    }

    #[test]
    fn bookmarks() {
        assert_eq!(classify("m", false), Parse::Incomplete);
        assert_eq!(complete("ma"), Command::SetMark('a'));
        assert_eq!(complete("`Z"), Command::JumpMark('Z'));
        assert_eq!(classify("m3", false), Parse::Reject);
    }

    #[test]
    fn find_again_requires_cached_find() {
        assert_eq!(classify(";", false), Parse::Reject);
        assert_eq!(classify(",", false), Parse::Reject);
        assert_eq!(classify(";", true), Parse::Complete(Command::FindAgain { reverse: false }));
        assert_eq!(classify(",", true), Parse::Complete(Command::FindAgain { reverse: true }));
    }

    #[test]
    fn garbage_rejected() {
        assert_eq!(classify("q", false), Parse::Reject);
        assert_eq!(classify("3q", false), Parse::Reject);
        assert_eq!(classify("dq", false), Parse::Reject);
        assert_eq!(classify("fxx", false), Parse::Reject);
    }

    #[test]
    fn strict_prefixes_stay_incomplete() {
        for prefix in ["2", "25", "d", "2d", "2d1", "f", "2f", "m", "`", "g", "y", "<"] {
            assert_eq!(
                classify(prefix, false),
                Parse::Incomplete,
                "prefix {prefix:?}"
            );
        }
    }

    #[test]
    fn mixed_operator_pair_still_parses() {
        // `><` passes the grammar; the executor is responsible for rejecting
        // pairs it has no mapping for.
        assert_eq!(
            complete("><"),
            Command::Operator {
                count: None,
                op: '>',
                motion: '<'
            }
        );
    }
}
