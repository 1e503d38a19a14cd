//! Comment stripping and string blanking
//!
//! Both run before any identifier scan. Comment markers inside string
//! literals, quoted table names or bracketed identifiers are left alone.
//! Removed text is replaced by spaces (newlines are kept) so the result has
//! the same line structure as the input.

use std::iter::Peekable;
use std::str::Chars;

/// Remove `/* */`, `//` and `--` comments
pub fn strip_comments(expr: &str) -> String {
    rewrite(expr, false)
}

/// Remove comments and blank the contents of string literals
pub fn prepare(expr: &str) -> String {
    rewrite(expr, true)
}

fn rewrite(expr: &str, blank_strings: bool) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                copy_delimited(&mut chars, &mut out, '"', blank_strings);
            }
            '\'' => {
                out.push(c);
                copy_delimited(&mut chars, &mut out, '\'', false);
            }
            '[' => {
                out.push(c);
                copy_delimited(&mut chars, &mut out, ']', false);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("  ");
                skip_block_comment(&mut chars, &mut out);
            }
            '/' | '-' if chars.peek() == Some(&c) => {
                out.push(' ');
                skip_line_comment(&mut chars, &mut out);
            }
            _ => out.push(c),
        }
    }

    out
}

fn blank(c: char) -> char {
    if c == '\n' {
        '\n'
    } else {
        ' '
    }
}

/// Copy up to and including `close`, treating a doubled `close` as an escape
fn copy_delimited(chars: &mut Peekable<Chars<'_>>, out: &mut String, close: char, blank_body: bool) {
    while let Some(c) = chars.next() {
        if c == close {
            if chars.peek() == Some(&close) {
                chars.next();
                if blank_body {
                    out.push_str("  ");
                } else {
                    out.push(c);
                    out.push(c);
                }
                continue;
            }
            out.push(c);
            return;
        }
        out.push(if blank_body { blank(c) } else { c });
    }
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            out.push_str("  ");
            return;
        }
        out.push(blank(c));
    }
}

fn skip_line_comment(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    while let Some(c) = chars.next() {
        if c == '\n' {
            out.push('\n');
            return;
        }
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_all_comment_styles() {
        let expr = "SUM('Sales'[Amount]) /* 'Fake'[Ref] */\n-- 'Fake2'[Ref]\n+ 1 // [Other]";
        let stripped = strip_comments(expr);
        assert!(!stripped.contains("Fake"));
        assert!(!stripped.contains("Other"));
        assert!(stripped.contains("SUM('Sales'[Amount])"));
        assert!(stripped.contains("+ 1"));
        assert_eq!(stripped.lines().count(), expr.lines().count());
    }

    #[test]
    fn multi_line_block_comment() {
        let stripped = strip_comments("[A] /* first\nsecond [B]\n*/ + [C]");
        assert!(!stripped.contains("[B]"));
        assert!(stripped.contains("[C]"));
        assert_eq!(stripped.lines().count(), 3);
    }

    #[test]
    fn markers_inside_literals_are_not_comments() {
        let expr = "\"http://x -- y\" & 'a--b'[c//d] & [e/*f*/]";
        assert_eq!(strip_comments(expr), expr);
    }

    #[test]
    fn subtraction_is_not_a_comment() {
        let expr = "[A] - [B] - -1";
        assert_eq!(strip_comments(expr), expr);
    }

    #[test]
    fn prepare_blanks_string_contents() {
        let prepared = prepare("IF([A] > 0, \"see [B]\", \"say \"\"[C]\"\"\") -- [D]");
        assert!(prepared.contains("[A]"));
        assert!(!prepared.contains("[B]"));
        assert!(!prepared.contains("[C]"));
        assert!(!prepared.contains("[D]"));
        assert!(prepared.starts_with("IF([A] > 0, \""));
    }

    #[test]
    fn escaped_bracket_and_quote_survive() {
        let expr = "'Bob''s'[Size]]s] + 1";
        assert_eq!(prepare(expr), expr);
    }
}
