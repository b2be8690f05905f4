use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";

/// Width of `s` in terminal columns. CJK and emoji count as two.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Shortens `s` to at most `max_width` columns, ending in `...` when cut.
///
/// Widths too narrow for a character plus the ellipsis get the leading
/// characters that fit and no ellipsis.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width > ELLIPSIS.len() {
        max_width - ELLIPSIS.len()
    } else {
        max_width
    };

    let mut width = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let char_width = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + char_width > budget {
            break;
        }
        width += char_width;
        end = idx + c.len_utf8();
    }

    if max_width > ELLIPSIS.len() {
        Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
    } else {
        Cow::Owned(s[..end].to_string())
    }
}

fn is_stripped_control(c: char) -> bool {
    c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Removes C0 control characters, DEL and ANSI escape sequences.
///
/// Tab, newline and carriage return survive. CSI sequences end at their
/// final byte; OSC sequences end at BEL or `ESC \`.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_counts_wide_chars() {
        assert_eq!(display_width("Feeds"), 5);
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn test_truncate_fits_borrowed() {
        assert!(matches!(truncate_to_width("Short", 10), Cow::Borrowed("Short")));
        assert_eq!(truncate_to_width("12345", 5), "12345");
    }

    #[test]
    fn test_truncate_appends_ellipsis() {
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
        assert_eq!(truncate_to_width("你好世界", 7), "你好...");
        assert_eq!(truncate_to_width("Testing", 4), "T...");
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 3), "Tes");
        assert_eq!(truncate_to_width("你好", 1), "");
        assert_eq!(truncate_to_width("你好", 3), "你");
    }

    #[test]
    fn test_strip_clean_text_borrowed() {
        let input = "line1\nline2\ttabbed\r\n";
        assert!(matches!(strip_control_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_controls_and_escapes() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x7f"), "hello");
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
        assert_eq!(strip_control_chars("a\x1bb"), "ab");
    }

    #[test]
    fn test_strip_keeps_unicode() {
        assert_eq!(strip_control_chars("日本 \x1b[1m赤\x1b[0m"), "日本 赤");
    }
}
