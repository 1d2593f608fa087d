//! Helpers for constructing and displaying error messages

use ansi_term::Color::{Blue, Red};
use std::fmt::Write;
use std::ops::Range;
use unicode_width::UnicodeWidthStr;

/// An interface for creating "pretty" error messages, given the total file
/// string and the name of the file in which the error occurred.
pub trait PrettyError {
    /// Formats the error. The returned string should have a single trailing
    /// newline.
    fn pretty_format(&self, file_str: &str, file_name: &str) -> String;
}

/// Pretty-prints a set of errors to stderr, with a closing count line
pub fn display_errors<E: PrettyError>(file_str: &str, file_name: &str, errs: &[E], pre_msg: &str) {
    if errs.is_empty() {
        panic!("internal error: no errors to display");
    }

    for err in errs {
        eprintln!("{}", err.pretty_format(file_str, file_name));
    }

    let err_no = match errs.len() {
        1 => "a previous error".into(),
        n => format!("{} previous errors", n),
    };

    eprintln!("{}: {} due to {}", Red.paint("error"), pre_msg, err_no);
}

/// Returns information about the position of the given byte index within the
/// file: the line index, the column index, the byte offset of the line, and
/// the line itself (without its newline). All indices start at zero.
pub fn line_info(file_str: &str, byte_idx: usize) -> (usize, usize, usize, &str) {
    let mut line_start = 0;
    let mut line_idx = 0;

    for (i, b) in file_str.bytes().enumerate() {
        if i >= byte_idx {
            break;
        }
        if b == b'\n' {
            line_start = i + 1;
            line_idx += 1;
        }
    }

    let line_end = file_str[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(file_str.len());
    let line = &file_str[line_start..line_end];

    let col_end = (byte_idx - line_start).min(line.len());
    let col_idx = UnicodeWidthStr::width(&line[..col_end]);

    (line_idx, col_idx, line_start, line)
}

/// Produces a row of caret characters to underline the given byte range of
/// the line. The upper end of the range may run past the line; the excess is
/// quietly ignored.
pub fn underline(line: &str, mut range: Range<usize>) -> String {
    range.end = range.end.min(line.len());
    range.start = range.start.min(range.end);

    let pre_len = UnicodeWidthStr::width(&line[..range.start]);
    let mut mid_len = UnicodeWidthStr::width(&line[range.start..range.end]);

    if range.end == range.start {
        mid_len += 1;
    }

    format!("{}{}", " ".repeat(pre_len), "^".repeat(mid_len))
}

/// Produces the standard portion of an error message: the context line with
/// the file position, the offending source line, and a caret underline. For
/// example:
///
/// ```text
///   --> swap.tj:4:9
///    |
///  4 |         means(b' = 'aa);
///    |               ^^^^^^^^
/// ```
///
/// The returned string has a trailing, but no leading, newline.
pub fn context_lines(byte_range: Range<usize>, file_str: &str, file_name: &str) -> String {
    let (line_idx, col_idx, line_offset, line) = line_info(file_str, byte_range.start);

    let line_no_str = (line_idx + 1).to_string();
    let spacing = " ".repeat(line_no_str.len());

    // The range of bytes the highlighted region takes up on its first line;
    // regions spanning several lines are underlined on the first only.
    let mut line_range = {
        let start = byte_range.start - line_offset;
        let end = (byte_range.end - line_offset).min(line.len());
        start..end
    };

    let line = replace_tabs(line, Some(&mut line_range));

    let mut msg = format!(
        "{}{} {}:{}:{}\n",
        spacing,
        Blue.paint("-->"),
        file_name,
        line_idx + 1,
        col_idx + 1
    );

    let filler_line = format!("{} {}", spacing, Blue.paint("|"));
    writeln!(msg, "{}", filler_line).unwrap();
    writeln!(msg, "{} {}", Blue.paint(line_no_str + " |"), line).unwrap();
    writeln!(
        msg,
        "{} {}",
        filler_line,
        Red.paint(underline(&line, line_range))
    )
    .unwrap();

    msg
}

/// Replaces tabs with four spaces, adjusting the byte range to keep it
/// pointing at the same characters
pub fn replace_tabs(line: &str, byte_range: Option<&mut Range<usize>>) -> String {
    if let Some(range) = byte_range {
        let start_offset = line[..range.start].chars().filter(|&c| c == '\t').count();
        let mid_offset = line[range.clone()].chars().filter(|&c| c == '\t').count();
        // Each replacement turns one byte into four, adding three.
        range.start += 3 * start_offset;
        range.end += 3 * (start_offset + mid_offset);
    }

    line.replace('\t', "    ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_info_basics() {
        let src = "first\nsecond line\nthird";
        let (line, col, offset, text) = line_info(src, 0);
        assert_eq!((line, col, offset, text), (0, 0, 0, "first"));

        // byte 6 is the 's' of "second"
        let (line, col, offset, text) = line_info(src, 6);
        assert_eq!((line, col, offset, text), (1, 0, 6, "second line"));

        // byte 13 is the 'c' of "second"... one past: index into line 1
        let (line, col, _, text) = line_info(src, 13);
        assert_eq!((line, col, text), (1, 7, "second line"));
    }

    #[test]
    fn underline_covers_range() {
        assert_eq!(underline("abcdef", 2..4), "  ^^");
        // Zero-width ranges still get one caret
        assert_eq!(underline("abcdef", 3..3), "   ^");
        // Out-of-range ends are clipped
        assert_eq!(underline("ab", 0..10), "^^");
    }
}
