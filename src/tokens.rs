//! The TrueJ tokenizer
//!
//! The scanner produces the *full* token stream, including whitespace and
//! comments. Later passes mostly ignore the insignificant tokens, but the
//! proof pass rewrites spans of this stream in place and serializes it as the
//! prover transcript, so nothing may be dropped here.
//!
//! The TrueJ-specific part is value names: a variable reference may carry at
//! most one decoration mark, and the whole decorated reference is a single
//! token. `'x` is the value of `x` on entry (pre-decorated), `x'` is the
//! final value (post-decorated), and `x'tag` is a named intermediate value
//! (mid-decorated).

use std::fmt;

/// A single token of TrueJ source
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub src: &'a str,
    pub kind: TokenKind,
    /// Byte offset of the token within the source file, for error display
    pub byte_idx: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Any contiguous run of whitespace
    Whitespace,
    /// `// ...` up to (not including) the newline
    LineComment,
    /// `/* ... */`, without nesting
    BlockComment,

    /// An undecorated identifier or keyword
    Ident,
    /// `'x` — the value of `x` on entry to the enclosing executable
    PreValueName,
    /// `x'` — the final value of `x`
    PostValueName,
    /// `x'tag` — a named intermediate value of `x`
    MidValueName,

    /// An integer literal
    IntLiteral,
    /// A floating-point literal, possibly starting with `.`
    FloatLiteral,

    Punc(Punc),
    Oper(Oper),

    /// A character we couldn't make sense of
    Unknown,
}

/// Punctuation that delimits program structure
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Punc {
    OpenParen,   // "("
    CloseParen,  // ")"
    OpenCurly,   // "{"
    CloseCurly,  // "}"
    OpenSquare,  // "["
    CloseSquare, // "]"
    Semi,        // ";"
    Comma,       // ","
    Dot,         // "."
    Question,    // "?"
    Colon,       // ":"
}

/// Every operator of the TrueJ expression grammar
///
/// Note that `=` is equality inside claims; assignment is a statement form,
/// not an expression, so there is no separate assignment operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Oper {
    Eq,        // "="
    Ne,        // "!="
    Lt,        // "<"
    Le,        // "<="
    Gt,        // ">"
    Ge,        // ">="
    Not,       // "!"
    And,       // "&"
    CondAnd,   // "&&"
    Or,        // "|"
    CondOr,    // "||"
    Xor,       // "^"
    Eqv,       // "==="
    Neqv,      // "=!="
    Implies,   // "==>"
    ImpliedBy, // "<=="
    Plus,      // "+"
    Minus,     // "-"
    Star,      // "*"
    Slash,     // "/"
}

impl<'a> Token<'a> {
    /// Whether this token matters to the parser. Whitespace and comments are
    /// carried along only for the rewriter.
    pub fn is_significant(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// The variable name underneath a (possibly decorated) reference:
    /// `'x` -> `x`, `x'` -> `x`, `x'tag` -> `x`, `x` -> `x`.
    pub fn variable_name(&self) -> &'a str {
        match self.kind {
            TokenKind::PreValueName => &self.src[1..],
            TokenKind::PostValueName => &self.src[..self.src.len() - 1],
            TokenKind::MidValueName => {
                let quote = self.src.find('\'').unwrap();
                &self.src[..quote]
            }
            _ => self.src,
        }
    }

    /// The byte range this token covers in the source file
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.byte_idx..self.byte_idx + self.src.len()
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.src)
    }
}

/// Tokenizes an entire source file
///
/// Unrecognized characters become `Unknown` tokens; use [`collect_invalid`]
/// to surface them before parsing.
pub fn tokenize(file_str: &str) -> Vec<Token> {
    let bytes = file_str.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let (kind, end) = scan_token(file_str, idx);
        tokens.push(Token {
            src: &file_str[idx..end],
            kind,
            byte_idx: idx,
        });
        idx = end;
    }

    tokens
}

/// Returns the tokens the scanner couldn't classify
pub fn collect_invalid<'a>(tokens: &[Token<'a>]) -> Vec<Token<'a>> {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Unknown)
        .copied()
        .collect()
}

/// Scans the single token starting at `idx`, returning its kind and the byte
/// index just past its end
fn scan_token(s: &str, idx: usize) -> (TokenKind, usize) {
    use TokenKind::*;

    let bytes = s.as_bytes();
    let b = bytes[idx];
    let next = bytes.get(idx + 1).copied();

    match b {
        _ if is_whitespace_byte(b) => (Whitespace, find_end_whitespace(s, idx + 1)),

        b'/' if next == Some(b'/') => (LineComment, find_newline_or_eof(s, idx + 2)),
        b'/' if next == Some(b'*') => match find_block_comment_end(s, idx + 2) {
            Some(end) => (BlockComment, end),
            // An unclosed comment swallows the rest of the file; the driver
            // reports it as an unknown token.
            None => (Unknown, s.len()),
        },

        // `'x` is a pre-decorated value name; a stray quote is unknown
        b'\'' => match next {
            Some(n) if is_ident_start(n) => (PreValueName, find_end_ident(s, idx + 2)),
            _ => (Unknown, idx + 1),
        },

        _ if is_ident_start(b) => {
            let end = find_end_ident(s, idx + 1);
            // A trailing quote turns the identifier into a post- or
            // mid-decorated value name.
            match bytes.get(end).copied() {
                Some(b'\'') => match bytes.get(end + 1).copied() {
                    Some(n) if is_ident_start(n) => (MidValueName, find_end_ident(s, end + 2)),
                    _ => (PostValueName, end + 1),
                },
                _ => (Ident, end),
            }
        }

        b'0'..=b'9' => {
            let end = find_end_digits(s, idx + 1);
            match (bytes.get(end).copied(), bytes.get(end + 1).copied()) {
                (Some(b'.'), Some(n)) if n.is_ascii_digit() => {
                    (FloatLiteral, find_end_digits(s, end + 2))
                }
                _ => (IntLiteral, end),
            }
        }
        // A float may start with its decimal point, e.g. `.25`
        b'.' if next.map(|n| n.is_ascii_digit()) == Some(true) => {
            (FloatLiteral, find_end_digits(s, idx + 2))
        }

        b'(' => (Punc(self::Punc::OpenParen), idx + 1),
        b')' => (Punc(self::Punc::CloseParen), idx + 1),
        b'{' => (Punc(self::Punc::OpenCurly), idx + 1),
        b'}' => (Punc(self::Punc::CloseCurly), idx + 1),
        b'[' => (Punc(self::Punc::OpenSquare), idx + 1),
        b']' => (Punc(self::Punc::CloseSquare), idx + 1),
        b';' => (Punc(self::Punc::Semi), idx + 1),
        b',' => (Punc(self::Punc::Comma), idx + 1),
        b'.' => (Punc(self::Punc::Dot), idx + 1),
        b'?' => (Punc(self::Punc::Question), idx + 1),
        b':' => (Punc(self::Punc::Colon), idx + 1),

        // Operators, longest match first
        b'=' => match (next, bytes.get(idx + 2).copied()) {
            (Some(b'='), Some(b'>')) => (Oper(self::Oper::Implies), idx + 3),
            (Some(b'='), Some(b'=')) => (Oper(self::Oper::Eqv), idx + 3),
            (Some(b'!'), Some(b'=')) => (Oper(self::Oper::Neqv), idx + 3),
            _ => (Oper(self::Oper::Eq), idx + 1),
        },
        b'<' => match (next, bytes.get(idx + 2).copied()) {
            (Some(b'='), Some(b'=')) => (Oper(self::Oper::ImpliedBy), idx + 3),
            (Some(b'='), _) => (Oper(self::Oper::Le), idx + 2),
            _ => (Oper(self::Oper::Lt), idx + 1),
        },
        b'>' => match next {
            Some(b'=') => (Oper(self::Oper::Ge), idx + 2),
            _ => (Oper(self::Oper::Gt), idx + 1),
        },
        b'!' => match next {
            Some(b'=') => (Oper(self::Oper::Ne), idx + 2),
            _ => (Oper(self::Oper::Not), idx + 1),
        },
        b'&' => match next {
            Some(b'&') => (Oper(self::Oper::CondAnd), idx + 2),
            _ => (Oper(self::Oper::And), idx + 1),
        },
        b'|' => match next {
            Some(b'|') => (Oper(self::Oper::CondOr), idx + 2),
            _ => (Oper(self::Oper::Or), idx + 1),
        },
        b'^' => (Oper(self::Oper::Xor), idx + 1),
        b'+' => (Oper(self::Oper::Plus), idx + 1),
        b'-' => (Oper(self::Oper::Minus), idx + 1),
        b'*' => (Oper(self::Oper::Star), idx + 1),
        b'/' => (Oper(self::Oper::Slash), idx + 1),

        _ => (Unknown, idx + 1),
    }
}

/// Whether the byte may start an identifier
fn is_ident_start(b: u8) -> bool {
    matches!(b, b'_' | b'a'..=b'z' | b'A'..=b'Z')
}

fn is_ident_byte(b: u8) -> bool {
    matches!(b, b'_' | b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9')
}

/// Whitespace is restricted to the characters that belong in source files:
/// spaces, tabs, newlines, and carriage returns.
fn is_whitespace_byte(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t')
}

/// Returns the byte index of the first non-whitespace byte at or after `idx`,
/// or the length of the string
fn find_end_whitespace(s: &str, idx: usize) -> usize {
    s.as_bytes()[idx..]
        .iter()
        .position(|&b| !is_whitespace_byte(b))
        .map(|i| idx + i)
        .unwrap_or(s.len())
}

/// Returns the byte index of the first non-identifier byte at or after `idx`,
/// or the length of the string
fn find_end_ident(s: &str, idx: usize) -> usize {
    s.as_bytes()[idx..]
        .iter()
        .position(|&b| !is_ident_byte(b))
        .map(|i| idx + i)
        .unwrap_or(s.len())
}

/// Returns the byte index of the first non-digit byte at or after `idx`, or
/// the length of the string
fn find_end_digits(s: &str, idx: usize) -> usize {
    s.as_bytes()[idx..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map(|i| idx + i)
        .unwrap_or(s.len())
}

/// Returns the byte index of the next newline at or after `idx`, or the
/// length of the string. The newline itself is not part of a line comment.
fn find_newline_or_eof(s: &str, idx: usize) -> usize {
    s.as_bytes()[idx..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| idx + i)
        .unwrap_or(s.len())
}

/// Returns the byte index just past the closing `*/`, scanning from `idx`
/// (the first byte after the opening `/*`), or `None` if the comment never
/// closes
fn find_block_comment_end(s: &str, idx: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = idx;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}
