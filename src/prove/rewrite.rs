//! The rewrite table
//!
//! The proof pass works by rewriting spans of the token stream in place:
//! value names become prover atoms, operators become prover operators, and
//! whole statements collapse into formulas. The table keeps the stream
//! itself untouched and records the substitutions beside it, so the original
//! text stays available for error messages while [`source`] reads through
//! the substitutions.
//!
//! Serializing the whole stream with substitutions applied yields the
//! transcript: the exact text the prover saw, in source order.
//!
//! [`source`]: Rewriter::source

use crate::ast::Span;
use crate::tokens::Token;
use std::collections::HashMap;

pub struct Rewriter<'a> {
    file: &'a str,
    tokens: &'a [Token<'a>],
    /// Span-level substitutions in insertion order; a later entry shadows an
    /// earlier one it covers. Children are always rewritten before their
    /// parents, so the latest entry starting at a position wins.
    subs: Vec<(Span, String)>,
    /// Single-token replacements (operator translations)
    token_subs: HashMap<usize, String>,
}

impl<'a> Rewriter<'a> {
    pub fn new(file: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Rewriter {
            file,
            tokens,
            subs: Vec::new(),
            token_subs: HashMap::new(),
        }
    }

    pub fn token(&self, idx: usize) -> Token<'a> {
        self.tokens[idx]
    }

    /// Substitutes the rendering of a whole span
    pub fn substitute(&mut self, span: Span, text: impl Into<String>) {
        self.subs.push((span, text.into()));
    }

    /// Replaces the rendering of a single token
    pub fn replace_token(&mut self, idx: usize, text: impl Into<String>) {
        self.token_subs.insert(idx, text.into());
    }

    /// The current rendering of a span, reading through all substitutions
    pub fn source(&self, span: Span) -> String {
        let mut out = String::new();
        let mut i = span.start;
        while i <= span.end {
            // The latest substitution starting here and contained in the
            // requested span wins
            let mut chosen: Option<&(Span, String)> = None;
            for sub in &self.subs {
                if sub.0.start == i && sub.0.end <= span.end {
                    chosen = Some(sub);
                }
            }
            if let Some((sub_span, text)) = chosen {
                out.push_str(text);
                i = sub_span.end + 1;
                continue;
            }
            match self.token_subs.get(&i) {
                Some(text) => out.push_str(text),
                None => out.push_str(self.tokens[i].src),
            }
            i += 1;
        }
        out
    }

    /// The unmodified source text of a span, exactly as the user wrote it.
    /// Used solely for user-facing error messages.
    pub fn original_source(&self, span: Span) -> String {
        let start = self.tokens[span.start].byte_idx;
        let end = self.tokens[span.end].byte_range().end;
        self.file[start..end].to_string()
    }

    /// The whole stream with substitutions applied: the prover transcript
    pub fn text(&self) -> String {
        if self.tokens.is_empty() {
            return String::new();
        }
        self.source(Span {
            start: 0,
            end: self.tokens.len() - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::tokenize;

    fn span(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    #[test]
    fn token_replacement_reads_through() {
        let src = "a' <= b';";
        let tokens = tokenize(src);
        let mut rw = Rewriter::new(src, &tokens);
        // tokens: [a'] [ ] [<=] [ ] [b'] [;]
        rw.replace_token(2, "=<");
        assert_eq!(rw.source(span(0, 5)), "a' =< b';");
        assert_eq!(rw.original_source(span(0, 4)), "a' <= b'");
    }

    #[test]
    fn later_substitutions_shadow_earlier_ones() {
        let src = "a' = 'b;";
        let tokens = tokenize(src);
        let mut rw = Rewriter::new(src, &tokens);
        rw.substitute(span(0, 0), "'a^'");
        rw.substitute(span(4, 4), "'^b'");
        assert_eq!(rw.source(span(0, 5)), "'a^' = '^b';");

        // The statement-level substitution covers both earlier ones
        rw.substitute(span(0, 5), "('a^' = ('^b'))");
        assert_eq!(rw.source(span(0, 5)), "('a^' = ('^b'))");
        // The original text is still reachable
        assert_eq!(rw.original_source(span(0, 5)), "a' = 'b;");
    }

    #[test]
    fn child_spans_render_independently_of_the_parent() {
        let src = "x' = 'y + 1;";
        let tokens = tokenize(src);
        let mut rw = Rewriter::new(src, &tokens);
        let all = span(0, tokens.len() - 1);
        rw.substitute(span(4, 4), "'^y'");
        rw.substitute(all, "('x^' = ('^y' + 1))");
        // A parent substitution does not leak into a child's render
        assert_eq!(rw.source(span(4, 4)), "'^y'");
        assert_eq!(rw.text(), "('x^' = ('^y' + 1))");
    }

    #[test]
    fn transcript_keeps_untouched_text() {
        let src = "// note\na' = 'b;";
        let tokens = tokenize(src);
        let mut rw = Rewriter::new(src, &tokens);
        // Substitute only the statement; the comment stays
        let stmt_start = tokens.iter().position(|t| t.src == "a'").unwrap();
        rw.substitute(span(stmt_start, tokens.len() - 1), "('a^' = ('^b'))");
        assert_eq!(rw.text(), "// note\n('a^' = ('^b'))");
    }
}
