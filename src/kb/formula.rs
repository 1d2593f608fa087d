//! The prover's formula language
//!
//! The proof pass hands the knowledge base plain text in the prover
//! vocabulary: quoted atoms (`'this.a^'`), identifiers, numeric literals,
//! applications like `type(int, 'a^')`, parentheses, `%` line comments, and
//! the operators `/\ \/ - = #= === =#= < =< > >= ==> <== + - * /`. This
//! module parses that text into [`Term`]s for the decision core.
//!
//! Anything outside the vocabulary is a syntax error — the translator only
//! ever emits well-formed text, so a syntax error here is a fatal internal
//! error, not a user-level proof failure.

use std::fmt;

/// A parsed prover term; formulas and arithmetic share one shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A quoted atom; the quotes are stripped, so `'this.a^'` is
    /// `Atom("this.a^")`
    Atom(String),
    /// An unquoted identifier: a type name or an undecorated variable
    Ident(String),
    /// An integer literal
    Int(i128),
    /// A floating-point literal, kept textually and compared syntactically
    Float(String),
    Bool(bool),
    /// An application `f(a, b, ...)`, e.g. a `type(T, v)` fact
    App(String, Vec<Term>),
    /// Logical negation (the prover spells it `-`)
    Not(Box<Term>),
    Bin(Op, Box<Term>, Box<Term>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    And,     // /\
    Or,      // \/
    Implies, // ==> (and <==, with the sides swapped)
    Eq,      // = and ===
    Ne,      // #= and =#=
    Lt,      // <
    Le,      // =<
    Gt,      // >
    Ge,      // >=
    Add,     // +
    Sub,     // -
    Mul,     // *
    Div,     // /
}

impl Op {
    /// Whether the operator yields a truth value
    pub fn is_logical(self) -> bool {
        !matches!(self, Op::Add | Op::Sub | Op::Mul | Op::Div)
    }
}

impl Term {
    pub fn bin(op: Op, lhs: Term, rhs: Term) -> Term {
        Term::Bin(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn not(t: Term) -> Term {
        Term::Not(Box::new(t))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Atom(s) => write!(f, "'{}'", s),
            Term::Ident(s) => f.write_str(s),
            Term::Int(n) => write!(f, "{}", n),
            Term::Float(s) => f.write_str(s),
            Term::Bool(b) => write!(f, "{}", b),
            Term::App(name, args) => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", a)?;
                }
                f.write_str(")")
            }
            Term::Not(t) => write!(f, "-({})", t),
            Term::Bin(op, l, r) => {
                let op = match op {
                    Op::And => "/\\",
                    Op::Or => "\\/",
                    Op::Implies => "==>",
                    Op::Eq => "=",
                    Op::Ne => "#=",
                    Op::Lt => "<",
                    Op::Le => "=<",
                    Op::Gt => ">",
                    Op::Ge => ">=",
                    Op::Add => "+",
                    Op::Sub => "-",
                    Op::Mul => "*",
                    Op::Div => "/",
                };
                write!(f, "({} {} {})", l, op, r)
            }
        }
    }
}

/// A formula the parser couldn't accept, with a description of where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
}

pub fn parse(text: &str) -> Result<Term, SyntaxError> {
    let tokens = lex(text)?;
    let mut p = FormulaParser { tokens, pos: 0 };
    let term = p.implication()?;
    match p.peek() {
        None => Ok(term),
        Some(t) => Err(SyntaxError {
            message: format!("unexpected `{}` after the formula", t),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FTok {
    Atom(String),
    Ident(String),
    Int(i128),
    Float(String),
    Oper(&'static str),
    OpenParen,
    CloseParen,
    Comma,
}

impl fmt::Display for FTok {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FTok::Atom(s) => write!(f, "'{}'", s),
            FTok::Ident(s) => f.write_str(s),
            FTok::Int(n) => write!(f, "{}", n),
            FTok::Float(s) => f.write_str(s),
            FTok::Oper(s) => f.write_str(s),
            FTok::OpenParen => f.write_str("("),
            FTok::CloseParen => f.write_str(")"),
            FTok::Comma => f.write_str(","),
        }
    }
}

fn lex(text: &str) -> Result<Vec<FTok>, SyntaxError> {
    let bytes = text.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;

    // Multi-byte operators, longest first so prefixes don't shadow them
    const OPERS: &[&str] = &[
        "===", "=#=", "==>", "<==", "/\\", "\\/", "#=", "=<", ">=", "=", "<", ">", "+", "-", "*",
        "/",
    ];

    'outer: while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            // `%` comments run to the end of the line
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'\'' => {
                let close = text[i + 1..].find('\'').ok_or_else(|| SyntaxError {
                    message: "unterminated quoted atom".into(),
                })?;
                toks.push(FTok::Atom(text[i + 1..i + 1 + close].into()));
                i += close + 2;
            }
            b'(' => {
                toks.push(FTok::OpenParen);
                i += 1;
            }
            b')' => {
                toks.push(FTok::CloseParen);
                i += 1;
            }
            b',' => {
                toks.push(FTok::Comma);
                i += 1;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    toks.push(FTok::Float(text[start..i].into()));
                } else {
                    let n = text[start..i].parse().map_err(|_| SyntaxError {
                        message: format!("integer literal {} is out of range", &text[start..i]),
                    })?;
                    toks.push(FTok::Int(n));
                }
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                toks.push(FTok::Ident(text[start..i].into()));
            }
            _ => {
                for &op in OPERS {
                    if text[i..].starts_with(op) {
                        toks.push(FTok::Oper(op));
                        i += op.len();
                        continue 'outer;
                    }
                }
                return Err(SyntaxError {
                    message: format!("unrecognized character `{}`", &text[i..].chars().next().unwrap()),
                });
            }
        }
    }

    Ok(toks)
}

struct FormulaParser {
    tokens: Vec<FTok>,
    pos: usize,
}

impl FormulaParser {
    fn peek(&self) -> Option<&FTok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<FTok> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_oper(&mut self, opers: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(FTok::Oper(o)) if opers.contains(o) => {
                let o = *o;
                self.pos += 1;
                Some(o)
            }
            _ => None,
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, SyntaxError> {
        Err(SyntaxError {
            message: message.into(),
        })
    }

    fn implication(&mut self) -> Result<Term, SyntaxError> {
        let lhs = self.disjunction()?;
        match self.eat_oper(&["==>", "<=="]) {
            Some("==>") => {
                let rhs = self.implication()?;
                Ok(Term::bin(Op::Implies, lhs, rhs))
            }
            Some("<==") => {
                let rhs = self.implication()?;
                Ok(Term::bin(Op::Implies, rhs, lhs))
            }
            _ => Ok(lhs),
        }
    }

    fn disjunction(&mut self) -> Result<Term, SyntaxError> {
        let mut lhs = self.conjunction()?;
        while self.eat_oper(&["\\/"]).is_some() {
            let rhs = self.conjunction()?;
            lhs = Term::bin(Op::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> Result<Term, SyntaxError> {
        let mut lhs = self.comparison()?;
        while self.eat_oper(&["/\\"]).is_some() {
            let rhs = self.comparison()?;
            lhs = Term::bin(Op::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Term, SyntaxError> {
        let lhs = self.additive()?;
        let op = match self.eat_oper(&["===", "=#=", "#=", "=<", ">=", "=", "<", ">"]) {
            Some("===") | Some("=") => Op::Eq,
            Some("=#=") | Some("#=") => Op::Ne,
            Some("=<") => Op::Le,
            Some(">=") => Op::Ge,
            Some("<") => Op::Lt,
            Some(">") => Op::Gt,
            _ => return Ok(lhs),
        };
        let rhs = self.additive()?;
        Ok(Term::bin(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Term, SyntaxError> {
        let mut lhs = self.multiplicative()?;
        loop {
            match self.eat_oper(&["+", "-"]) {
                Some("+") => lhs = Term::bin(Op::Add, lhs, self.multiplicative()?),
                Some("-") => lhs = Term::bin(Op::Sub, lhs, self.multiplicative()?),
                _ => return Ok(lhs),
            }
        }
    }

    fn multiplicative(&mut self) -> Result<Term, SyntaxError> {
        let mut lhs = self.unary()?;
        loop {
            match self.eat_oper(&["*", "/"]) {
                Some("*") => lhs = Term::bin(Op::Mul, lhs, self.unary()?),
                Some("/") => lhs = Term::bin(Op::Div, lhs, self.unary()?),
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Term, SyntaxError> {
        if self.eat_oper(&["-"]).is_some() {
            // `-` is the prover's negation; on an integer literal it is just
            // the sign
            let operand = self.unary()?;
            return Ok(match operand {
                Term::Int(n) => Term::Int(-n),
                t => Term::not(t),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Term, SyntaxError> {
        match self.bump() {
            Some(FTok::Atom(s)) => Ok(Term::Atom(s)),
            Some(FTok::Int(n)) => Ok(Term::Int(n)),
            Some(FTok::Float(s)) => Ok(Term::Float(s)),
            Some(FTok::Ident(s)) => {
                if s == "true" {
                    return Ok(Term::Bool(true));
                }
                if s == "false" {
                    return Ok(Term::Bool(false));
                }
                // An identifier directly followed by `(` is an application
                if self.peek() == Some(&FTok::OpenParen) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&FTok::CloseParen) {
                        loop {
                            args.push(self.implication()?);
                            match self.bump() {
                                Some(FTok::Comma) => continue,
                                Some(FTok::CloseParen) => break,
                                _ => return self.error("expected `,` or `)` in an application"),
                            }
                        }
                    } else {
                        self.pos += 1;
                    }
                    return Ok(Term::App(s, args));
                }
                Ok(Term::Ident(s))
            }
            Some(FTok::OpenParen) => {
                let inner = self.implication()?;
                match self.bump() {
                    Some(FTok::CloseParen) => Ok(inner),
                    _ => self.error("expected `)`"),
                }
            }
            t => self.error(format!(
                "expected a term, found {}",
                t.map(|t| t.to_string()).unwrap_or_else(|| "end of formula".into())
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_translated_assignment() {
        let t = parse("('this.a^' = ('this.^b'))").unwrap();
        assert_eq!(
            t,
            Term::bin(
                Op::Eq,
                Term::Atom("this.a^".into()),
                Term::Atom("this.^b".into())
            )
        );
    }

    #[test]
    fn parses_block_meaning_conjunction() {
        let t = parse("true /\\ ('a^' = 'b^tag') /\\ type(int,'a^')").unwrap();
        match t {
            Term::Bin(Op::And, lhs, rhs) => {
                assert!(matches!(*lhs, Term::Bin(Op::And, _, _)));
                assert_eq!(
                    *rhs,
                    Term::App(
                        "type".into(),
                        vec![Term::Ident("int".into()), Term::Atom("a^".into())]
                    )
                );
            }
            t => panic!("expected a conjunction, got {}", t),
        }
    }

    #[test]
    fn negation_and_comparison_flip() {
        let t = parse("(-('this.^a' > 'this.^b'))").unwrap();
        assert_eq!(
            t,
            Term::not(Term::bin(
                Op::Gt,
                Term::Atom("this.^a".into()),
                Term::Atom("this.^b".into())
            ))
        );
    }

    #[test]
    fn negative_literals_fold() {
        assert_eq!(parse("- 3").unwrap(), Term::Int(-3));
        assert_eq!(
            parse("'x^' = -1").unwrap(),
            Term::bin(Op::Eq, Term::Atom("x^".into()), Term::Int(-1))
        );
    }

    #[test]
    fn implied_by_swaps_sides() {
        let fwd = parse("a ==> b").unwrap();
        let bwd = parse("b <== a").unwrap();
        assert_eq!(fwd, bwd);
    }

    #[test]
    fn comments_are_skipped() {
        let t = parse("true % translated from a line comment\n/\\ 'x^' = 1").unwrap();
        assert!(matches!(t, Term::Bin(Op::And, _, _)));
    }

    #[test]
    fn rejects_foreign_syntax() {
        assert!(parse("x @ y").is_err());
        assert!(parse("('a^' = ").is_err());
        assert!(parse("'unterminated").is_err());
    }
}
