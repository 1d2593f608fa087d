//! The TrueJ parse tree and its parser
//!
//! The tree is a closed set of node kinds; anything the proof pass cannot
//! translate is an internal error there, never a silent fallthrough. Every
//! node carries a [`NodeId`] (its identity in the rewrite table and scope
//! map) and a [`Span`] of indices into the full token stream, so that the
//! rewriter can substitute the node's text in place.

pub mod expr;
pub mod stmt;

pub use expr::{Expr, ExprKind};
pub use stmt::{Block, BlockStmt, Declarator, LocalDecl, MeansStmt, Stmt, StmtKind};

use crate::tokens::{Punc, Token, TokenKind};

/// Identity of a parse node, unique within one compilation
pub type NodeId = u32;

/// A contiguous range of indices into the *full* token stream, inclusive on
/// both ends
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

/// A significant token together with its index in the full stream
#[derive(Debug, Copy, Clone)]
pub struct Tok<'a> {
    /// Index into the full token stream (*not* the significant-only list)
    pub idx: usize,
    pub tok: Token<'a>,
}

impl<'a> Tok<'a> {
    pub fn span(&self) -> Span {
        Span {
            start: self.idx,
            end: self.idx,
        }
    }
}

/// A class declaration, the only top-level item
#[derive(Debug)]
pub struct ClassDecl<'a> {
    pub id: NodeId,
    pub span: Span,
    pub name: Tok<'a>,
    pub members: Vec<Member<'a>>,
}

#[derive(Debug)]
pub enum Member<'a> {
    Field(FieldDecl<'a>),
    Method(MethodDecl<'a>),
}

/// A field declaration, e.g. `int a, b;`
#[derive(Debug)]
pub struct FieldDecl<'a> {
    pub id: NodeId,
    pub span: Span,
    pub var_type: Tok<'a>,
    pub names: Vec<Tok<'a>>,
}

/// A method declaration
///
/// A means-statement written at class level directly after the method states
/// the method's meaning; it is parsed here as part of the method so the proof
/// pass can discharge it against the method's knowledge base.
#[derive(Debug)]
pub struct MethodDecl<'a> {
    pub id: NodeId,
    pub span: Span,
    pub return_type: Tok<'a>,
    pub name: Tok<'a>,
    pub params: Vec<(Tok<'a>, Tok<'a>)>,
    pub body: Block<'a>,
    pub means: Option<MeansStmt<'a>>,
}

/// A parse error: the offending token (if any) and what we expected
#[derive(Debug)]
pub struct ParseError<'a> {
    pub token: Option<Token<'a>>,
    pub message: String,
}

pub type ParseResult<'a, T> = Result<T, ParseError<'a>>;

/// Parses a whole file of class declarations
pub fn try_parse<'a>(tokens: &[Token<'a>]) -> ParseResult<'a, Vec<ClassDecl<'a>>> {
    let mut p = Parser::new(tokens);
    let mut classes = Vec::new();
    while !p.at_end() {
        classes.push(p.class_decl()?);
    }
    Ok(classes)
}

/// Recursive-descent parser state over the significant tokens
pub(crate) struct Parser<'a> {
    toks: Vec<Tok<'a>>,
    pos: usize,
    next_id: NodeId,
}

impl<'a> Parser<'a> {
    fn new(tokens: &[Token<'a>]) -> Self {
        let toks = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_significant())
            .map(|(idx, &tok)| Tok { idx, tok })
            .collect();
        Parser {
            toks,
            pos: 0,
            next_id: 0,
        }
    }

    pub(crate) fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    pub(crate) fn peek(&self) -> Option<Tok<'a>> {
        self.toks.get(self.pos).copied()
    }

    pub(crate) fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.tok.kind)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<Tok<'a>> {
        self.toks.get(self.pos + offset).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<Tok<'a>> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn error<T>(&self, message: impl Into<String>) -> ParseResult<'a, T> {
        Err(ParseError {
            token: self.peek().map(|t| t.tok),
            message: message.into(),
        })
    }

    /// Consumes a token of the given kind or fails with `expected`
    pub(crate) fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<'a, Tok<'a>> {
        match self.peek() {
            Some(t) if t.tok.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            _ => self.error(format!("expected {}", expected)),
        }
    }

    pub(crate) fn expect_punc(&mut self, punc: Punc, expected: &str) -> ParseResult<'a, Tok<'a>> {
        self.expect(TokenKind::Punc(punc), expected)
    }

    /// Consumes an identifier with the exact given text
    fn expect_keyword(&mut self, kw: &str) -> ParseResult<'a, Tok<'a>> {
        match self.peek() {
            Some(t) if t.tok.kind == TokenKind::Ident && t.tok.src == kw => {
                self.pos += 1;
                Ok(t)
            }
            _ => self.error(format!("expected `{}`", kw)),
        }
    }

    pub(crate) fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(t) if t.tok.kind == TokenKind::Ident && t.tok.src == kw)
    }

    pub(crate) fn at_punc(&self, punc: Punc) -> bool {
        self.peek_kind() == Some(TokenKind::Punc(punc))
    }

    fn class_decl(&mut self) -> ParseResult<'a, ClassDecl<'a>> {
        let id = self.fresh_id();
        let start = self.expect_keyword("class")?;
        let name = self.expect(TokenKind::Ident, "a class name")?;
        self.expect_punc(Punc::OpenCurly, "`{`")?;

        let mut members = Vec::new();
        while !self.at_punc(Punc::CloseCurly) {
            if self.at_end() {
                return self.error("expected `}` to close the class body");
            }
            self.member(&mut members)?;
        }
        let close = self.expect_punc(Punc::CloseCurly, "`}`")?;

        Ok(ClassDecl {
            id,
            span: start.span().to(close.span()),
            name,
            members,
        })
    }

    /// Parses one class member: a field, a method, or a means-statement that
    /// attaches to the preceding method
    fn member(&mut self, members: &mut Vec<Member<'a>>) -> ParseResult<'a, ()> {
        if self.at_keyword("means") {
            let means = self.means_stmt()?;
            match members.iter_mut().rev().find_map(|m| match m {
                Member::Method(m) => Some(m),
                Member::Field(_) => None,
            }) {
                Some(method) if method.means.is_none() => {
                    method.span = method.span.to(means.span);
                    method.means = Some(means);
                    Ok(())
                }
                Some(_) => self.error("the preceding method already has a means-statement"),
                None => self.error("a class-level means-statement must follow a method"),
            }
        } else {
            let var_type = self.expect(TokenKind::Ident, "a type or `means`")?;
            let name = self.expect(TokenKind::Ident, "a member name")?;
            if self.at_punc(Punc::OpenParen) {
                let method = self.method_decl(var_type, name)?;
                members.push(Member::Method(method));
            } else {
                let field = self.field_decl(var_type, name)?;
                members.push(Member::Field(field));
            }
            Ok(())
        }
    }

    fn field_decl(&mut self, var_type: Tok<'a>, first: Tok<'a>) -> ParseResult<'a, FieldDecl<'a>> {
        let id = self.fresh_id();
        let mut names = vec![first];
        while self.at_punc(Punc::Comma) {
            self.bump();
            names.push(self.expect(TokenKind::Ident, "a field name")?);
        }
        let semi = self.expect_punc(Punc::Semi, "`;`")?;
        Ok(FieldDecl {
            id,
            span: var_type.span().to(semi.span()),
            var_type,
            names,
        })
    }

    fn method_decl(
        &mut self,
        return_type: Tok<'a>,
        name: Tok<'a>,
    ) -> ParseResult<'a, MethodDecl<'a>> {
        let id = self.fresh_id();
        self.expect_punc(Punc::OpenParen, "`(`")?;
        let mut params = Vec::new();
        if !self.at_punc(Punc::CloseParen) {
            loop {
                let ty = self.expect(TokenKind::Ident, "a parameter type")?;
                let pname = self.expect(TokenKind::Ident, "a parameter name")?;
                params.push((ty, pname));
                if self.at_punc(Punc::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect_punc(Punc::CloseParen, "`)`")?;
        let body = self.block()?;
        Ok(MethodDecl {
            id,
            span: return_type.span().to(body.span),
            return_type,
            name,
            params,
            body,
            means: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::tokenize;

    fn parse(src: &str) -> Vec<ClassDecl> {
        let tokens = tokenize(src);
        try_parse(&tokens).unwrap_or_else(|e| panic!("parse error: {} at {:?}", e.message, e.token))
    }

    #[test]
    fn class_with_fields_and_method() {
        let classes = parse(
            "class Pair {
                int a, b;
                void swap() {
                    int startingA' = 'a;
                    a' = 'b;
                    b' = startingA';
                }
            }",
        );
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.name.tok.src, "Pair");
        assert_eq!(class.members.len(), 2);
        match &class.members[0] {
            Member::Field(f) => {
                assert_eq!(f.var_type.tok.src, "int");
                let names: Vec<_> = f.names.iter().map(|n| n.tok.src).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            m => panic!("expected a field, got {:?}", m),
        }
        match &class.members[1] {
            Member::Method(m) => {
                assert_eq!(m.name.tok.src, "swap");
                assert_eq!(m.body.stmts.len(), 3);
                assert!(m.means.is_none());
            }
            m => panic!("expected a method, got {:?}", m),
        }
    }

    #[test]
    fn class_level_means_attaches_to_method() {
        let classes = parse(
            "class BlockMeaning1 {
                int a, b, startingA;
                void swap() {
                    startingA' = 'a;
                    a' = 'b;
                    b' = startingA';
                }
                means(startingA' = 'a & a' = 'b & b' = startingA');
            }",
        );
        match &classes[0].members[1] {
            Member::Method(m) => assert!(m.means.is_some()),
            m => panic!("expected a method, got {:?}", m),
        }
    }

    #[test]
    fn means_without_method_is_an_error() {
        let tokens = tokenize("class C { means(true); }");
        let err = try_parse(&tokens).unwrap_err();
        assert!(err.message.contains("must follow a method"));
    }
}
