//! Statement and block nodes and their parsing

use super::expr::{Expr, ExprKind};
use super::{NodeId, ParseResult, Parser, Span, Tok};
use crate::tokens::{Oper, Punc, TokenKind};

/// A braced sequence of block-statements
#[derive(Debug)]
pub struct Block<'a> {
    pub id: NodeId,
    pub span: Span,
    pub stmts: Vec<BlockStmt<'a>>,
}

/// One element of a block: either a local declaration or a statement
#[derive(Debug)]
pub enum BlockStmt<'a> {
    Decl(LocalDecl<'a>),
    Stmt(Stmt<'a>),
}

/// `T v;` or `T v' = e;` with one or more declarators
#[derive(Debug)]
pub struct LocalDecl<'a> {
    pub id: NodeId,
    pub span: Span,
    pub var_type: Tok<'a>,
    pub declarators: Vec<Declarator<'a>>,
}

/// A single declarator: the declared (possibly decorated) name and an
/// optional initializer
#[derive(Debug)]
pub struct Declarator<'a> {
    pub id: NodeId,
    pub span: Span,
    pub name: Tok<'a>,
    /// The `=` token and initializing expression, if present
    pub init: Option<(Tok<'a>, Expr<'a>)>,
}

#[derive(Debug)]
pub struct Stmt<'a> {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind<'a>,
}

#[derive(Debug)]
pub enum StmtKind<'a> {
    Block(Block<'a>),

    /// `<target> = <expr> ;` where the target is a value name or `this.x'`
    Assign {
        target: Expr<'a>,
        op: Tok<'a>,
        value: Expr<'a>,
    },

    /// `if (<cond>) <then> [else <else>]` — the condition keeps its
    /// parentheses (it is a `Paren` expression)
    If {
        cond: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    /// `while (<cond>) <body>`
    While {
        cond: Expr<'a>,
        body: Box<Stmt<'a>>,
    },

    /// `return;` or `return <expr>;`
    Return { value: Option<Expr<'a>> },

    /// `means(<expr>);`
    Means(MeansStmt<'a>),

    /// A bare `;`
    Empty,
}

/// A means-statement: the assertion that, once proven, supplants the
/// meaning of everything above it in its block
#[derive(Debug)]
pub struct MeansStmt<'a> {
    pub id: NodeId,
    pub span: Span,
    pub expr: Expr<'a>,
}

impl<'a> Parser<'a> {
    pub(crate) fn block(&mut self) -> ParseResult<'a, Block<'a>> {
        let id = self.fresh_id();
        let open = self.expect_punc(Punc::OpenCurly, "`{`")?;
        let mut stmts = Vec::new();
        while !self.at_punc(Punc::CloseCurly) {
            if self.at_end() {
                return self.error("expected `}` to close the block");
            }
            stmts.push(self.block_stmt()?);
        }
        let close = self.expect_punc(Punc::CloseCurly, "`}`")?;
        Ok(Block {
            id,
            span: open.span().to(close.span()),
            stmts,
        })
    }

    fn block_stmt(&mut self) -> ParseResult<'a, BlockStmt<'a>> {
        // A local declaration starts with a type name followed by the
        // declared name; everything else is a statement.
        let declares = self.peek_kind() == Some(TokenKind::Ident)
            && matches!(
                self.peek_at(1).map(|t| t.tok.kind),
                Some(TokenKind::Ident)
                    | Some(TokenKind::PostValueName)
                    | Some(TokenKind::MidValueName)
            )
            && !self.at_keyword("return");

        if declares {
            Ok(BlockStmt::Decl(self.local_decl()?))
        } else {
            Ok(BlockStmt::Stmt(self.stmt()?))
        }
    }

    fn local_decl(&mut self) -> ParseResult<'a, LocalDecl<'a>> {
        let id = self.fresh_id();
        let var_type = self.expect(TokenKind::Ident, "a type name")?;
        let mut declarators = Vec::new();
        loop {
            declarators.push(self.declarator()?);
            if self.at_punc(Punc::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        let semi = self.expect_punc(Punc::Semi, "`;`")?;
        Ok(LocalDecl {
            id,
            span: var_type.span().to(semi.span()),
            var_type,
            declarators,
        })
    }

    fn declarator(&mut self) -> ParseResult<'a, Declarator<'a>> {
        let id = self.fresh_id();
        let name = self.value_name("a variable name")?;
        if name.tok.kind == TokenKind::PreValueName {
            return self.error("a declaration cannot name an entry value");
        }
        let init = match self.peek_kind() {
            Some(TokenKind::Oper(Oper::Eq)) => {
                let op = self.bump().unwrap();
                let value = self.expr()?;
                Some((op, value))
            }
            _ => None,
        };
        let end = init.as_ref().map(|(_, e)| e.span).unwrap_or(name.span());
        Ok(Declarator {
            id,
            span: name.span().to(end),
            name,
            init,
        })
    }

    pub(crate) fn stmt(&mut self) -> ParseResult<'a, Stmt<'a>> {
        let id = self.fresh_id();
        let start = match self.peek() {
            Some(t) => t,
            None => return self.error("expected a statement"),
        };

        if self.at_punc(Punc::OpenCurly) {
            let block = self.block()?;
            let span = block.span;
            return Ok(Stmt {
                id,
                span,
                kind: StmtKind::Block(block),
            });
        }

        if self.at_punc(Punc::Semi) {
            let semi = self.bump().unwrap();
            return Ok(Stmt {
                id,
                span: semi.span(),
                kind: StmtKind::Empty,
            });
        }

        if self.at_keyword("if") {
            self.bump();
            let cond = self.par_expr()?;
            let then_branch = Box::new(self.stmt()?);
            let else_branch = if self.at_keyword("else") {
                self.bump();
                Some(Box::new(self.stmt()?))
            } else {
                None
            };
            let end = else_branch
                .as_ref()
                .map(|s| s.span)
                .unwrap_or(then_branch.span);
            return Ok(Stmt {
                id,
                span: start.span().to(end),
                kind: StmtKind::If {
                    cond,
                    then_branch,
                    else_branch,
                },
            });
        }

        if self.at_keyword("while") {
            self.bump();
            let cond = self.par_expr()?;
            let body = Box::new(self.stmt()?);
            let end = body.span;
            return Ok(Stmt {
                id,
                span: start.span().to(end),
                kind: StmtKind::While { cond, body },
            });
        }

        if self.at_keyword("return") {
            self.bump();
            let value = if self.at_punc(Punc::Semi) {
                None
            } else {
                Some(self.expr()?)
            };
            let semi = self.expect_punc(Punc::Semi, "`;`")?;
            return Ok(Stmt {
                id,
                span: start.span().to(semi.span()),
                kind: StmtKind::Return { value },
            });
        }

        if self.at_keyword("means") {
            let means = self.means_stmt()?;
            let span = means.span;
            return Ok(Stmt {
                id,
                span,
                kind: StmtKind::Means(means),
            });
        }

        // Otherwise this must be an assignment
        let target = self.assignable()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Oper(Oper::Eq)) => self.bump().unwrap(),
            _ => return self.error("expected `=`"),
        };
        let value = self.expr()?;
        let semi = self.expect_punc(Punc::Semi, "`;`")?;
        Ok(Stmt {
            id,
            span: start.span().to(semi.span()),
            kind: StmtKind::Assign { target, op, value },
        })
    }

    /// `means ( <expr> ) ;`
    pub(crate) fn means_stmt(&mut self) -> ParseResult<'a, MeansStmt<'a>> {
        let id = self.fresh_id();
        let kw = self.expect(TokenKind::Ident, "`means`")?;
        self.expect_punc(Punc::OpenParen, "`(`")?;
        let expr = self.expr()?;
        self.expect_punc(Punc::CloseParen, "`)`")?;
        let semi = self.expect_punc(Punc::Semi, "`;`")?;
        Ok(MeansStmt {
            id,
            span: kw.span().to(semi.span()),
            expr,
        })
    }

    /// The target of an assignment: a decorated value name, optionally
    /// reached through `this.`
    fn assignable(&mut self) -> ParseResult<'a, Expr<'a>> {
        let first = self.value_name("an assignable value name")?;
        let mut expr = Expr {
            id: self.fresh_id(),
            span: first.span(),
            kind: ExprKind::Name(first),
        };
        if first.tok.src == "this" && self.at_punc(Punc::Dot) {
            self.bump();
            let field = self.value_name("a field value name")?;
            expr = Expr {
                id: self.fresh_id(),
                span: expr.span.to(field.span()),
                kind: ExprKind::FieldAccess {
                    base: Box::new(expr),
                    field,
                },
            };
        }
        match expr.kind {
            ExprKind::Name(tok) if tok.tok.kind == TokenKind::Ident && tok.tok.src != "this" => {
                // An undecorated assignment target would create no new value
                // name; TrueJ requires the decoration.
                self.error("an assignment target must be a decorated value name")
            }
            _ => Ok(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::tokenize;

    fn parse_stmt(src: &'static str) -> Stmt<'static> {
        let tokens = tokenize(src);
        let mut p = Parser::new(&tokens);
        let s = p.stmt().unwrap_or_else(|e| panic!("parse error: {}", e.message));
        assert!(p.at_end(), "trailing tokens after statement");
        s
    }

    #[test]
    fn assignment_to_post_value() {
        let s = parse_stmt("a' = 'b;");
        match s.kind {
            StmtKind::Assign { target, value, .. } => {
                assert!(matches!(target.kind, ExprKind::Name(t)
                    if t.tok.kind == TokenKind::PostValueName));
                assert!(matches!(value.kind, ExprKind::Name(t)
                    if t.tok.kind == TokenKind::PreValueName));
            }
            k => panic!("expected an assignment, got {:?}", k),
        }
    }

    #[test]
    fn if_with_else_and_blocks() {
        let s = parse_stmt("if ('a > 'b) { a' = 'b; b' = 'a; } else { a' = 'a; b' = 'b; }");
        match s.kind {
            StmtKind::If {
                cond, else_branch, ..
            } => {
                assert!(matches!(cond.kind, ExprKind::Paren(_)));
                assert!(else_branch.is_some());
            }
            k => panic!("expected an if, got {:?}", k),
        }
    }

    #[test]
    fn local_declaration_with_initializer() {
        let tokens = tokenize("int startingA' = 'a;");
        let mut p = Parser::new(&tokens);
        match p.block_stmt().unwrap() {
            BlockStmt::Decl(decl) => {
                assert_eq!(decl.var_type.tok.src, "int");
                assert_eq!(decl.declarators.len(), 1);
                let d = &decl.declarators[0];
                assert_eq!(d.name.tok.src, "startingA'");
                assert!(d.init.is_some());
            }
            b => panic!("expected a declaration, got {:?}", b),
        }
    }

    #[test]
    fn means_statement() {
        let s = parse_stmt("means(a' = 'b & b' = 'a);");
        match s.kind {
            StmtKind::Means(m) => {
                assert!(matches!(m.expr.kind, ExprKind::Binary { .. }));
            }
            k => panic!("expected a means-statement, got {:?}", k),
        }
    }

    #[test]
    fn empty_statement() {
        let s = parse_stmt(";");
        assert!(matches!(s.kind, StmtKind::Empty));
    }
}
