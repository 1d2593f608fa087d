//! Expression nodes and their parsing
//!
//! The grammar mirrors the Java expression grammar for the fragment TrueJ
//! uses, with the conjunctive boolean operators (`===`, `=!=`, `==>`, `<==`)
//! binding loosest of the binary operators. `=` is equality here — TrueJ
//! assignments are statements, not expressions.

use super::{NodeId, ParseResult, Parser, Span, Tok};
use crate::tokens::{Oper, Punc, TokenKind};

#[derive(Debug)]
pub struct Expr<'a> {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind<'a>,
}

#[derive(Debug)]
pub enum ExprKind<'a> {
    /// An integer, float, or `true`/`false` literal
    Literal(Tok<'a>),

    /// A variable reference: an undecorated identifier or a decorated value
    /// name (one token either way)
    Name(Tok<'a>),

    /// `<base>.<field>`, e.g. `this.a'`
    FieldAccess {
        base: Box<Expr<'a>>,
        field: Tok<'a>,
    },

    /// `<base>[<index>]`
    Index {
        base: Box<Expr<'a>>,
        index: Box<Expr<'a>>,
    },

    /// `<callee>(<args>)`
    Call {
        callee: Box<Expr<'a>>,
        args: Vec<Expr<'a>>,
    },

    /// `!e` or `-e`
    Unary {
        op: Tok<'a>,
        operand: Box<Expr<'a>>,
    },

    /// `<lhs> <op> <rhs>` for every binary operator
    Binary {
        lhs: Box<Expr<'a>>,
        op: Tok<'a>,
        rhs: Box<Expr<'a>>,
    },

    /// `<cond> ? <then> : <else>`
    Conditional {
        cond: Box<Expr<'a>>,
        then_expr: Box<Expr<'a>>,
        else_expr: Box<Expr<'a>>,
    },

    /// `<expr> instanceof <type>`
    InstanceOf {
        expr: Box<Expr<'a>>,
        type_name: Tok<'a>,
    },

    /// `( <expr> )` — kept as a node so the parentheses belong to a span
    Paren(Box<Expr<'a>>),
}

impl<'a> Expr<'a> {
    /// Strips any number of surrounding parentheses
    pub fn without_parens(&self) -> &Expr<'a> {
        match &self.kind {
            ExprKind::Paren(inner) => inner.without_parens(),
            _ => self,
        }
    }

    /// The operator token of a binary node, if this is one
    pub fn binary_op(&self) -> Option<Oper> {
        match &self.kind {
            ExprKind::Binary { op, .. } => match op.tok.kind {
                TokenKind::Oper(o) => Some(o),
                _ => None,
            },
            _ => None,
        }
    }
}

impl<'a> Parser<'a> {
    pub(crate) fn expr(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.conditional()
    }

    /// `( <expr> )`, producing a `Paren` node whose span covers the
    /// parentheses — conditions of `if` and `while` are translated with
    /// their parentheses included
    pub(crate) fn par_expr(&mut self) -> ParseResult<'a, Expr<'a>> {
        let open = self.expect_punc(Punc::OpenParen, "`(`")?;
        let inner = self.expr()?;
        let close = self.expect_punc(Punc::CloseParen, "`)`")?;
        Ok(Expr {
            id: self.fresh_id(),
            span: open.span().to(close.span()),
            kind: ExprKind::Paren(Box::new(inner)),
        })
    }

    fn conditional(&mut self) -> ParseResult<'a, Expr<'a>> {
        let cond = self.conj_bool()?;
        if !self.at_punc(Punc::Question) {
            return Ok(cond);
        }
        self.bump();
        let then_expr = self.expr()?;
        self.expect_punc(Punc::Colon, "`:`")?;
        let else_expr = self.conditional()?;
        Ok(Expr {
            id: self.fresh_id(),
            span: cond.span.to(else_expr.span),
            kind: ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
        })
    }

    fn conj_bool(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(
            &[Oper::Eqv, Oper::Neqv, Oper::Implies, Oper::ImpliedBy],
            Self::cond_or,
        )
    }

    fn cond_or(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::CondOr], Self::cond_and)
    }

    fn cond_and(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::CondAnd], Self::bit_or)
    }

    fn bit_or(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::Or], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::Xor], Self::bit_and)
    }

    fn bit_and(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::And], Self::equality)
    }

    fn equality(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::Eq, Oper::Ne], Self::relational)
    }

    fn relational(&mut self) -> ParseResult<'a, Expr<'a>> {
        let mut lhs = self.additive()?;
        loop {
            if self.at_keyword("instanceof") {
                self.bump();
                let type_name = self.expect(TokenKind::Ident, "a type name")?;
                lhs = Expr {
                    id: self.fresh_id(),
                    span: lhs.span.to(type_name.span()),
                    kind: ExprKind::InstanceOf {
                        expr: Box::new(lhs),
                        type_name,
                    },
                };
                continue;
            }
            match self.peek_oper(&[Oper::Lt, Oper::Le, Oper::Gt, Oper::Ge]) {
                Some(op) => {
                    self.bump();
                    let rhs = self.additive()?;
                    lhs = self.binary(lhs, op, rhs);
                }
                None => return Ok(lhs),
            }
        }
    }

    fn additive(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::Plus, Oper::Minus], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> ParseResult<'a, Expr<'a>> {
        self.binary_level(&[Oper::Star, Oper::Slash], Self::unary)
    }

    fn unary(&mut self) -> ParseResult<'a, Expr<'a>> {
        match self.peek_oper(&[Oper::Not, Oper::Minus]) {
            Some(op) => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expr {
                    id: self.fresh_id(),
                    span: op.span().to(operand.span),
                    kind: ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> ParseResult<'a, Expr<'a>> {
        let mut expr = self.primary()?;
        loop {
            if self.at_punc(Punc::Dot) {
                self.bump();
                let field = self.value_name("a field name")?;
                expr = Expr {
                    id: self.fresh_id(),
                    span: expr.span.to(field.span()),
                    kind: ExprKind::FieldAccess {
                        base: Box::new(expr),
                        field,
                    },
                };
            } else if self.at_punc(Punc::OpenSquare) {
                self.bump();
                let index = self.expr()?;
                let close = self.expect_punc(Punc::CloseSquare, "`]`")?;
                expr = Expr {
                    id: self.fresh_id(),
                    span: expr.span.to(close.span()),
                    kind: ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.at_punc(Punc::OpenParen) {
                self.bump();
                let mut args = Vec::new();
                if !self.at_punc(Punc::CloseParen) {
                    loop {
                        args.push(self.expr()?);
                        if self.at_punc(Punc::Comma) {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                let close = self.expect_punc(Punc::CloseParen, "`)`")?;
                expr = Expr {
                    id: self.fresh_id(),
                    span: expr.span.to(close.span()),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> ParseResult<'a, Expr<'a>> {
        match self.peek_kind() {
            Some(TokenKind::IntLiteral) | Some(TokenKind::FloatLiteral) => {
                let tok = self.bump().unwrap();
                Ok(Expr {
                    id: self.fresh_id(),
                    span: tok.span(),
                    kind: ExprKind::Literal(tok),
                })
            }
            Some(TokenKind::Ident)
            | Some(TokenKind::PreValueName)
            | Some(TokenKind::PostValueName)
            | Some(TokenKind::MidValueName) => {
                let tok = self.bump().unwrap();
                let kind = match tok.tok.src {
                    "true" | "false" => ExprKind::Literal(tok),
                    _ => ExprKind::Name(tok),
                };
                Ok(Expr {
                    id: self.fresh_id(),
                    span: tok.span(),
                    kind,
                })
            }
            Some(TokenKind::Punc(Punc::OpenParen)) => self.par_expr(),
            _ => self.error("expected an expression"),
        }
    }

    /// A possibly-decorated variable reference token
    pub(crate) fn value_name(&mut self, expected: &str) -> ParseResult<'a, Tok<'a>> {
        match self.peek_kind() {
            Some(TokenKind::Ident)
            | Some(TokenKind::PreValueName)
            | Some(TokenKind::PostValueName)
            | Some(TokenKind::MidValueName) => Ok(self.bump().unwrap()),
            _ => self.error(format!("expected {}", expected)),
        }
    }

    /// Parses a left-associative run of the given operators
    fn binary_level(
        &mut self,
        opers: &[Oper],
        next: fn(&mut Self) -> ParseResult<'a, Expr<'a>>,
    ) -> ParseResult<'a, Expr<'a>> {
        let mut lhs = next(self)?;
        while let Some(op) = self.peek_oper(opers) {
            self.bump();
            let rhs = next(self)?;
            lhs = self.binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn binary(&mut self, lhs: Expr<'a>, op: Tok<'a>, rhs: Expr<'a>) -> Expr<'a> {
        Expr {
            id: self.fresh_id(),
            span: lhs.span.to(rhs.span),
            kind: ExprKind::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            },
        }
    }

    fn peek_oper(&self, opers: &[Oper]) -> Option<Tok<'a>> {
        match self.peek() {
            Some(t) => match t.tok.kind {
                TokenKind::Oper(o) if opers.contains(&o) => Some(t),
                _ => None,
            },
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::tokenize;

    fn parse_expr(src: &'static str) -> Expr<'static> {
        let tokens = tokenize(src);
        let mut p = Parser::new(&tokens);
        let e = p.expr().unwrap_or_else(|e| panic!("parse error: {}", e.message));
        assert!(p.at_end(), "trailing tokens after expression");
        e
    }

    #[test]
    fn conjunction_binds_tighter_than_implication() {
        // a' = 'b & b' = 'a ==> c  parses as ((a' = 'b) & (b' = 'a)) ==> c
        let e = parse_expr("a' = 'b & b' = 'a ==> c");
        assert_eq!(e.binary_op(), Some(Oper::Implies));
        match &e.kind {
            ExprKind::Binary { lhs, .. } => assert_eq!(lhs.binary_op(), Some(Oper::And)),
            k => panic!("expected a binary node, got {:?}", k),
        }
    }

    #[test]
    fn equality_binds_tighter_than_conjunction() {
        let e = parse_expr("a' = 'b & b' = 'a");
        assert_eq!(e.binary_op(), Some(Oper::And));
        match &e.kind {
            ExprKind::Binary { lhs, rhs, .. } => {
                assert_eq!(lhs.binary_op(), Some(Oper::Eq));
                assert_eq!(rhs.binary_op(), Some(Oper::Eq));
            }
            k => panic!("expected a binary node, got {:?}", k),
        }
    }

    #[test]
    fn field_access_and_conditional() {
        let e = parse_expr("this.a' > 0 ? this.a' : -this.a'");
        match &e.kind {
            ExprKind::Conditional { cond, .. } => assert_eq!(cond.binary_op(), Some(Oper::Gt)),
            k => panic!("expected a conditional, got {:?}", k),
        }
    }

    #[test]
    fn parens_are_kept_as_nodes() {
        let e = parse_expr("('a > 'b)");
        match &e.kind {
            ExprKind::Paren(inner) => assert_eq!(inner.binary_op(), Some(Oper::Gt)),
            k => panic!("expected parens, got {:?}", k),
        }
        assert_eq!(e.without_parens().binary_op(), Some(Oper::Gt));
    }
}
