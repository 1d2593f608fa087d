//! The proof pass
//!
//! This is the final pass before code generation: it walks the resolved
//! parse tree depth-first, rewrites every executable construct into a
//! predicate over value names, maintains a knowledge base that mirrors the
//! scope stack, and discharges every means-statement against the prover.
//! When a compound claim cannot be shown whole, it is decomposed into its
//! conjuncts, left to right, and the first conjunct the prover cannot
//! support is reported at its original source text.
//!
//! User-level proof failures do not stop the pass (several may be reported
//! per method); an internal translation failure aborts it with a [`Fatal`].

pub mod names;
pub mod ops;
pub mod rewrite;

#[cfg(test)]
mod tests;

use crate::ast::{
    Block, BlockStmt, ClassDecl, Declarator, Expr, ExprKind, LocalDecl, MeansStmt, Member,
    MethodDecl, Stmt, StmtKind, Tok,
};
use crate::kb::solve::Budget;
use crate::kb::{Fatal, KnowledgeBase, ProofResult};
use crate::report::Reports;
use crate::scope::{ScopeId, ScopeMap};
use crate::tokens::{Oper, Token, TokenKind};
use rewrite::Rewriter;

pub const COMPONENT: &str = "Prover";

const AND: &str = " /\\ ";
const OR: &str = " \\/ ";
const NOT: &str = "-";

/// Driver-provided configuration for the pass
#[derive(Debug, Clone, Default)]
pub struct ProofOptions {
    /// When true, `return e;` translates only to `(return^' = e)`; when
    /// false (the default) `(return = e)` is asserted alongside it so claims
    /// may use either spelling.
    pub require_decorated_final_value: bool,
    /// Resource bounds handed to the prover
    pub budget: Budget,
}

/// Runs the proof pass over every class. Proof errors land in `reports`;
/// the returned string is the transcript of everything the prover saw.
pub fn prove_classes<'a>(
    classes: &[ClassDecl<'a>],
    tokens: &'a [Token<'a>],
    file_str: &'a str,
    scopes: &ScopeMap,
    options: &ProofOptions,
    reports: &mut Reports<'a>,
) -> Result<String, Fatal> {
    let mut pass = ProofPass {
        rewriter: Rewriter::new(file_str, tokens),
        scopes,
        kb: KnowledgeBase::with_budget(options.budget.clone()),
        options,
        reports,
    };
    for class in classes {
        pass.visit_class(class)?;
    }
    Ok(pass.rewriter.text())
}

struct ProofPass<'r, 'a> {
    rewriter: Rewriter<'a>,
    scopes: &'r ScopeMap,
    kb: KnowledgeBase,
    options: &'r ProofOptions,
    reports: &'r mut Reports<'a>,
}

impl<'r, 'a> ProofPass<'r, 'a> {
    /// Runs `f` inside a fresh child knowledge base, restoring the parent
    /// on every exit path, including error exits
    fn with_child_kb<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, Fatal>,
    ) -> Result<R, Fatal> {
        self.kb.push_child();
        let result = f(self);
        self.kb.pop_child();
        result
    }

    fn visit_class(&mut self, class: &ClassDecl<'a>) -> Result<(), Fatal> {
        let scope = self
            .scopes
            .scope_of(class.id)
            .ok_or_else(|| Fatal::new("class declaration without a scope"))?;
        for member in &class.members {
            if let Member::Method(method) = member {
                self.visit_method(method, scope)?;
            }
        }
        Ok(())
    }

    /// A method gets its own knowledge base; a means-statement following the
    /// method at class level states the method's meaning and is discharged
    /// before that knowledge base pops
    fn visit_method(&mut self, method: &MethodDecl<'a>, class_scope: ScopeId) -> Result<(), Fatal> {
        let scope = self.scopes.scope_of(method.id).unwrap_or(class_scope);
        self.with_child_kb(|s| {
            s.visit_block(&method.body, scope)?;
            if let Some(means) = &method.means {
                s.visit_means(means, scope)?;
            }
            Ok(())
        })
    }

    /// Translates a block into the meaning of its statements, changing the
    /// braces to parentheses. The children are visited top-down (inner
    /// proofs must see the accumulating knowledge base); the block's own
    /// text is then assembled bottom-up, stopping at the last
    /// means-statement, which summarizes everything above it. Declarations
    /// contribute type facts regardless of where the scan stops.
    fn visit_block(&mut self, block: &Block<'a>, outer_scope: ScopeId) -> Result<(), Fatal> {
        let scope = self.scopes.scope_of(block.id).unwrap_or(outer_scope);

        self.with_child_kb(|s| {
            for bs in &block.stmts {
                match bs {
                    BlockStmt::Decl(decl) => s.visit_local_decl(decl, scope)?,
                    BlockStmt::Stmt(stmt) => s.visit_stmt(stmt, scope)?,
                }
            }
            Ok(())
        })?;

        let mut active = true;
        let mut types = String::from("true");
        let mut meaning = String::from("true");
        for bs in block.stmts.iter().rev() {
            match bs {
                BlockStmt::Stmt(stmt) => {
                    if let StmtKind::Means(m) = &stmt.kind {
                        if active {
                            meaning.push_str(AND);
                            meaning.push_str(&self.rewriter.source(m.expr.span));
                            active = false;
                        }
                    } else if active {
                        meaning.push_str(AND);
                        meaning.push_str(&self.rewriter.source(stmt.span));
                    }
                }
                BlockStmt::Decl(decl) => {
                    for d in &decl.declarators {
                        types.push_str(AND);
                        types.push_str(&format!(
                            " type({},{})",
                            decl.var_type.tok.src,
                            self.rewriter.source(d.name.span())
                        ));
                        if d.init.is_some() && active {
                            meaning.push_str(AND);
                            meaning.push_str(&parenthesize(&self.rewriter.source(d.span)));
                        }
                    }
                }
            }
        }

        let meaning = parenthesize(&meaning);
        self.rewriter.substitute(block.span, meaning.clone());
        if types != "true" {
            self.kb.assume(&types)?;
        }
        self.kb.assume(&meaning)
    }

    fn visit_local_decl(&mut self, decl: &LocalDecl<'a>, scope: ScopeId) -> Result<(), Fatal> {
        for d in &decl.declarators {
            self.visit_declarator(d, scope)?;
        }
        Ok(())
    }

    /// An initialized declarator asserts `(v' = e)` — with `===` when the
    /// declared variable is boolean; an uninitialized one only renames
    fn visit_declarator(&mut self, d: &Declarator<'a>, scope: ScopeId) -> Result<(), Fatal> {
        self.visit_name_token(d.name, scope);
        if let Some((op, init)) = &d.init {
            self.visit_expr(init, scope)?;
            let boolean = ops::is_boolean_variable(&d.name.tok, self.scopes, scope);
            self.rewriter
                .replace_token(op.idx, if boolean { " === " } else { " = " });
            let src = self.rewriter.source(d.span);
            self.kb.assume(&src)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt<'a>, scope: ScopeId) -> Result<(), Fatal> {
        match &stmt.kind {
            StmtKind::Block(block) => self.visit_block(block, scope),

            StmtKind::Empty => {
                self.rewriter.substitute(stmt.span, "true");
                Ok(())
            }

            StmtKind::Assign { target, value, .. } => {
                self.visit_expr(target, scope)?;
                self.visit_expr(value, scope)?;

                let target_tok = assign_target_token(target)
                    .ok_or_else(|| Fatal::new("cannot translate this assignment target"))?;
                let boolean = ops::is_boolean_variable(&target_tok, self.scopes, scope);
                let op = if boolean { "===" } else { " = " };

                let src = parenthesize(&format!(
                    "{}{}{}",
                    self.rewriter.source(target.span),
                    op,
                    parenthesize(&self.rewriter.source(value.span))
                ));
                self.rewriter.substitute(stmt.span, src.clone());
                self.kb.assume(&src)
            }

            StmtKind::Return { value } => {
                let translation = match value {
                    None => "true".to_string(),
                    Some(v) => {
                        self.visit_expr(v, scope)?;
                        let e = self.rewriter.source(v.span);
                        let decorated = names::return_atom(self.scopes, scope);
                        let mut t = parenthesize(&format!("{} = {}", decorated, e));
                        if !self.options.require_decorated_final_value {
                            t.push_str(AND);
                            t.push_str(&parenthesize(&format!("return = {}", e)));
                        }
                        t
                    }
                };
                self.rewriter.substitute(stmt.span, translation);
                Ok(())
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let condition = self.translate_condition(cond, scope)?;
                let then_meaning = self.check_branch(&condition, then_branch, scope)?;
                let else_meaning = match else_branch {
                    None => negate(&condition),
                    Some(e) => self.check_branch(&negate(&condition), e, scope)?,
                };
                let meaning = parenthesize(&format!("{}{}{}", then_meaning, OR, else_meaning));
                self.rewriter.substitute(stmt.span, meaning);
                self.kb.assume(&self.rewriter.source(stmt.span))
            }

            // The loop keeps only its partial-correctness face: the guard
            // held and the body's meaning. Invariant reasoning is not
            // attempted here.
            StmtKind::While { cond, body } => {
                self.visit_expr(cond, scope)?;
                self.visit_stmt(body, scope)?;
                let condition = self.rewriter.source(cond.span);
                let body_src = parenthesize(&self.rewriter.source(body.span));
                self.rewriter
                    .substitute(stmt.span, parenthesize(&format!("{}{}{}", condition, AND, body_src)));
                Ok(())
            }

            StmtKind::Means(means) => self.visit_means(means, scope),
        }
    }

    fn translate_condition(&mut self, cond: &Expr<'a>, scope: ScopeId) -> Result<String, Fatal> {
        self.visit_expr(cond, scope)?;
        Ok(self.rewriter.source(cond.span))
    }

    /// A branch is a scope, but being a single statement it needs none of
    /// the usual scope paraphernalia: a child knowledge base that first
    /// assumes the guard is enough
    fn check_branch(
        &mut self,
        condition: &str,
        branch: &Stmt<'a>,
        scope: ScopeId,
    ) -> Result<String, Fatal> {
        self.with_child_kb(|s| {
            s.kb.assume(condition)?;
            s.visit_stmt(branch, scope)
        })?;
        Ok(parenthesize(&format!(
            "{}{}{}",
            condition,
            AND,
            self.rewriter.source(branch.span)
        )))
    }

    /// Discharges a means-statement: translate the predicate, try the whole
    /// claim, and on failure blame the first unprovable conjunct. A proven
    /// claim supplants everything assumed so far in the current knowledge
    /// base — readers may start reading from the last means-statement
    /// upward.
    fn visit_means(&mut self, means: &MeansStmt<'a>, scope: ScopeId) -> Result<(), Fatal> {
        self.visit_expr(&means.expr, scope)?;

        let for_prover = self.prolog_code(&self.rewriter.source(means.expr.span));
        let result = self.kb.substitute_if_proven(&for_prover)?;
        if result != ProofResult::ProvenTrue {
            self.prove_each_conjunct(&means.expr)?;
        }
        self.rewriter.substitute(means.expr.span, for_prover);
        Ok(())
    }

    /// Walks the conjunctive structure of a failed claim, left to right,
    /// proving what it can and reporting the first conjunct it cannot
    fn prove_each_conjunct(&mut self, conjunction: &Expr<'a>) -> Result<ProofResult, Fatal> {
        let conjunction = conjunction.without_parens();
        match conjunction.binary_op() {
            Some(Oper::And) | Some(Oper::CondAnd) => {
                if let ExprKind::Binary { lhs, rhs, .. } = &conjunction.kind {
                    for side in [lhs.as_ref(), rhs.as_ref()] {
                        let result = self.prove_each_conjunct(side)?;
                        if result != ProofResult::ProvenTrue {
                            return Ok(result);
                        }
                    }
                }
                Ok(ProofResult::ProvenTrue)
            }
            _ => {
                let formula = self.prolog_code(&self.rewriter.source(conjunction.span));
                let result = self.kb.assume_if_proven(&formula)?;
                self.report_any_error(conjunction, result);
                Ok(result)
            }
        }
    }

    fn report_any_error(&mut self, conjunct: &Expr<'a>, result: ProofResult) {
        let message = match result {
            ProofResult::ProvenTrue => return,
            ProofResult::Unsupported => format!(
                "The code does not support the proof of the statement: {}",
                self.rewriter.original_source(conjunct.span)
            ),
            ProofResult::ReachedLimit => format!(
                "The prover reached an internal limit. Consider adding a lemma to help prove \
                 the statement: \n    {}",
                self.rewriter.original_source(conjunct.span)
            ),
        };
        let token = self.rewriter.token(conjunct.span.start);
        self.reports.collect(COMPONENT, Some(token), message);
    }

    /// Final fixups on text bound for the prover: quantified variables get
    /// their type facts expanded (a declared hook, currently the identity),
    /// and the surface line-comment marker becomes the prover's
    fn prolog_code(&self, source: &str) -> String {
        expand_forall(source).replace("//", "%")
    }

    fn visit_expr(&mut self, expr: &Expr<'a>, scope: ScopeId) -> Result<(), Fatal> {
        match &expr.kind {
            ExprKind::Literal(t) => {
                // A float like `.25` needs its leading zero for the prover
                if t.tok.kind == TokenKind::FloatLiteral && t.tok.src.starts_with('.') {
                    self.rewriter.substitute(t.span(), format!("0{}", t.tok.src));
                }
                Ok(())
            }

            ExprKind::Name(t) => {
                self.visit_name_token(*t, scope);
                Ok(())
            }

            ExprKind::FieldAccess { base, field } => match &base.kind {
                ExprKind::Name(b) if b.tok.src == "this" => {
                    let atom = match names::prover_atom(&field.tok, self.scopes, scope) {
                        Some(atom) => atom,
                        // An undecorated field reference still becomes one
                        // prover atom
                        None => format!("'this.{}'", field.tok.src),
                    };
                    self.rewriter.substitute(expr.span, atom);
                    Ok(())
                }
                _ => Err(Fatal::new(format!(
                    "cannot translate a field access through `{}`; only `this` is supported",
                    self.rewriter.original_source(base.span)
                ))),
            },

            ExprKind::Index { base, index } => {
                self.visit_expr(base, scope)?;
                self.visit_expr(index, scope)
            }

            ExprKind::Call { callee, args } => {
                // The callee names a method, not a value
                if !matches!(callee.kind, ExprKind::Name(_)) {
                    self.visit_expr(callee, scope)?;
                }
                for a in args {
                    self.visit_expr(a, scope)?;
                }
                Ok(())
            }

            ExprKind::Unary { op, operand } => {
                self.visit_expr(operand, scope)?;
                if op.tok.src == "!" {
                    self.rewriter.replace_token(op.idx, NOT);
                }
                Ok(())
            }

            ExprKind::Binary { lhs, op, rhs } => {
                self.visit_expr(lhs, scope)?;
                self.visit_expr(rhs, scope)?;
                self.translate_binary(expr, lhs, *op, scope)
            }

            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit_expr(cond, scope)?;
                self.visit_expr(then_expr, scope)?;
                self.visit_expr(else_expr, scope)
            }

            ExprKind::InstanceOf { expr: inner, .. } => self.visit_expr(inner, scope),

            ExprKind::Paren(inner) => self.visit_expr(inner, scope),
        }
    }

    /// Rewrites a binary operator to its prover spelling, lifting `=`/`!=`
    /// to `===`/`=#=` when the first operand is boolean, and parenthesizes
    /// the arithmetic and relational forms
    fn translate_binary(
        &mut self,
        whole: &Expr<'a>,
        lhs: &Expr<'a>,
        op: Tok<'a>,
        scope: ScopeId,
    ) -> Result<(), Fatal> {
        let oper = match op.tok.kind {
            TokenKind::Oper(o) => o,
            _ => return Err(Fatal::new("binary node without an operator token")),
        };
        match oper {
            Oper::And | Oper::CondAnd => {
                self.rewriter.replace_token(op.idx, "/\\");
            }
            Oper::Or | Oper::CondOr => {
                self.rewriter.replace_token(op.idx, "\\/");
            }
            Oper::Neqv => {
                self.rewriter.replace_token(op.idx, "=#=");
            }
            // ===, ==>, and <== are already the prover's spellings
            Oper::Eqv | Oper::Implies | Oper::ImpliedBy => (),

            Oper::Le | Oper::Eq | Oper::Ne | Oper::Lt | Oper::Gt | Oper::Ge => {
                let boolean = ops::has_boolean_terms(lhs, self.scopes, scope);
                match oper {
                    Oper::Le => self.rewriter.replace_token(op.idx, "=<"),
                    Oper::Eq => self
                        .rewriter
                        .replace_token(op.idx, if boolean { "===" } else { " = " }),
                    Oper::Ne => self
                        .rewriter
                        .replace_token(op.idx, if boolean { "=#=" } else { "#=" }),
                    _ => (),
                }
                let src = self.rewriter.source(whole.span);
                self.rewriter.substitute(whole.span, parenthesize(&src));
            }

            Oper::Plus | Oper::Minus | Oper::Star | Oper::Slash => {
                let src = self.rewriter.source(whole.span);
                self.rewriter.substitute(whole.span, parenthesize(&src));
            }

            // Exclusive-or has no prover spelling yet; leaving it untouched
            // surfaces as an internal error if a claim ever queries it
            Oper::Xor | Oper::Not => (),
        }
        Ok(())
    }

    fn visit_name_token(&mut self, t: Tok<'a>, scope: ScopeId) {
        if let Some(atom) = names::prover_atom(&t.tok, self.scopes, scope) {
            self.rewriter.substitute(t.span(), atom);
        }
    }
}

/// The token naming the variable an assignment writes
fn assign_target_token<'a>(target: &Expr<'a>) -> Option<Token<'a>> {
    match &target.kind {
        ExprKind::Name(t) => Some(t.tok),
        ExprKind::FieldAccess { field, .. } => Some(field.tok),
        _ => None,
    }
}

fn parenthesize(text: &str) -> String {
    format!("({})", text)
}

fn negate(condition: &str) -> String {
    parenthesize(&format!("{}{}", NOT, condition))
}

/// Searches a claim for variables bound by `forall` and conjoins the
/// expanded type facts for them inside the quantified scope.
///
/// TODO: expand the bound variables' type constraints once quantifiers are
/// translated; until then this is the identity and proofs that need the
/// types of bound variables will fail as unsupported.
fn expand_forall(statement: &str) -> String {
    statement.to_string()
}
