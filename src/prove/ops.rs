//! Surface-operator translation and boolean-term detection
//!
//! Equality and inequality have two prover spellings: arithmetic (`=`,
//! `#=`) and boolean (`===`, `=#=`). Which one an expression needs is
//! decided structurally from its first operand, without a full type
//! checker: literals, declared-boolean variables, logical operators, and a
//! few other forms count as boolean; everything else does not.

use crate::ast::{Expr, ExprKind};
use crate::scope::{ScopeId, ScopeMap};
use crate::tokens::{Oper, Token};

/// Whether the variable a token names was declared `boolean` (or boxed
/// `Boolean`)
pub fn is_boolean_variable(token: &Token, scopes: &ScopeMap, scope: ScopeId) -> bool {
    scopes.is_boolean(scope, token.variable_name())
}

/// Structural booleanness of an expression
///
/// Function calls and dot expressions that do not resolve to `this.x`
/// default to non-boolean; this is a known gap carried over deliberately.
pub fn has_boolean_terms(expr: &Expr, scopes: &ScopeMap, scope: ScopeId) -> bool {
    match &expr.kind {
        ExprKind::Literal(t) => t.tok.src == "true" || t.tok.src == "false",
        ExprKind::Name(t) => is_boolean_variable(&t.tok, scopes, scope),
        ExprKind::Unary { op, .. } => op.tok.src == "!",
        ExprKind::Binary { op, .. } => match op.tok.kind {
            crate::tokens::TokenKind::Oper(o) => matches!(
                o,
                Oper::And
                    | Oper::CondAnd
                    | Oper::Or
                    | Oper::CondOr
                    | Oper::Xor
                    | Oper::Eqv
                    | Oper::Neqv
                    | Oper::Implies
                    | Oper::ImpliedBy
                    | Oper::Eq
                    | Oper::Ne
                    | Oper::Lt
                    | Oper::Le
                    | Oper::Gt
                    | Oper::Ge
            ),
            _ => false,
        },
        // `c ? a : b` is judged by its first result
        ExprKind::Conditional { then_expr, .. } => has_boolean_terms(then_expr, scopes, scope),
        ExprKind::InstanceOf { .. } => true,
        // An indexing is boolean when its base is
        ExprKind::Index { base, .. } => has_boolean_terms(base, scopes, scope),
        ExprKind::FieldAccess { base, field } => match &base.kind {
            ExprKind::Name(b) if b.tok.src == "this" => {
                is_boolean_variable(&field.tok, scopes, scope)
            }
            _ => false,
        },
        // TODO: decide booleanness of a call from the callee's return type
        // once method signatures are collected
        ExprKind::Call { .. } => false,
        ExprKind::Paren(inner) => has_boolean_terms(inner, scopes, scope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::try_parse;
    use crate::ast::Member;
    use crate::report::Reports;
    use crate::scope::resolve;
    use crate::tokens::tokenize;

    /// Parses a class whose last method ends with `means(<expr>);` and
    /// returns booleanness of that expression
    fn boolean_in(src: &str) -> bool {
        let tokens = tokenize(src);
        let classes = try_parse(&tokens).unwrap_or_else(|e| panic!("parse: {}", e.message));
        let mut reports = Reports::new();
        let map = resolve(&classes, &mut reports);
        let method = classes[0]
            .members
            .iter()
            .find_map(|m| match m {
                Member::Method(m) => Some(m),
                _ => None,
            })
            .unwrap();
        let scope = map.scope_of(method.id).unwrap();
        let means = method.means.as_ref().expect("method-level means");
        has_boolean_terms(&means.expr, &map, scope)
    }

    #[test]
    fn literals_and_boolean_variables() {
        assert!(boolean_in(
            "class C { boolean f; void m() { f' = true; } means(f'); }"
        ));
        assert!(!boolean_in(
            "class C { int n; void m() { n' = 1; } means(n'); }"
        ));
    }

    #[test]
    fn operators_decide_structurally() {
        // A comparison is boolean even over integer operands
        assert!(boolean_in(
            "class C { int n; void m() { n' = 1; } means(n' > 0); }"
        ));
        // Arithmetic is not
        assert!(!boolean_in(
            "class C { int n; void m() { n' = 1; } means(n' + 1); }"
        ));
    }

    #[test]
    fn this_access_uses_the_field_type() {
        assert!(boolean_in(
            "class C { boolean f; void m() { f' = true; } means(this.f); }"
        ));
        assert!(!boolean_in(
            "class C { int n; void m() { n' = 1; } means(this.n); }"
        ));
    }

    #[test]
    fn calls_default_to_non_boolean() {
        assert!(!boolean_in(
            "class C { int n; void m() { n' = 1; } means(check(n')); }"
        ));
    }
}
